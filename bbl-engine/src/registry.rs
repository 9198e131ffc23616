//
// Session registry: allocates session ids and indexes live sessions both
// by id and by composite key (`SessionKey`), a first-class type rather
// than packed/unpacked ad hoc. Released ids are queued on an idle list
// for reuse instead of letting ids grow unbounded.
//

use std::collections::HashMap;

use bbl_utils::session_key::SessionKey;

use crate::error::Error;
use crate::session::Session;

#[derive(Default)]
pub struct Registry {
    sessions: HashMap<u32, Session>,
    by_key: HashMap<SessionKey, u32>,
    next_id: u32,
    idle_ids: Vec<u32>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            sessions: HashMap::new(),
            by_key: HashMap::new(),
            next_id: 1,
            idle_ids: Vec::new(),
        }
    }

    /// Allocates the next session id, preferring ids released by a
    /// previously terminated session before minting a new one.
    fn allocate_id(&mut self) -> Result<u32, Error> {
        if let Some(id) = self.idle_ids.pop() {
            return Ok(id);
        }
        if self.next_id == u32::MAX {
            return Err(Error::PoolExhausted);
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    /// Reserves an id and its composite key for a new session before the
    /// `Session` value itself exists, so the caller can build it with the
    /// id baked in (invariant I1: exactly one session owns a key at a
    /// time).
    pub fn reserve(&mut self, key: SessionKey) -> Result<u32, Error> {
        if self.by_key.contains_key(&key) {
            return Err(Error::DuplicateKey(key));
        }
        let id = self.allocate_id()?;
        self.by_key.insert(key, id);
        Ok(id)
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.session_id, session);
    }

    pub fn get(&self, session_id: u32) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    pub fn get_mut(&mut self, session_id: u32) -> Option<&mut Session> {
        self.sessions.get_mut(&session_id)
    }

    pub fn get_by_key(&self, key: &SessionKey) -> Option<&Session> {
        self.by_key.get(key).and_then(|id| self.sessions.get(id))
    }

    pub fn get_by_key_mut(&mut self, key: &SessionKey) -> Option<&mut Session> {
        let id = *self.by_key.get(key)?;
        self.sessions.get_mut(&id)
    }

    pub fn resolve_id(&self, key: &SessionKey) -> Option<u32> {
        self.by_key.get(key).copied()
    }

    /// Removes a session from both indices and queues its id for re-use.
    /// The caller is responsible for cancelling the session's timers and
    /// detaching its flows first (invariant I5).
    pub fn remove(&mut self, session_id: u32) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;
        self.by_key.remove(&session.key);
        self.idle_ids.push(session_id);
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.sessions.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Driver, SessionType};
    use bbl_utils::mac_addr::MacAddr;
    use std::time::Instant;

    fn dummy_session(id: u32, key: SessionKey) -> Session {
        Session::new(
            id,
            key,
            SessionType::Ipoe,
            MacAddr::ZERO,
            MacAddr::ZERO,
            Driver::Ipoe(crate::session::ipoe::Ipoe::new(
                MacAddr::ZERO,
                None,
                0,
                false,
                false,
                vec![],
                false,
                false,
            )),
            Instant::now(),
        )
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut reg = Registry::new();
        let key = SessionKey::new(1, 10, 20);
        let id = reg.reserve(key).unwrap();
        reg.insert(dummy_session(id, key));
        assert!(matches!(reg.reserve(key), Err(Error::DuplicateKey(_))));
    }

    #[test]
    fn removed_id_is_recycled() {
        let mut reg = Registry::new();
        let key = SessionKey::new(1, 10, 20);
        let id = reg.reserve(key).unwrap();
        reg.insert(dummy_session(id, key));
        reg.remove(id);
        assert!(reg.get_by_key(&key).is_none());
        let key2 = SessionKey::new(1, 10, 21);
        let id2 = reg.reserve(key2).unwrap();
        assert_eq!(id, id2, "idle id should be recycled before minting a new one");
    }
}
