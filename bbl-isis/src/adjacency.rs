//
// IS-IS adjacency state machine: the standard three-way
// Down/Init/Up on P2P interfaces, two-way election on LAN. Each adjacency
// also owns its flood tree (SRM-equivalent) and PSNP tree (SSN-equivalent).
//

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use bbl_packet::isis::LspId;
use bbl_timer::TimerHandle;

use crate::debug::Debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdjacencyState {
    Down,
    Init,
    Up,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdjacencyEvent {
    HelloOneWayRcvd,
    HelloTwoWayRcvd,
    HoldtimeExpired,
    LinkDown,
    Kill,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    L1,
    L2,
}

pub struct Adjacency {
    pub ifindex: u32,
    pub level: Level,
    pub peer_system_id: [u8; 6],
    pub state: AdjacencyState,
    pub holding_time: u16,
    pub window_size: usize,
    /// LSPs this adjacency still needs to send.
    pub flood_tree: VecDeque<LspId>,
    /// LSPs in the flood tree waiting for an ack, keyed by the time they
    /// were transmitted so the retry timer can find them.
    pub wait_ack: std::collections::HashMap<LspId, Instant>,
    /// LSPs received from this peer that still need acknowledging via PSNP
    ///.
    pub psnp_tree: HashSet<LspId>,
    pub hello_timer: Option<TimerHandle>,
    pub holding_timer: Option<TimerHandle>,
    pub csnp_timer: Option<TimerHandle>,
    pub psnp_timer: Option<TimerHandle>,
}

impl Adjacency {
    pub fn new(ifindex: u32, level: Level, peer_system_id: [u8; 6], window_size: usize) -> Self {
        Adjacency {
            ifindex,
            level,
            peer_system_id,
            state: AdjacencyState::Down,
            holding_time: 0,
            window_size,
            flood_tree: VecDeque::new(),
            wait_ack: std::collections::HashMap::new(),
            psnp_tree: HashSet::new(),
            hello_timer: None,
            holding_timer: None,
            csnp_timer: None,
            psnp_timer: None,
        }
    }

    pub fn state_change(&mut self, event: AdjacencyEvent, new_state: AdjacencyState) {
        if self.state == new_state {
            return;
        }
        Debug::AdjacencyStateChange(&self.peer_system_id, self.state, new_state, event).log();
        if new_state != AdjacencyState::Up {
            // clears SRM and SSN for just this adjacency's own trees; callers
            // are responsible for the interface-wide clear.
            self.flood_tree.clear();
            self.wait_ack.clear();
            self.psnp_tree.clear();
        }
        self.state = new_state;
    }

    /// Marks `lsp_id` for transmission on this adjacency unless it is
    /// already pending or awaiting an ack.
    pub fn flood_insert(&mut self, lsp_id: LspId) {
        if self.wait_ack.contains_key(&lsp_id) || self.flood_tree.contains(&lsp_id) {
            return;
        }
        self.flood_tree.push_back(lsp_id);
    }

    pub fn flood_remove(&mut self, lsp_id: LspId) {
        self.flood_tree.retain(|id| *id != lsp_id);
        self.wait_ack.remove(&lsp_id);
    }

    /// Walks the flood tree under the adjacency's window size, moving each
    /// drained entry into `wait_ack`. Returns the LSP ids to actually transmit,
    /// bounding I-FLOOD's "at most window_size per TX tick per adjacency".
    pub fn drain_flood_tree(&mut self, now: Instant) -> Vec<LspId> {
        let mut out = Vec::with_capacity(self.window_size);
        for _ in 0..self.window_size {
            let Some(lsp_id) = self.flood_tree.pop_front() else {
                break;
            };
            self.wait_ack.insert(lsp_id, now);
            out.push(lsp_id);
        }
        out
    }

    /// Clears `wait_ack` entries whose retry deadline has passed, making
    /// them eligible to be re-drained from the flood tree on the next tick.
    pub fn expire_retries(&mut self, now: Instant, retry_interval: std::time::Duration) {
        let expired: Vec<LspId> = self
            .wait_ack
            .iter()
            .filter(|(_, sent)| now.duration_since(**sent) >= retry_interval)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.wait_ack.remove(&id);
            if !self.flood_tree.contains(&id) {
                self.flood_tree.push_back(id);
            }
        }
    }

    /// Acknowledges `lsp_id` as seen by the peer (CSNP/PSNP entry with
    /// equal-or-higher sequence) - removes it from both trees.
    pub fn ack(&mut self, lsp_id: LspId) {
        self.flood_remove(lsp_id);
    }
}
