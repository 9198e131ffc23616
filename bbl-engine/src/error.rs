//
// Top-level session/engine errors. Wire decode failures stay
// as `bbl_packet::error::DecodeError` and are counted rather than
// propagated; this enum covers violations the session and registry layers
// detect once a packet has been parsed, plus the handful of operational
// failures the control socket needs to report as 4xx/5xx.
//

use std::fmt;

#[derive(Debug)]
pub enum Error {
    NoSuchSession(u32),
    DuplicateKey(bbl_utils::session_key::SessionKey),
    NoSuchInterface(u32),
    UnexpectedState { state: &'static str, event: &'static str },
    AuthenticationFailed,
    PoolExhausted,
    L2tp(bbl_l2tp::Error),
    Isis(bbl_isis::Error),
    NoSuchTunnel(u16),
    NoSuchL2tpSession(u16),
    IsisNotConfigured,
    NoSuchFlow(u64),
    GroupAlreadyActive,
    GroupNotFound,
    GroupInUseByZapping,
    NoGroupSlot,
    NotPppoe,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoSuchSession(id) => write!(f, "no such session {id}"),
            Error::DuplicateKey(key) => write!(f, "session key already in use: {key}"),
            Error::NoSuchInterface(ifindex) => write!(f, "no such interface {ifindex}"),
            Error::UnexpectedState { state, event } => {
                write!(f, "unexpected {event} in state {state}")
            }
            Error::AuthenticationFailed => write!(f, "session authentication failed"),
            Error::PoolExhausted => write!(f, "session id pool exhausted"),
            Error::L2tp(e) => write!(f, "l2tp: {e}"),
            Error::Isis(e) => write!(f, "isis: {e}"),
            Error::NoSuchTunnel(id) => write!(f, "no such tunnel {id}"),
            Error::NoSuchL2tpSession(id) => write!(f, "no such l2tp session {id}"),
            Error::IsisNotConfigured => write!(f, "isis instance not configured"),
            Error::NoSuchFlow(id) => write!(f, "no such flow {id}"),
            Error::GroupAlreadyActive => write!(f, "group already exists"),
            Error::GroupNotFound => write!(f, "group not found"),
            Error::GroupInUseByZapping => write!(f, "group used by zapping test"),
            Error::NoGroupSlot => write!(f, "no igmp group slot available"),
            Error::NotPppoe => write!(f, "matching session is not of type pppoe"),
        }
    }
}

impl std::error::Error for Error {}

impl From<bbl_l2tp::Error> for Error {
    fn from(e: bbl_l2tp::Error) -> Self {
        Error::L2tp(e)
    }
}

impl From<bbl_isis::Error> for Error {
    fn from(e: bbl_isis::Error) -> Self {
        Error::Isis(e)
    }
}
