//
// L2TP LNS errors. Wire decode failures are
// `bbl_packet::error::DecodeError` and never reach here; these are
// violations the tunnel/session state machines detect once a control
// message has been parsed.
//

use std::fmt;

#[derive(Debug)]
pub enum Error {
    UnexpectedMessage {
        state: &'static str,
        message_type: &'static str,
    },
    MissingAvp(&'static str),
    AuthenticationFailed,
    NoSuchTunnel(u16),
    NoSuchSession(u16),
    RetriesExhausted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedMessage { state, message_type } => {
                write!(f, "unexpected {message_type} in state {state}")
            }
            Error::MissingAvp(name) => write!(f, "missing required avp {name}"),
            Error::AuthenticationFailed => write!(f, "l2tp tunnel authentication failed"),
            Error::NoSuchTunnel(id) => write!(f, "no such tunnel {id}"),
            Error::NoSuchSession(id) => write!(f, "no such session {id}"),
            Error::RetriesExhausted => write!(f, "control message retries exhausted"),
        }
    }
}

impl std::error::Error for Error {}
