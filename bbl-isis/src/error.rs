//
// IS-IS instance errors. Per-PDU decode failures are `bbl_packet::error::
// DecodeError` and never reach here; this enum is for violations the
// instance itself detects once a PDU has been parsed.
//

use std::fmt;

#[derive(Debug)]
pub enum Error {
    AuthenticationFailed,
    UnknownLevel(u8),
    LspTooLarge,
    NoSuchAdjacency,
    MalformedMrt,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AuthenticationFailed => write!(f, "isis authentication failed"),
            Error::UnknownLevel(l) => write!(f, "unknown isis level {l}"),
            Error::LspTooLarge => write!(f, "lsp exceeds interface mtu"),
            Error::NoSuchAdjacency => write!(f, "no such adjacency"),
            Error::MalformedMrt => write!(f, "malformed mrt dump"),
        }
    }
}

impl std::error::Error for Error {}
