//
// Per-packet codec errors.
//

use std::fmt;

#[derive(Debug)]
pub enum DecodeError {
    Truncated { wanted: usize, have: usize },
    UnknownProtocol(u16),
    WrongMagic,
    Malformed(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { wanted, have } => {
                write!(f, "truncated packet: wanted {wanted} bytes, have {have}")
            }
            DecodeError::UnknownProtocol(v) => write!(f, "unknown protocol 0x{v:04x}"),
            DecodeError::WrongMagic => write!(f, "magic number mismatch"),
            DecodeError::Malformed(what) => write!(f, "malformed {what}"),
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug)]
pub enum EncodeError {
    BufferTooSmall,
    TooManyOptions,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BufferTooSmall => write!(f, "output buffer too small"),
            EncodeError::TooManyOptions => write!(f, "too many options to encode"),
        }
    }
}

impl std::error::Error for EncodeError {}

pub fn need(buf_len: usize, wanted: usize) -> Result<(), DecodeError> {
    if buf_len < wanted {
        Err(DecodeError::Truncated {
            wanted,
            have: buf_len,
        })
    } else {
        Ok(())
    }
}
