//
// PPP session framing, LCP, PAP and CHAP.
//
// PPPoE session frames carry a 2-byte PPP protocol field directly (no HDLC
// framing/escaping, since there's no serial link here) followed by the
// protocol's payload.
//

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, DecodeError};

pub const PROTO_IPV4: u16 = 0x0021;
pub const PROTO_IPV6: u16 = 0x0057;
pub const PROTO_LCP: u16 = 0xc021;
pub const PROTO_PAP: u16 = 0xc023;
pub const PROTO_CHAP: u16 = 0xc223;
pub const PROTO_IPCP: u16 = 0x8021;
pub const PROTO_IP6CP: u16 = 0x8057;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LcpCode {
    ConfigureRequest,
    ConfigureAck,
    ConfigureNak,
    ConfigureReject,
    TerminateRequest,
    TerminateAck,
    CodeReject,
    ProtocolReject,
    EchoRequest,
    EchoReply,
    DiscardRequest,
}

impl LcpCode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => LcpCode::ConfigureRequest,
            2 => LcpCode::ConfigureAck,
            3 => LcpCode::ConfigureNak,
            4 => LcpCode::ConfigureReject,
            5 => LcpCode::TerminateRequest,
            6 => LcpCode::TerminateAck,
            7 => LcpCode::CodeReject,
            8 => LcpCode::ProtocolReject,
            9 => LcpCode::EchoRequest,
            10 => LcpCode::EchoReply,
            11 => LcpCode::DiscardRequest,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            LcpCode::ConfigureRequest => 1,
            LcpCode::ConfigureAck => 2,
            LcpCode::ConfigureNak => 3,
            LcpCode::ConfigureReject => 4,
            LcpCode::TerminateRequest => 5,
            LcpCode::TerminateAck => 6,
            LcpCode::CodeReject => 7,
            LcpCode::ProtocolReject => 8,
            LcpCode::EchoRequest => 9,
            LcpCode::EchoReply => 10,
            LcpCode::DiscardRequest => 11,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LcpOption {
    Mru(u16),
    AuthProtocol(u16),
    MagicNumber(u32),
    Unknown(u8, Vec<u8>),
}

const OPT_MRU: u8 = 1;
const OPT_AUTH_PROTOCOL: u8 = 3;
const OPT_MAGIC_NUMBER: u8 = 5;

#[derive(Clone, Debug)]
pub struct LcpPacket {
    pub code: LcpCode,
    pub identifier: u8,
    pub options: Vec<LcpOption>,
    /// Raw payload for Echo/Discard/TerminateRequest, which carry an
    /// opaque "data" field rather than options.
    pub data: Vec<u8>,
}

impl LcpPacket {
    pub fn magic_number(&self) -> Option<u32> {
        self.options.iter().find_map(|o| match o {
            LcpOption::MagicNumber(m) => Some(*m),
            _ => None,
        })
    }

    pub fn decode(buf: &mut impl Buf) -> Result<LcpPacket, DecodeError> {
        need(buf.remaining(), 4)?;
        let code =
            LcpCode::from_u8(buf.get_u8()).ok_or(DecodeError::Malformed("lcp code"))?;
        let identifier = buf.get_u8();
        let length = buf.get_u16() as usize;
        if length < 4 {
            return Err(DecodeError::Malformed("lcp length"));
        }
        need(buf.remaining(), length - 4)?;
        let mut body = buf.copy_to_bytes(length - 4);
        let (options, data) = match code {
            LcpCode::ConfigureRequest
            | LcpCode::ConfigureAck
            | LcpCode::ConfigureNak
            | LcpCode::ConfigureReject => (decode_options(&mut body)?, Vec::new()),
            _ => (Vec::new(), body.copy_to_bytes(body.remaining()).to_vec()),
        };
        Ok(LcpPacket {
            code,
            identifier,
            options,
            data,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.code.as_u8());
        buf.put_u8(self.identifier);
        let mut body = BytesMut::new();
        match self.code {
            LcpCode::ConfigureRequest
            | LcpCode::ConfigureAck
            | LcpCode::ConfigureNak
            | LcpCode::ConfigureReject => {
                for opt in &self.options {
                    encode_option(opt, &mut body);
                }
            }
            _ => body.put_slice(&self.data),
        }
        buf.put_u16((body.len() + 4) as u16);
        buf.put_slice(&body);
    }
}

fn decode_options(buf: &mut Bytes) -> Result<Vec<LcpOption>, DecodeError> {
    let mut options = Vec::new();
    while buf.remaining() >= 2 {
        let opt_type = buf.get_u8();
        let opt_len = buf.get_u8() as usize;
        if opt_len < 2 || buf.remaining() < opt_len - 2 {
            return Err(DecodeError::Malformed("lcp option"));
        }
        let mut value = buf.copy_to_bytes(opt_len - 2);
        options.push(match opt_type {
            OPT_MRU if value.remaining() >= 2 => LcpOption::Mru(value.get_u16()),
            OPT_AUTH_PROTOCOL if value.remaining() >= 2 => {
                LcpOption::AuthProtocol(value.get_u16())
            }
            OPT_MAGIC_NUMBER if value.remaining() >= 4 => {
                LcpOption::MagicNumber(value.get_u32())
            }
            other => LcpOption::Unknown(other, value.copy_to_bytes(value.remaining()).to_vec()),
        });
    }
    Ok(options)
}

fn encode_option(opt: &LcpOption, buf: &mut BytesMut) {
    match opt {
        LcpOption::Mru(mru) => {
            buf.put_u8(OPT_MRU);
            buf.put_u8(4);
            buf.put_u16(*mru);
        }
        LcpOption::AuthProtocol(proto) => {
            buf.put_u8(OPT_AUTH_PROTOCOL);
            buf.put_u8(4);
            buf.put_u16(*proto);
        }
        LcpOption::MagicNumber(magic) => {
            buf.put_u8(OPT_MAGIC_NUMBER);
            buf.put_u8(6);
            buf.put_u32(*magic);
        }
        LcpOption::Unknown(t, v) => {
            buf.put_u8(*t);
            buf.put_u8((v.len() + 2) as u8);
            buf.put_slice(v);
        }
    }
}

// ===== PAP =====

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PapCode {
    AuthenticateRequest,
    AuthenticateAck,
    AuthenticateNak,
}

#[derive(Clone, Debug)]
pub enum PapPacket {
    Request {
        identifier: u8,
        peer_id: String,
        password: String,
    },
    Ack {
        identifier: u8,
        message: String,
    },
    Nak {
        identifier: u8,
        message: String,
    },
}

impl PapPacket {
    pub fn code(&self) -> PapCode {
        match self {
            PapPacket::Request { .. } => PapCode::AuthenticateRequest,
            PapPacket::Ack { .. } => PapCode::AuthenticateAck,
            PapPacket::Nak { .. } => PapCode::AuthenticateNak,
        }
    }

    pub fn decode(buf: &mut impl Buf) -> Result<PapPacket, DecodeError> {
        need(buf.remaining(), 4)?;
        let code = buf.get_u8();
        let identifier = buf.get_u8();
        let length = buf.get_u16() as usize;
        need(buf.remaining(), length.saturating_sub(4))?;
        let mut body = buf.copy_to_bytes(length.saturating_sub(4));
        Ok(match code {
            1 => {
                need(body.remaining(), 1)?;
                let peer_id = read_len_prefixed(&mut body)?;
                let password = read_len_prefixed(&mut body)?;
                PapPacket::Request {
                    identifier,
                    peer_id,
                    password,
                }
            }
            2 => PapPacket::Ack {
                identifier,
                message: read_len_prefixed(&mut body).unwrap_or_default(),
            },
            3 => PapPacket::Nak {
                identifier,
                message: read_len_prefixed(&mut body).unwrap_or_default(),
            },
            _ => return Err(DecodeError::Malformed("pap code")),
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        match self {
            PapPacket::Request {
                peer_id, password, ..
            } => {
                write_len_prefixed(&mut body, peer_id);
                write_len_prefixed(&mut body, password);
            }
            PapPacket::Ack { message, .. } | PapPacket::Nak { message, .. } => {
                write_len_prefixed(&mut body, message);
            }
        }
        let (code, identifier) = match self {
            PapPacket::Request { identifier, .. } => (1u8, *identifier),
            PapPacket::Ack { identifier, .. } => (2u8, *identifier),
            PapPacket::Nak { identifier, .. } => (3u8, *identifier),
        };
        buf.put_u8(code);
        buf.put_u8(identifier);
        buf.put_u16((body.len() + 4) as u16);
        buf.put_slice(&body);
    }
}

fn read_len_prefixed(buf: &mut Bytes) -> Result<String, DecodeError> {
    need(buf.remaining(), 1)?;
    let len = buf.get_u8() as usize;
    need(buf.remaining(), len)?;
    let bytes = buf.copy_to_bytes(len);
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_len_prefixed(buf: &mut BytesMut, s: &str) {
    buf.put_u8(s.len() as u8);
    buf.put_slice(s.as_bytes());
}

// ===== CHAP =====

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChapCode {
    Challenge,
    Response,
    Success,
    Failure,
}

#[derive(Clone, Debug)]
pub enum ChapPacket {
    Challenge {
        identifier: u8,
        value: Vec<u8>,
        name: String,
    },
    Response {
        identifier: u8,
        value: Vec<u8>,
        name: String,
    },
    Success {
        identifier: u8,
        message: String,
    },
    Failure {
        identifier: u8,
        message: String,
    },
}

impl ChapPacket {
    pub fn code(&self) -> ChapCode {
        match self {
            ChapPacket::Challenge { .. } => ChapCode::Challenge,
            ChapPacket::Response { .. } => ChapCode::Response,
            ChapPacket::Success { .. } => ChapCode::Success,
            ChapPacket::Failure { .. } => ChapCode::Failure,
        }
    }

    pub fn decode(buf: &mut impl Buf) -> Result<ChapPacket, DecodeError> {
        need(buf.remaining(), 4)?;
        let code = buf.get_u8();
        let identifier = buf.get_u8();
        let length = buf.get_u16() as usize;
        need(buf.remaining(), length.saturating_sub(4))?;
        let mut body = buf.copy_to_bytes(length.saturating_sub(4));
        Ok(match code {
            1 | 2 => {
                need(body.remaining(), 1)?;
                let value_len = body.get_u8() as usize;
                need(body.remaining(), value_len)?;
                let value = body.copy_to_bytes(value_len).to_vec();
                let name = String::from_utf8_lossy(
                    &body.copy_to_bytes(body.remaining()),
                )
                .into_owned();
                if code == 1 {
                    ChapPacket::Challenge {
                        identifier,
                        value,
                        name,
                    }
                } else {
                    ChapPacket::Response {
                        identifier,
                        value,
                        name,
                    }
                }
            }
            3 | 4 => {
                let message =
                    String::from_utf8_lossy(&body.copy_to_bytes(body.remaining()))
                        .into_owned();
                if code == 3 {
                    ChapPacket::Success {
                        identifier,
                        message,
                    }
                } else {
                    ChapPacket::Failure {
                        identifier,
                        message,
                    }
                }
            }
            _ => return Err(DecodeError::Malformed("chap code")),
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        let (code, identifier) = match self {
            ChapPacket::Challenge {
                identifier,
                value,
                name,
            } => {
                body.put_u8(value.len() as u8);
                body.put_slice(value);
                body.put_slice(name.as_bytes());
                (1u8, *identifier)
            }
            ChapPacket::Response {
                identifier,
                value,
                name,
            } => {
                body.put_u8(value.len() as u8);
                body.put_slice(value);
                body.put_slice(name.as_bytes());
                (2u8, *identifier)
            }
            ChapPacket::Success {
                identifier,
                message,
            } => {
                body.put_slice(message.as_bytes());
                (3u8, *identifier)
            }
            ChapPacket::Failure {
                identifier,
                message,
            } => {
                body.put_slice(message.as_bytes());
                (4u8, *identifier)
            }
        };
        buf.put_u8(code);
        buf.put_u8(identifier);
        buf.put_u16((body.len() + 4) as u16);
        buf.put_slice(&body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn lcp_conf_request_round_trip() {
        let pkt = LcpPacket {
            code: LcpCode::ConfigureRequest,
            identifier: 1,
            options: vec![
                LcpOption::Mru(1492),
                LcpOption::MagicNumber(0xdeadbeef),
                LcpOption::AuthProtocol(PROTO_CHAP),
            ],
            data: Vec::new(),
        };
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = buf.freeze();
        let decoded = LcpPacket::decode(&mut reader).unwrap();
        assert_eq!(decoded.magic_number(), Some(0xdeadbeef));
        assert_eq!(decoded.options.len(), 3);
    }

    #[test]
    fn chap_challenge_response_round_trip() {
        let challenge = ChapPacket::Challenge {
            identifier: 5,
            value: vec![1, 2, 3, 4],
            name: "lns".into(),
        };
        let mut buf = BytesMut::new();
        challenge.encode(&mut buf);
        let mut reader = buf.freeze();
        let decoded = ChapPacket::decode(&mut reader).unwrap();
        match decoded {
            ChapPacket::Challenge { value, name, .. } => {
                assert_eq!(value, vec![1, 2, 3, 4]);
                assert_eq!(name, "lns");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn pap_request_round_trip() {
        let pkt = PapPacket::Request {
            identifier: 9,
            peer_id: "alice".into(),
            password: "secret".into(),
        };
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = buf.freeze();
        let decoded = PapPacket::decode(&mut reader).unwrap();
        match decoded {
            PapPacket::Request {
                peer_id, password, ..
            } => {
                assert_eq!(peer_id, "alice");
                assert_eq!(password, "secret");
            }
            _ => panic!("wrong variant"),
        }
    }
}
