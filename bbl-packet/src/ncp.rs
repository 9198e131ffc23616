//
// IPCP and IP6CP. Both reuse the PPP LCP code space (ConfigureRequest..
// CodeReject) so we accept an [`LcpCode`] here rather than duplicating it.
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, DecodeError};
use crate::ppp::LcpCode;

const IPCP_OPT_IP_ADDRESS: u8 = 3;
const IPCP_OPT_PRIMARY_DNS: u8 = 129;
const IPCP_OPT_SECONDARY_DNS: u8 = 131;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IpcpOption {
    IpAddress(Ipv4Addr),
    PrimaryDns(Ipv4Addr),
    SecondaryDns(Ipv4Addr),
    Unknown(u8, Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct IpcpPacket {
    pub code: LcpCode,
    pub identifier: u8,
    pub options: Vec<IpcpOption>,
}

impl IpcpPacket {
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|o| match o {
            IpcpOption::IpAddress(a) => Some(*a),
            _ => None,
        })
    }

    pub fn decode(buf: &mut impl Buf) -> Result<IpcpPacket, DecodeError> {
        need(buf.remaining(), 4)?;
        let code =
            LcpCode::from_u8(buf.get_u8()).ok_or(DecodeError::Malformed("ipcp code"))?;
        let identifier = buf.get_u8();
        let length = buf.get_u16() as usize;
        need(buf.remaining(), length.saturating_sub(4))?;
        let mut body = buf.copy_to_bytes(length.saturating_sub(4));
        let mut options = Vec::new();
        while body.remaining() >= 2 {
            let opt_type = body.get_u8();
            let opt_len = body.get_u8() as usize;
            if opt_len < 2 || body.remaining() < opt_len - 2 {
                return Err(DecodeError::Malformed("ipcp option"));
            }
            let mut value = body.copy_to_bytes(opt_len - 2);
            options.push(decode_option(opt_type, &mut value));
        }
        Ok(IpcpPacket {
            code,
            identifier,
            options,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.code.as_u8());
        buf.put_u8(self.identifier);
        let mut body = BytesMut::new();
        for opt in &self.options {
            encode_option(opt, &mut body);
        }
        buf.put_u16((body.len() + 4) as u16);
        buf.put_slice(&body);
    }
}

fn decode_option(opt_type: u8, value: &mut Bytes) -> IpcpOption {
    match opt_type {
        IPCP_OPT_IP_ADDRESS if value.remaining() >= 4 => {
            IpcpOption::IpAddress(Ipv4Addr::from(value.get_u32()))
        }
        IPCP_OPT_PRIMARY_DNS if value.remaining() >= 4 => {
            IpcpOption::PrimaryDns(Ipv4Addr::from(value.get_u32()))
        }
        IPCP_OPT_SECONDARY_DNS if value.remaining() >= 4 => {
            IpcpOption::SecondaryDns(Ipv4Addr::from(value.get_u32()))
        }
        other => IpcpOption::Unknown(other, value.copy_to_bytes(value.remaining()).to_vec()),
    }
}

fn encode_option(opt: &IpcpOption, buf: &mut BytesMut) {
    match opt {
        IpcpOption::IpAddress(addr) => {
            buf.put_u8(IPCP_OPT_IP_ADDRESS);
            buf.put_u8(6);
            buf.put_u32(u32::from(*addr));
        }
        IpcpOption::PrimaryDns(addr) => {
            buf.put_u8(IPCP_OPT_PRIMARY_DNS);
            buf.put_u8(6);
            buf.put_u32(u32::from(*addr));
        }
        IpcpOption::SecondaryDns(addr) => {
            buf.put_u8(IPCP_OPT_SECONDARY_DNS);
            buf.put_u8(6);
            buf.put_u32(u32::from(*addr));
        }
        IpcpOption::Unknown(t, v) => {
            buf.put_u8(*t);
            buf.put_u8((v.len() + 2) as u8);
            buf.put_slice(v);
        }
    }
}

const IP6CP_OPT_INTERFACE_IDENTIFIER: u8 = 1;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Ip6cpOption {
    InterfaceIdentifier(u64),
    Unknown(u8, Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct Ip6cpPacket {
    pub code: LcpCode,
    pub identifier: u8,
    pub options: Vec<Ip6cpOption>,
}

impl Ip6cpPacket {
    pub fn interface_identifier(&self) -> Option<u64> {
        self.options.iter().find_map(|o| match o {
            Ip6cpOption::InterfaceIdentifier(id) => Some(*id),
            _ => None,
        })
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Ip6cpPacket, DecodeError> {
        need(buf.remaining(), 4)?;
        let code =
            LcpCode::from_u8(buf.get_u8()).ok_or(DecodeError::Malformed("ip6cp code"))?;
        let identifier = buf.get_u8();
        let length = buf.get_u16() as usize;
        need(buf.remaining(), length.saturating_sub(4))?;
        let mut body = buf.copy_to_bytes(length.saturating_sub(4));
        let mut options = Vec::new();
        while body.remaining() >= 2 {
            let opt_type = body.get_u8();
            let opt_len = body.get_u8() as usize;
            if opt_len < 2 || body.remaining() < opt_len - 2 {
                return Err(DecodeError::Malformed("ip6cp option"));
            }
            let mut value = body.copy_to_bytes(opt_len - 2);
            options.push(match opt_type {
                IP6CP_OPT_INTERFACE_IDENTIFIER if value.remaining() >= 8 => {
                    Ip6cpOption::InterfaceIdentifier(value.get_u64())
                }
                other => Ip6cpOption::Unknown(
                    other,
                    value.copy_to_bytes(value.remaining()).to_vec(),
                ),
            });
        }
        Ok(Ip6cpPacket {
            code,
            identifier,
            options,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.code.as_u8());
        buf.put_u8(self.identifier);
        let mut body = BytesMut::new();
        for opt in &self.options {
            match opt {
                Ip6cpOption::InterfaceIdentifier(id) => {
                    body.put_u8(IP6CP_OPT_INTERFACE_IDENTIFIER);
                    body.put_u8(10);
                    body.put_u64(*id);
                }
                Ip6cpOption::Unknown(t, v) => {
                    body.put_u8(*t);
                    body.put_u8((v.len() + 2) as u8);
                    body.put_slice(v);
                }
            }
        }
        buf.put_u16((body.len() + 4) as u16);
        buf.put_slice(&body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipcp_round_trip() {
        let pkt = IpcpPacket {
            code: LcpCode::ConfigureNak,
            identifier: 3,
            options: vec![IpcpOption::IpAddress(Ipv4Addr::new(198, 51, 100, 1))],
        };
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = buf.freeze();
        let decoded = IpcpPacket::decode(&mut reader).unwrap();
        assert_eq!(decoded.address(), Some(Ipv4Addr::new(198, 51, 100, 1)));
    }

    #[test]
    fn ip6cp_round_trip() {
        let pkt = Ip6cpPacket {
            code: LcpCode::ConfigureRequest,
            identifier: 1,
            options: vec![Ip6cpOption::InterfaceIdentifier(0x0011223344556677)],
        };
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = buf.freeze();
        let decoded = Ip6cpPacket::decode(&mut reader).unwrap();
        assert_eq!(decoded.interface_identifier(), Some(0x0011223344556677));
    }
}
