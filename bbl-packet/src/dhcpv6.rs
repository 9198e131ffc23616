//
// DHCPv6.
//

use std::net::Ipv6Addr;

use bbl_utils::cursor::BufExt;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, DecodeError};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageType {
    Solicit,
    Advertise,
    Request,
    Confirm,
    Renew,
    Rebind,
    Reply,
    Release,
    Decline,
    Reconfigure,
    InformationRequest,
    RelayForw,
    RelayReply,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => MessageType::Solicit,
            2 => MessageType::Advertise,
            3 => MessageType::Request,
            4 => MessageType::Confirm,
            5 => MessageType::Renew,
            6 => MessageType::Rebind,
            7 => MessageType::Reply,
            8 => MessageType::Release,
            9 => MessageType::Decline,
            10 => MessageType::Reconfigure,
            11 => MessageType::InformationRequest,
            12 => MessageType::RelayForw,
            13 => MessageType::RelayReply,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            MessageType::Solicit => 1,
            MessageType::Advertise => 2,
            MessageType::Request => 3,
            MessageType::Confirm => 4,
            MessageType::Renew => 5,
            MessageType::Rebind => 6,
            MessageType::Reply => 7,
            MessageType::Release => 8,
            MessageType::Decline => 9,
            MessageType::Reconfigure => 10,
            MessageType::InformationRequest => 11,
            MessageType::RelayForw => 12,
            MessageType::RelayReply => 13,
        }
    }
}

const OPT_CLIENTID: u16 = 1;
const OPT_SERVERID: u16 = 2;
const OPT_IA_NA: u16 = 3;
const OPT_IA_ADDR: u16 = 5;
const OPT_ORO: u16 = 6;
const OPT_RAPID_COMMIT: u16 = 14;
const OPT_REMOTE_ID: u16 = 37;
const OPT_IA_PD: u16 = 25;
const OPT_IAPREFIX: u16 = 26;

#[derive(Clone, Debug)]
pub struct IaNa {
    pub iaid: u32,
    pub t1: u32,
    pub t2: u32,
    pub addr: Option<Ipv6Addr>,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
}

#[derive(Clone, Debug)]
pub struct IaPd {
    pub iaid: u32,
    pub t1: u32,
    pub t2: u32,
    pub prefix: Option<(Ipv6Addr, u8)>,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Dhcpv6Options {
    pub client_duid: Option<Vec<u8>>,
    pub server_duid: Option<Vec<u8>>,
    pub ia_na: Option<IaNa>,
    pub ia_pd: Option<IaPd>,
    pub rapid_commit: bool,
    pub remote_id: Option<Vec<u8>>,
    pub oro: Vec<u16>,
}

#[derive(Clone, Debug)]
pub struct Dhcpv6Packet {
    pub msg_type: MessageType,
    pub transaction_id: u32,
    pub options: Dhcpv6Options,
}

impl Dhcpv6Packet {
    pub fn decode(buf: &mut impl Buf) -> Result<Dhcpv6Packet, DecodeError> {
        need(buf.remaining(), 4)?;
        let word = buf.get_u32();
        let msg_type = MessageType::from_u8((word >> 24) as u8)
            .ok_or(DecodeError::Malformed("dhcpv6 message type"))?;
        let transaction_id = word & 0x00ff_ffff;
        let options = decode_options(buf)?;
        Ok(Dhcpv6Packet {
            msg_type,
            transaction_id,
            options,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let word = ((self.msg_type.as_u8() as u32) << 24) | (self.transaction_id & 0x00ff_ffff);
        buf.put_u32(word);
        encode_options(&self.options, buf);
    }
}

fn decode_options(buf: &mut impl Buf) -> Result<Dhcpv6Options, DecodeError> {
    let mut options = Dhcpv6Options::default();
    while buf.remaining() >= 4 {
        let opt_type = buf.get_u16();
        let opt_len = buf.get_u16() as usize;
        need(buf.remaining(), opt_len)?;
        let mut value = buf.copy_to_bytes(opt_len);
        match opt_type {
            OPT_CLIENTID => options.client_duid = Some(value.to_vec()),
            OPT_SERVERID => options.server_duid = Some(value.to_vec()),
            OPT_RAPID_COMMIT => options.rapid_commit = true,
            OPT_REMOTE_ID => options.remote_id = Some(value.to_vec()),
            OPT_ORO => {
                while value.remaining() >= 2 {
                    options.oro.push(value.get_u16());
                }
            }
            OPT_IA_NA if value.remaining() >= 12 => {
                let iaid = value.get_u32();
                let t1 = value.get_u32();
                let t2 = value.get_u32();
                let (addr, preferred_lifetime, valid_lifetime) =
                    decode_ia_addr(&mut value)?;
                options.ia_na = Some(IaNa {
                    iaid,
                    t1,
                    t2,
                    addr,
                    preferred_lifetime,
                    valid_lifetime,
                });
            }
            OPT_IA_PD if value.remaining() >= 12 => {
                let iaid = value.get_u32();
                let t1 = value.get_u32();
                let t2 = value.get_u32();
                let (prefix, preferred_lifetime, valid_lifetime) =
                    decode_ia_prefix(&mut value)?;
                options.ia_pd = Some(IaPd {
                    iaid,
                    t1,
                    t2,
                    prefix,
                    preferred_lifetime,
                    valid_lifetime,
                });
            }
            _ => {}
        }
    }
    Ok(options)
}

fn decode_ia_addr(value: &mut Bytes) -> Result<(Option<Ipv6Addr>, u32, u32), DecodeError> {
    if value.remaining() < 4 {
        return Ok((None, 0, 0));
    }
    let sub_type = value.get_u16();
    let sub_len = value.get_u16() as usize;
    need(value.remaining(), sub_len)?;
    let mut sub = value.copy_to_bytes(sub_len);
    if sub_type != OPT_IA_ADDR || sub.remaining() < 24 {
        return Ok((None, 0, 0));
    }
    let addr = sub.try_get_ipv6().unwrap();
    let preferred = sub.get_u32();
    let valid = sub.get_u32();
    Ok((Some(addr), preferred, valid))
}

fn decode_ia_prefix(
    value: &mut Bytes,
) -> Result<(Option<(Ipv6Addr, u8)>, u32, u32), DecodeError> {
    if value.remaining() < 4 {
        return Ok((None, 0, 0));
    }
    let sub_type = value.get_u16();
    let sub_len = value.get_u16() as usize;
    need(value.remaining(), sub_len)?;
    let mut sub = value.copy_to_bytes(sub_len);
    if sub_type != OPT_IAPREFIX || sub.remaining() < 25 {
        return Ok((None, 0, 0));
    }
    let preferred = sub.get_u32();
    let valid = sub.get_u32();
    let prefix_len = sub.get_u8();
    let prefix = sub.try_get_ipv6().unwrap();
    Ok((Some((prefix, prefix_len)), preferred, valid))
}

fn encode_options(opts: &Dhcpv6Options, buf: &mut impl BufMut) {
    if let Some(duid) = &opts.client_duid {
        buf.put_u16(OPT_CLIENTID);
        buf.put_u16(duid.len() as u16);
        buf.put_slice(duid);
    }
    if let Some(duid) = &opts.server_duid {
        buf.put_u16(OPT_SERVERID);
        buf.put_u16(duid.len() as u16);
        buf.put_slice(duid);
    }
    if opts.rapid_commit {
        buf.put_u16(OPT_RAPID_COMMIT);
        buf.put_u16(0);
    }
    if let Some(remote_id) = &opts.remote_id {
        buf.put_u16(OPT_REMOTE_ID);
        buf.put_u16(remote_id.len() as u16);
        buf.put_slice(remote_id);
    }
    if !opts.oro.is_empty() {
        buf.put_u16(OPT_ORO);
        buf.put_u16((opts.oro.len() * 2) as u16);
        for code in &opts.oro {
            buf.put_u16(*code);
        }
    }
    if let Some(ia) = &opts.ia_na {
        let mut body = BytesMut::new();
        body.put_u32(ia.iaid);
        body.put_u32(ia.t1);
        body.put_u32(ia.t2);
        if let Some(addr) = ia.addr {
            body.put_u16(OPT_IA_ADDR);
            body.put_u16(24);
            body.put_slice(&addr.octets());
            body.put_u32(ia.preferred_lifetime);
            body.put_u32(ia.valid_lifetime);
        }
        buf.put_u16(OPT_IA_NA);
        buf.put_u16(body.len() as u16);
        buf.put_slice(&body);
    }
    if let Some(ia) = &opts.ia_pd {
        let mut body = BytesMut::new();
        body.put_u32(ia.iaid);
        body.put_u32(ia.t1);
        body.put_u32(ia.t2);
        if let Some((prefix, prefix_len)) = ia.prefix {
            body.put_u16(OPT_IAPREFIX);
            body.put_u16(25);
            body.put_u32(ia.preferred_lifetime);
            body.put_u32(ia.valid_lifetime);
            body.put_u8(prefix_len);
            body.put_slice(&prefix.octets());
        }
        buf.put_u16(OPT_IA_PD);
        buf.put_u16(body.len() as u16);
        buf.put_slice(&body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn solicit_with_ia_na_round_trip() {
        let pkt = Dhcpv6Packet {
            msg_type: MessageType::Solicit,
            transaction_id: 0x010203,
            options: Dhcpv6Options {
                client_duid: Some(vec![1, 2, 3]),
                rapid_commit: true,
                ia_na: Some(IaNa {
                    iaid: 1,
                    t1: 100,
                    t2: 160,
                    addr: None,
                    preferred_lifetime: 0,
                    valid_lifetime: 0,
                }),
                ..Default::default()
            },
        };
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = Dhcpv6Packet::decode(&mut reader).unwrap();
        assert_eq!(decoded.msg_type, MessageType::Solicit);
        assert!(decoded.options.rapid_commit);
        assert_eq!(decoded.options.ia_na.unwrap().iaid, 1);
    }

    #[test]
    fn reply_with_bound_address_round_trip() {
        let pkt = Dhcpv6Packet {
            msg_type: MessageType::Reply,
            transaction_id: 5,
            options: Dhcpv6Options {
                ia_na: Some(IaNa {
                    iaid: 1,
                    t1: 100,
                    t2: 160,
                    addr: Some(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
                    preferred_lifetime: 3600,
                    valid_lifetime: 7200,
                }),
                ..Default::default()
            },
        };
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = Dhcpv6Packet::decode(&mut reader).unwrap();
        let ia = decoded.options.ia_na.unwrap();
        assert_eq!(ia.addr, Some(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)));
        assert_eq!(ia.valid_lifetime, 7200);
    }
}
