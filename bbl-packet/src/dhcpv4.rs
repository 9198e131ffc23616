//
// DHCPv4.
//

use std::net::Ipv4Addr;

use bbl_utils::cursor::{BufExt, BufMutExt};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, DecodeError};
use crate::pppoe::AccessLine;

pub const MAGIC_COOKIE: u32 = 0x6382_5363;

pub const OPT_SUBNET_MASK: u8 = 1;
pub const OPT_ROUTER: u8 = 3;
pub const OPT_DNS: u8 = 6;
pub const OPT_REQUESTED_IP: u8 = 50;
pub const OPT_LEASE_TIME: u8 = 51;
pub const OPT_MESSAGE_TYPE: u8 = 53;
pub const OPT_SERVER_ID: u8 = 54;
pub const OPT_PARAMETER_REQUEST_LIST: u8 = 55;
pub const OPT_RELAY_AGENT: u8 = 82;
pub const OPT_END: u8 = 255;

const RAI_SUBOPT_CIRCUIT_ID: u8 = 1;
const RAI_SUBOPT_REMOTE_ID: u8 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
}

impl MessageType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => MessageType::Discover,
            2 => MessageType::Offer,
            3 => MessageType::Request,
            4 => MessageType::Decline,
            5 => MessageType::Ack,
            6 => MessageType::Nak,
            7 => MessageType::Release,
            8 => MessageType::Inform,
            _ => return None,
        })
    }

    fn as_u8(self) -> u8 {
        match self {
            MessageType::Discover => 1,
            MessageType::Offer => 2,
            MessageType::Request => 3,
            MessageType::Decline => 4,
            MessageType::Ack => 5,
            MessageType::Nak => 6,
            MessageType::Release => 7,
            MessageType::Inform => 8,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DhcpOptions {
    pub message_type: Option<MessageType>,
    pub requested_ip: Option<Ipv4Addr>,
    pub server_id: Option<Ipv4Addr>,
    pub lease_time: Option<u32>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub dns: Vec<Ipv4Addr>,
    pub relay_agent: Option<AccessLine>,
}

/// Fixed-format DHCPv4 header (BOOTP legacy fields) plus TLV options.
#[derive(Clone, Debug)]
pub struct DhcpPacket {
    pub op: u8,
    pub xid: u32,
    pub client_mac: [u8; 6],
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub options: DhcpOptions,
}

pub const OP_BOOTREQUEST: u8 = 1;
pub const OP_BOOTREPLY: u8 = 2;

impl DhcpPacket {
    pub fn decode(buf: &mut impl Buf) -> Result<DhcpPacket, DecodeError> {
        need(buf.remaining(), 240)?;
        let op = buf.get_u8();
        buf.get_u8(); // htype
        buf.get_u8(); // hlen
        buf.get_u8(); // hops
        let xid = buf.get_u32();
        buf.get_u16(); // secs
        buf.get_u16(); // flags
        let ciaddr = buf.try_get_ipv4().unwrap();
        let yiaddr = buf.try_get_ipv4().unwrap();
        buf.try_get_ipv4().unwrap(); // siaddr
        let giaddr = buf.try_get_ipv4().unwrap();
        let client_mac = buf.try_get_mac().unwrap();
        buf.advance(10); // remainder of chaddr padding
        buf.advance(64); // sname
        buf.advance(128); // file
        let cookie = buf.get_u32();
        if cookie != MAGIC_COOKIE {
            return Err(DecodeError::WrongMagic);
        }
        let options = decode_options(buf)?;
        Ok(DhcpPacket {
            op,
            xid,
            client_mac,
            ciaddr,
            yiaddr,
            giaddr,
            options,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.op);
        buf.put_u8(1); // htype = ethernet
        buf.put_u8(6); // hlen
        buf.put_u8(0); // hops
        buf.put_u32(self.xid);
        buf.put_u16(0); // secs
        buf.put_u16(0); // flags
        buf.put_ipv4(self.ciaddr);
        buf.put_ipv4(self.yiaddr);
        buf.put_ipv4(Ipv4Addr::UNSPECIFIED);
        buf.put_ipv4(self.giaddr);
        buf.put_mac(self.client_mac);
        for _ in 0..10 {
            buf.put_u8(0);
        }
        for _ in 0..64 {
            buf.put_u8(0);
        }
        for _ in 0..128 {
            buf.put_u8(0);
        }
        buf.put_u32(MAGIC_COOKIE);
        encode_options(&self.options, buf);
        buf.put_u8(OPT_END);
    }
}

fn decode_options(buf: &mut impl Buf) -> Result<DhcpOptions, DecodeError> {
    let mut options = DhcpOptions::default();
    while buf.remaining() >= 1 {
        let opt_type = buf.get_u8();
        if opt_type == OPT_END {
            break;
        }
        if opt_type == 0 {
            continue; // pad
        }
        need(buf.remaining(), 1)?;
        let len = buf.get_u8() as usize;
        need(buf.remaining(), len)?;
        let mut value = buf.copy_to_bytes(len);
        match opt_type {
            OPT_MESSAGE_TYPE if value.remaining() >= 1 => {
                options.message_type = MessageType::from_u8(value.get_u8());
            }
            OPT_REQUESTED_IP if value.remaining() >= 4 => {
                options.requested_ip = Some(Ipv4Addr::from(value.get_u32()));
            }
            OPT_SERVER_ID if value.remaining() >= 4 => {
                options.server_id = Some(Ipv4Addr::from(value.get_u32()));
            }
            OPT_LEASE_TIME if value.remaining() >= 4 => {
                options.lease_time = Some(value.get_u32());
            }
            OPT_SUBNET_MASK if value.remaining() >= 4 => {
                options.subnet_mask = Some(Ipv4Addr::from(value.get_u32()));
            }
            OPT_ROUTER if value.remaining() >= 4 => {
                options.router = Some(Ipv4Addr::from(value.get_u32()));
            }
            OPT_DNS => {
                while value.remaining() >= 4 {
                    options.dns.push(Ipv4Addr::from(value.get_u32()));
                }
            }
            OPT_RELAY_AGENT => {
                options.relay_agent = Some(decode_relay_agent(&mut value)?);
            }
            _ => {}
        }
    }
    Ok(options)
}

fn decode_relay_agent(buf: &mut Bytes) -> Result<AccessLine, DecodeError> {
    let mut access_line = AccessLine::default();
    while buf.remaining() >= 2 {
        let sub_type = buf.get_u8();
        let sub_len = buf.get_u8() as usize;
        need(buf.remaining(), sub_len)?;
        let value = buf.copy_to_bytes(sub_len);
        match sub_type {
            RAI_SUBOPT_CIRCUIT_ID => {
                access_line.agent_circuit_id =
                    Some(String::from_utf8_lossy(&value).into_owned());
            }
            RAI_SUBOPT_REMOTE_ID => {
                access_line.agent_remote_id =
                    Some(String::from_utf8_lossy(&value).into_owned());
            }
            _ => {}
        }
    }
    Ok(access_line)
}

fn encode_options(opts: &DhcpOptions, buf: &mut impl BufMut) {
    if let Some(mt) = opts.message_type {
        buf.put_u8(OPT_MESSAGE_TYPE);
        buf.put_u8(1);
        buf.put_u8(mt.as_u8());
    }
    if let Some(ip) = opts.requested_ip {
        buf.put_u8(OPT_REQUESTED_IP);
        buf.put_u8(4);
        buf.put_ipv4(ip);
    }
    if let Some(ip) = opts.server_id {
        buf.put_u8(OPT_SERVER_ID);
        buf.put_u8(4);
        buf.put_ipv4(ip);
    }
    if let Some(secs) = opts.lease_time {
        buf.put_u8(OPT_LEASE_TIME);
        buf.put_u8(4);
        buf.put_u32(secs);
    }
    if let Some(ip) = opts.subnet_mask {
        buf.put_u8(OPT_SUBNET_MASK);
        buf.put_u8(4);
        buf.put_ipv4(ip);
    }
    if let Some(ip) = opts.router {
        buf.put_u8(OPT_ROUTER);
        buf.put_u8(4);
        buf.put_ipv4(ip);
    }
    if !opts.dns.is_empty() {
        buf.put_u8(OPT_DNS);
        buf.put_u8((opts.dns.len() * 4) as u8);
        for dns in &opts.dns {
            buf.put_ipv4(*dns);
        }
    }
    if let Some(access_line) = &opts.relay_agent {
        let mut sub = BytesMut::new();
        if let Some(aci) = &access_line.agent_circuit_id {
            sub.put_u8(RAI_SUBOPT_CIRCUIT_ID);
            sub.put_u8(aci.len() as u8);
            sub.put_slice(aci.as_bytes());
        }
        if let Some(ari) = &access_line.agent_remote_id {
            sub.put_u8(RAI_SUBOPT_REMOTE_ID);
            sub.put_u8(ari.len() as u8);
            sub.put_slice(ari.as_bytes());
        }
        buf.put_u8(OPT_RELAY_AGENT);
        buf.put_u8(sub.len() as u8);
        buf.put_slice(&sub);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn discover_round_trip() {
        let pkt = DhcpPacket {
            op: OP_BOOTREQUEST,
            xid: 0x1234,
            client_mac: [2, 0, 0, 0, 0, 1],
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            options: DhcpOptions {
                message_type: Some(MessageType::Discover),
                ..Default::default()
            },
        };
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = DhcpPacket::decode(&mut reader).unwrap();
        assert_eq!(decoded.options.message_type, Some(MessageType::Discover));
        assert_eq!(decoded.xid, 0x1234);
    }

    #[test]
    fn relay_agent_round_trip() {
        let mut opts = DhcpOptions {
            message_type: Some(MessageType::Request),
            ..Default::default()
        };
        opts.relay_agent = Some(AccessLine {
            agent_circuit_id: Some("0/1/1".into()),
            agent_remote_id: Some("remote".into()),
            ..Default::default()
        });
        let pkt = DhcpPacket {
            op: OP_BOOTREQUEST,
            xid: 7,
            client_mac: [2, 0, 0, 0, 0, 2],
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            options: opts,
        };
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = DhcpPacket::decode(&mut reader).unwrap();
        let access_line = decoded.options.relay_agent.unwrap();
        assert_eq!(access_line.agent_circuit_id.as_deref(), Some("0/1/1"));
    }
}
