//
// IPv4 header.
//
// Only the fields and the one option this core actually needs are modeled;
// arbitrary option lists from a peer are preserved as opaque bytes so a
// round-trip never silently drops them.
//

use std::net::Ipv4Addr;

use bbl_utils::cursor::BufExt;
use bytes::{Buf, BufMut};
use internet_checksum::checksum;

use crate::error::{need, DecodeError};

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_IGMP: u8 = 2;
pub const PROTO_UDP: u8 = 17;

pub const ROUTER_ALERT_OPTION: [u8; 4] = [0x94, 0x04, 0x00, 0x00];

#[derive(Clone, Debug)]
pub struct Ipv4Header {
    pub tos: u8,
    pub identification: u16,
    pub dont_fragment: bool,
    pub ttl: u8,
    pub protocol: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub router_alert: bool,
    pub payload_len: u16,
}

impl Ipv4Header {
    pub fn header_len(&self) -> usize {
        if self.router_alert {
            24
        } else {
            20
        }
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Ipv4Header, DecodeError> {
        need(buf.remaining(), 20)?;
        let vihl = buf.get_u8();
        if vihl >> 4 != 4 {
            return Err(DecodeError::Malformed("ipv4 version"));
        }
        let ihl = ((vihl & 0x0f) as usize) * 4;
        if ihl < 20 {
            return Err(DecodeError::Malformed("ipv4 ihl"));
        }
        let tos = buf.get_u8();
        let total_len = buf.get_u16();
        let identification = buf.get_u16();
        let flags_frag = buf.get_u16();
        let dont_fragment = flags_frag & 0x4000 != 0;
        let ttl = buf.get_u8();
        let protocol = buf.get_u8();
        let _checksum = buf.get_u16();
        let src = buf.try_get_ipv4().ok_or(DecodeError::Malformed("ipv4 src"))?;
        let dst = buf.try_get_ipv4().ok_or(DecodeError::Malformed("ipv4 dst"))?;
        need(buf.remaining(), ihl - 20)?;
        let options = buf.copy_to_bytes(ihl - 20);
        let router_alert = options.as_ref() == ROUTER_ALERT_OPTION;
        let payload_len = total_len.saturating_sub(ihl as u16);
        Ok(Ipv4Header {
            tos,
            identification,
            dont_fragment,
            ttl,
            protocol,
            src,
            dst,
            router_alert,
            payload_len,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let ihl_words = self.header_len() / 4;
        let mut header = [0u8; 24];
        header[0] = 0x40 | ihl_words as u8;
        header[1] = self.tos;
        let total_len = self.header_len() as u16 + self.payload_len;
        header[2..4].copy_from_slice(&total_len.to_be_bytes());
        header[4..6].copy_from_slice(&self.identification.to_be_bytes());
        let flags = if self.dont_fragment { 0x4000u16 } else { 0 };
        header[6..8].copy_from_slice(&flags.to_be_bytes());
        header[8] = self.ttl;
        header[9] = self.protocol;
        header[10..12].copy_from_slice(&[0, 0]);
        header[12..16].copy_from_slice(&self.src.octets());
        header[16..20].copy_from_slice(&self.dst.octets());
        if self.router_alert {
            header[20..24].copy_from_slice(&ROUTER_ALERT_OPTION);
        }
        let hlen = self.header_len();
        let sum = checksum(&header[..hlen]);
        header[10] = sum[0];
        header[11] = sum[1];
        buf.put_slice(&header[..hlen]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn round_trip_with_router_alert() {
        let hdr = Ipv4Header {
            tos: 0,
            identification: 42,
            dont_fragment: true,
            ttl: 1,
            protocol: PROTO_IGMP,
            src: Ipv4Addr::new(192, 0, 2, 1),
            dst: Ipv4Addr::new(224, 0, 0, 1),
            router_alert: true,
            payload_len: 8,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        assert_eq!(buf.len(), 24);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = Ipv4Header::decode(&mut reader).unwrap();
        assert!(decoded.router_alert);
        assert_eq!(decoded.dst, Ipv4Addr::new(224, 0, 0, 1));
    }

    #[test]
    fn round_trip_plain() {
        let hdr = Ipv4Header {
            tos: 0,
            identification: 7,
            dont_fragment: false,
            ttl: 64,
            protocol: PROTO_UDP,
            src: Ipv4Addr::new(198, 51, 100, 1),
            dst: Ipv4Addr::new(198, 51, 100, 2),
            router_alert: false,
            payload_len: 16,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        assert_eq!(buf.len(), 20);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = Ipv4Header::decode(&mut reader).unwrap();
        assert!(!decoded.router_alert);
        assert_eq!(decoded.identification, 7);
    }
}
