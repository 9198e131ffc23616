//
// IPv6 header with an optional hop-by-hop options extension header.
//

use std::net::Ipv6Addr;

use bbl_utils::cursor::BufExt;
use bytes::{Buf, BufMut};

use crate::error::{need, DecodeError};

pub const NEXT_HEADER_HOP_BY_HOP: u8 = 0;
pub const NEXT_HEADER_ICMPV6: u8 = 58;
pub const NEXT_HEADER_UDP: u8 = 17;

#[derive(Clone, Debug)]
pub struct Ipv6Header {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub hop_limit: u8,
    pub next_header: u8,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    /// Present when a hop-by-hop extension header (e.g. router alert for
    /// MLD) precedes the upper-layer payload.
    pub hop_by_hop: Option<Vec<u8>>,
    pub payload_len: u16,
}

impl Ipv6Header {
    pub fn header_len(&self) -> usize {
        40 + self.hop_by_hop.as_ref().map(|o| o.len() + 2).unwrap_or(0)
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Ipv6Header, DecodeError> {
        need(buf.remaining(), 40)?;
        let word0 = buf.get_u32();
        if word0 >> 28 != 6 {
            return Err(DecodeError::Malformed("ipv6 version"));
        }
        let traffic_class = ((word0 >> 20) & 0xff) as u8;
        let flow_label = word0 & 0x000f_ffff;
        let payload_len = buf.get_u16();
        let mut next_header = buf.get_u8();
        let hop_limit = buf.get_u8();
        let src = buf.try_get_ipv6().ok_or(DecodeError::Malformed("ipv6 src"))?;
        let dst = buf.try_get_ipv6().ok_or(DecodeError::Malformed("ipv6 dst"))?;
        let mut hop_by_hop = None;
        let mut upper_payload_len = payload_len;
        if next_header == NEXT_HEADER_HOP_BY_HOP {
            need(buf.remaining(), 2)?;
            let real_next = buf.get_u8();
            let ext_len = buf.get_u8() as usize;
            let total = ext_len * 8 + 8 - 2;
            need(buf.remaining(), total)?;
            hop_by_hop = Some(buf.copy_to_bytes(total).to_vec());
            next_header = real_next;
            upper_payload_len = payload_len.saturating_sub(total as u16 + 2);
        }
        Ok(Ipv6Header {
            traffic_class,
            flow_label,
            hop_limit,
            next_header,
            src,
            dst,
            hop_by_hop,
            payload_len: upper_payload_len,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let word0 =
            (6u32 << 28) | ((self.traffic_class as u32) << 20) | (self.flow_label & 0x000f_ffff);
        buf.put_u32(word0);
        let total_payload = self.payload_len
            + self.hop_by_hop.as_ref().map(|o| o.len() as u16 + 2).unwrap_or(0);
        buf.put_u16(total_payload);
        if self.hop_by_hop.is_some() {
            buf.put_u8(NEXT_HEADER_HOP_BY_HOP);
        } else {
            buf.put_u8(self.next_header);
        }
        buf.put_u8(self.hop_limit);
        buf.put_slice(&self.src.octets());
        buf.put_slice(&self.dst.octets());
        if let Some(opts) = &self.hop_by_hop {
            buf.put_u8(self.next_header);
            buf.put_u8(((opts.len() + 2) / 8 - 1) as u8);
            buf.put_slice(opts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn round_trip_plain() {
        let hdr = Ipv6Header {
            traffic_class: 0,
            flow_label: 0,
            hop_limit: 255,
            next_header: NEXT_HEADER_ICMPV6,
            src: Ipv6Addr::LOCALHOST,
            dst: Ipv6Addr::UNSPECIFIED,
            hop_by_hop: None,
            payload_len: 24,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        assert_eq!(buf.len(), 40);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = Ipv6Header::decode(&mut reader).unwrap();
        assert_eq!(decoded.next_header, NEXT_HEADER_ICMPV6);
        assert!(decoded.hop_by_hop.is_none());
    }

    #[test]
    fn round_trip_hop_by_hop() {
        let hdr = Ipv6Header {
            traffic_class: 0,
            flow_label: 0,
            hop_limit: 1,
            next_header: NEXT_HEADER_UDP,
            src: Ipv6Addr::LOCALHOST,
            dst: Ipv6Addr::UNSPECIFIED,
            hop_by_hop: Some(vec![0x05, 0x02, 0x00, 0x00, 0x01, 0x00]),
            payload_len: 16,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = Ipv6Header::decode(&mut reader).unwrap();
        assert_eq!(decoded.next_header, NEXT_HEADER_UDP);
        assert!(decoded.hop_by_hop.is_some());
    }
}
