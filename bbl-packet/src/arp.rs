//
// ARP (RFC 826), used by IPoE sessions to resolve the first-hop gateway's
// MAC address before DHCP starts.
//

use std::net::Ipv4Addr;

use bbl_utils::cursor::{BufExt, BufMutExt};
use bbl_utils::mac_addr::MacAddr;
use bytes::{Buf, BufMut};

use crate::error::{need, DecodeError};

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArpOperation {
    Request,
    Reply,
}

#[derive(Clone, Copy, Debug)]
pub struct ArpPacket {
    pub operation: ArpOperation,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub const LENGTH: usize = 28;

    pub fn decode(buf: &mut impl Buf) -> Result<ArpPacket, DecodeError> {
        need(buf.remaining(), Self::LENGTH)?;
        let htype = buf.get_u16();
        let ptype = buf.get_u16();
        let hlen = buf.get_u8();
        let plen = buf.get_u8();
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != 6 || plen != 4 {
            return Err(DecodeError::Malformed("arp header"));
        }
        let operation = match buf.get_u16() {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            _ => return Err(DecodeError::Malformed("arp operation")),
        };
        let sender_mac = MacAddr::from(buf.try_get_mac().ok_or(DecodeError::Malformed("arp sha"))?);
        let sender_ip = buf.try_get_ipv4().ok_or(DecodeError::Malformed("arp spa"))?;
        let target_mac = MacAddr::from(buf.try_get_mac().ok_or(DecodeError::Malformed("arp tha"))?);
        let target_ip = buf.try_get_ipv4().ok_or(DecodeError::Malformed("arp tpa"))?;
        Ok(ArpPacket {
            operation,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16(HTYPE_ETHERNET);
        buf.put_u16(PTYPE_IPV4);
        buf.put_u8(6);
        buf.put_u8(4);
        buf.put_u16(match self.operation {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
        });
        buf.put_mac(self.sender_mac.as_bytes());
        buf.put_ipv4(self.sender_ip);
        buf.put_mac(self.target_mac.as_bytes());
        buf.put_ipv4(self.target_ip);
    }

    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> ArpPacket {
        ArpPacket {
            operation: ArpOperation::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn round_trip() {
        let pkt = ArpPacket::request(
            MacAddr::from([2, 0, 0, 0, 0, 1]),
            Ipv4Addr::new(192, 0, 2, 10),
            Ipv4Addr::new(192, 0, 2, 1),
        );
        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        assert_eq!(buf.len(), ArpPacket::LENGTH);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = ArpPacket::decode(&mut reader).unwrap();
        assert_eq!(decoded.operation, ArpOperation::Request);
        assert_eq!(decoded.target_ip, Ipv4Addr::new(192, 0, 2, 1));
    }
}
