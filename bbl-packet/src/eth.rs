//
// Ethernet header with up to three stacked VLAN tags (IEEE 802.1Q and the
// QinQ 0x88a8 TPID).
//

use bbl_utils::cursor::{BufExt, BufMutExt};
use bbl_utils::mac_addr::MacAddr;
use bytes::{Buf, BufMut};
use smallvec::SmallVec;

use crate::error::DecodeError;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_QINQ: u16 = 0x88a8;
pub const ETHERTYPE_PPPOE_DISCOVERY: u16 = 0x8863;
pub const ETHERTYPE_PPPOE_SESSION: u16 = 0x8864;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
pub const ETHERTYPE_ISIS_LLC: u16 = 0xfefe;

pub const MAX_VLAN_TAGS: usize = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VlanTag {
    pub tpid: u16,
    pub pcp: u8,
    pub dei: bool,
    pub vlan_id: u16,
}

#[derive(Clone, Debug)]
pub struct EthHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub vlan: SmallVec<[VlanTag; MAX_VLAN_TAGS]>,
    pub ethertype: u16,
}

impl EthHeader {
    pub fn outer_vlan(&self) -> u16 {
        self.vlan.first().map(|t| t.vlan_id).unwrap_or(0)
    }

    pub fn inner_vlan(&self) -> u16 {
        self.vlan.get(1).map(|t| t.vlan_id).unwrap_or(0)
    }

    pub fn decode(buf: &mut impl Buf) -> Result<EthHeader, DecodeError> {
        if buf.remaining() < 14 {
            return Err(DecodeError::Truncated {
                wanted: 14,
                have: buf.remaining(),
            });
        }
        let dst = MacAddr::from(buf.try_get_mac().unwrap());
        let src = MacAddr::from(buf.try_get_mac().unwrap());
        let mut ethertype = buf.get_u16();
        let mut vlan = SmallVec::new();
        while matches!(ethertype, ETHERTYPE_VLAN | ETHERTYPE_QINQ) {
            if vlan.len() == MAX_VLAN_TAGS || buf.remaining() < 4 {
                return Err(DecodeError::Malformed("vlan tag"));
            }
            let tci = buf.get_u16();
            vlan.push(VlanTag {
                tpid: ethertype,
                pcp: (tci >> 13) as u8,
                dei: (tci & 0x1000) != 0,
                vlan_id: tci & 0x0fff,
            });
            ethertype = buf.get_u16();
        }
        Ok(EthHeader {
            dst,
            src,
            vlan,
            ethertype,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_mac(self.dst.as_bytes());
        buf.put_mac(self.src.as_bytes());
        for tag in &self.vlan {
            buf.put_u16(tag.tpid);
            let tci = ((tag.pcp as u16) << 13)
                | if tag.dei { 0x1000 } else { 0 }
                | (tag.vlan_id & 0x0fff);
            buf.put_u16(tci);
        }
        buf.put_u16(self.ethertype);
    }

    pub fn header_len(&self) -> usize {
        14 + self.vlan.len() * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    fn sample() -> EthHeader {
        EthHeader {
            dst: MacAddr::BROADCAST,
            src: MacAddr::from([2, 1, 1, 1, 1, 1]),
            vlan: SmallVec::from_slice(&[VlanTag {
                tpid: ETHERTYPE_VLAN,
                pcp: 0,
                dei: false,
                vlan_id: 100,
            }]),
            ethertype: ETHERTYPE_PPPOE_DISCOVERY,
        }
    }

    #[test]
    fn round_trip() {
        let eth = sample();
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = EthHeader::decode(&mut reader).unwrap();
        assert_eq!(decoded.outer_vlan(), 100);
        assert_eq!(decoded.ethertype, ETHERTYPE_PPPOE_DISCOVERY);
    }

    #[test]
    fn qinq_two_tags() {
        let mut eth = sample();
        eth.vlan.push(VlanTag {
            tpid: ETHERTYPE_VLAN,
            pcp: 0,
            dei: false,
            vlan_id: 200,
        });
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = EthHeader::decode(&mut reader).unwrap();
        assert_eq!(decoded.outer_vlan(), 100);
        assert_eq!(decoded.inner_vlan(), 200);
    }
}
