//
// ICMPv6 Router/Neighbor Discovery, the
// subset IPoE sessions need to discover a link-local gateway and resolve
// its link-layer address before DHCPv6 starts.
//
// Checksums are computed over the IPv6 pseudo-header the caller supplies -
// this module never reaches into `ipv6` to avoid a layering cycle.
//

use std::net::Ipv6Addr;

use bbl_utils::cursor::{BufExt, BufMutExt};
use bbl_utils::mac_addr::MacAddr;
use bytes::{Buf, BufMut, BytesMut};
use internet_checksum::checksum;

use crate::error::{need, DecodeError};

const TYPE_ROUTER_SOLICIT: u8 = 133;
const TYPE_ROUTER_ADVERT: u8 = 134;
const TYPE_NEIGHBOR_SOLICIT: u8 = 135;
const TYPE_NEIGHBOR_ADVERT: u8 = 136;

const OPT_SOURCE_LINK_ADDR: u8 = 1;
const OPT_TARGET_LINK_ADDR: u8 = 2;

#[derive(Clone, Copy, Debug)]
pub enum Icmpv6Message {
    RouterSolicit {
        source_link_addr: Option<MacAddr>,
    },
    RouterAdvert {
        source_link_addr: Option<MacAddr>,
        managed: bool,
        other_config: bool,
    },
    NeighborSolicit {
        target: Ipv6Addr,
        source_link_addr: Option<MacAddr>,
    },
    NeighborAdvert {
        target: Ipv6Addr,
        target_link_addr: Option<MacAddr>,
        router: bool,
        solicited: bool,
    },
}

impl Icmpv6Message {
    pub fn decode(buf: &mut impl Buf) -> Result<Icmpv6Message, DecodeError> {
        need(buf.remaining(), 4)?;
        let msg_type = buf.get_u8();
        let _code = buf.get_u8();
        let _checksum = buf.get_u16();
        match msg_type {
            TYPE_ROUTER_SOLICIT => {
                need(buf.remaining(), 4)?;
                buf.advance(4); // reserved
                Ok(Icmpv6Message::RouterSolicit {
                    source_link_addr: decode_link_addr_option(buf, OPT_SOURCE_LINK_ADDR),
                })
            }
            TYPE_ROUTER_ADVERT => {
                need(buf.remaining(), 12)?;
                buf.advance(1); // cur hop limit
                let flags = buf.get_u8();
                buf.advance(10); // lifetime, reachable, retrans
                Ok(Icmpv6Message::RouterAdvert {
                    source_link_addr: decode_link_addr_option(buf, OPT_SOURCE_LINK_ADDR),
                    managed: flags & 0x80 != 0,
                    other_config: flags & 0x40 != 0,
                })
            }
            TYPE_NEIGHBOR_SOLICIT => {
                need(buf.remaining(), 20)?;
                buf.advance(4); // reserved
                let target = buf.try_get_ipv6().ok_or(DecodeError::Malformed("ns target"))?;
                Ok(Icmpv6Message::NeighborSolicit {
                    target,
                    source_link_addr: decode_link_addr_option(buf, OPT_SOURCE_LINK_ADDR),
                })
            }
            TYPE_NEIGHBOR_ADVERT => {
                need(buf.remaining(), 20)?;
                let flags = buf.get_u8();
                buf.advance(3); // reserved
                let target = buf.try_get_ipv6().ok_or(DecodeError::Malformed("na target"))?;
                Ok(Icmpv6Message::NeighborAdvert {
                    target,
                    target_link_addr: decode_link_addr_option(buf, OPT_TARGET_LINK_ADDR),
                    router: flags & 0x80 != 0,
                    solicited: flags & 0x40 != 0,
                })
            }
            other => Err(DecodeError::UnknownProtocol(other as u16)),
        }
    }

    /// Encodes the ICMPv6 body and computes the checksum over the supplied
    /// IPv6 pseudo-header (src || dst || upper-layer length || next header).
    pub fn encode(&self, pseudo_header: &[u8]) -> Vec<u8> {
        let mut body = BytesMut::new();
        match self {
            Icmpv6Message::RouterSolicit { source_link_addr } => {
                body.put_u8(TYPE_ROUTER_SOLICIT);
                body.put_u8(0);
                body.put_u16(0); // checksum placeholder
                body.put_u32(0);
                encode_link_addr_option(&mut body, OPT_SOURCE_LINK_ADDR, *source_link_addr);
            }
            Icmpv6Message::RouterAdvert {
                source_link_addr,
                managed,
                other_config,
            } => {
                body.put_u8(TYPE_ROUTER_ADVERT);
                body.put_u8(0);
                body.put_u16(0);
                body.put_u8(64); // cur hop limit
                let mut flags = 0u8;
                if *managed {
                    flags |= 0x80;
                }
                if *other_config {
                    flags |= 0x40;
                }
                body.put_u8(flags);
                body.put_u16(1800); // router lifetime seconds
                body.put_u32(0); // reachable time
                body.put_u32(0); // retrans timer
                encode_link_addr_option(&mut body, OPT_SOURCE_LINK_ADDR, *source_link_addr);
            }
            Icmpv6Message::NeighborSolicit {
                target,
                source_link_addr,
            } => {
                body.put_u8(TYPE_NEIGHBOR_SOLICIT);
                body.put_u8(0);
                body.put_u16(0);
                body.put_u32(0);
                body.put_ipv6(*target);
                encode_link_addr_option(&mut body, OPT_SOURCE_LINK_ADDR, *source_link_addr);
            }
            Icmpv6Message::NeighborAdvert {
                target,
                target_link_addr,
                router,
                solicited,
            } => {
                body.put_u8(TYPE_NEIGHBOR_ADVERT);
                body.put_u8(0);
                body.put_u16(0);
                let mut flags = 0u8;
                if *router {
                    flags |= 0x80;
                }
                if *solicited {
                    flags |= 0x40;
                }
                flags |= 0x20; // override
                body.put_u8(flags);
                body.put_u8(0);
                body.put_u8(0);
                body.put_u8(0);
                body.put_ipv6(*target);
                encode_link_addr_option(&mut body, OPT_TARGET_LINK_ADDR, *target_link_addr);
            }
        }
        let mut to_checksum = pseudo_header.to_vec();
        to_checksum.extend_from_slice(&body);
        let sum = checksum(&to_checksum);
        body[2] = sum[0];
        body[3] = sum[1];
        body.to_vec()
    }
}

fn decode_link_addr_option(buf: &mut impl Buf, want_type: u8) -> Option<MacAddr> {
    while buf.remaining() >= 8 {
        let opt_type = buf.get_u8();
        let opt_len = buf.get_u8(); // in units of 8 bytes, includes type+len
        if opt_len == 0 || buf.remaining() < (opt_len as usize * 8).saturating_sub(2) {
            return None;
        }
        let mac = buf.try_get_mac()?;
        let extra = (opt_len as usize * 8).saturating_sub(8);
        buf.advance(extra.min(buf.remaining()));
        if opt_type == want_type {
            return Some(MacAddr::from(mac));
        }
    }
    None
}

fn encode_link_addr_option(buf: &mut BytesMut, opt_type: u8, mac: Option<MacAddr>) {
    if let Some(mac) = mac {
        buf.put_u8(opt_type);
        buf.put_u8(1); // length in 8-byte units: type(1)+len(1)+mac(6) = 8
        buf.put_mac(mac.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_header() -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        v.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        v.extend_from_slice(&0u32.to_be_bytes());
        v.extend_from_slice(&[0, 0, 0, 58]);
        v
    }

    #[test]
    fn neighbor_solicit_round_trip() {
        let target = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
        let msg = Icmpv6Message::NeighborSolicit {
            target,
            source_link_addr: Some(MacAddr::from([2, 0, 0, 0, 0, 9])),
        };
        let bytes = msg.encode(&pseudo_header());
        let mut reader = bytes::Bytes::from(bytes);
        let decoded = Icmpv6Message::decode(&mut reader).unwrap();
        match decoded {
            Icmpv6Message::NeighborSolicit {
                target: t,
                source_link_addr,
            } => {
                assert_eq!(t, target);
                assert_eq!(source_link_addr, Some(MacAddr::from([2, 0, 0, 0, 0, 9])));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn router_advert_flags_round_trip() {
        let msg = Icmpv6Message::RouterAdvert {
            source_link_addr: None,
            managed: true,
            other_config: false,
        };
        let bytes = msg.encode(&pseudo_header());
        let mut reader = bytes::Bytes::from(bytes);
        let decoded = Icmpv6Message::decode(&mut reader).unwrap();
        match decoded {
            Icmpv6Message::RouterAdvert { managed, other_config, .. } => {
                assert!(managed);
                assert!(!other_config);
            }
            _ => panic!("wrong variant"),
        }
    }
}
