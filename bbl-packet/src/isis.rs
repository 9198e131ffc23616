//
// IS-IS over 802.3 with LLC: L1/L2 LAN hello, P2P hello,
// L1/L2 LSP, L1/L2 CSNP, L1/L2 PSNP. TLVs are limited to the set `bbl-isis`
// actually consumes: area addresses, protocols supported, IS reachability
// (extended), IP reachability (extended v4/v6), hostname, TE router id,
// IPv4 interface address, SR capability, and authentication.
//

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, DecodeError};

pub const LLC_ISIS: [u8; 3] = [0xfe, 0xfe, 0x03];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PduType {
    L1LanHello,
    L2LanHello,
    P2pHello,
    L1Lsp,
    L2Lsp,
    L1Csnp,
    L2Csnp,
    L1Psnp,
    L2Psnp,
}

impl PduType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            15 => PduType::L1LanHello,
            16 => PduType::L2LanHello,
            17 => PduType::P2pHello,
            18 => PduType::L1Lsp,
            20 => PduType::L2Lsp,
            24 => PduType::L1Csnp,
            25 => PduType::L2Csnp,
            26 => PduType::L1Psnp,
            27 => PduType::L2Psnp,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            PduType::L1LanHello => 15,
            PduType::L2LanHello => 16,
            PduType::P2pHello => 17,
            PduType::L1Lsp => 18,
            PduType::L2Lsp => 20,
            PduType::L1Csnp => 24,
            PduType::L2Csnp => 25,
            PduType::L1Psnp => 26,
            PduType::L2Psnp => 27,
        }
    }
}

/// 8-byte LSP id: 6-byte system id, 1-byte pseudonode number, 1-byte
/// fragment number, big-endian: system id || pseudonode || fragment.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LspId {
    pub system_id: [u8; 6],
    pub pseudonode: u8,
    pub fragment: u8,
}

impl LspId {
    pub fn decode(buf: &mut impl Buf) -> Result<LspId, DecodeError> {
        need(buf.remaining(), 8)?;
        let mut system_id = [0u8; 6];
        buf.copy_to_slice(&mut system_id);
        let pseudonode = buf.get_u8();
        let fragment = buf.get_u8();
        Ok(LspId {
            system_id,
            pseudonode,
            fragment,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.system_id);
        buf.put_u8(self.pseudonode);
        buf.put_u8(self.fragment);
    }
}

#[derive(Clone, Debug)]
pub enum Tlv {
    AreaAddresses(Vec<Vec<u8>>),
    ProtocolsSupported(Vec<u8>),
    Hostname(String),
    TeRouterId([u8; 4]),
    Ipv4InterfaceAddress([u8; 4]),
    ExtendedIsReachability(Vec<(LspId, u32)>),
    ExtendedIpReachability(Vec<(u32, u8, [u8; 4])>),
    Ipv6Reachability(Vec<(u32, u8, [u8; 16])>),
    RouterCapability { srgb_base: u32, srgb_range: u32 },
    Authentication { auth_type: u8, value: Vec<u8> },
    Unknown(u8, Vec<u8>),
}

const TLV_AREA_ADDRESSES: u8 = 1;
const TLV_IS_REACHABILITY_EXT: u8 = 22;
const TLV_AUTHENTICATION: u8 = 10;
const TLV_IP_REACHABILITY_EXT: u8 = 135;
const TLV_PROTOCOLS_SUPPORTED: u8 = 129;
const TLV_IPV4_INTERFACE_ADDRESS: u8 = 132;
const TLV_TE_ROUTER_ID: u8 = 134;
const TLV_DYNAMIC_HOSTNAME: u8 = 137;
const TLV_IPV6_REACHABILITY: u8 = 236;
const TLV_ROUTER_CAPABILITY: u8 = 242;

fn decode_tlvs(buf: &mut Bytes) -> Result<Vec<Tlv>, DecodeError> {
    let mut tlvs = Vec::new();
    while buf.remaining() >= 2 {
        let tlv_type = buf.get_u8();
        let tlv_len = buf.get_u8() as usize;
        need(buf.remaining(), tlv_len)?;
        let mut value = buf.copy_to_bytes(tlv_len);
        tlvs.push(match tlv_type {
            TLV_AREA_ADDRESSES => {
                let mut areas = Vec::new();
                while value.remaining() >= 1 {
                    let len = value.get_u8() as usize;
                    need(value.remaining(), len)?;
                    areas.push(value.copy_to_bytes(len).to_vec());
                }
                Tlv::AreaAddresses(areas)
            }
            TLV_PROTOCOLS_SUPPORTED => Tlv::ProtocolsSupported(value.to_vec()),
            TLV_DYNAMIC_HOSTNAME => {
                Tlv::Hostname(String::from_utf8_lossy(&value).into_owned())
            }
            TLV_TE_ROUTER_ID if value.remaining() >= 4 => {
                let mut id = [0u8; 4];
                value.copy_to_slice(&mut id);
                Tlv::TeRouterId(id)
            }
            TLV_IPV4_INTERFACE_ADDRESS if value.remaining() >= 4 => {
                let mut addr = [0u8; 4];
                value.copy_to_slice(&mut addr);
                Tlv::Ipv4InterfaceAddress(addr)
            }
            TLV_IS_REACHABILITY_EXT => {
                let mut entries = Vec::new();
                while value.remaining() >= 11 {
                    let neighbor = LspId::decode(&mut value)?;
                    let metric = value.get_u8() as u32
                        | (value.get_u8() as u32) << 8
                        | (value.get_u8() as u32) << 16;
                    let sub_len = value.get_u8() as usize;
                    need(value.remaining(), sub_len)?;
                    value.advance(sub_len);
                    entries.push((neighbor, metric));
                }
                Tlv::ExtendedIsReachability(entries)
            }
            TLV_IP_REACHABILITY_EXT => {
                let mut entries = Vec::new();
                while value.remaining() >= 5 {
                    let metric = value.get_u32();
                    let control = value.get_u8();
                    let prefix_len = control & 0x3f;
                    let has_subtlvs = control & 0x40 != 0;
                    let prefix_bytes = prefix_len.div_ceil(8) as usize;
                    need(value.remaining(), prefix_bytes)?;
                    let mut prefix = [0u8; 4];
                    let got = value.copy_to_bytes(prefix_bytes);
                    prefix[..got.len()].copy_from_slice(&got);
                    if has_subtlvs {
                        need(value.remaining(), 1)?;
                        let sub_len = value.get_u8() as usize;
                        need(value.remaining(), sub_len)?;
                        value.advance(sub_len);
                    }
                    entries.push((metric, prefix_len, prefix));
                }
                Tlv::ExtendedIpReachability(entries)
            }
            TLV_IPV6_REACHABILITY => {
                let mut entries = Vec::new();
                while value.remaining() >= 6 {
                    let metric = value.get_u32();
                    let control = value.get_u8();
                    let prefix_len = value.get_u8();
                    let has_subtlvs = control & 0x20 != 0;
                    let prefix_bytes = prefix_len.div_ceil(8) as usize;
                    need(value.remaining(), prefix_bytes)?;
                    let mut prefix = [0u8; 16];
                    let got = value.copy_to_bytes(prefix_bytes);
                    prefix[..got.len()].copy_from_slice(&got);
                    if has_subtlvs {
                        need(value.remaining(), 1)?;
                        let sub_len = value.get_u8() as usize;
                        need(value.remaining(), sub_len)?;
                        value.advance(sub_len);
                    }
                    entries.push((metric, prefix_len, prefix));
                }
                Tlv::Ipv6Reachability(entries)
            }
            TLV_ROUTER_CAPABILITY if value.remaining() >= 5 => {
                value.advance(5); // router id + flags
                let mut srgb_base = 0u32;
                let mut srgb_range = 0u32;
                while value.remaining() >= 2 {
                    let sub_type = value.get_u8();
                    let sub_len = value.get_u8() as usize;
                    need(value.remaining(), sub_len)?;
                    let mut sub_value = value.copy_to_bytes(sub_len);
                    if sub_type == 2 && sub_value.remaining() >= 9 {
                        sub_value.advance(2);
                        srgb_range = sub_value.get_u8() as u32
                            | (sub_value.get_u8() as u32) << 8
                            | (sub_value.get_u8() as u32) << 16;
                        sub_value.advance(2); // sid/label sub-tlv type+len
                        srgb_base = sub_value.get_u8() as u32
                            | (sub_value.get_u8() as u32) << 8
                            | (sub_value.get_u8() as u32) << 16;
                    }
                }
                Tlv::RouterCapability { srgb_base, srgb_range }
            }
            TLV_AUTHENTICATION if value.remaining() >= 1 => {
                let auth_type = value.get_u8();
                Tlv::Authentication {
                    auth_type,
                    value: value.to_vec(),
                }
            }
            other => Tlv::Unknown(other, value.to_vec()),
        });
    }
    Ok(tlvs)
}

fn encode_tlv(tlv: &Tlv, buf: &mut BytesMut) {
    let mut value = BytesMut::new();
    let tlv_type = match tlv {
        Tlv::AreaAddresses(areas) => {
            for area in areas {
                value.put_u8(area.len() as u8);
                value.put_slice(area);
            }
            TLV_AREA_ADDRESSES
        }
        Tlv::ProtocolsSupported(protos) => {
            value.put_slice(protos);
            TLV_PROTOCOLS_SUPPORTED
        }
        Tlv::Hostname(name) => {
            value.put_slice(name.as_bytes());
            TLV_DYNAMIC_HOSTNAME
        }
        Tlv::TeRouterId(id) => {
            value.put_slice(id);
            TLV_TE_ROUTER_ID
        }
        Tlv::Ipv4InterfaceAddress(addr) => {
            value.put_slice(addr);
            TLV_IPV4_INTERFACE_ADDRESS
        }
        Tlv::ExtendedIsReachability(entries) => {
            for (neighbor, metric) in entries {
                neighbor.encode(&mut value);
                value.put_u8((*metric & 0xff) as u8);
                value.put_u8(((*metric >> 8) & 0xff) as u8);
                value.put_u8(((*metric >> 16) & 0xff) as u8);
                value.put_u8(0); // no sub-TLVs
            }
            TLV_IS_REACHABILITY_EXT
        }
        Tlv::ExtendedIpReachability(entries) => {
            for (metric, prefix_len, prefix) in entries {
                value.put_u32(*metric);
                value.put_u8(*prefix_len & 0x3f);
                let nbytes = prefix_len.div_ceil(8) as usize;
                value.put_slice(&prefix[..nbytes]);
            }
            TLV_IP_REACHABILITY_EXT
        }
        Tlv::Ipv6Reachability(entries) => {
            for (metric, prefix_len, prefix) in entries {
                value.put_u32(*metric);
                value.put_u8(0);
                value.put_u8(*prefix_len);
                let nbytes = prefix_len.div_ceil(8) as usize;
                value.put_slice(&prefix[..nbytes]);
            }
            TLV_IPV6_REACHABILITY
        }
        Tlv::RouterCapability { srgb_base, srgb_range } => {
            value.put_slice(&[0, 0, 0, 0, 0]); // router id + flags
            value.put_u8(2); // SR capability sub-TLV
            value.put_u8(9);
            value.put_u16(0); // flags
            value.put_u8((*srgb_range & 0xff) as u8);
            value.put_u8(((*srgb_range >> 8) & 0xff) as u8);
            value.put_u8(((*srgb_range >> 16) & 0xff) as u8);
            value.put_u8(1); // SID/label sub-TLV type
            value.put_u8(3); // length
            value.put_u8((*srgb_base & 0xff) as u8);
            value.put_u8(((*srgb_base >> 8) & 0xff) as u8);
            value.put_u8(((*srgb_base >> 16) & 0xff) as u8);
            TLV_ROUTER_CAPABILITY
        }
        Tlv::Authentication { auth_type, value: v } => {
            value.put_u8(*auth_type);
            value.put_slice(v);
            TLV_AUTHENTICATION
        }
        Tlv::Unknown(t, v) => {
            value.put_slice(v);
            *t
        }
    };
    buf.put_u8(tlv_type);
    buf.put_u8(value.len() as u8);
    buf.put_slice(&value);
}

#[derive(Clone, Debug)]
pub struct LspPdu {
    pub lsp_id: LspId,
    pub sequence: u32,
    pub remaining_lifetime: u16,
    pub checksum: u16,
    /// Bit 3 of the type-block byte ("attached" bit is ignored here; only
    /// the overload bit and level indicator matter to this emulator).
    pub overload: bool,
    pub level: u8,
    pub tlvs: Vec<Tlv>,
}

impl LspPdu {
    pub fn decode(buf: &mut Bytes) -> Result<LspPdu, DecodeError> {
        need(buf.remaining(), 19)?;
        buf.get_u16(); // pdu length, re-derived on encode
        let remaining_lifetime = buf.get_u16();
        let lsp_id = LspId::decode(buf)?;
        let sequence = buf.get_u32();
        let checksum = buf.get_u16();
        let type_block = buf.get_u8();
        let overload = type_block & 0x04 != 0;
        let level = if type_block & 0x03 != 0 { 2 } else { 1 };
        let tlvs = decode_tlvs(buf)?;
        Ok(LspPdu {
            lsp_id,
            sequence,
            remaining_lifetime,
            checksum,
            overload,
            level,
            tlvs,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        body.put_u16(self.remaining_lifetime);
        self.lsp_id.encode(&mut body);
        body.put_u32(self.sequence);
        body.put_u16(self.checksum);
        let mut type_block = 0x03; // IS type = 3 (L1L2): this emulator always advertises both
        if self.overload {
            type_block |= 0x04;
        }
        body.put_u8(type_block);
        for tlv in &self.tlvs {
            encode_tlv(tlv, &mut body);
        }
        buf.put_u16((19 + body.len() - 17) as u16);
        buf.put_slice(&body);
    }
}

#[derive(Clone, Debug)]
pub struct HelloPdu {
    pub source_id: [u8; 6],
    pub holding_time: u16,
    pub priority: u8,
    pub lan_id: LspId,
    pub tlvs: Vec<Tlv>,
}

impl HelloPdu {
    pub fn decode(buf: &mut Bytes) -> Result<HelloPdu, DecodeError> {
        need(buf.remaining(), 20)?;
        buf.get_u8(); // circuit type
        let mut source_id = [0u8; 6];
        buf.copy_to_slice(&mut source_id);
        let holding_time = buf.get_u16();
        buf.get_u16(); // pdu length
        let priority = buf.get_u8() & 0x7f;
        let lan_id = LspId::decode(buf)?;
        let tlvs = decode_tlvs(buf)?;
        Ok(HelloPdu {
            source_id,
            holding_time,
            priority,
            lan_id,
            tlvs,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        body.put_slice(&self.source_id);
        body.put_u16(self.holding_time);
        let header_len_placeholder = 0u16;
        body.put_u16(header_len_placeholder);
        body.put_u8(self.priority & 0x7f);
        self.lan_id.encode(&mut body);
        for tlv in &self.tlvs {
            encode_tlv(tlv, &mut body);
        }
        buf.put_u8(3); // circuit type = L1L2
        buf.put_slice(&body);
    }
}

#[derive(Clone, Debug)]
pub struct CsnpPdu {
    pub source_id: [u8; 6],
    pub start_lsp_id: LspId,
    pub end_lsp_id: LspId,
    pub entries: Vec<(LspId, u32, u16, u16)>,
}

impl CsnpPdu {
    pub fn decode(buf: &mut Bytes) -> Result<CsnpPdu, DecodeError> {
        need(buf.remaining(), 25)?;
        buf.get_u16(); // pdu length
        let mut source_id = [0u8; 6];
        buf.copy_to_slice(&mut source_id);
        let start_lsp_id = LspId::decode(buf)?;
        let end_lsp_id = LspId::decode(buf)?;
        let mut entries = Vec::new();
        while buf.remaining() >= 2 {
            let tlv_type = buf.get_u8();
            let tlv_len = buf.get_u8() as usize;
            need(buf.remaining(), tlv_len)?;
            let mut value = buf.copy_to_bytes(tlv_len);
            if tlv_type == 9 {
                while value.remaining() >= 16 {
                    let lifetime = value.get_u16();
                    let lsp_id = LspId::decode(&mut value)?;
                    let seq = value.get_u32();
                    let checksum = value.get_u16();
                    entries.push((lsp_id, seq, lifetime, checksum));
                }
            }
        }
        Ok(CsnpPdu {
            source_id,
            start_lsp_id,
            end_lsp_id,
            entries,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        body.put_slice(&self.source_id);
        self.start_lsp_id.encode(&mut body);
        self.end_lsp_id.encode(&mut body);
        let mut entries_tlv = BytesMut::new();
        for (lsp_id, seq, lifetime, checksum) in &self.entries {
            entries_tlv.put_u16(*lifetime);
            lsp_id.encode(&mut entries_tlv);
            entries_tlv.put_u32(*seq);
            entries_tlv.put_u16(*checksum);
        }
        for chunk in entries_tlv.chunks(255 / 16 * 16) {
            body.put_u8(9);
            body.put_u8(chunk.len() as u8);
            body.put_slice(chunk);
        }
        buf.put_u16((25 + body.len() - 23) as u16);
        buf.put_slice(&body);
    }
}

#[derive(Clone, Debug)]
pub struct PsnpPdu {
    pub source_id: [u8; 6],
    pub entries: Vec<(LspId, u32, u16, u16)>,
}

impl PsnpPdu {
    pub fn decode(buf: &mut Bytes) -> Result<PsnpPdu, DecodeError> {
        need(buf.remaining(), 8)?;
        buf.get_u16(); // pdu length
        let mut source_id = [0u8; 6];
        buf.copy_to_slice(&mut source_id);
        let mut entries = Vec::new();
        while buf.remaining() >= 2 {
            let tlv_type = buf.get_u8();
            let tlv_len = buf.get_u8() as usize;
            need(buf.remaining(), tlv_len)?;
            let mut value = buf.copy_to_bytes(tlv_len);
            if tlv_type == 9 {
                while value.remaining() >= 16 {
                    let lifetime = value.get_u16();
                    let lsp_id = LspId::decode(&mut value)?;
                    let seq = value.get_u32();
                    let checksum = value.get_u16();
                    entries.push((lsp_id, seq, lifetime, checksum));
                }
            }
        }
        Ok(PsnpPdu { source_id, entries })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        body.put_slice(&self.source_id);
        let mut entries_tlv = BytesMut::new();
        for (lsp_id, seq, lifetime, checksum) in &self.entries {
            entries_tlv.put_u16(*lifetime);
            lsp_id.encode(&mut entries_tlv);
            entries_tlv.put_u32(*seq);
            entries_tlv.put_u16(*checksum);
        }
        for chunk in entries_tlv.chunks(255 / 16 * 16) {
            body.put_u8(9);
            body.put_u8(chunk.len() as u8);
            body.put_slice(chunk);
        }
        buf.put_u16((8 + body.len() - 6) as u16);
        buf.put_slice(&body);
    }
}

#[derive(Clone, Debug)]
pub enum IsisPdu {
    Hello(HelloPdu),
    Lsp(LspPdu),
    Csnp(CsnpPdu),
    Psnp(PsnpPdu),
}

/// Common IS-IS PDU header: intradomain routing protocol discriminator,
/// header length, version, id length, PDU type, version2, reserved,
/// max-area-addresses - 8 bytes preceding the PDU-specific header.
pub fn decode(buf: &mut impl Buf) -> Result<(PduType, IsisPdu), DecodeError> {
    need(buf.remaining(), 8)?;
    let discriminator = buf.get_u8();
    if discriminator != 0x83 {
        return Err(DecodeError::Malformed("isis discriminator"));
    }
    buf.get_u8(); // header length
    buf.get_u8(); // version
    buf.get_u8(); // id length
    let pdu_type = PduType::from_u8(buf.get_u8() & 0x1f)
        .ok_or(DecodeError::Malformed("isis pdu type"))?;
    buf.get_u8(); // version2
    buf.get_u8(); // reserved
    buf.get_u8(); // max area addresses
    let mut rest = buf.copy_to_bytes(buf.remaining());
    let pdu = match pdu_type {
        PduType::L1LanHello | PduType::L2LanHello | PduType::P2pHello => {
            IsisPdu::Hello(HelloPdu::decode(&mut rest)?)
        }
        PduType::L1Lsp | PduType::L2Lsp => IsisPdu::Lsp(LspPdu::decode(&mut rest)?),
        PduType::L1Csnp | PduType::L2Csnp => IsisPdu::Csnp(CsnpPdu::decode(&mut rest)?),
        PduType::L1Psnp | PduType::L2Psnp => IsisPdu::Psnp(PsnpPdu::decode(&mut rest)?),
    };
    Ok((pdu_type, pdu))
}

/// Common IS-IS PDU header, written ahead of any PDU-specific body:
/// discriminator, header length, version, id length, PDU type, version2,
/// reserved, max-area-addresses.
fn encode_header(pdu_type: PduType, buf: &mut impl BufMut) {
    buf.put_u8(0x83);
    buf.put_u8(27); // fixed header length, same for every PDU type here
    buf.put_u8(1);
    buf.put_u8(0);
    buf.put_u8(pdu_type.as_u8());
    buf.put_u8(1);
    buf.put_u8(0);
    buf.put_u8(0);
}

pub fn encode(pdu_type: PduType, pdu: &IsisPdu, buf: &mut impl BufMut) {
    encode_header(pdu_type, buf);
    match pdu {
        IsisPdu::Hello(h) => h.encode(buf),
        IsisPdu::Lsp(l) => l.encode(buf),
        IsisPdu::Csnp(c) => c.encode(buf),
        IsisPdu::Psnp(p) => p.encode(buf),
    }
}

/// Writes the common header ahead of an already-encoded PDU-specific body -
/// the LSDB keeps a flooded LSP's body pre-encoded so re-flooding it never
/// re-runs TLV encoding.
pub fn encode_raw(pdu_type: PduType, body: &[u8], buf: &mut impl BufMut) {
    encode_header(pdu_type, buf);
    buf.put_slice(body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsp_round_trip() {
        let pdu = LspPdu {
            lsp_id: LspId {
                system_id: [1, 2, 3, 4, 5, 6],
                pseudonode: 0,
                fragment: 0,
            },
            sequence: 5,
            remaining_lifetime: 1200,
            checksum: 0,
            overload: false,
            level: 2,
            tlvs: vec![
                Tlv::Hostname("r1".into()),
                Tlv::AreaAddresses(vec![vec![0x49, 0x00, 0x01]]),
            ],
        };
        let mut buf = BytesMut::new();
        encode(PduType::L2Lsp, &IsisPdu::Lsp(pdu.clone()), &mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let (pdu_type, decoded) = decode(&mut reader).unwrap();
        assert_eq!(pdu_type, PduType::L2Lsp);
        match decoded {
            IsisPdu::Lsp(l) => {
                assert_eq!(l.sequence, 5);
                assert_eq!(l.lsp_id.system_id, [1, 2, 3, 4, 5, 6]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn hello_round_trip() {
        let pdu = HelloPdu {
            source_id: [9, 9, 9, 9, 9, 9],
            holding_time: 30,
            priority: 64,
            lan_id: LspId::default(),
            tlvs: vec![Tlv::AreaAddresses(vec![vec![0x49]])],
        };
        let mut buf = BytesMut::new();
        encode(PduType::P2pHello, &IsisPdu::Hello(pdu), &mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let (pdu_type, decoded) = decode(&mut reader).unwrap();
        assert_eq!(pdu_type, PduType::P2pHello);
        match decoded {
            IsisPdu::Hello(h) => assert_eq!(h.source_id, [9, 9, 9, 9, 9, 9]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn csnp_round_trip() {
        let pdu = CsnpPdu {
            source_id: [1; 6],
            start_lsp_id: LspId::default(),
            end_lsp_id: LspId {
                system_id: [0xff; 6],
                pseudonode: 0xff,
                fragment: 0xff,
            },
            entries: vec![(
                LspId {
                    system_id: [1, 2, 3, 4, 5, 6],
                    pseudonode: 0,
                    fragment: 0,
                },
                7,
                1199,
                0,
            )],
        };
        let mut buf = BytesMut::new();
        encode(PduType::L2Csnp, &IsisPdu::Csnp(pdu), &mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let (_, decoded) = decode(&mut reader).unwrap();
        match decoded {
            IsisPdu::Csnp(c) => assert_eq!(c.entries.len(), 1),
            _ => panic!("wrong variant"),
        }
    }
}
