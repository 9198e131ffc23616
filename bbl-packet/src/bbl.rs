//
// The synthetic "BBL" traffic payload: a 48-byte trailer
// carried over UDP port 65056 that lets the traffic engine correlate and
// measure per-flow behavior without needing a real application on either
// end.
//

use bytes::{Buf, BufMut};

use crate::error::{need, DecodeError};

pub const MAGIC: u64 = 0x5274_4272_6963_6b21; // "RtBrick!"
pub const LENGTH: usize = 48;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowType {
    Unicast,
    Multicast,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowSubType {
    Ipv4,
    Ipv6,
    Ipv6Pd,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Upstream,
    Downstream,
}

#[derive(Clone, Copy, Debug)]
pub struct BblHeader {
    pub flow_type: FlowType,
    pub sub_type: FlowSubType,
    pub direction: Direction,
    pub session_id: u32,
    pub outer_vlan: u16,
    pub inner_vlan: u16,
    pub flow_id: u64,
    pub flow_seq: u64,
    /// Nanoseconds since an arbitrary but stable epoch, used only to
    /// compute a one-way delay relative to another timestamp of the same
    /// clock domain.
    pub timestamp_ns: u64,
}

impl BblHeader {
    pub fn decode(buf: &mut impl Buf) -> Result<BblHeader, DecodeError> {
        need(buf.remaining(), LENGTH)?;
        let magic = buf.get_u64();
        if magic != MAGIC {
            return Err(DecodeError::WrongMagic);
        }
        let flow_type = match buf.get_u8() {
            0 => FlowType::Unicast,
            1 => FlowType::Multicast,
            _ => return Err(DecodeError::Malformed("bbl flow type")),
        };
        let sub_type = match buf.get_u8() {
            0 => FlowSubType::Ipv4,
            1 => FlowSubType::Ipv6,
            2 => FlowSubType::Ipv6Pd,
            _ => return Err(DecodeError::Malformed("bbl sub type")),
        };
        let direction = match buf.get_u8() {
            0 => Direction::Upstream,
            1 => Direction::Downstream,
            _ => return Err(DecodeError::Malformed("bbl direction")),
        };
        buf.get_u8(); // padding
        let session_id = buf.get_u32();
        let outer_vlan = buf.get_u16();
        let inner_vlan = buf.get_u16();
        let flow_id = buf.get_u64();
        let flow_seq = buf.get_u64();
        let timestamp_ns = buf.get_u64();
        Ok(BblHeader {
            flow_type,
            sub_type,
            direction,
            session_id,
            outer_vlan,
            inner_vlan,
            flow_id,
            flow_seq,
            timestamp_ns,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(MAGIC);
        buf.put_u8(match self.flow_type {
            FlowType::Unicast => 0,
            FlowType::Multicast => 1,
        });
        buf.put_u8(match self.sub_type {
            FlowSubType::Ipv4 => 0,
            FlowSubType::Ipv6 => 1,
            FlowSubType::Ipv6Pd => 2,
        });
        buf.put_u8(match self.direction {
            Direction::Upstream => 0,
            Direction::Downstream => 1,
        });
        buf.put_u8(0);
        buf.put_u32(self.session_id);
        buf.put_u16(self.outer_vlan);
        buf.put_u16(self.inner_vlan);
        buf.put_u64(self.flow_id);
        buf.put_u64(self.flow_seq);
        buf.put_u64(self.timestamp_ns);
        // pad to the fixed 48-byte trailer length.
        let used = 8 + 4 + 4 + 4 + 8 + 8 + 8;
        for _ in used..LENGTH {
            buf.put_u8(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn round_trip_is_exactly_48_bytes() {
        let hdr = BblHeader {
            flow_type: FlowType::Unicast,
            sub_type: FlowSubType::Ipv4,
            direction: Direction::Downstream,
            session_id: 7,
            outer_vlan: 100,
            inner_vlan: 200,
            flow_id: 0xaabb,
            flow_seq: 42,
            timestamp_ns: 123_456_789,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        assert_eq!(buf.len(), LENGTH);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = BblHeader::decode(&mut reader).unwrap();
        assert_eq!(decoded.flow_id, 0xaabb);
        assert_eq!(decoded.flow_seq, 42);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u64(0);
        buf.resize(LENGTH, 0);
        let mut reader = Bytes::from(buf.freeze());
        assert!(matches!(
            BblHeader::decode(&mut reader),
            Err(DecodeError::WrongMagic)
        ));
    }
}
