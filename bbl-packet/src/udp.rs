//
// UDP header. No checksum computation: every upper-layer
// protocol this core speaks tolerates a zero UDP checksum over IPv4, and
// IPv6 checksums are left to the caller since they need the pseudo-header.
//

use bytes::{Buf, BufMut};

use crate::error::{need, DecodeError};

pub const PORT_DHCP_SERVER: u16 = 67;
pub const PORT_DHCP_CLIENT: u16 = 68;
pub const PORT_DHCPV6_CLIENT: u16 = 546;
pub const PORT_DHCPV6_SERVER: u16 = 547;
pub const PORT_L2TP: u16 = 1701;
pub const PORT_BBL: u16 = 65056;

#[derive(Clone, Copy, Debug)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub const LEN: usize = 8;

    pub fn decode(buf: &mut impl Buf) -> Result<UdpHeader, DecodeError> {
        need(buf.remaining(), Self::LEN)?;
        Ok(UdpHeader {
            src_port: buf.get_u16(),
            dst_port: buf.get_u16(),
            length: buf.get_u16(),
            checksum: buf.get_u16(),
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u16(self.length);
        buf.put_u16(self.checksum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn round_trip() {
        let hdr = UdpHeader {
            src_port: PORT_BBL,
            dst_port: PORT_BBL,
            length: 56,
            checksum: 0,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = UdpHeader::decode(&mut reader).unwrap();
        assert_eq!(decoded.length, 56);
    }
}
