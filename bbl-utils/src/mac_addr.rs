//
// 48-bit MAC address (IEEE EUI-48 format).
//

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct MacAddr([u8; 6]);

// ===== impl MacAddr =====

impl MacAddr {
    pub const LENGTH: usize = 6;
    pub const BROADCAST: Self = Self([0xff; 6]);
    pub const ZERO: Self = Self([0; 6]);

    // All-L1-IS multicast address (01:80:c2:00:00:14).
    pub const ALL_L1_IS: Self = Self([0x01, 0x80, 0xc2, 0x00, 0x00, 0x14]);
    // All-L2-IS multicast address (01:80:c2:00:00:15).
    pub const ALL_L2_IS: Self = Self([0x01, 0x80, 0xc2, 0x00, 0x00, 0x15]);
    // IS-IS P2P hello destination (same as AllL1IS in practice, kept
    // distinct so callers can name intent).
    pub const P2P_HELLO: Self = Self::ALL_L1_IS;

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

impl From<MacAddr> for [u8; 6] {
    fn from(mac: MacAddr) -> Self {
        mac.0
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let mac = MacAddr::from([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(mac.to_string(), "02:11:22:33:44:55");
    }

    #[test]
    fn multicast_bit() {
        assert!(MacAddr::ALL_L1_IS.is_multicast());
        assert!(!MacAddr::ZERO.is_multicast());
    }
}
