//
// Small byte-cursor extensions shared by every codec in `bbl-packet`.
//
// A thin `BytesExt`-style layer, trimmed to the primitives this core's
// wire formats actually need.
//

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut};

pub trait BufExt: Buf {
    fn try_get_ipv4(&mut self) -> Option<Ipv4Addr> {
        if self.remaining() < 4 {
            return None;
        }
        Some(Ipv4Addr::from(self.get_u32()))
    }

    fn try_get_ipv6(&mut self) -> Option<Ipv6Addr> {
        if self.remaining() < 16 {
            return None;
        }
        let mut octets = [0u8; 16];
        self.copy_to_slice(&mut octets);
        Some(Ipv6Addr::from(octets))
    }

    fn try_get_mac(&mut self) -> Option<[u8; 6]> {
        if self.remaining() < 6 {
            return None;
        }
        let mut octets = [0u8; 6];
        self.copy_to_slice(&mut octets);
        Some(octets)
    }
}

impl<T: Buf + ?Sized> BufExt for T {}

pub trait BufMutExt: BufMut {
    fn put_ipv4(&mut self, addr: Ipv4Addr) {
        self.put_u32(u32::from(addr));
    }

    fn put_ipv6(&mut self, addr: Ipv6Addr) {
        self.put_slice(&addr.octets());
    }

    fn put_mac(&mut self, mac: [u8; 6]) {
        self.put_slice(&mac);
    }
}

impl<T: BufMut + ?Sized> BufMutExt for T {}
