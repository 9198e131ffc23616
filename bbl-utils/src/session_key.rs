//
// Composite session key: (ifindex, outer_vlan, inner_vlan).
//
// Per the source's DESIGN FLAGS, this is promoted to a first-class key type
// instead of being packed/unpacked ad hoc at each lookup site.
//

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct SessionKey {
    pub ifindex: u32,
    pub outer_vlan: u16,
    pub inner_vlan: u16,
}

impl SessionKey {
    pub fn new(ifindex: u32, outer_vlan: u16, inner_vlan: u16) -> Self {
        SessionKey {
            ifindex,
            outer_vlan,
            inner_vlan,
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "if{}:{}:{}",
            self.ifindex, self.outer_vlan, self.inner_vlan
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keys_are_distinct() {
        let a = SessionKey::new(1, 10, 20);
        let b = SessionKey::new(1, 10, 21);
        assert_ne!(a, b);
    }
}
