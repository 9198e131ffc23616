//
// Session state: one [`Session`] per emulated
// subscriber, combining the top-level PPPoE/IPoE lifecycle with the PPP
// and address-acquisition sub-state machines each session drives through.
//
// Sub-state machines are deliberately dumb: each owns only its own RFC
// exchange and returns an `Action` describing what to send next. The
// top-level driver in `pppoe.rs`/`ipoe.rs` sequences them and the engine's
// interface layer turns an `Action` into wire bytes.
//

pub mod auth;
pub mod dhcp;
pub mod dhcpv6;
pub mod igmp;
pub mod ip6cp;
pub mod ipcp;
pub mod ipoe;
pub mod lcp;
pub mod pppoe;

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Instant;

use bbl_packet::igmp::IgmpMessage;
use bbl_utils::mac_addr::MacAddr;
use bbl_utils::session_key::SessionKey;

pub use auth::{Auth, AuthState};
pub use dhcp::{DhcpClient, DhcpClientState};
pub use dhcpv6::{Dhcpv6Client, Dhcpv6ClientState};
pub use igmp::{GroupMembership, GroupState};
pub use ip6cp::{Ip6cp, Ip6cpState};
pub use ipcp::{Ipcp, IpcpState};
pub use ipoe::Ipoe;
pub use lcp::{Lcp, LcpState};
pub use pppoe::Pppoe;

use crate::debug::Debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionType {
    Pppoe,
    Ipoe,
}

/// Coarse session lifecycle. Each
/// sub-state machine tracks its own finer-grained progress; this is what
/// the control socket and session counters report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Init,
    Establishing,
    Established,
    Terminating,
    Terminated,
}

#[derive(Default, Debug)]
pub struct SessionStats {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub flapped: u32,
}

/// Minimal CFM continuity-check bookkeeping: the control socket's
/// `cfm-cc-*` handlers toggle this, but no real 802.1ag CCM PDU is
/// exchanged - full CFM codec support is out of scope.
#[derive(Default, Debug)]
pub struct CfmState {
    pub enabled: bool,
    pub rdi: bool,
    pub last_defect: Option<Instant>,
}

pub struct Address {
    pub ipv4: Option<Ipv4Addr>,
    pub dns1: Option<Ipv4Addr>,
    pub dns2: Option<Ipv4Addr>,
    pub ipv6_interface_identifier: Option<u64>,
    pub ipv6_delegated_prefix: Option<(Ipv6Addr, u8)>,
}

impl Default for Address {
    fn default() -> Self {
        Address {
            ipv4: None,
            dns1: None,
            dns2: None,
            ipv6_interface_identifier: None,
            ipv6_delegated_prefix: None,
        }
    }
}

/// The per-session driver: either [`Pppoe`] or [`Ipoe`]. Kept as a wrapper
/// enum rather than a trait object since each variant's `Action` type
/// differs and the engine dispatches on `session_type` anyway.
pub enum Driver {
    Pppoe(Pppoe),
    Ipoe(Ipoe),
}

pub struct Session {
    pub session_id: u32,
    pub key: SessionKey,
    pub session_type: SessionType,
    pub state: SessionState,
    pub client_mac: MacAddr,
    pub server_mac: MacAddr,

    pub driver: Driver,

    pub address: Address,
    pub igmp_groups: Vec<GroupMembership>,
    pub stats: SessionStats,
    pub traffic: crate::traffic::SessionTraffic,
    pub cfm: CfmState,

    pub established_at: Option<Instant>,
    pub last_activity: Instant,
}

impl Session {
    pub fn new(
        session_id: u32,
        key: SessionKey,
        session_type: SessionType,
        client_mac: MacAddr,
        server_mac: MacAddr,
        driver: Driver,
        now: Instant,
    ) -> Self {
        Session {
            session_id,
            key,
            session_type,
            state: SessionState::Init,
            client_mac,
            server_mac,
            driver,
            address: Address::default(),
            igmp_groups: Vec::new(),
            stats: SessionStats::default(),
            traffic: crate::traffic::SessionTraffic::default(),
            cfm: CfmState::default(),
            established_at: None,
            last_activity: now,
        }
    }

    pub fn state_change(&mut self, new_state: SessionState) {
        if self.state == new_state {
            return;
        }
        let machine = match self.session_type {
            SessionType::Pppoe => "pppoe",
            SessionType::Ipoe => "ipoe",
        };
        Debug::SessionStateChange(self.session_id, machine, self.state, new_state).log();
        if new_state == SessionState::Established {
            Debug::SessionEstablished(self.session_id, self.session_type).log();
        }
        self.state = new_state;
    }

    pub fn group(&mut self, addr: std::net::Ipv4Addr) -> &mut GroupMembership {
        if let Some(idx) = self.igmp_groups.iter().position(|g| g.group == addr) {
            &mut self.igmp_groups[idx]
        } else {
            self.igmp_groups.push(GroupMembership::new(addr));
            self.igmp_groups.last_mut().unwrap()
        }
    }

    /// Reacts to an IGMP message received from the network side. Only
    /// `Query` matters here: this session re-reports every group it is
    /// currently joining or has joined, the way a real subscriber host
    /// answers a general or group-specific query.
    pub fn receive_igmp(&mut self, msg: &IgmpMessage) -> Vec<IgmpMessage> {
        match msg {
            IgmpMessage::Query { group, .. } => self
                .igmp_groups
                .iter()
                .filter(|g| matches!(g.state, GroupState::Joining | GroupState::Joined))
                .filter(|g| *group == std::net::Ipv4Addr::UNSPECIFIED || g.group == *group)
                .map(|g| IgmpMessage::V2Report { group: g.group })
                .collect(),
            _ => Vec::new(),
        }
    }
}
