//
// Top-level IPoE session driver: "Idle -> ARP_Resolve ->
// DHCP_Discover -> DHCP_Request -> DHCP_Bound -> Established" for IPv4, and
// in parallel "RS/RA -> DHCPv6_Solicit -> DHCPv6_Request -> DHCPv6_Bound ->
// Established" for IPv6. Either family alone is enough to reach
// Established; a session configured for both only gets there once both
// finish (or neither is configured, which degrades to an Ethernet-only
// no-op session used by a few control-socket tests).
//

use std::net::Ipv4Addr;
use std::time::Instant;

use bbl_packet::arp::ArpPacket;
use bbl_packet::dhcpv4::DhcpPacket;
use bbl_packet::dhcpv6::Dhcpv6Packet;
use bbl_packet::icmpv6::Icmpv6Message;
use bbl_utils::mac_addr::MacAddr;

use super::dhcp::{self, DhcpClient};
use super::dhcpv6::{self, Dhcpv6Client};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IpoePhase {
    ArpResolve,
    Dhcp,
    Established,
    Terminated,
}

#[derive(Debug)]
pub enum Action {
    SendArp(ArpPacket),
    SendDhcp(DhcpPacket),
    SendRouterSolicit(Icmpv6Message),
    SendDhcpv6(Dhcpv6Packet),
    Established,
    Flapped,
    Terminated(&'static str),
}

pub struct Ipoe {
    pub phase: IpoePhase,
    client_mac: MacAddr,
    gateway_ipv4: Option<Ipv4Addr>,
    gateway_resolved: bool,
    pub dhcp: Option<DhcpClient>,
    router_solicited: bool,
    router_lifetime_seen: bool,
    pub dhcpv6: Option<Dhcpv6Client>,
    ipv4_ready: bool,
    ipv6_ready: bool,
}

impl Ipoe {
    pub fn new(
        client_mac: MacAddr,
        gateway_ipv4: Option<Ipv4Addr>,
        xid: u32,
        dhcpv4_enabled: bool,
        dhcpv6_enabled: bool,
        client_duid: Vec<u8>,
        rapid_commit: bool,
        request_prefix: bool,
    ) -> Self {
        Ipoe {
            phase: IpoePhase::ArpResolve,
            client_mac,
            gateway_ipv4,
            gateway_resolved: gateway_ipv4.is_none(),
            dhcp: dhcpv4_enabled.then(|| DhcpClient::new(client_mac, xid)),
            router_solicited: false,
            router_lifetime_seen: false,
            dhcpv6: dhcpv6_enabled
                .then(|| Dhcpv6Client::new(client_duid, xid & 0xffff, xid, rapid_commit, request_prefix)),
            ipv4_ready: !dhcpv4_enabled,
            ipv6_ready: !dhcpv6_enabled,
        }
    }

    pub fn start(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if let (false, Some(gateway)) = (self.gateway_resolved, self.gateway_ipv4) {
            actions.push(Action::SendArp(ArpPacket::request(
                self.client_mac,
                Ipv4Addr::UNSPECIFIED,
                gateway,
            )));
        } else if let Some(dhcp) = &mut self.dhcp {
            self.phase = IpoePhase::Dhcp;
            actions.push(Action::SendDhcp(dhcp.start_packet()));
        }
        if self.dhcpv6.is_some() && !self.router_solicited {
            self.router_solicited = true;
            actions.push(Action::SendRouterSolicit(Icmpv6Message::RouterSolicit {
                source_link_addr: Some(self.client_mac),
            }));
        }
        actions
    }

    pub fn receive_arp(&mut self, pkt: &ArpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.gateway_resolved {
            return actions;
        }
        if Some(pkt.sender_ip) == self.gateway_ipv4 && pkt.operation == bbl_packet::arp::ArpOperation::Reply {
            self.gateway_resolved = true;
            if let Some(dhcp) = &mut self.dhcp {
                self.phase = IpoePhase::Dhcp;
                actions.push(Action::SendDhcp(dhcp.start_packet()));
            }
        }
        actions
    }

    pub fn receive_dhcp(&mut self, pkt: &DhcpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(dhcp) = &mut self.dhcp else { return actions };
        if let Some(action) = dhcp.receive(pkt) {
            match action {
                dhcp::Action::SendDiscover(p) | dhcp::Action::SendRequest(p) => {
                    actions.push(Action::SendDhcp(p));
                }
                dhcp::Action::Bound(_) => {
                    self.ipv4_ready = true;
                    if self.established() {
                        actions.push(Action::Established);
                    }
                }
                dhcp::Action::Flapped(p) => {
                    self.ipv4_ready = false;
                    if self.phase == IpoePhase::Established {
                        self.phase = IpoePhase::Dhcp;
                    }
                    actions.push(Action::Flapped);
                    actions.push(Action::SendDhcp(p));
                }
            }
        }
        actions
    }

    pub fn receive_icmpv6(&mut self, pkt: &Icmpv6Message) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Icmpv6Message::RouterAdvert { .. } = pkt {
            if !self.router_lifetime_seen {
                self.router_lifetime_seen = true;
                if let Some(dhcpv6) = &mut self.dhcpv6 {
                    actions.push(Action::SendDhcpv6(dhcpv6.start_packet()));
                }
            }
        }
        actions
    }

    pub fn receive_dhcpv6(&mut self, pkt: &Dhcpv6Packet) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(dhcpv6) = &mut self.dhcpv6 else { return actions };
        if let Some(action) = dhcpv6.receive(pkt) {
            match action {
                dhcpv6::Action::SendSolicit(p) | dhcpv6::Action::SendRequest(p) => {
                    actions.push(Action::SendDhcpv6(p));
                }
                dhcpv6::Action::Bound(_) => {
                    self.ipv6_ready = true;
                    if self.established() {
                        actions.push(Action::Established);
                    }
                }
            }
        }
        actions
    }

    /// T1/T2-driven renewal check, run from the timer wheel.
    pub fn poll_renew(&mut self, now: Instant, t1_factor: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(dhcp) = &mut self.dhcp {
            if dhcp.lease_expired(now) {
                self.ipv4_ready = false;
                if self.phase == IpoePhase::Established {
                    self.phase = IpoePhase::Dhcp;
                }
                match dhcp.expire() {
                    dhcp::Action::Flapped(p) => {
                        actions.push(Action::Flapped);
                        actions.push(Action::SendDhcp(p));
                    }
                    _ => unreachable!("expire() always yields Flapped"),
                }
            } else if dhcp.needs_renew(now, t1_factor) {
                actions.push(Action::SendDhcp(dhcp.start_packet()));
            }
        }
        actions
    }

    fn established(&self) -> bool {
        self.phase != IpoePhase::Established && self.ipv4_ready && self.ipv6_ready
    }

    pub fn mark_established(&mut self) {
        self.phase = IpoePhase::Established;
    }

    pub fn terminate(&mut self) -> Action {
        self.phase = IpoePhase::Terminated;
        Action::Terminated("session terminated")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbl_packet::arp::ArpOperation;
    use bbl_packet::dhcpv4::{DhcpOptions, MessageType as Dhcp4Type, OP_BOOTREQUEST};

    fn sample() -> Ipoe {
        Ipoe::new(
            MacAddr::from([2, 0, 0, 0, 0, 1]),
            Some(Ipv4Addr::new(192, 0, 2, 1)),
            0x1234,
            true,
            false,
            vec![1, 2, 3],
            true,
            false,
        )
    }

    #[test]
    fn arp_then_dhcp_then_established() {
        let mut session = sample();
        let actions = session.start();
        assert!(matches!(actions[0], Action::SendArp(_)));

        let reply = ArpPacket {
            operation: ArpOperation::Reply,
            sender_mac: MacAddr::from([2, 0, 0, 0, 0, 2]),
            sender_ip: Ipv4Addr::new(192, 0, 2, 1),
            target_mac: MacAddr::from([2, 0, 0, 0, 0, 1]),
            target_ip: Ipv4Addr::UNSPECIFIED,
        };
        let actions = session.receive_arp(&reply);
        assert!(matches!(actions[0], Action::SendDhcp(_)));
        assert_eq!(session.phase, IpoePhase::Dhcp);

        let offer = DhcpPacket {
            op: OP_BOOTREQUEST,
            xid: 0x1234,
            client_mac: session.client_mac.as_bytes(),
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::new(192, 0, 2, 50),
            giaddr: Ipv4Addr::UNSPECIFIED,
            options: DhcpOptions {
                message_type: Some(Dhcp4Type::Offer),
                server_id: Some(Ipv4Addr::new(192, 0, 2, 1)),
                ..Default::default()
            },
        };
        let actions = session.receive_dhcp(&offer);
        assert!(matches!(actions[0], Action::SendDhcp(_)));

        let ack = DhcpPacket {
            op: OP_BOOTREQUEST,
            xid: 0x1234,
            client_mac: session.client_mac.as_bytes(),
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::new(192, 0, 2, 50),
            giaddr: Ipv4Addr::UNSPECIFIED,
            options: DhcpOptions {
                message_type: Some(Dhcp4Type::Ack),
                server_id: Some(Ipv4Addr::new(192, 0, 2, 1)),
                lease_time: Some(3600),
                ..Default::default()
            },
        };
        let actions = session.receive_dhcp(&ack);
        assert!(actions.iter().any(|a| matches!(a, Action::Established)));
    }
}
