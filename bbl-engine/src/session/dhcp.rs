//
// DHCPv4 client sub-state machine for IPoE sessions: the
// standard Discover/Offer/Request/Ack exchange, plus T1/T2-driven
// renew/rebind. PPPoE sessions get their address from IPCP instead and
// never drive this machine.
//

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use bbl_packet::dhcpv4::{DhcpOptions, DhcpPacket, MessageType, OP_BOOTREQUEST};
use bbl_utils::mac_addr::MacAddr;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DhcpClientState {
    Init,
    Selecting,
    Requesting,
    Bound,
    Renewing,
    Rebinding,
}

#[derive(Debug)]
pub struct Lease {
    pub address: Ipv4Addr,
    pub server_id: Ipv4Addr,
    pub lease_time: u32,
    pub bound_at: Instant,
}

#[derive(Debug)]
pub enum Action {
    SendDiscover(DhcpPacket),
    SendRequest(DhcpPacket),
    Bound(Lease),
    /// A previously bound lease was NAK'd or expired without a successful
    /// rebind: the client drops back to `Discover`. Distinct from the in-flight `Requesting`-state NAK, which
    /// just retries before ever having been bound.
    Flapped(DhcpPacket),
}

pub struct DhcpClient {
    pub state: DhcpClientState,
    client_mac: MacAddr,
    xid: u32,
    pub lease: Option<Lease>,
}

impl DhcpClient {
    pub fn new(client_mac: MacAddr, xid: u32) -> Self {
        DhcpClient {
            state: DhcpClientState::Init,
            client_mac,
            xid,
            lease: None,
        }
    }

    pub fn start(&mut self) -> Action {
        self.state = DhcpClientState::Selecting;
        Action::SendDiscover(DhcpPacket {
            op: OP_BOOTREQUEST,
            xid: self.xid,
            client_mac: self.client_mac.as_bytes(),
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            options: DhcpOptions {
                message_type: Some(MessageType::Discover),
                ..Default::default()
            },
        })
    }

    /// Like [`start`](Self::start), but returns the wire packet directly
    /// for callers (the `ipoe` driver) that never inspect the coarser
    /// `Action` on this first hop.
    pub fn start_packet(&mut self) -> DhcpPacket {
        match self.start() {
            Action::SendDiscover(p) => p,
            _ => unreachable!("start() always yields SendDiscover"),
        }
    }

    pub fn receive(&mut self, pkt: &DhcpPacket) -> Option<Action> {
        match (self.state, pkt.options.message_type) {
            (DhcpClientState::Selecting, Some(MessageType::Offer)) => {
                self.state = DhcpClientState::Requesting;
                Some(Action::SendRequest(DhcpPacket {
                    op: OP_BOOTREQUEST,
                    xid: self.xid,
                    client_mac: self.client_mac.as_bytes(),
                    ciaddr: Ipv4Addr::UNSPECIFIED,
                    yiaddr: Ipv4Addr::UNSPECIFIED,
                    giaddr: Ipv4Addr::UNSPECIFIED,
                    options: DhcpOptions {
                        message_type: Some(MessageType::Request),
                        requested_ip: Some(pkt.yiaddr),
                        server_id: pkt.options.server_id,
                        ..Default::default()
                    },
                }))
            }
            (DhcpClientState::Requesting, Some(MessageType::Ack)) => {
                self.state = DhcpClientState::Bound;
                let lease = Lease {
                    address: pkt.yiaddr,
                    server_id: pkt.options.server_id.unwrap_or(Ipv4Addr::UNSPECIFIED),
                    lease_time: pkt.options.lease_time.unwrap_or(3600),
                    bound_at: Instant::now(),
                };
                self.lease = Some(Lease {
                    address: lease.address,
                    server_id: lease.server_id,
                    lease_time: lease.lease_time,
                    bound_at: lease.bound_at,
                });
                Some(Action::Bound(lease))
            }
            (DhcpClientState::Requesting, Some(MessageType::Nak)) => {
                self.state = DhcpClientState::Init;
                Some(self.start())
            }
            (
                DhcpClientState::Bound | DhcpClientState::Renewing | DhcpClientState::Rebinding,
                Some(MessageType::Nak),
            ) => {
                self.lease = None;
                Some(Action::Flapped(self.start_packet()))
            }
            _ => None,
        }
    }

    /// Whether T1 (renew) has elapsed since binding.
    pub fn needs_renew(&self, now: Instant, t1_factor: f64) -> bool {
        let Some(lease) = &self.lease else { return false };
        if self.state != DhcpClientState::Bound {
            return false;
        }
        let t1 = Duration::from_secs_f64(lease.lease_time as f64 * t1_factor);
        now.duration_since(lease.bound_at) >= t1
    }

    /// Whether the lease has expired outright (T2 well past, no rebind
    /// response ever arrived) - the client must flap back to `Discover`
    /// rather than keep renewing forever.
    pub fn lease_expired(&self, now: Instant) -> bool {
        let Some(lease) = &self.lease else { return false };
        if self.state != DhcpClientState::Bound && self.state != DhcpClientState::Renewing {
            return false;
        }
        now.duration_since(lease.bound_at) >= Duration::from_secs(lease.lease_time as u64)
    }

    /// Drops the expired lease and restarts from `Discover`, returning the
    /// flap action the caller should surface (counters, control socket,
    /// `tracing`).
    pub fn expire(&mut self) -> Action {
        self.lease = None;
        Action::Flapped(self.start_packet())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_ack_binds_address() {
        let mut client = DhcpClient::new(MacAddr::from([2, 0, 0, 0, 0, 1]), 0x1234);
        client.start();
        let offer = DhcpPacket {
            op: 2,
            xid: 0x1234,
            client_mac: [2, 0, 0, 0, 0, 1],
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::new(192, 0, 2, 10),
            giaddr: Ipv4Addr::UNSPECIFIED,
            options: DhcpOptions {
                message_type: Some(MessageType::Offer),
                server_id: Some(Ipv4Addr::new(192, 0, 2, 1)),
                ..Default::default()
            },
        };
        let action = client.receive(&offer).unwrap();
        assert!(matches!(action, Action::SendRequest(_)));

        let ack = DhcpPacket {
            op: 2,
            xid: 0x1234,
            client_mac: [2, 0, 0, 0, 0, 1],
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::new(192, 0, 2, 10),
            giaddr: Ipv4Addr::UNSPECIFIED,
            options: DhcpOptions {
                message_type: Some(MessageType::Ack),
                server_id: Some(Ipv4Addr::new(192, 0, 2, 1)),
                lease_time: Some(7200),
                ..Default::default()
            },
        };
        let action = client.receive(&ack).unwrap();
        match action {
            Action::Bound(lease) => assert_eq!(lease.address, Ipv4Addr::new(192, 0, 2, 10)),
            _ => panic!("wrong action"),
        }
        assert_eq!(client.state, DhcpClientState::Bound);
    }
}
