//
// DHCPv6 client sub-state machine: Solicit/Advertise/
// Request/Reply with IA_NA (address) and optional IA_PD (prefix
// delegation), plus the rapid-commit shortcut straight to Reply.
//

use std::net::Ipv6Addr;

use bbl_packet::dhcpv6::{Dhcpv6Options, Dhcpv6Packet, IaNa, IaPd, MessageType};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dhcpv6ClientState {
    Init,
    Soliciting,
    Requesting,
    Bound,
}

#[derive(Debug)]
pub struct Binding {
    pub address: Option<Ipv6Addr>,
    pub delegated_prefix: Option<(Ipv6Addr, u8)>,
}

#[derive(Debug)]
pub enum Action {
    SendSolicit(Dhcpv6Packet),
    SendRequest(Dhcpv6Packet),
    Bound(Binding),
}

pub struct Dhcpv6Client {
    pub state: Dhcpv6ClientState,
    client_duid: Vec<u8>,
    iaid: u32,
    transaction_id: u32,
    rapid_commit: bool,
    request_prefix: bool,
    advertised_server_duid: Option<Vec<u8>>,
}

impl Dhcpv6Client {
    pub fn new(client_duid: Vec<u8>, iaid: u32, transaction_id: u32, rapid_commit: bool, request_prefix: bool) -> Self {
        Dhcpv6Client {
            state: Dhcpv6ClientState::Init,
            client_duid,
            iaid,
            transaction_id,
            rapid_commit,
            request_prefix,
            advertised_server_duid: None,
        }
    }

    fn ia_na(&self) -> IaNa {
        IaNa {
            iaid: self.iaid,
            t1: 0,
            t2: 0,
            addr: None,
            preferred_lifetime: 0,
            valid_lifetime: 0,
        }
    }

    fn ia_pd(&self) -> Option<IaPd> {
        self.request_prefix.then(|| IaPd {
            iaid: self.iaid,
            t1: 0,
            t2: 0,
            prefix: None,
            preferred_lifetime: 0,
            valid_lifetime: 0,
        })
    }

    pub fn start(&mut self) -> Action {
        self.state = Dhcpv6ClientState::Soliciting;
        Action::SendSolicit(Dhcpv6Packet {
            msg_type: MessageType::Solicit,
            transaction_id: self.transaction_id,
            options: Dhcpv6Options {
                client_duid: Some(self.client_duid.clone()),
                rapid_commit: self.rapid_commit,
                ia_na: Some(self.ia_na()),
                ia_pd: self.ia_pd(),
                oro: vec![23, 24],
                ..Default::default()
            },
        })
    }

    pub fn start_packet(&mut self) -> Dhcpv6Packet {
        match self.start() {
            Action::SendSolicit(p) => p,
            _ => unreachable!("start() always yields SendSolicit"),
        }
    }

    pub fn receive(&mut self, pkt: &Dhcpv6Packet) -> Option<Action> {
        match (self.state, pkt.msg_type) {
            (Dhcpv6ClientState::Soliciting, MessageType::Advertise) => {
                self.advertised_server_duid = pkt.options.server_duid.clone();
                self.state = Dhcpv6ClientState::Requesting;
                Some(Action::SendRequest(Dhcpv6Packet {
                    msg_type: MessageType::Request,
                    transaction_id: self.transaction_id,
                    options: Dhcpv6Options {
                        client_duid: Some(self.client_duid.clone()),
                        server_duid: self.advertised_server_duid.clone(),
                        ia_na: Some(self.ia_na()),
                        ia_pd: self.ia_pd(),
                        ..Default::default()
                    },
                }))
            }
            (Dhcpv6ClientState::Soliciting, MessageType::Reply) if self.rapid_commit => {
                self.state = Dhcpv6ClientState::Bound;
                Some(Action::Bound(binding_from(pkt)))
            }
            (Dhcpv6ClientState::Requesting, MessageType::Reply) => {
                self.state = Dhcpv6ClientState::Bound;
                Some(Action::Bound(binding_from(pkt)))
            }
            _ => None,
        }
    }
}

fn binding_from(pkt: &Dhcpv6Packet) -> Binding {
    Binding {
        address: pkt.options.ia_na.as_ref().and_then(|ia| ia.addr),
        delegated_prefix: pkt.options.ia_pd.as_ref().and_then(|ia| ia.prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_commit_binds_directly_from_reply() {
        let mut client = Dhcpv6Client::new(vec![1, 2, 3], 1, 0x0a0b0c, true, false);
        client.start();
        let reply = Dhcpv6Packet {
            msg_type: MessageType::Reply,
            transaction_id: 0x0a0b0c,
            options: Dhcpv6Options {
                ia_na: Some(IaNa {
                    iaid: 1,
                    t1: 100,
                    t2: 160,
                    addr: Some(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
                    preferred_lifetime: 3600,
                    valid_lifetime: 7200,
                }),
                ..Default::default()
            },
        };
        let action = client.receive(&reply).unwrap();
        match action {
            Action::Bound(binding) => {
                assert_eq!(binding.address, Some(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)))
            }
            _ => panic!("wrong action"),
        }
        assert_eq!(client.state, Dhcpv6ClientState::Bound);
    }

    #[test]
    fn advertise_then_reply_binds() {
        let mut client = Dhcpv6Client::new(vec![1], 2, 1, false, true);
        client.start();
        let advertise = Dhcpv6Packet {
            msg_type: MessageType::Advertise,
            transaction_id: 1,
            options: Dhcpv6Options {
                server_duid: Some(vec![9, 9]),
                ..Default::default()
            },
        };
        let action = client.receive(&advertise).unwrap();
        assert!(matches!(action, Action::SendRequest(_)));
        assert_eq!(client.state, Dhcpv6ClientState::Requesting);

        let reply = Dhcpv6Packet {
            msg_type: MessageType::Reply,
            transaction_id: 1,
            options: Dhcpv6Options {
                ia_pd: Some(IaPd {
                    iaid: 2,
                    t1: 100,
                    t2: 160,
                    prefix: Some((Ipv6Addr::new(0x2001, 0xdb8, 1, 0, 0, 0, 0, 0), 56)),
                    preferred_lifetime: 3600,
                    valid_lifetime: 7200,
                }),
                ..Default::default()
            },
        };
        let action = client.receive(&reply).unwrap();
        match action {
            Action::Bound(binding) => assert_eq!(
                binding.delegated_prefix,
                Some((Ipv6Addr::new(0x2001, 0xdb8, 1, 0, 0, 0, 0, 0), 56))
            ),
            _ => panic!("wrong action"),
        }
    }
}
