//
// IP6CP sub-state machine: negotiates the interface
// identifier used to form the session's link-local address; DHCPv6 or
// router-advertised prefixes handle the rest of IPv6 addressing.
//

use bbl_packet::ncp::{Ip6cpOption, Ip6cpPacket};
use bbl_packet::ppp::LcpCode;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ip6cpState {
    Closed,
    RequestSent,
    Opened,
}

#[derive(Debug)]
pub enum Action {
    SendConfRequest(Ip6cpPacket),
    SendConfAck(Ip6cpPacket),
    Opened { interface_identifier: u64 },
}

pub struct Ip6cp {
    pub state: Ip6cpState,
    identifier: u8,
    local_identifier: u64,
    pub peer_identifier: Option<u64>,
}

impl Ip6cp {
    pub fn new(local_identifier: u64) -> Self {
        Ip6cp {
            state: Ip6cpState::Closed,
            identifier: 0,
            local_identifier,
            peer_identifier: None,
        }
    }

    fn conf_request(&mut self) -> Ip6cpPacket {
        self.identifier = self.identifier.wrapping_add(1);
        Ip6cpPacket {
            code: LcpCode::ConfigureRequest,
            identifier: self.identifier,
            options: vec![Ip6cpOption::InterfaceIdentifier(self.local_identifier)],
        }
    }

    pub fn start(&mut self) -> Action {
        self.state = Ip6cpState::RequestSent;
        Action::SendConfRequest(self.conf_request())
    }

    pub fn receive(&mut self, pkt: &Ip6cpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        match pkt.code {
            LcpCode::ConfigureRequest => {
                self.peer_identifier = pkt.interface_identifier();
                actions.push(Action::SendConfAck(Ip6cpPacket {
                    code: LcpCode::ConfigureAck,
                    identifier: pkt.identifier,
                    options: pkt.options.clone(),
                }));
            }
            LcpCode::ConfigureAck => {
                self.state = Ip6cpState::Opened;
                actions.push(Action::Opened {
                    interface_identifier: self.local_identifier,
                });
            }
            LcpCode::ConfigureNak => {
                actions.push(Action::SendConfRequest(self.conf_request()));
            }
            _ => {}
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_interface_identifier() {
        let mut ip6cp = Ip6cp::new(0x0011_2233_4455_6677);
        ip6cp.start();
        let peer_req = Ip6cpPacket {
            code: LcpCode::ConfigureRequest,
            identifier: 1,
            options: vec![Ip6cpOption::InterfaceIdentifier(0xaabb_ccdd_eeff_0011)],
        };
        let actions = ip6cp.receive(&peer_req);
        assert!(matches!(actions[0], Action::SendConfAck(_)));
        assert_eq!(ip6cp.peer_identifier, Some(0xaabb_ccdd_eeff_0011));

        let ack = Ip6cpPacket {
            code: LcpCode::ConfigureAck,
            identifier: ip6cp.identifier,
            options: vec![Ip6cpOption::InterfaceIdentifier(0x0011_2233_4455_6677)],
        };
        let actions = ip6cp.receive(&ack);
        assert!(matches!(actions[0], Action::Opened { .. }));
        assert_eq!(ip6cp.state, Ip6cpState::Opened);
    }
}
