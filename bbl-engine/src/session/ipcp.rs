//
// IPCP sub-state machine: negotiates the session's
// IPv4 address and optional DNS servers once authentication succeeds.
// Follows the same Configure-Request/Ack shape as LCP but reuses
// `LcpCode` per `bbl_packet::ncp`.
//

use std::net::Ipv4Addr;

use bbl_packet::ncp::{IpcpOption, IpcpPacket};
use bbl_packet::ppp::LcpCode;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IpcpState {
    Closed,
    RequestSent,
    Opened,
}

#[derive(Debug)]
pub enum Action {
    SendConfRequest(IpcpPacket),
    SendConfAck(IpcpPacket),
    Opened { address: Ipv4Addr },
}

pub struct Ipcp {
    pub state: IpcpState,
    identifier: u8,
    requested_address: Ipv4Addr,
}

impl Ipcp {
    pub fn new(requested_address: Ipv4Addr) -> Self {
        Ipcp {
            state: IpcpState::Closed,
            identifier: 0,
            requested_address,
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        self.requested_address
    }

    fn conf_request(&mut self) -> IpcpPacket {
        self.identifier = self.identifier.wrapping_add(1);
        IpcpPacket {
            code: LcpCode::ConfigureRequest,
            identifier: self.identifier,
            options: vec![IpcpOption::IpAddress(self.requested_address)],
        }
    }

    pub fn start(&mut self) -> Action {
        self.state = IpcpState::RequestSent;
        Action::SendConfRequest(self.conf_request())
    }

    pub fn receive(&mut self, pkt: &IpcpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        match pkt.code {
            LcpCode::ConfigureRequest => {
                actions.push(Action::SendConfAck(IpcpPacket {
                    code: LcpCode::ConfigureAck,
                    identifier: pkt.identifier,
                    options: pkt.options.clone(),
                }));
            }
            LcpCode::ConfigureNak => {
                // The peer suggested (or assigned) an address: accept it
                // and re-request with that value, as a real client would.
                if let Some(addr) = pkt.address() {
                    self.requested_address = addr;
                }
                actions.push(Action::SendConfRequest(self.conf_request()));
            }
            LcpCode::ConfigureAck => {
                self.state = IpcpState::Opened;
                actions.push(Action::Opened {
                    address: self.requested_address,
                });
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
    fn nak_then_ack_adopts_server_assigned_address() {
        let mut ipcp = Ipcp::new(Ipv4Addr::UNSPECIFIED);
        ipcp.start();
        let nak = IpcpPacket {
            code: LcpCode::ConfigureNak,
            identifier: 1,
            options: vec![IpcpOption::IpAddress(Ipv4Addr::new(198, 51, 100, 5))],
        };
        let actions = ipcp.receive(&nak);
        assert!(matches!(actions[0], Action::SendConfRequest(_)));
        assert_eq!(ipcp.requested_address, Ipv4Addr::new(198, 51, 100, 5));

        let ack = IpcpPacket {
            code: LcpCode::ConfigureAck,
            identifier: ipcp.identifier,
            options: vec![IpcpOption::IpAddress(Ipv4Addr::new(198, 51, 100, 5))],
        };
        let actions = ipcp.receive(&ack);
        match &actions[0] {
            Action::Opened { address } => assert_eq!(*address, Ipv4Addr::new(198, 51, 100, 5)),
            _ => panic!("wrong action"),
        }
        assert_eq!(ipcp.state, IpcpState::Opened);
    }
}
