//
// PPP LCP sub-state machine:
// negotiates the magic number and MRU before authentication can start.
// Mirrors the restricted subset of RFC 1661 this emulator actually speaks -
// one Configure-Request out, one in, then Up.
//

use bbl_packet::ppp::{LcpCode, LcpOption, LcpPacket};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LcpState {
    Closed,
    RequestSent,
    AckReceived,
    AckSent,
    Opened,
}

#[derive(Debug)]
pub enum Action {
    SendConfRequest(LcpPacket),
    SendConfAck(LcpPacket),
    SendEchoReply(LcpPacket),
    SendTermAck(LcpPacket),
    Opened,
    Closed,
}

pub struct Lcp {
    pub state: LcpState,
    pub identifier: u8,
    pub retries: u32,
    pub local_magic: u32,
    pub peer_magic: u32,
    pub mru: u16,
}

impl Lcp {
    pub fn new(local_magic: u32, mru: u16) -> Self {
        Lcp {
            state: LcpState::Closed,
            identifier: 0,
            retries: 0,
            local_magic,
            peer_magic: 0,
            mru,
        }
    }

    fn next_identifier(&mut self) -> u8 {
        self.identifier = self.identifier.wrapping_add(1);
        self.identifier
    }

    fn conf_request(&mut self) -> LcpPacket {
        let identifier = self.next_identifier();
        LcpPacket {
            code: LcpCode::ConfigureRequest,
            identifier,
            options: vec![
                LcpOption::MagicNumber(self.local_magic),
                LcpOption::Mru(self.mru),
            ],
            data: Vec::new(),
        }
    }

    /// Starts negotiation by sending our own Configure-Request.
    pub fn start(&mut self) -> Action {
        self.state = LcpState::RequestSent;
        self.retries = 1;
        Action::SendConfRequest(self.conf_request())
    }

    pub fn retransmit(&mut self) -> Action {
        self.retries += 1;
        Action::SendConfRequest(self.conf_request())
    }

    pub fn receive(&mut self, pkt: &LcpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        match pkt.code {
            LcpCode::ConfigureRequest => {
                if let Some(magic) = pkt.magic_number() {
                    self.peer_magic = magic;
                }
                actions.push(Action::SendConfAck(LcpPacket {
                    code: LcpCode::ConfigureAck,
                    identifier: pkt.identifier,
                    options: pkt.options.clone(),
                    data: Vec::new(),
                }));
                match self.state {
                    LcpState::Closed | LcpState::RequestSent => self.state = LcpState::AckSent,
                    LcpState::AckReceived => {
                        self.state = LcpState::Opened;
                        actions.push(Action::Opened);
                    }
                    LcpState::AckSent | LcpState::Opened => {}
                }
            }
            LcpCode::ConfigureAck => match self.state {
                LcpState::RequestSent => {
                    self.state = LcpState::AckReceived;
                }
                LcpState::AckSent => {
                    self.state = LcpState::Opened;
                    actions.push(Action::Opened);
                }
                _ => {}
            },
            LcpCode::ConfigureNak | LcpCode::ConfigureReject => {
                actions.push(Action::SendConfRequest(self.conf_request()));
            }
            LcpCode::EchoRequest => {
                actions.push(Action::SendEchoReply(LcpPacket {
                    code: LcpCode::EchoReply,
                    identifier: pkt.identifier,
                    options: Vec::new(),
                    data: self.local_magic.to_be_bytes().to_vec(),
                }));
            }
            LcpCode::TerminateRequest => {
                self.state = LcpState::Closed;
                actions.push(Action::SendTermAck(LcpPacket {
                    code: LcpCode::TerminateAck,
                    identifier: pkt.identifier,
                    options: Vec::new(),
                    data: Vec::new(),
                }));
                actions.push(Action::Closed);
            }
            LcpCode::EchoReply | LcpCode::TerminateAck | LcpCode::CodeReject => {}
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_to_opened_after_both_acks() {
        let mut lcp = Lcp::new(0x1234_5678, 1492);
        lcp.start();
        let peer_req = LcpPacket {
            code: LcpCode::ConfigureRequest,
            identifier: 1,
            options: vec![LcpOption::MagicNumber(0xaabb_ccdd), LcpOption::Mru(1492)],
            data: Vec::new(),
        };
        let actions = lcp.receive(&peer_req);
        assert!(matches!(actions[0], Action::SendConfAck(_)));
        assert_eq!(lcp.state, LcpState::AckSent);

        let ack = LcpPacket {
            code: LcpCode::ConfigureAck,
            identifier: lcp.identifier,
            options: vec![LcpOption::MagicNumber(0x1234_5678), LcpOption::Mru(1492)],
            data: Vec::new(),
        };
        let actions = lcp.receive(&ack);
        assert!(matches!(actions.last(), Some(Action::Opened)));
        assert_eq!(lcp.state, LcpState::Opened);
    }

    #[test]
    fn terminate_request_closes_and_acks() {
        let mut lcp = Lcp::new(1, 1492);
        lcp.state = LcpState::Opened;
        let term = LcpPacket {
            code: LcpCode::TerminateRequest,
            identifier: 9,
            options: Vec::new(),
            data: Vec::new(),
        };
        let actions = lcp.receive(&term);
        assert_eq!(lcp.state, LcpState::Closed);
        assert!(matches!(actions[0], Action::SendTermAck(_)));
        assert!(matches!(actions[1], Action::Closed));
    }
}
