//
// PAP/CHAP authentication sub-state machine. Runs after LCP
// reaches Opened and before IPCP/IP6CP negotiation starts, mirroring the
// ordering RFC 1661 imposes on the PPP link phases.
//

use bbl_packet::ppp::{ChapPacket, PapPacket};
use bbl_utils::config::AuthProtocol;
use bbl_utils::crypto::chap_response;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthState {
    NotStarted,
    AwaitingChallenge,
    InProgress,
    Success,
    Failed,
}

#[derive(Debug)]
pub enum Action {
    SendPapRequest(PapPacket),
    SendChapResponse(ChapPacket),
    Success,
    Failed,
}

pub struct Auth {
    pub protocol: AuthProtocol,
    pub state: AuthState,
    pub username: String,
    pub password: String,
    identifier: u8,
}

impl Auth {
    pub fn new(protocol: AuthProtocol, username: String, password: String) -> Self {
        Auth {
            protocol,
            state: AuthState::NotStarted,
            username,
            password,
            identifier: 0,
        }
    }

    /// Called once LCP is Opened. PAP starts the exchange itself; CHAP
    /// instead waits for the peer's Challenge.
    pub fn start(&mut self) -> Option<Action> {
        match self.protocol {
            AuthProtocol::Pap => {
                self.identifier = self.identifier.wrapping_add(1);
                self.state = AuthState::InProgress;
                Some(Action::SendPapRequest(PapPacket::Request {
                    identifier: self.identifier,
                    peer_id: self.username.clone(),
                    password: self.password.clone(),
                }))
            }
            AuthProtocol::Chap => {
                self.state = AuthState::AwaitingChallenge;
                None
            }
        }
    }

    pub fn receive_pap(&mut self, pkt: &PapPacket) -> Option<Action> {
        match pkt {
            PapPacket::Ack { .. } => {
                self.state = AuthState::Success;
                Some(Action::Success)
            }
            PapPacket::Nak { .. } => {
                self.state = AuthState::Failed;
                Some(Action::Failed)
            }
            PapPacket::Request { .. } => None,
        }
    }

    pub fn receive_chap(&mut self, pkt: &ChapPacket) -> Option<Action> {
        match pkt {
            ChapPacket::Challenge { identifier, value, .. } => {
                let digest = chap_response(*identifier, self.password.as_bytes(), value);
                self.state = AuthState::InProgress;
                Some(Action::SendChapResponse(ChapPacket::Response {
                    identifier: *identifier,
                    value: digest.to_vec(),
                    name: self.username.clone(),
                }))
            }
            ChapPacket::Success { .. } => {
                self.state = AuthState::Success;
                Some(Action::Success)
            }
            ChapPacket::Failure { .. } => {
                self.state = AuthState::Failed;
                Some(Action::Failed)
            }
            ChapPacket::Response { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pap_request_then_ack_succeeds() {
        let mut auth = Auth::new(AuthProtocol::Pap, "user".into(), "pass".into());
        let action = auth.start().unwrap();
        assert!(matches!(action, Action::SendPapRequest(_)));
        let action = auth
            .receive_pap(&PapPacket::Ack {
                identifier: 1,
                message: String::new(),
            })
            .unwrap();
        assert!(matches!(action, Action::Success));
        assert_eq!(auth.state, AuthState::Success);
    }

    #[test]
    fn chap_challenge_produces_matching_response() {
        let mut auth = Auth::new(AuthProtocol::Chap, "user".into(), "pass".into());
        assert!(auth.start().is_none());
        let action = auth
            .receive_chap(&ChapPacket::Challenge {
                identifier: 7,
                value: vec![1, 2, 3, 4],
                name: "lns".into(),
            })
            .unwrap();
        match action {
            Action::SendChapResponse(ChapPacket::Response { value, .. }) => {
                assert_eq!(value, chap_response(7, b"pass", &[1, 2, 3, 4]).to_vec());
            }
            _ => panic!("wrong action"),
        }
    }
}
