//
// A10NSP terminator: a second session role that *terminates* PPPoE/IPoE from the
// tester's own access side instead of initiating it, so traffic can be
// looped back without a real BNG on the other end. Grounded in
// `bbl_a10nsp.c`: answers PADI with PADO carrying a random AC-Cookie,
// mirrors the Agent-Circuit-Id/Agent-Remote-Id vendor sub-options back
// onto the session it terminates, and always Naks IPCP with a fixed peer
// address regardless of whether the peer requested one.
//

use bbl_packet::ncp::{IpcpOption, IpcpPacket};
use bbl_packet::ppp::{LcpCode, LcpOption, LcpPacket};
use bbl_packet::pppoe::{AccessLine, PppoeCode, PppoeDiscovery, PppoeTag};
use bbl_utils::mac_addr::MacAddr;
use rand::Rng;
use std::net::Ipv4Addr;

use crate::debug::Debug;

/// Fixed peer address the terminator always Naks IPCP with, matching
/// `L2TP_IPCP_IP_REMOTE` in the source.
pub const L2TP_IPCP_IP_REMOTE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TerminatorState {
    Idle,
    WaitPadr,
    Established,
    Terminated,
}

#[derive(Debug)]
pub enum Action {
    SendPado(PppoeDiscovery),
    SendPads(PppoeDiscovery),
    SendLcp(LcpPacket),
    SendIpcp(IpcpPacket),
    Established,
    Terminated,
}

pub struct A10nspTerminator {
    pub state: TerminatorState,
    pub local_mac: MacAddr,
    /// The access-side peer's MAC, learned from the PADI that opened this
    /// terminator - needed so later LCP/IPCP replies on the same session
    /// go back to the right destination.
    pub peer_mac: MacAddr,
    pub service_name: String,
    pub pppoe_session_id: u16,
    pub access_line: Option<AccessLine>,
    local_magic: u32,
    identifier: u8,
}

impl A10nspTerminator {
    pub fn new(local_mac: MacAddr, peer_mac: MacAddr, service_name: String, pppoe_session_id: u16) -> Self {
        A10nspTerminator {
            state: TerminatorState::Idle,
            local_mac,
            peer_mac,
            service_name,
            pppoe_session_id,
            access_line: None,
            local_magic: rand::rng().random(),
            identifier: 0,
        }
    }

    pub fn receive_discovery(&mut self, pkt: &PppoeDiscovery) -> Vec<Action> {
        let mut actions = Vec::new();
        match pkt.code {
            PppoeCode::Padi if self.state == TerminatorState::Idle => {
                let cookie: Vec<u8> = (0..8).map(|_| rand::rng().random()).collect();
                self.state = TerminatorState::WaitPadr;
                actions.push(Action::SendPado(PppoeDiscovery {
                    code: PppoeCode::Pado,
                    session_id: 0,
                    tags: vec![
                        PppoeTag::ServiceName(self.service_name.clone()),
                        PppoeTag::AcCookie(cookie),
                    ],
                }));
            }
            PppoeCode::Padr if self.state == TerminatorState::WaitPadr => {
                // Mirror whatever access-line sub-options the peer (the
                // tester's own PPPoE client, with its access-line vendor
                // tag) carried on the PADR back onto this session.
                self.access_line = pkt.tags.iter().find_map(|t| match t {
                    PppoeTag::AccessLine(al) => Some(al.clone()),
                    _ => None,
                });
                self.state = TerminatorState::Established;
                Debug::A10nspMirror(self.pppoe_session_id as u32, "padr accepted").log();
                actions.push(Action::SendPads(PppoeDiscovery {
                    code: PppoeCode::Pads,
                    session_id: self.pppoe_session_id,
                    tags: vec![PppoeTag::ServiceName(self.service_name.clone())],
                }));
            }
            PppoeCode::Padt => {
                self.state = TerminatorState::Terminated;
                actions.push(Action::Terminated);
            }
            _ => {}
        }
        actions
    }

    pub fn receive_lcp(&mut self, pkt: &LcpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        if pkt.code == LcpCode::ConfigureRequest {
            self.identifier = pkt.identifier;
            actions.push(Action::SendLcp(LcpPacket {
                code: LcpCode::ConfigureAck,
                identifier: pkt.identifier,
                options: pkt.options.clone(),
                data: vec![],
            }));
            actions.push(Action::SendLcp(LcpPacket {
                code: LcpCode::ConfigureRequest,
                identifier: self.next_identifier(),
                options: vec![LcpOption::MagicNumber(self.local_magic)],
                data: vec![],
            }));
        } else if pkt.code == LcpCode::ConfigureAck {
            actions.push(Action::Established);
        }
        actions
    }

    /// Always Naks IPCP with `L2TP_IPCP_IP_REMOTE`, independent of whether
    /// the peer's ConfReq carried an address option at all (Open Question
    /// #2, resolved to match `bbl_a10nsp.c` unconditionally).
    pub fn receive_ipcp(&mut self, pkt: &IpcpPacket) -> Vec<Action> {
        vec![Action::SendIpcp(IpcpPacket {
            code: LcpCode::ConfigureNak,
            identifier: pkt.identifier,
            options: vec![IpcpOption::IpAddress(L2TP_IPCP_IP_REMOTE)],
        })]
    }

    fn next_identifier(&mut self) -> u8 {
        self.identifier = self.identifier.wrapping_add(1);
        self.identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padi_then_padr_establishes() {
        let mut term = A10nspTerminator::new(
            MacAddr::from([2, 0, 0, 0, 0, 9]),
            MacAddr::from([2, 0, 0, 0, 0, 1]),
            "internet".into(),
            42,
        );
        let padi = PppoeDiscovery {
            code: PppoeCode::Padi,
            session_id: 0,
            tags: vec![],
        };
        let actions = term.receive_discovery(&padi);
        assert!(matches!(actions[0], Action::SendPado(_)));

        let padr = PppoeDiscovery {
            code: PppoeCode::Padr,
            session_id: 0,
            tags: vec![PppoeTag::AccessLine(AccessLine {
                agent_circuit_id: Some("circuit-1".into()),
                ..Default::default()
            })],
        };
        let actions = term.receive_discovery(&padr);
        assert!(matches!(actions[0], Action::SendPads(_)));
        assert_eq!(term.state, TerminatorState::Established);
        assert_eq!(
            term.access_line.as_ref().unwrap().agent_circuit_id.as_deref(),
            Some("circuit-1")
        );
    }

    #[test]
    fn ipcp_always_naks_with_fixed_address_even_without_option() {
        let mut term = A10nspTerminator::new(
            MacAddr::from([2, 0, 0, 0, 0, 9]),
            MacAddr::from([2, 0, 0, 0, 0, 1]),
            "internet".into(),
            1,
        );
        let req = IpcpPacket {
            code: LcpCode::ConfigureRequest,
            identifier: 5,
            options: vec![],
        };
        let actions = term.receive_ipcp(&req);
        match &actions[0] {
            Action::SendIpcp(pkt) => {
                assert_eq!(pkt.code, LcpCode::ConfigureNak);
                assert!(pkt
                    .options
                    .iter()
                    .any(|o| matches!(o, IpcpOption::IpAddress(addr) if *addr == L2TP_IPCP_IP_REMOTE)));
            }
            _ => panic!("expected SendIpcp"),
        }
    }
}
