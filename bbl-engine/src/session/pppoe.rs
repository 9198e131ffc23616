//
// Top-level PPPoE session driver: sequences discovery
// (PADI/PADO/PADR/PADS), then LCP, then PAP/CHAP, then IPCP and/or IP6CP.
// Each phase is owned by its own sub-state machine in this module's
// siblings; this file only sequences them and decides when the session as
// a whole is Established or torn down.
//

use std::net::Ipv4Addr;

use bbl_packet::ncp::{Ip6cpPacket, IpcpPacket};
use bbl_packet::ppp::{ChapPacket, LcpPacket, PapPacket};
use bbl_packet::pppoe::{AccessLine, PppoeCode, PppoeDiscovery, PppoeTag};
use bbl_utils::config::AuthProtocol;

use super::auth::{self, Auth};
use super::ip6cp::{self, Ip6cp};
use super::ipcp::{self, Ipcp};
use super::lcp::{self, Lcp};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PppoePhase {
    Discovery,
    Ppp,
    Established,
    Terminated,
}

#[derive(Debug)]
pub enum Action {
    SendPadi(PppoeDiscovery),
    SendPadr(PppoeDiscovery),
    SendLcp(LcpPacket),
    SendPap(PapPacket),
    SendChap(ChapPacket),
    SendIpcp(IpcpPacket),
    SendIp6cp(Ip6cpPacket),
    Established,
    Terminated(&'static str),
}

pub struct Pppoe {
    pub phase: PppoePhase,
    pub pppoe_session_id: u16,
    pub service_name: String,
    pub access_line: Option<AccessLine>,
    pub lcp: Lcp,
    pub auth: Auth,
    pub ipcp: Option<Ipcp>,
    pub ip6cp: Option<Ip6cp>,
    lcp_done: bool,
    auth_done: bool,
}

impl Pppoe {
    pub fn new(
        service_name: String,
        access_line: Option<AccessLine>,
        local_magic: u32,
        mru: u16,
        auth_protocol: AuthProtocol,
        username: String,
        password: String,
        want_ipv4: bool,
        want_ipv6: bool,
        ipv6_interface_identifier: u64,
    ) -> Self {
        Pppoe {
            phase: PppoePhase::Discovery,
            pppoe_session_id: 0,
            service_name,
            access_line,
            lcp: Lcp::new(local_magic, mru),
            auth: Auth::new(auth_protocol, username, password),
            ipcp: want_ipv4.then(|| Ipcp::new(Ipv4Addr::UNSPECIFIED)),
            ip6cp: want_ipv6.then(|| Ip6cp::new(ipv6_interface_identifier)),
            lcp_done: false,
            auth_done: false,
        }
    }

    pub fn start(&mut self) -> Action {
        let mut tags = vec![PppoeTag::ServiceName(self.service_name.clone())];
        if let Some(access_line) = self.access_line.clone() {
            tags.push(PppoeTag::AccessLine(access_line));
        }
        Action::SendPadi(PppoeDiscovery {
            code: PppoeCode::Padi,
            session_id: 0,
            tags,
        })
    }

    pub fn receive_discovery(&mut self, pkt: &PppoeDiscovery) -> Vec<Action> {
        let mut actions = Vec::new();
        match pkt.code {
            PppoeCode::Pado if self.phase == PppoePhase::Discovery => {
                let mut tags = vec![PppoeTag::ServiceName(self.service_name.clone())];
                if let Some(cookie) = pkt.ac_cookie() {
                    tags.push(PppoeTag::AcCookie(cookie.to_vec()));
                }
                actions.push(Action::SendPadr(PppoeDiscovery {
                    code: PppoeCode::Padr,
                    session_id: 0,
                    tags,
                }));
            }
            PppoeCode::Pads if self.phase == PppoePhase::Discovery => {
                self.pppoe_session_id = pkt.session_id;
                self.phase = PppoePhase::Ppp;
                actions.push(Action::SendLcp(
                    lcp_packet(self.lcp.start()),
                ));
            }
            PppoeCode::Padt => {
                self.phase = PppoePhase::Terminated;
                actions.push(Action::Terminated("padt received"));
            }
            _ => {}
        }
        actions
    }

    pub fn receive_lcp(&mut self, pkt: &LcpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        for action in self.lcp.receive(pkt) {
            match action {
                lcp::Action::SendConfRequest(p) => actions.push(Action::SendLcp(p)),
                lcp::Action::SendConfAck(p) => actions.push(Action::SendLcp(p)),
                lcp::Action::SendEchoReply(p) => actions.push(Action::SendLcp(p)),
                lcp::Action::SendTermAck(p) => actions.push(Action::SendLcp(p)),
                lcp::Action::Opened => {
                    self.lcp_done = true;
                    if let Some(action) = self.auth.start() {
                        actions.push(auth_action(action));
                    } else {
                        self.auth_done = true;
                    }
                    actions.extend(self.advance_ncp());
                }
                lcp::Action::Closed => actions.push(Action::Terminated("lcp closed")),
            }
        }
        actions
    }

    pub fn receive_pap(&mut self, pkt: &PapPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(action) = self.auth.receive_pap(pkt) {
            actions.push(self.apply_auth_action(action));
        }
        actions
    }

    pub fn receive_chap(&mut self, pkt: &ChapPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(action) = self.auth.receive_chap(pkt) {
            actions.push(self.apply_auth_action(action));
        }
        actions
    }

    fn apply_auth_action(&mut self, action: auth::Action) -> Action {
        match action {
            auth::Action::Success => {
                self.auth_done = true;
                let more = self.advance_ncp();
                if self.established() {
                    Action::Established
                } else if let Some(first) = more.into_iter().next() {
                    first
                } else {
                    Action::Established
                }
            }
            auth::Action::Failed => Action::Terminated("authentication failed"),
            other => auth_action(other),
        }
    }

    pub fn receive_ipcp(&mut self, pkt: &IpcpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(ipcp) = &mut self.ipcp {
            for action in ipcp.receive(pkt) {
                match action {
                    ipcp::Action::SendConfRequest(p) => actions.push(Action::SendIpcp(p)),
                    ipcp::Action::SendConfAck(p) => actions.push(Action::SendIpcp(p)),
                    ipcp::Action::Opened { .. } => {
                        if self.established() {
                            actions.push(Action::Established);
                        }
                    }
                }
            }
        }
        actions
    }

    pub fn receive_ip6cp(&mut self, pkt: &Ip6cpPacket) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(ip6cp) = &mut self.ip6cp {
            for action in ip6cp.receive(pkt) {
                match action {
                    ip6cp::Action::SendConfRequest(p) => actions.push(Action::SendIp6cp(p)),
                    ip6cp::Action::SendConfAck(p) => actions.push(Action::SendIp6cp(p)),
                    ip6cp::Action::Opened { .. } => {
                        if self.established() {
                            actions.push(Action::Established);
                        }
                    }
                }
            }
        }
        actions
    }

    fn advance_ncp(&mut self) -> Vec<Action> {
        if !(self.lcp_done && self.auth_done) {
            return Vec::new();
        }
        let mut actions = Vec::new();
        if let Some(ipcp) = &mut self.ipcp {
            if ipcp.state == ipcp::IpcpState::Closed {
                actions.push(Action::SendIpcp(match ipcp.start() {
                    ipcp::Action::SendConfRequest(p) => p,
                    _ => unreachable!(),
                }));
            }
        }
        if let Some(ip6cp) = &mut self.ip6cp {
            if ip6cp.state == ip6cp::Ip6cpState::Closed {
                actions.push(Action::SendIp6cp(match ip6cp.start() {
                    ip6cp::Action::SendConfRequest(p) => p,
                    _ => unreachable!(),
                }));
            }
        }
        actions
    }

    fn established(&self) -> bool {
        self.lcp_done
            && self.auth_done
            && self.ipcp.as_ref().is_none_or(|c| c.state == ipcp::IpcpState::Opened)
            && self.ip6cp.as_ref().is_none_or(|c| c.state == ip6cp::Ip6cpState::Opened)
    }
}

fn lcp_packet(action: lcp::Action) -> LcpPacket {
    match action {
        lcp::Action::SendConfRequest(p) => p,
        _ => unreachable!("start() always yields SendConfRequest"),
    }
}

fn auth_action(action: auth::Action) -> Action {
    match action {
        auth::Action::SendPapRequest(p) => Action::SendPap(p),
        auth::Action::SendChapResponse(p) => Action::SendChap(p),
        auth::Action::Success => Action::Established,
        auth::Action::Failed => Action::Terminated("authentication failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbl_packet::ppp::LcpCode;

    fn sample() -> Pppoe {
        Pppoe::new(
            "internet".into(),
            None,
            0x1234_5678,
            1492,
            AuthProtocol::Pap,
            "user".into(),
            "pass".into(),
            true,
            false,
            0,
        )
    }

    #[test]
    fn discovery_then_lcp_then_established() {
        let mut session = sample();
        session.start();
        let pado = PppoeDiscovery {
            code: PppoeCode::Pado,
            session_id: 0,
            tags: vec![PppoeTag::AcCookie(vec![1, 2, 3])],
        };
        let actions = session.receive_discovery(&pado);
        assert!(matches!(actions[0], Action::SendPadr(_)));

        let pads = PppoeDiscovery {
            code: PppoeCode::Pads,
            session_id: 7,
            tags: vec![],
        };
        let actions = session.receive_discovery(&pads);
        assert!(matches!(actions[0], Action::SendLcp(_)));
        assert_eq!(session.pppoe_session_id, 7);

        let peer_lcp_req = LcpPacket {
            code: LcpCode::ConfigureRequest,
            identifier: 1,
            options: vec![],
            data: vec![],
        };
        session.receive_lcp(&peer_lcp_req);
        let ack = LcpPacket {
            code: LcpCode::ConfigureAck,
            identifier: session.lcp.identifier,
            options: vec![],
            data: vec![],
        };
        let actions = session.receive_lcp(&ack);
        assert!(actions.iter().any(|a| matches!(a, Action::SendPap(_))));

        let ack = bbl_packet::ppp::PapPacket::Ack {
            identifier: 1,
            message: String::new(),
        };
        let actions = session.receive_pap(&ack);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SendIpcp(_) | Action::Established
        )));
    }
}
