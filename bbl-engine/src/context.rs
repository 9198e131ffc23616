//
// Global context: the one piece of shared mutable
// state in the whole engine, reached through an explicit `&mut Context`
// handle rather than a global. Owns the session registry, one
// `Interface` per configured port, the L2TP LNS, the IS-IS instance, the
// traffic engine's flow tables, and the timer wheel every periodic thing in
// the engine is driven from.
//
// `tick` is the single entry point the daemon's event loop calls once per
// scheduling quantum; everything else is either session-lifecycle plumbing
// or frame dispatch reached from `tick`/`dispatch_frame`.
//

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};

use bbl_isis::Instance as IsisInstance;
use bbl_l2tp::{Dispatched, Lns};
use bbl_packet::bbl::BblHeader;
use bbl_packet::dhcpv4::DhcpPacket;
use bbl_packet::dhcpv6::Dhcpv6Packet;
use bbl_packet::eth::{EthHeader, VlanTag, ETHERTYPE_ARP, ETHERTYPE_IPV4, ETHERTYPE_IPV6,
    ETHERTYPE_ISIS_LLC, ETHERTYPE_PPPOE_DISCOVERY, ETHERTYPE_PPPOE_SESSION, ETHERTYPE_QINQ,
    ETHERTYPE_VLAN};
use bbl_packet::icmpv6::Icmpv6Message;
use bbl_packet::ipv4::{Ipv4Header, PROTO_IGMP, PROTO_UDP};
use bbl_packet::ipv6::{Ipv6Header, NEXT_HEADER_ICMPV6, NEXT_HEADER_UDP};
use bbl_packet::isis::{self, IsisPdu, PduType};
use bbl_packet::ncp::{Ip6cpPacket, IpcpPacket};
use bbl_packet::ppp::{self, ChapPacket, LcpPacket, PapPacket};
use bbl_packet::pppoe::PppoeDiscovery;
use bbl_packet::udp::UdpHeader;
use bbl_packet::{arp::ArpPacket, igmp::IgmpMessage};
use bbl_utils::config::{AuthProtocol, Config, InterfaceRole};
use bbl_utils::mac_addr::MacAddr;
use bbl_utils::session_key::SessionKey;

use crate::a10nsp::A10nspTerminator;
use crate::debug::Debug;
use crate::error::Error;
use crate::interface::{Interface, LoopbackPort};
use crate::registry::Registry;
use crate::session::{self, Driver, GroupState, Session, SessionType};
use crate::traffic::{FlowTemplate, GeneratorFlow, VerifierFlow};

/// Window size used for every adjacency's flood tree drain (I-FLOOD). No
/// per-adjacency config for this exists; it is a fixed tuning constant.
const ISIS_FLOOD_WINDOW_SIZE: usize = 5;

/// Remaining-lifetime stamped on a self-originated LSP purged at shutdown -
/// IS-IS's standard ZeroAgeLifetime.
const ISIS_PURGE_LIFETIME: Duration = Duration::from_secs(60);

#[derive(Default, Debug)]
pub struct GlobalCounters {
    pub sessions_established: u64,
    pub sessions_terminated: u64,
    pub sessions_flapped: u64,
    pub pppoe_sessions: u64,
    pub ipoe_sessions: u64,
    pub verified_flows: u64,
}

pub struct Context {
    pub config: Arc<Config>,
    pub registry: Registry,
    pub interfaces: HashMap<u32, Interface<LoopbackPort>>,
    pub l2tp: Option<Lns>,
    pub isis: Option<IsisInstance>,
    pub a10nsp: HashMap<SessionKey, A10nspTerminator>,
    pub generators: HashMap<u64, GeneratorFlow>,
    pub verifiers: HashMap<u64, VerifierFlow>,
    next_flow_id: u64,
    pub counters: GlobalCounters,
    pub timers: bbl_timer::TimerRoot,
    pub epoch: Instant,
    started_at: Instant,
    /// Global toggle for `multicast-traffic-start`/`-stop`: a second
    /// independent on/off switch from the per-flow `enabled` field, since
    /// multicast join/leave traffic and unicast session traffic are
    /// separately gated concerns.
    pub multicast_traffic: bool,
}

impl Context {
    pub fn new(config: Arc<Config>, now: Instant) -> Self {
        let mut interfaces = HashMap::new();
        for ifcfg in &config.interfaces {
            interfaces.insert(
                ifcfg.ifindex,
                Interface::new(
                    ifcfg.ifindex,
                    ifcfg.name.clone(),
                    ifcfg.role,
                    MacAddr::from(ifcfg.mac),
                    LoopbackPort::new(),
                    now,
                ),
            );
        }
        let l2tp = config
            .l2tp_server
            .clone()
            .map(|cfg| Lns::new(cfg, "bngblasterd".into()));
        let isis = config.isis.as_ref().map(IsisInstance::new);
        Context {
            config,
            registry: Registry::new(),
            interfaces,
            l2tp,
            isis,
            a10nsp: HashMap::new(),
            generators: HashMap::new(),
            verifiers: HashMap::new(),
            next_flow_id: 1,
            counters: GlobalCounters::default(),
            timers: bbl_timer::TimerRoot::new(),
            epoch: now,
            started_at: now,
            multicast_traffic: false,
        }
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    fn next_flow_id(&mut self) -> u64 {
        let id = self.next_flow_id;
        self.next_flow_id += 1;
        id
    }

    pub fn add_generator(&mut self, template: FlowTemplate, target_pps: f64, now: Instant) -> u64 {
        let id = self.next_flow_id();
        self.generators
            .insert(id, GeneratorFlow::new(id, template, target_pps, now));
        self.verifiers.insert(id, VerifierFlow::new(id));
        id
    }

    /// Creates a session-bound traffic flow and records it on the owning
    /// `Session` so the `sessions-pending` control query can report it
    ///.
    pub fn add_session_flow(
        &mut self,
        session_id: u32,
        sub_type: bbl_packet::bbl::FlowSubType,
        direction: bbl_packet::bbl::Direction,
        target_pps: f64,
        now: Instant,
    ) -> Result<u64, Error> {
        let session = self
            .registry
            .get(session_id)
            .ok_or(Error::NoSuchSession(session_id))?;
        let template = FlowTemplate {
            flow_type: bbl_packet::bbl::FlowType::Unicast,
            sub_type,
            direction,
            session_id,
            outer_vlan: session.key.outer_vlan,
            inner_vlan: session.key.inner_vlan,
        };
        let flow_id = self.add_generator(template, target_pps, now);
        let session = self.registry.get_mut(session_id).unwrap();
        match sub_type {
            bbl_packet::bbl::FlowSubType::Ipv4 => session.traffic.ipv4_flow = Some(flow_id),
            bbl_packet::bbl::FlowSubType::Ipv6 => session.traffic.ipv6_flow = Some(flow_id),
            bbl_packet::bbl::FlowSubType::Ipv6Pd => session.traffic.ipv6pd_flow = Some(flow_id),
        }
        Ok(flow_id)
    }

    /// Drops a session's own generator/verifier flows from both flow
    /// tables. Must run before the session's storage is released (invariant
    /// I5: "every timer and every flow owned by the session is cancelled
    /// before the session's storage is released") - otherwise a destroyed
    /// session's generator keeps ticking and emitting BBL packets for a
    /// session id that no longer resolves.
    fn detach_session_flows(&mut self, session_id: u32) {
        let Some(session) = self.registry.get(session_id) else {
            return;
        };
        for flow_id in [
            session.traffic.ipv4_flow,
            session.traffic.ipv6_flow,
            session.traffic.ipv6pd_flow,
        ]
        .into_iter()
        .flatten()
        {
            self.generators.remove(&flow_id);
            self.verifiers.remove(&flow_id);
        }
    }

    // ===== session lifecycle =====

    /// Starts a PPPoE session on an access interface and sends the initial
    /// PADI.
    pub fn start_pppoe_session(&mut self, key: SessionKey, client_mac: MacAddr) -> Result<u32, Error> {
        let server_mac = self
            .interfaces
            .get(&key.ifindex)
            .map(|i| i.mac)
            .ok_or(Error::NoSuchInterface(key.ifindex))?;
        let id = self.registry.reserve(key)?;
        let cfg = &self.config.pppoe;
        let local_magic: u32 = rand::random();
        let mut driver = session::Pppoe::new(
            cfg.service_name.clone(),
            self.config.access_line.agent_circuit_id.is_some().then(|| {
                bbl_packet::pppoe::AccessLine {
                    agent_circuit_id: self.config.access_line.agent_circuit_id.clone(),
                    agent_remote_id: self.config.access_line.agent_remote_id.clone(),
                    rate_up: self.config.access_line.rate_up,
                    rate_down: self.config.access_line.rate_down,
                    dsl_type: self.config.access_line.dsl_type,
                }
            }),
            local_magic,
            cfg.mru,
            cfg.authentication,
            cfg.username.clone(),
            cfg.password.clone(),
            true,
            self.config.dhcpv6.enable,
            0,
        );
        let action = driver.start();
        let mut session = Session::new(
            id,
            key,
            SessionType::Pppoe,
            client_mac,
            server_mac,
            Driver::Pppoe(driver),
            Instant::now(),
        );
        session.state_change(session::SessionState::Establishing);
        self.registry.insert(session);
        self.counters.pppoe_sessions += 1;
        if let session::pppoe::Action::SendPadi(pkt) = action {
            self.send_pppoe_discovery(key, client_mac, MacAddr::BROADCAST, &pkt);
        }
        Ok(id)
    }

    /// Starts an IPoE session: ARP-resolve the gateway, then DHCP/DHCPv6
    ///.
    pub fn start_ipoe_session(
        &mut self,
        key: SessionKey,
        client_mac: MacAddr,
        gateway_ipv4: Option<Ipv4Addr>,
    ) -> Result<u32, Error> {
        let server_mac = self
            .interfaces
            .get(&key.ifindex)
            .map(|i| i.mac)
            .ok_or(Error::NoSuchInterface(key.ifindex))?;
        let id = self.registry.reserve(key)?;
        let xid: u32 = rand::random();
        let duid: Vec<u8> = client_mac.as_bytes().to_vec();
        let mut driver = session::Ipoe::new(
            client_mac,
            gateway_ipv4,
            xid,
            self.config.dhcp.enable,
            self.config.dhcpv6.enable,
            duid,
            self.config.dhcpv6.rapid_commit,
            false,
        );
        let actions = driver.start();
        let mut session = Session::new(
            id,
            key,
            SessionType::Ipoe,
            client_mac,
            server_mac,
            Driver::Ipoe(driver),
            Instant::now(),
        );
        session.state_change(session::SessionState::Establishing);
        self.registry.insert(session);
        self.counters.ipoe_sessions += 1;
        for action in actions {
            self.apply_ipoe_action(key, client_mac, action);
        }
        Ok(id)
    }

    pub fn terminate_session(&mut self, session_id: u32) -> Result<(), Error> {
        let session = self
            .registry
            .get_mut(session_id)
            .ok_or(Error::NoSuchSession(session_id))?;
        session.state_change(session::SessionState::Terminated);
        Debug::SessionTerminated(session_id, "control request").log();
        self.detach_session_flows(session_id);
        self.registry.remove(session_id);
        self.counters.sessions_terminated += 1;
        Ok(())
    }

    pub fn terminate_all(&mut self) {
        let ids: Vec<u32> = self.registry.ids().collect();
        for id in ids {
            let _ = self.terminate_session(id);
        }
    }

    // ===== control socket operations =====
    //
    // These back `ctrl::dispatch`'s handlers that need more than a direct
    // field read: they mutate sub-state machines, send wire frames, or
    // reach into the L2TP/IS-IS sub-crates. Read-only queries (session
    // info/counters, interface/tunnel/adjacency listings) stay in `ctrl.rs`
    // itself since every field they need is already `pub`.

    fn pppoe_driver_mut(&mut self, session_id: u32) -> Result<&mut session::Pppoe, Error> {
        let session = self
            .registry
            .get_mut(session_id)
            .ok_or(Error::NoSuchSession(session_id))?;
        match &mut session.driver {
            Driver::Pppoe(driver) => Ok(driver),
            Driver::Ipoe(_) => Err(Error::NotPppoe),
        }
    }

    pub fn open_ipcp(&mut self, session_id: u32) -> Result<(), Error> {
        let key = self.registry.get(session_id).ok_or(Error::NoSuchSession(session_id))?.key;
        let (client_mac, server_mac) = {
            let session = self.registry.get(session_id).unwrap();
            (session.client_mac, session.server_mac)
        };
        let driver = self.pppoe_driver_mut(session_id)?;
        let ipcp = driver.ipcp.get_or_insert_with(|| session::Ipcp::new(Ipv4Addr::UNSPECIFIED));
        let session::ipcp::Action::SendConfRequest(pkt) = ipcp.start() else {
            unreachable!("start() always yields SendConfRequest")
        };
        self.send_ppp(key, client_mac, server_mac, ppp::PROTO_IPCP, &pkt);
        Ok(())
    }

    /// Administratively resets IPCP to `Closed`. No CP-Close is sent - the real protocol exchange to
    /// tear an NCP down mid-session isn't implemented; this just stops the
    /// session from reporting the address as negotiated until it reopens.
    pub fn close_ipcp(&mut self, session_id: u32) -> Result<(), Error> {
        let driver = self.pppoe_driver_mut(session_id)?;
        if let Some(ipcp) = &mut driver.ipcp {
            ipcp.state = session::IpcpState::Closed;
        }
        Ok(())
    }

    pub fn open_ip6cp(&mut self, session_id: u32) -> Result<(), Error> {
        let key = self.registry.get(session_id).ok_or(Error::NoSuchSession(session_id))?.key;
        let (client_mac, server_mac) = {
            let session = self.registry.get(session_id).unwrap();
            (session.client_mac, session.server_mac)
        };
        let driver = self.pppoe_driver_mut(session_id)?;
        let ip6cp = driver.ip6cp.get_or_insert_with(|| session::Ip6cp::new(0));
        let session::ip6cp::Action::SendConfRequest(pkt) = ip6cp.start() else {
            unreachable!("start() always yields SendConfRequest")
        };
        self.send_ppp(key, client_mac, server_mac, ppp::PROTO_IP6CP, &pkt);
        Ok(())
    }

    pub fn close_ip6cp(&mut self, session_id: u32) -> Result<(), Error> {
        let driver = self.pppoe_driver_mut(session_id)?;
        if let Some(ip6cp) = &mut driver.ip6cp {
            ip6cp.state = session::Ip6cpState::Closed;
        }
        Ok(())
    }

    /// Joins `group` on behalf of `session_id`. Bounded to at most 8 groups
    /// per session; a repeat join of an already `Joining`/`Joined` group is
    /// rejected outright rather than resetting its zap-delay timer, and a
    /// join racing an in-progress leave is rejected as a zapping conflict.
    pub fn igmp_join(&mut self, session_id: u32, group: Ipv4Addr, now: Instant) -> Result<(), Error> {
        const MAX_GROUPS: usize = 8;
        let session = self
            .registry
            .get_mut(session_id)
            .ok_or(Error::NoSuchSession(session_id))?;
        if let Some(existing) = session.igmp_groups.iter().find(|g| g.group == group) {
            match existing.state {
                GroupState::Joining | GroupState::Joined => return Err(Error::GroupAlreadyActive),
                GroupState::Leaving => return Err(Error::GroupInUseByZapping),
                GroupState::Idle => {}
            }
        } else if session.igmp_groups.len() >= MAX_GROUPS {
            return Err(Error::NoGroupSlot);
        }
        let (key, client_mac, server_mac) = (session.key, session.client_mac, session.server_mac);
        let report = session.group(group).join(now);
        self.send_igmp(key, client_mac, server_mac, &report);
        Ok(())
    }

    pub fn igmp_leave(&mut self, session_id: u32, group: Ipv4Addr, now: Instant) -> Result<(), Error> {
        let session = self
            .registry
            .get_mut(session_id)
            .ok_or(Error::NoSuchSession(session_id))?;
        if !session.igmp_groups.iter().any(|g| g.group == group) {
            return Err(Error::GroupNotFound);
        }
        let (key, client_mac, server_mac) = (session.key, session.client_mac, session.server_mac);
        let leave = session.group(group).leave(now);
        self.send_igmp(key, client_mac, server_mac, &leave);
        Ok(())
    }

    fn send_l2tp_datagram(&mut self, dgram: bbl_l2tp::Datagram) {
        if let Some(iface) = self
            .interfaces
            .values_mut()
            .find(|i| i.role == InterfaceRole::Network)
        {
            iface.send(dgram.bytes);
        }
    }

    pub fn l2tp_tunnel_terminate(
        &mut self,
        tunnel_id: u16,
        result_code: u16,
        error_code: Option<u16>,
        error_message: Option<&str>,
        now: Instant,
    ) -> Result<(), Error> {
        let l2tp = self.l2tp.as_mut().ok_or(Error::NoSuchTunnel(tunnel_id))?;
        let dgram = l2tp.terminate_tunnel(tunnel_id, result_code, error_code, error_message, now)?;
        self.send_l2tp_datagram(dgram);
        Ok(())
    }

    pub fn l2tp_session_terminate(&mut self, tunnel_id: u16, session_id: u16, now: Instant) -> Result<(), Error> {
        let l2tp = self.l2tp.as_mut().ok_or(Error::NoSuchTunnel(tunnel_id))?;
        let dgram = l2tp.terminate_session(tunnel_id, session_id, now)?;
        self.send_l2tp_datagram(dgram);
        Ok(())
    }

    pub fn l2tp_csurq(&mut self, tunnel_id: u16, session_ids: &[u16], now: Instant) -> Result<(), Error> {
        let l2tp = self.l2tp.as_mut().ok_or(Error::NoSuchTunnel(tunnel_id))?;
        let dgram = l2tp.request_csurq(tunnel_id, session_ids, now)?;
        self.send_l2tp_datagram(dgram);
        Ok(())
    }

    pub fn stream_set_enabled(&mut self, flow_id: u64, enabled: bool) -> Result<(), Error> {
        let flow = self.generators.get_mut(&flow_id).ok_or(Error::NoSuchFlow(flow_id))?;
        flow.enabled = enabled;
        Ok(())
    }

    /// Disables every generator flow.
    pub fn traffic_stop(&mut self) {
        for flow in self.generators.values_mut() {
            flow.enabled = false;
        }
    }

    /// Re-enables every generator flow and resets its sequence counter back
    /// to the pre-stop baseline.
    pub fn traffic_start(&mut self, now: Instant) {
        for flow in self.generators.values_mut() {
            flow.enabled = true;
            flow.restart(now);
        }
    }

    pub fn isis_load_mrt(&mut self, level: bbl_isis::Level, data: &[u8], now: Instant) -> Result<usize, Error> {
        let isis = self.isis.as_mut().ok_or(Error::IsisNotConfigured)?;
        let records = bbl_isis::parse_dump(data).map_err(Error::Isis)?;
        let count = records.len();
        for record in records {
            isis.load_external(level, &record.pdu, record.raw, now);
        }
        Ok(count)
    }

    pub fn isis_load_external(&mut self, level: bbl_isis::Level, pdu_bytes: &[u8], now: Instant) -> Result<(), Error> {
        let isis = self.isis.as_mut().ok_or(Error::IsisNotConfigured)?;
        let mut cursor = Bytes::copy_from_slice(pdu_bytes);
        let pdu = isis::LspPdu::decode(&mut cursor)
            .map_err(|_| Error::UnexpectedState { state: "any", event: "malformed external lsp pdu" })?;
        isis.load_external(level, &pdu, pdu_bytes.to_vec(), now);
        Ok(())
    }

    // ===== periodic driver =====

    /// Drives every periodic subsystem once. Called from the daemon's
    /// cooperative event loop at a fixed cadence.
    pub fn tick(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.started_at);
        self.timers.walk(now);
        self.timers.gc();

        if let Some(isis) = &mut self.isis {
            isis.tick(now, elapsed);
        }
        self.flood_isis(now);

        if let Some(l2tp) = &mut self.l2tp {
            for tunnel in l2tp.tunnels.values_mut() {
                if let Ok(frames) = tunnel.retransmit_due(now) {
                    // Control datagrams go out the network interface; with
                    // a single network port configured this picks the first
                    // one, matching the "one role per interface" model.
                    if let Some(iface) = self
                        .interfaces
                        .values_mut()
                        .find(|i| i.role == InterfaceRole::Network)
                    {
                        for frame in frames {
                            iface.send(frame);
                        }
                    }
                }
            }
        }

        let ids: Vec<u32> = self.registry.ids().collect();
        for id in ids {
            self.poll_session_renew(id, now);
        }

        let max_packets = 256;
        let flow_ids: Vec<u64> = self.generators.keys().copied().collect();
        for flow_id in flow_ids {
            let headers = {
                let flow = self.generators.get_mut(&flow_id).unwrap();
                flow.tick(now, self.epoch, max_packets)
            };
            for header in headers {
                self.send_bbl(header);
            }
        }

        for iface in self.interfaces.values_mut() {
            iface.tx_tick();
        }
    }

    fn poll_session_renew(&mut self, session_id: u32, now: Instant) {
        let t1 = self.config.dhcp.t1_factor;
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        let (key, client_mac) = (session.key, session.client_mac);
        let actions = match &mut session.driver {
            Driver::Ipoe(ipoe) => ipoe.poll_renew(now, t1),
            Driver::Pppoe(_) => return,
        };
        for action in actions {
            self.apply_ipoe_action(key, client_mac, action);
        }
    }

    // ===== frame ingestion =====

    /// Drains every interface's RX queue and dispatches each frame.
    pub fn poll_interfaces(&mut self, now: Instant) {
        let ifindices: Vec<u32> = self.interfaces.keys().copied().collect();
        for ifindex in ifindices {
            let frames = self.interfaces.get_mut(&ifindex).unwrap().rx_tick();
            for frame in frames {
                self.dispatch_frame(ifindex, &frame, now);
            }
        }
    }

    pub fn dispatch_frame(&mut self, ifindex: u32, frame: &[u8], now: Instant) {
        let mut buf = Bytes::copy_from_slice(frame);
        let Ok(eth) = EthHeader::decode(&mut buf) else {
            return;
        };
        let key = SessionKey::new(ifindex, eth.outer_vlan(), eth.inner_vlan());
        match eth.ethertype {
            ETHERTYPE_PPPOE_DISCOVERY => self.handle_pppoe_discovery(ifindex, key, &eth, buf, now),
            ETHERTYPE_PPPOE_SESSION => self.handle_pppoe_session(key, buf, now),
            ETHERTYPE_ARP => self.handle_arp(key, buf, now),
            ETHERTYPE_IPV4 => self.handle_ipv4(key, buf, now),
            ETHERTYPE_IPV6 => self.handle_ipv6(key, buf, now),
            ETHERTYPE_ISIS_LLC => self.handle_isis(ifindex, buf, now),
            _ => {}
        }
    }

    fn handle_pppoe_discovery(
        &mut self,
        ifindex: u32,
        key: SessionKey,
        eth: &EthHeader,
        mut buf: Bytes,
        now: Instant,
    ) {
        let Ok(pkt) = PppoeDiscovery::decode(&mut buf) else {
            return;
        };
        let role = self.interfaces.get(&ifindex).map(|i| i.role);
        if role == Some(InterfaceRole::A10nsp) {
            let service_name = self.config.pppoe.service_name.clone();
            let term = self
                .a10nsp
                .entry(key)
                .or_insert_with(|| A10nspTerminator::new(eth.dst, eth.src, service_name, 0));
            for action in term.receive_discovery(&pkt) {
                match action {
                    crate::a10nsp::Action::SendPado(p) => {
                        self.send_pppoe_discovery(key, eth.src, eth.dst, &p)
                    }
                    crate::a10nsp::Action::SendPads(p) => {
                        self.send_pppoe_discovery(key, eth.src, eth.dst, &p)
                    }
                    crate::a10nsp::Action::Terminated => {
                        self.a10nsp.remove(&key);
                    }
                    _ => {}
                }
            }
            return;
        }
        let Some(session) = self.registry.get_by_key_mut(&key) else {
            return;
        };
        if let Driver::Pppoe(driver) = &mut session.driver {
            let actions = driver.receive_discovery(&pkt);
            let client_mac = session.client_mac;
            let server_mac = session.server_mac;
            for action in actions {
                self.apply_pppoe_action(key, client_mac, server_mac, action, now);
            }
        }
    }

    fn handle_pppoe_session(&mut self, key: SessionKey, mut buf: Bytes, now: Instant) {
        if buf.remaining() < 2 {
            return;
        }
        let proto = buf.get_u16();
        let role = self.interfaces.get(&key.ifindex).map(|i| i.role);
        if role == Some(InterfaceRole::A10nsp) {
            self.handle_a10nsp_session(key, proto, buf);
            return;
        }
        let Some(session) = self.registry.get_by_key_mut(&key) else {
            return;
        };
        let client_mac = session.client_mac;
        let server_mac = session.server_mac;
        let Driver::Pppoe(driver) = &mut session.driver else {
            return;
        };
        let actions = match proto {
            ppp::PROTO_LCP => LcpPacket::decode(&mut buf)
                .map(|pkt| driver.receive_lcp(&pkt))
                .unwrap_or_default(),
            ppp::PROTO_PAP => PapPacket::decode(&mut buf)
                .map(|pkt| driver.receive_pap(&pkt))
                .unwrap_or_default(),
            ppp::PROTO_CHAP => ChapPacket::decode(&mut buf)
                .map(|pkt| driver.receive_chap(&pkt))
                .unwrap_or_default(),
            ppp::PROTO_IPCP => IpcpPacket::decode(&mut buf)
                .map(|pkt| driver.receive_ipcp(&pkt))
                .unwrap_or_default(),
            ppp::PROTO_IP6CP => Ip6cpPacket::decode(&mut buf)
                .map(|pkt| driver.receive_ip6cp(&pkt))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        for action in actions {
            self.apply_pppoe_action(key, client_mac, server_mac, action, now);
        }
    }

    /// Routes LCP/IPCP frames on an A10NSP access interface to the
    /// terminator fixture instead of a real `Session`, mirroring
    /// `handle_pppoe_discovery`'s role check.
    fn handle_a10nsp_session(&mut self, key: SessionKey, proto: u16, mut buf: Bytes) {
        let Some(term) = self.a10nsp.get_mut(&key) else {
            return;
        };
        let (local_mac, peer_mac) = (term.local_mac, term.peer_mac);
        let actions = match proto {
            ppp::PROTO_LCP => LcpPacket::decode(&mut buf)
                .map(|pkt| term.receive_lcp(&pkt))
                .unwrap_or_default(),
            ppp::PROTO_IPCP => IpcpPacket::decode(&mut buf)
                .map(|pkt| term.receive_ipcp(&pkt))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        for action in actions {
            match action {
                crate::a10nsp::Action::SendLcp(p) => {
                    self.send_ppp(key, peer_mac, local_mac, ppp::PROTO_LCP, &p)
                }
                crate::a10nsp::Action::SendIpcp(p) => {
                    self.send_ppp(key, peer_mac, local_mac, ppp::PROTO_IPCP, &p)
                }
                crate::a10nsp::Action::Established => {
                    Debug::A10nspMirror(0, "ppp established").log();
                }
                _ => {}
            }
        }
    }

    fn handle_arp(&mut self, key: SessionKey, mut buf: Bytes, _now: Instant) {
        let Ok(pkt) = ArpPacket::decode(&mut buf) else {
            return;
        };
        let Some(session) = self.registry.get_by_key_mut(&key) else {
            return;
        };
        if let Driver::Ipoe(driver) = &mut session.driver {
            if let Some(action) = driver.receive_arp(&pkt) {
                let client_mac = session.client_mac;
                self.apply_ipoe_action(key, client_mac, action);
            }
        }
    }

    fn handle_ipv4(&mut self, key: SessionKey, mut buf: Bytes, now: Instant) {
        let Ok(hdr) = Ipv4Header::decode(&mut buf) else {
            return;
        };
        match hdr.protocol {
            PROTO_UDP => self.handle_udp_v4(key, &hdr, buf, now),
            PROTO_IGMP => self.handle_igmp(key, buf),
            _ => self.handle_bbl_payload(key, buf, now),
        }
    }

    fn handle_ipv6(&mut self, key: SessionKey, mut buf: Bytes, now: Instant) {
        let Ok(hdr) = Ipv6Header::decode(&mut buf) else {
            return;
        };
        match hdr.next_header {
            NEXT_HEADER_ICMPV6 => self.handle_icmpv6(key, buf),
            NEXT_HEADER_UDP => self.handle_udp_v6(key, buf, now),
            _ => {}
        }
    }

    fn handle_udp_v4(&mut self, key: SessionKey, hdr: &Ipv4Header, mut buf: Bytes, now: Instant) {
        let Ok(udp) = UdpHeader::decode(&mut buf) else {
            return;
        };
        match udp.dst_port {
            67 | 68 => self.handle_dhcpv4(key, buf),
            1701 => self.handle_l2tp(hdr.src, udp.src_port, buf, now),
            65056 => self.handle_bbl_payload(key, buf, now),
            _ => {}
        }
    }

    fn handle_udp_v6(&mut self, key: SessionKey, mut buf: Bytes, now: Instant) {
        let Ok(udp) = UdpHeader::decode(&mut buf) else {
            return;
        };
        match udp.dst_port {
            546 | 547 => self.handle_dhcpv6(key, buf),
            65056 => self.handle_bbl_payload(key, buf, now),
            _ => {}
        }
    }

    fn handle_dhcpv4(&mut self, key: SessionKey, mut buf: Bytes) {
        let Ok(pkt) = DhcpPacket::decode(&mut buf) else {
            return;
        };
        let Some(session) = self.registry.get_by_key_mut(&key) else {
            return;
        };
        if let Driver::Ipoe(driver) = &mut session.driver {
            if let Some(action) = driver.receive_dhcp(&pkt) {
                let client_mac = session.client_mac;
                self.apply_ipoe_action(key, client_mac, action);
            }
        }
    }

    fn handle_dhcpv6(&mut self, key: SessionKey, mut buf: Bytes) {
        let Ok(pkt) = Dhcpv6Packet::decode(&mut buf) else {
            return;
        };
        let Some(session) = self.registry.get_by_key_mut(&key) else {
            return;
        };
        if let Driver::Ipoe(driver) = &mut session.driver {
            if let Some(action) = driver.receive_dhcpv6(&pkt) {
                let client_mac = session.client_mac;
                self.apply_ipoe_action(key, client_mac, action);
            }
        }
    }

    fn handle_icmpv6(&mut self, key: SessionKey, mut buf: Bytes) {
        let Ok(msg) = Icmpv6Message::decode(&mut buf) else {
            return;
        };
        let Some(session) = self.registry.get_by_key_mut(&key) else {
            return;
        };
        if let Driver::Ipoe(driver) = &mut session.driver {
            if let Some(action) = driver.receive_icmpv6(&msg) {
                let client_mac = session.client_mac;
                self.apply_ipoe_action(key, client_mac, action);
            }
        }
    }

    fn handle_igmp(&mut self, key: SessionKey, mut buf: Bytes) {
        let Ok(msg) = IgmpMessage::decode(&mut buf) else {
            return;
        };
        let Some(session) = self.registry.get_by_key_mut(&key) else {
            return;
        };
        let client_mac = session.client_mac;
        let server_mac = session.server_mac;
        let reports = session.receive_igmp(&msg);
        for report in reports {
            self.send_igmp(key, client_mac, server_mac, &report);
        }
    }

    fn handle_bbl_payload(&mut self, _key: SessionKey, mut buf: Bytes, now: Instant) {
        let Ok(hdr) = BblHeader::decode(&mut buf) else {
            return;
        };
        if let Some(verifier) = self.verifiers.get_mut(&hdr.flow_id) {
            let delay_ns = now
                .saturating_duration_since(self.epoch)
                .as_nanos()
                .saturating_sub(hdr.timestamp_ns as u128) as u64;
            if verifier.on_receive(hdr.flow_seq, delay_ns, bbl_packet::bbl::LENGTH as u64) {
                self.counters.verified_flows += 1;
                Debug::TrafficFlowStart(hdr.flow_id, "first packet verified").log();
            }
        }
        if let Some(session) = self.registry.get_mut(hdr.session_id) {
            session.traffic.mark_verified(hdr.sub_type);
        }
    }

    fn handle_isis(&mut self, ifindex: u32, mut buf: Bytes, now: Instant) {
        let Some(isis) = &mut self.isis else { return };
        let Ok((pdu_type, pdu)) = isis::decode(&mut buf) else {
            return;
        };
        match (pdu_type, pdu) {
            (PduType::L1Lsp | PduType::L2Lsp, IsisPdu::Lsp(lsp)) => {
                let level = if pdu_type == PduType::L1Lsp {
                    bbl_isis::Level::L1
                } else {
                    bbl_isis::Level::L2
                };
                let mut raw = Vec::new();
                lsp.encode(&mut raw);
                let _ = isis.receive_lsp(level, &lsp, raw, ifindex, now);
            }
            (PduType::L1Csnp | PduType::L2Csnp, IsisPdu::Csnp(csnp)) => {
                isis.handle_csnp(
                    if pdu_type == PduType::L1Csnp {
                        bbl_isis::Level::L1
                    } else {
                        bbl_isis::Level::L2
                    },
                    &csnp,
                    ifindex,
                );
            }
            (PduType::L1LanHello | PduType::L2LanHello | PduType::P2pHello, IsisPdu::Hello(hello)) => {
                let level = if pdu_type == PduType::L2LanHello {
                    bbl_isis::Level::L2
                } else {
                    bbl_isis::Level::L1
                };
                isis.process_hello(ifindex, level, &hello, ISIS_FLOOD_WINDOW_SIZE);
            }
            (PduType::L1Psnp | PduType::L2Psnp, IsisPdu::Psnp(psnp)) => {
                isis.handle_psnp(
                    if pdu_type == PduType::L1Psnp {
                        bbl_isis::Level::L1
                    } else {
                        bbl_isis::Level::L2
                    },
                    &psnp,
                    ifindex,
                );
            }
            _ => {}
        }
    }

    /// Transmits every LSP drained from each Up adjacency's flood tree this
    /// tick, wrapped in its common IS-IS header and an Ethernet frame
    /// addressed to the level's well-known multicast MAC.
    fn flood_isis(&mut self, now: Instant) {
        let ifindex_macs: HashMap<u32, MacAddr> =
            self.interfaces.iter().map(|(ifindex, iface)| (*ifindex, iface.mac)).collect();
        let Some(isis) = &mut self.isis else { return };
        let batches = isis.drain_floods(now);
        let mut frames: Vec<(u32, Vec<u8>)> = Vec::new();
        for (ifindex, level, lsp_ids) in batches {
            let Some(&src) = ifindex_macs.get(&ifindex) else {
                continue;
            };
            let pdu_type = match level {
                bbl_isis::Level::L1 => PduType::L1Lsp,
                bbl_isis::Level::L2 => PduType::L2Lsp,
            };
            let dst = match level {
                bbl_isis::Level::L1 => MacAddr::ALL_L1_IS,
                bbl_isis::Level::L2 => MacAddr::ALL_L2_IS,
            };
            let lsdb = match level {
                bbl_isis::Level::L1 => &isis.lsdb_l1,
                bbl_isis::Level::L2 => &isis.lsdb_l2,
            };
            for lsp_id in lsp_ids {
                let Some(raw) = lsdb.get(&lsp_id).map(|e| e.raw.clone()) else {
                    continue;
                };
                let eth = EthHeader {
                    dst,
                    src,
                    vlan: smallvec::SmallVec::new(),
                    ethertype: ETHERTYPE_ISIS_LLC,
                };
                let mut buf = BytesMut::new();
                eth.encode(&mut buf);
                isis::encode_raw(pdu_type, &raw, &mut buf);
                frames.push((ifindex, buf.to_vec()));
            }
        }
        for (ifindex, frame) in frames {
            self.send_frame(ifindex, frame);
        }
    }

    /// Purges this instance's self-originated LSPs at every configured level
    /// and flushes the resulting purge frames out, for use on shutdown.
    pub fn isis_shutdown(&mut self, now: Instant) {
        let Some(isis) = &mut self.isis else { return };
        let levels = match isis.level_type {
            bbl_utils::config::IsisLevelType::L1 => vec![bbl_isis::Level::L1],
            bbl_utils::config::IsisLevelType::L2 => vec![bbl_isis::Level::L2],
            bbl_utils::config::IsisLevelType::L1L2 => vec![bbl_isis::Level::L1, bbl_isis::Level::L2],
        };
        for level in levels {
            isis.purge(level, ISIS_PURGE_LIFETIME, now);
        }
        self.flood_isis(now);
    }

    fn handle_l2tp(&mut self, peer_addr: Ipv4Addr, peer_port: u16, mut buf: Bytes, now: Instant) {
        let Some(l2tp) = &mut self.l2tp else { return };
        let bytes = buf.copy_to_bytes(buf.remaining());
        if let Ok(Dispatched::Control(datagrams)) = l2tp.handle_datagram(peer_addr, peer_port, bytes, now) {
            if let Some(iface) = self
                .interfaces
                .values_mut()
                .find(|i| i.role == InterfaceRole::Network)
            {
                for dgram in datagrams {
                    iface.send(dgram.bytes);
                }
            }
        }
    }

    // ===== action appliers =====

    fn apply_pppoe_action(
        &mut self,
        key: SessionKey,
        client_mac: MacAddr,
        server_mac: MacAddr,
        action: session::pppoe::Action,
        now: Instant,
    ) {
        use session::pppoe::Action;
        match action {
            Action::SendPadi(p) | Action::SendPadr(p) => {
                self.send_pppoe_discovery(key, client_mac, server_mac, &p)
            }
            Action::SendLcp(p) => self.send_ppp(key, client_mac, server_mac, ppp::PROTO_LCP, &p),
            Action::SendPap(p) => self.send_ppp(key, client_mac, server_mac, ppp::PROTO_PAP, &p),
            Action::SendChap(p) => self.send_ppp(key, client_mac, server_mac, ppp::PROTO_CHAP, &p),
            Action::SendIpcp(p) => self.send_ppp(key, client_mac, server_mac, ppp::PROTO_IPCP, &p),
            Action::SendIp6cp(p) => self.send_ppp(key, client_mac, server_mac, ppp::PROTO_IP6CP, &p),
            Action::Established => {
                if let Some(session) = self.registry.get_by_key_mut(&key) {
                    session.state_change(session::SessionState::Established);
                }
                self.counters.sessions_established += 1;
            }
            Action::Terminated(reason) => {
                if let Some(id) = self.registry.resolve_id(&key) {
                    Debug::SessionTerminated(id, reason).log();
                    self.detach_session_flows(id);
                    self.registry.remove(id);
                    self.counters.sessions_terminated += 1;
                }
            }
        }
        let _ = now;
    }

    fn apply_ipoe_action(&mut self, key: SessionKey, client_mac: MacAddr, action: session::ipoe::Action) {
        use session::ipoe::Action;
        let server_mac = self
            .registry
            .get_by_key(&key)
            .map(|s| s.server_mac)
            .unwrap_or(MacAddr::ZERO);
        match action {
            Action::SendArp(p) => self.send_arp(key, client_mac, &p),
            Action::SendDhcp(p) => self.send_dhcpv4(key, client_mac, server_mac, &p),
            Action::SendRouterSolicit(m) => self.send_icmpv6(key, client_mac, server_mac, &m),
            Action::SendDhcpv6(p) => self.send_dhcpv6(key, client_mac, server_mac, &p),
            Action::Established => {
                if let Some(session) = self.registry.get_by_key_mut(&key) {
                    session.state_change(session::SessionState::Established);
                }
                self.counters.sessions_established += 1;
            }
            Action::Flapped => {
                if let Some(id) = self.registry.resolve_id(&key) {
                    if let Some(session) = self.registry.get_by_key_mut(&key) {
                        session.stats.flapped += 1;
                        session.state_change(session::SessionState::Establishing);
                    }
                    Debug::SessionStateChange(
                        id,
                        "ipoe",
                        session::SessionState::Established,
                        session::SessionState::Establishing,
                    )
                    .log();
                }
                self.counters.sessions_flapped += 1;
            }
            Action::Terminated(reason) => {
                if let Some(id) = self.registry.resolve_id(&key) {
                    Debug::SessionTerminated(id, reason).log();
                    self.detach_session_flows(id);
                    self.registry.remove(id);
                    self.counters.sessions_terminated += 1;
                }
            }
        }
    }

    // ===== wire encoding helpers =====

    fn vlan_tags(&self, key: SessionKey) -> smallvec::SmallVec<[VlanTag; 3]> {
        let mut v = smallvec::SmallVec::new();
        if key.outer_vlan != 0 {
            v.push(VlanTag {
                tpid: ETHERTYPE_VLAN,
                pcp: 0,
                dei: false,
                vlan_id: key.outer_vlan,
            });
        }
        if key.inner_vlan != 0 {
            v.push(VlanTag {
                tpid: ETHERTYPE_QINQ,
                pcp: 0,
                dei: false,
                vlan_id: key.inner_vlan,
            });
        }
        v
    }

    fn send_frame(&mut self, ifindex: u32, frame: Vec<u8>) {
        if let Some(iface) = self.interfaces.get_mut(&ifindex) {
            iface.send(frame);
        }
    }

    fn send_pppoe_discovery(&mut self, key: SessionKey, dst: MacAddr, src: MacAddr, pkt: &PppoeDiscovery) {
        let eth = EthHeader {
            dst,
            src,
            vlan: self.vlan_tags(key),
            ethertype: ETHERTYPE_PPPOE_DISCOVERY,
        };
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        pkt.encode(&mut buf);
        self.send_frame(key.ifindex, buf.to_vec());
    }

    fn send_ppp(
        &mut self,
        key: SessionKey,
        dst: MacAddr,
        src: MacAddr,
        proto: u16,
        pkt: &impl Encodable,
    ) {
        let eth = EthHeader {
            dst,
            src,
            vlan: self.vlan_tags(key),
            ethertype: ETHERTYPE_PPPOE_SESSION,
        };
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        buf.extend_from_slice(&proto.to_be_bytes());
        pkt.encode_into(&mut buf);
        self.send_frame(key.ifindex, buf.to_vec());
    }

    fn send_arp(&mut self, key: SessionKey, dst: MacAddr, pkt: &ArpPacket) {
        let eth = EthHeader {
            dst: MacAddr::BROADCAST,
            src: dst,
            vlan: self.vlan_tags(key),
            ethertype: ETHERTYPE_ARP,
        };
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        pkt.encode(&mut buf);
        self.send_frame(key.ifindex, buf.to_vec());
    }

    /// Sends an IGMPv2/v3 report or leave for a group join/leave/query
    /// response.
    fn send_igmp(&mut self, key: SessionKey, client_mac: MacAddr, server_mac: MacAddr, msg: &IgmpMessage) {
        let mut payload = BytesMut::new();
        msg.encode(&mut payload);
        let dst = match msg {
            IgmpMessage::V2Leave { .. } => Ipv4Addr::new(224, 0, 0, 2),
            IgmpMessage::V2Report { group } | IgmpMessage::V1Report { group } => *group,
            _ => Ipv4Addr::new(224, 0, 0, 22),
        };
        let ip = Ipv4Header {
            tos: 0,
            identification: 0,
            dont_fragment: false,
            ttl: 1,
            protocol: PROTO_IGMP,
            src: Ipv4Addr::UNSPECIFIED,
            dst,
            router_alert: true,
            payload_len: payload.len() as u16,
        };
        let eth = EthHeader {
            dst: MacAddr::BROADCAST,
            src: client_mac,
            vlan: self.vlan_tags(key),
            ethertype: ETHERTYPE_IPV4,
        };
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        ip.encode(&mut buf);
        buf.extend_from_slice(&payload);
        let _ = server_mac;
        self.send_frame(key.ifindex, buf.to_vec());
    }

    fn send_dhcpv4(&mut self, key: SessionKey, client_mac: MacAddr, server_mac: MacAddr, pkt: &DhcpPacket) {
        let mut payload = BytesMut::new();
        pkt.encode(&mut payload);
        let udp = UdpHeader {
            src_port: 68,
            dst_port: 67,
            length: 8 + payload.len() as u16,
        };
        let mut udp_buf = BytesMut::new();
        udp.encode(&mut udp_buf);
        udp_buf.extend_from_slice(&payload);
        let ip = Ipv4Header {
            tos: 0,
            identification: 0,
            dont_fragment: false,
            ttl: 64,
            protocol: PROTO_UDP,
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::BROADCAST,
            router_alert: false,
            payload_len: udp_buf.len() as u16,
        };
        let eth = EthHeader {
            dst: MacAddr::BROADCAST,
            src: server_mac,
            vlan: self.vlan_tags(key),
            ethertype: ETHERTYPE_IPV4,
        };
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        ip.encode(&mut buf);
        buf.extend_from_slice(&udp_buf);
        let _ = client_mac;
        self.send_frame(key.ifindex, buf.to_vec());
    }

    fn send_dhcpv6(&mut self, key: SessionKey, client_mac: MacAddr, server_mac: MacAddr, pkt: &Dhcpv6Packet) {
        let mut payload = BytesMut::new();
        pkt.encode(&mut payload);
        let udp = UdpHeader {
            src_port: 546,
            dst_port: 547,
            length: 8 + payload.len() as u16,
        };
        let mut udp_buf = BytesMut::new();
        udp.encode(&mut udp_buf);
        udp_buf.extend_from_slice(&payload);
        let ip = Ipv6Header {
            traffic_class: 0,
            flow_label: 0,
            hop_limit: 1,
            next_header: NEXT_HEADER_UDP,
            src: Ipv6Addr::UNSPECIFIED,
            dst: Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2),
            hop_by_hop: None,
            payload_len: udp_buf.len() as u16,
        };
        let eth = EthHeader {
            dst: MacAddr::BROADCAST,
            src: server_mac,
            vlan: self.vlan_tags(key),
            ethertype: ETHERTYPE_IPV6,
        };
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        ip.encode(&mut buf);
        buf.extend_from_slice(&udp_buf);
        let _ = client_mac;
        self.send_frame(key.ifindex, buf.to_vec());
    }

    fn send_icmpv6(&mut self, key: SessionKey, client_mac: MacAddr, server_mac: MacAddr, msg: &Icmpv6Message) {
        let dst = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);
        let mut pseudo = Vec::with_capacity(40);
        pseudo.extend_from_slice(&Ipv6Addr::UNSPECIFIED.octets());
        pseudo.extend_from_slice(&dst.octets());
        let body = msg.encode(&pseudo);
        let ip = Ipv6Header {
            traffic_class: 0,
            flow_label: 0,
            hop_limit: 255,
            next_header: NEXT_HEADER_ICMPV6,
            src: Ipv6Addr::UNSPECIFIED,
            dst,
            hop_by_hop: None,
            payload_len: body.len() as u16,
        };
        let eth = EthHeader {
            dst: MacAddr::BROADCAST,
            src: server_mac,
            vlan: self.vlan_tags(key),
            ethertype: ETHERTYPE_IPV6,
        };
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        ip.encode(&mut buf);
        buf.extend_from_slice(&body);
        let _ = client_mac;
        self.send_frame(key.ifindex, buf.to_vec());
    }

    fn send_bbl(&mut self, hdr: BblHeader) {
        let key = SessionKey::new(0, hdr.outer_vlan, hdr.inner_vlan);
        let (client_mac, server_mac) = self
            .registry
            .get_by_key(&key)
            .map(|s| (s.client_mac, s.server_mac))
            .unwrap_or((MacAddr::BROADCAST, MacAddr::ZERO));
        let mut payload = BytesMut::new();
        hdr.encode(&mut payload);
        let udp = UdpHeader {
            src_port: 65056,
            dst_port: 65056,
            length: 8 + payload.len() as u16,
        };
        let mut udp_buf = BytesMut::new();
        udp.encode(&mut udp_buf);
        udp_buf.extend_from_slice(&payload);
        let ip = Ipv4Header {
            tos: 0,
            identification: 0,
            dont_fragment: false,
            ttl: 64,
            protocol: PROTO_UDP,
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::UNSPECIFIED,
            router_alert: false,
            payload_len: udp_buf.len() as u16,
        };
        let eth = EthHeader {
            dst: client_mac,
            src: server_mac,
            vlan: self.vlan_tags(key),
            ethertype: ETHERTYPE_IPV4,
        };
        let mut buf = BytesMut::new();
        eth.encode(&mut buf);
        ip.encode(&mut buf);
        buf.extend_from_slice(&udp_buf);
        self.send_frame(key.ifindex, buf.to_vec());
    }
}

/// Minimal adapter so `send_ppp` can stay generic over the five PPP-layer
/// packet types without duplicating the dispatch per type.
trait Encodable {
    fn encode_into(&self, buf: &mut BytesMut);
}

impl Encodable for LcpPacket {
    fn encode_into(&self, buf: &mut BytesMut) {
        self.encode(buf)
    }
}
impl Encodable for PapPacket {
    fn encode_into(&self, buf: &mut BytesMut) {
        self.encode(buf)
    }
}
impl Encodable for ChapPacket {
    fn encode_into(&self, buf: &mut BytesMut) {
        self.encode(buf)
    }
}
impl Encodable for IpcpPacket {
    fn encode_into(&self, buf: &mut BytesMut) {
        self.encode(buf)
    }
}
impl Encodable for Ip6cpPacket {
    fn encode_into(&self, buf: &mut BytesMut) {
        self.encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbl_utils::config::{InterfaceConfig, PppoeConfig};

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            interfaces: vec![InterfaceConfig {
                name: "eth1".into(),
                ifindex: 1,
                role: InterfaceRole::Access,
                mac: [2, 0, 0, 0, 0, 1],
                outer_vlan_min: 0,
                outer_vlan_max: 0,
                inner_vlan_min: 0,
                inner_vlan_max: 0,
                qinq: false,
            }],
            pppoe: PppoeConfig {
                service_name: "internet".into(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn starting_a_pppoe_session_sends_a_padi() {
        let now = Instant::now();
        let mut ctx = Context::new(test_config(), now);
        let key = SessionKey::new(1, 100, 0);
        ctx.start_pppoe_session(key, MacAddr::from([2, 1, 1, 1, 1, 1])).unwrap();
        assert_eq!(ctx.registry.len(), 1);
        ctx.interfaces.get_mut(&1).unwrap().tx_tick();
        assert_eq!(ctx.interfaces.get_mut(&1).unwrap().port_mut().sent.len(), 1);
    }
}
