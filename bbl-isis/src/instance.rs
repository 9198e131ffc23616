//
// IS-IS instance: adjacencies, per-level LSDB, self-LSP
// generation and the flooding/CSNP/PSNP rules that keep every adjacency's
// view of the database converged.
//

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bbl_packet::isis::{CsnpPdu, HelloPdu, LspId, LspPdu, PsnpPdu, Tlv};
use bbl_utils::config::{IsisConfig, IsisLevelType};

use crate::adjacency::{Adjacency, AdjacencyEvent, AdjacencyState, Level};
use crate::debug::Debug;
use crate::error::Error;
use crate::lsdb::{Lsdb, ReceiveOutcome};

/// One network interface's IS-IS-relevant configuration, enough to build
/// the extended reachability and IP reachability TLVs for the self LSP.
#[derive(Clone, Debug)]
pub struct IsisInterface {
    pub ifindex: u32,
    pub ipv4_prefix: Option<([u8; 4], u8)>,
    pub ipv6_prefix: Option<([u8; 16], u8)>,
    pub metric: u32,
}

pub struct ExternalConnection {
    pub system_id: [u8; 6],
    pub metric: u32,
}

pub struct Instance {
    pub system_id: [u8; 6],
    pub area_addresses: Vec<Vec<u8>>,
    pub hostname: Option<String>,
    pub router_id: Option<[u8; 4]>,
    pub level_type: IsisLevelType,
    pub srgb: Option<(u32, u32)>,
    pub hello_interval: Duration,
    pub holding_multiplier: u8,
    pub lsp_lifetime: Duration,
    pub lsp_refresh_interval: Duration,
    pub lsp_retry_interval: Duration,

    pub interfaces: Vec<IsisInterface>,
    pub external_connections: Vec<ExternalConnection>,
    pub adjacencies: Vec<Adjacency>,
    pub lsdb_l1: Lsdb,
    pub lsdb_l2: Lsdb,

    own_sequence_l1: u32,
    own_sequence_l2: u32,
    csnp_scan_counter: u64,
}

impl Instance {
    pub fn new(cfg: &IsisConfig) -> Self {
        Instance {
            system_id: cfg.system_id,
            area_addresses: cfg.area_addresses.clone(),
            hostname: cfg.hostname.clone(),
            router_id: cfg.router_id.map(|ip| ip.octets()),
            level_type: cfg.level_type,
            srgb: if cfg.sr_enabled {
                Some((cfg.srgb_base, cfg.srgb_range))
            } else {
                None
            },
            hello_interval: cfg.hello_interval,
            holding_multiplier: cfg.holding_multiplier,
            lsp_lifetime: cfg.lsp_lifetime,
            lsp_refresh_interval: cfg.lsp_refresh_interval,
            lsp_retry_interval: cfg.lsp_retry_interval,
            interfaces: Vec::new(),
            external_connections: Vec::new(),
            adjacencies: Vec::new(),
            lsdb_l1: Lsdb::default(),
            lsdb_l2: Lsdb::default(),
            own_sequence_l1: 0,
            own_sequence_l2: 0,
            csnp_scan_counter: 0,
        }
    }

    fn lsdb(&self, level: Level) -> &Lsdb {
        match level {
            Level::L1 => &self.lsdb_l1,
            Level::L2 => &self.lsdb_l2,
        }
    }

    fn lsdb_mut(&mut self, level: Level) -> &mut Lsdb {
        match level {
            Level::L1 => &mut self.lsdb_l1,
            Level::L2 => &mut self.lsdb_l2,
        }
    }

    pub fn self_lsp_id(&self) -> LspId {
        LspId {
            system_id: self.system_id,
            pseudonode: 0,
            fragment: 0,
        }
    }

    pub fn adjacency_mut(&mut self, ifindex: u32, level: Level) -> Option<&mut Adjacency> {
        self.adjacencies
            .iter_mut()
            .find(|a| a.ifindex == ifindex && a.level == level)
    }

    pub fn adjacency_up(&mut self, ifindex: u32, level: Level, peer_system_id: [u8; 6], window_size: usize) {
        if self.adjacency_mut(ifindex, level).is_none() {
            self.adjacencies
                .push(Adjacency::new(ifindex, level, peer_system_id, window_size));
        }
        let adj = self.adjacency_mut(ifindex, level).unwrap();
        adj.state_change(AdjacencyEvent::HelloTwoWayRcvd, AdjacencyState::Up);
        // Every adjacency newly up needs the current self LSP and everything
        // else already in the database.
        let ids: Vec<LspId> = self.lsdb(level).iter().map(|(id, _)| *id).collect();
        if let Some(adj) = self.adjacency_mut(ifindex, level) {
            for id in ids {
                adj.flood_insert(id);
            }
        }
    }

    pub fn adjacency_down(&mut self, ifindex: u32, level: Level, event: AdjacencyEvent) {
        if let Some(adj) = self.adjacency_mut(ifindex, level) {
            adj.state_change(event, AdjacencyState::Down);
        }
    }

    /// Builds and (re)installs the self-originated LSP for `level`, per
    /// "Self LSP generation". Floods it to every Up adjacency
    /// at that level.
    pub fn generate_self_lsp(&mut self, level: Level, now: Instant) {
        let sequence = match level {
            Level::L1 => {
                self.own_sequence_l1 += 1;
                self.own_sequence_l1
            }
            Level::L2 => {
                self.own_sequence_l2 += 1;
                self.own_sequence_l2
            }
        };
        let mut tlvs = vec![Tlv::AreaAddresses(self.area_addresses.clone())];
        tlvs.push(Tlv::ProtocolsSupported(vec![0xcc, 0x8e])); // IPv4 + IPv6 NLPID
        if let Some(hostname) = &self.hostname {
            tlvs.push(Tlv::Hostname(hostname.clone()));
        }
        if let Some(router_id) = self.router_id {
            tlvs.push(Tlv::TeRouterId(router_id));
            tlvs.push(Tlv::Ipv4InterfaceAddress(router_id));
        }
        if let Some((base, range)) = self.srgb {
            tlvs.push(Tlv::RouterCapability {
                srgb_base: base,
                srgb_range: range,
            });
        }
        let mut is_reach = Vec::new();
        let mut ip4_reach = Vec::new();
        let mut ip6_reach = Vec::new();
        for adj in self
            .adjacencies
            .iter()
            .filter(|a| a.level == level && a.state == AdjacencyState::Up)
        {
            is_reach.push((
                LspId {
                    system_id: adj.peer_system_id,
                    pseudonode: 0,
                    fragment: 0,
                },
                10,
            ));
            if let Some(iface) = self.interfaces.iter().find(|i| i.ifindex == adj.ifindex) {
                if let Some((prefix, len)) = iface.ipv4_prefix {
                    ip4_reach.push((iface.metric, len, prefix));
                }
                if let Some((prefix, len)) = iface.ipv6_prefix {
                    ip6_reach.push((iface.metric, len, prefix));
                }
            }
        }
        for ext in &self.external_connections {
            is_reach.push((
                LspId {
                    system_id: ext.system_id,
                    pseudonode: 0,
                    fragment: 0,
                },
                ext.metric,
            ));
        }
        if !is_reach.is_empty() {
            tlvs.push(Tlv::ExtendedIsReachability(is_reach));
        }
        if !ip4_reach.is_empty() {
            tlvs.push(Tlv::ExtendedIpReachability(ip4_reach));
        }
        if !ip6_reach.is_empty() {
            tlvs.push(Tlv::Ipv6Reachability(ip6_reach));
        }

        let lsp_id = self.self_lsp_id();
        let pdu = LspPdu {
            lsp_id,
            sequence,
            remaining_lifetime: self.lsp_lifetime.as_secs().min(u16::MAX as u64) as u16,
            checksum: 0,
            overload: false,
            level: if level == Level::L1 { 1 } else { 2 },
            tlvs,
        };
        let mut raw = Vec::new();
        pdu.encode(&mut raw);
        self.lsdb_mut(level)
            .install_self(lsp_id, sequence, pdu.remaining_lifetime, raw, now);
        self.flood_to_all(level, lsp_id, None);
    }

    fn flood_to_all(&mut self, level: Level, lsp_id: LspId, except_ifindex: Option<u32>) {
        for adj in self
            .adjacencies
            .iter_mut()
            .filter(|a| a.level == level && a.state == AdjacencyState::Up)
        {
            if Some(adj.ifindex) == except_ifindex {
                continue;
            }
            Debug::Flood(lsp_id, &adj.peer_system_id).log();
            adj.flood_insert(lsp_id);
        }
    }

    /// "Receipt of LSP". `from_ifindex` is the receiving
    /// adjacency's interface, used to implement "never flood back to the
    /// receiving adjacency; never flood to a neighbor whose system id
    /// matches the LSP origin adjacency's peer".
    pub fn receive_lsp(
        &mut self,
        level: Level,
        pdu: &LspPdu,
        raw: Vec<u8>,
        from_ifindex: u32,
        now: Instant,
    ) -> Result<ReceiveOutcome, Error> {
        let outcome = self.lsdb_mut(level).receive(
            pdu.lsp_id,
            pdu.sequence,
            pdu.remaining_lifetime,
            raw,
            now,
        );
        match outcome {
            ReceiveOutcome::Installed | ReceiveOutcome::Replaced => {
                let origin_peer = pdu.lsp_id.system_id;
                for adj in self
                    .adjacencies
                    .iter_mut()
                    .filter(|a| a.level == level && a.state == AdjacencyState::Up)
                {
                    if adj.ifindex == from_ifindex || adj.peer_system_id == origin_peer {
                        continue;
                    }
                    adj.flood_insert(pdu.lsp_id);
                }
            }
            ReceiveOutcome::SelfBumped(_) => {
                self.generate_self_lsp(level, now);
            }
            ReceiveOutcome::AlreadyCurrent | ReceiveOutcome::ExternalProtected => {}
        }
        if let Some(adj) = self.adjacency_mut(from_ifindex, level) {
            adj.psnp_tree.insert(pdu.lsp_id);
        }
        Ok(outcome)
    }

    /// Builds the periodic full-LSDB CSNP for `level`, stamping every
    /// mentioned LSP with the current scan id.
    pub fn build_csnp(&mut self, level: Level) -> CsnpPdu {
        self.csnp_scan_counter += 1;
        let entries: Vec<_> = self
            .lsdb(level)
            .iter()
            .filter(|(_, e)| !e.expired)
            .map(|(id, e)| (*id, e.sequence, e.remaining_lifetime, 0u16))
            .collect();
        Debug::CsnpScan(self.csnp_scan_counter).log();
        let (start, end) = (
            entries.first().map(|e| e.0).unwrap_or(LspId::default()),
            entries
                .last()
                .map(|e| e.0)
                .unwrap_or(LspId {
                    system_id: [0xff; 6],
                    pseudonode: 0xff,
                    fragment: 0xff,
                }),
        );
        CsnpPdu {
            source_id: self.system_id,
            start_lsp_id: start,
            end_lsp_id: end,
            entries,
        }
    }

    /// "CSNP": LSPs the peer lists that we lack (or hold an
    /// older copy of) go into the peer's flood tree; LSPs the peer is
    /// missing that we hold go into its flood tree too (same action, the
    /// peer side request comes back as our own DB lookup below).
    pub fn handle_csnp(&mut self, level: Level, csnp: &CsnpPdu, from_ifindex: u32) {
        let mut mentioned = std::collections::HashSet::new();
        for (lsp_id, seq, _lifetime, _checksum) in &csnp.entries {
            mentioned.insert(*lsp_id);
            let local = self.lsdb(level).get(lsp_id).map(|e| e.sequence);
            match local {
                Some(local_seq) if local_seq >= *seq => {
                    if let Some(adj) = self.adjacency_mut(from_ifindex, level) {
                        adj.ack(*lsp_id);
                    }
                }
                Some(_) => {
                    if let Some(adj) = self.adjacency_mut(from_ifindex, level) {
                        adj.flood_remove(*lsp_id);
                    }
                }
                None => {
                    if let Some(adj) = self.adjacency_mut(from_ifindex, level) {
                        adj.flood_insert(*lsp_id);
                    }
                }
            }
        }
        let missing: Vec<LspId> = self
            .lsdb(level)
            .iter()
            .filter(|(id, e)| !e.expired && !mentioned.contains(*id))
            .map(|(id, _)| *id)
            .collect();
        if let Some(adj) = self.adjacency_mut(from_ifindex, level) {
            for id in missing {
                adj.flood_insert(id);
            }
        }
    }

    pub fn handle_psnp(&mut self, level: Level, psnp: &PsnpPdu, from_ifindex: u32) {
        for (lsp_id, seq, _lifetime, _checksum) in &psnp.entries {
            if let Some(local) = self.lsdb(level).get(lsp_id) {
                if local.sequence <= *seq {
                    if let Some(adj) = self.adjacency_mut(from_ifindex, level) {
                        adj.ack(*lsp_id);
                    }
                }
            }
        }
    }

    /// Drains every Up adjacency's flood tree under its window, returns
    /// `(ifindex, level, lsp_ids)` batches for the caller to encode and
    /// transmit.
    pub fn drain_floods(&mut self, now: Instant) -> Vec<(u32, Level, Vec<LspId>)> {
        let mut out = Vec::new();
        for adj in self
            .adjacencies
            .iter_mut()
            .filter(|a| a.state == AdjacencyState::Up)
        {
            adj.expire_retries(now, self.lsp_retry_interval);
            let drained = adj.drain_flood_tree(now);
            if !drained.is_empty() {
                out.push((adj.ifindex, adj.level, drained));
            }
        }
        out
    }

    /// Ages LSP lifetimes and refreshes self-originated ones whose refresh
    /// interval has elapsed.
    pub fn tick(&mut self, now: Instant, elapsed: Duration) {
        self.lsdb_l1.tick_lifetimes(elapsed);
        self.lsdb_l2.tick_lifetimes(elapsed);
        for level in [Level::L1, Level::L2] {
            let due = self
                .lsdb(level)
                .get(&self.self_lsp_id())
                .map(|e| now.duration_since(e.last_generated) >= self.lsp_refresh_interval)
                .unwrap_or(false);
            if due {
                self.generate_self_lsp(level, now);
            }
        }
        self.lsdb_l1.gc();
        self.lsdb_l2.gc();
    }

    /// "Purge on shutdown": rebuild with only the
    /// authentication TLV, bump sequence, set a short purge lifetime.
    pub fn purge(&mut self, level: Level, purge_lifetime: Duration, now: Instant) {
        let sequence = match level {
            Level::L1 => {
                self.own_sequence_l1 += 1;
                self.own_sequence_l1
            }
            Level::L2 => {
                self.own_sequence_l2 += 1;
                self.own_sequence_l2
            }
        };
        let lsp_id = self.self_lsp_id();
        let pdu = LspPdu {
            lsp_id,
            sequence,
            remaining_lifetime: purge_lifetime.as_secs().min(u16::MAX as u64) as u16,
            checksum: 0,
            overload: false,
            level: if level == Level::L1 { 1 } else { 2 },
            tlvs: vec![],
        };
        let mut raw = Vec::new();
        pdu.encode(&mut raw);
        self.lsdb_mut(level)
            .install_self(lsp_id, sequence, pdu.remaining_lifetime, raw, now);
        self.flood_to_all(level, lsp_id, None);
    }

    /// Loads an externally supplied LSP: never overwritten by a peer, never
    /// refreshed.
    pub fn load_external(&mut self, level: Level, pdu: &LspPdu, raw: Vec<u8>, now: Instant) {
        self.lsdb_mut(level)
            .install_external(pdu.lsp_id, pdu.sequence, raw, now);
    }

    pub fn process_hello(
        &mut self,
        ifindex: u32,
        level: Level,
        hello: &HelloPdu,
        window_size: usize,
    ) {
        Debug::HelloRx(&hello.source_id).log();
        self.adjacency_up(ifindex, level, hello.source_id, window_size);
        if let Some(adj) = self.adjacency_mut(ifindex, level) {
            adj.holding_time = hello.holding_time;
        }
    }

    pub fn adjacency_count(&self, level: Level) -> usize {
        self.adjacencies
            .iter()
            .filter(|a| a.level == level && a.state == AdjacencyState::Up)
            .count()
    }

    pub fn peer_holdtimes(&self) -> HashMap<[u8; 6], u16> {
        self.adjacencies
            .iter()
            .map(|a| (a.peer_system_id, a.holding_time))
            .collect()
    }
}
