//
// Traffic generator / verifier: per-flow BBL
// packet generation at a target pps, and per-flow sequence/loss/delay
// verification on receive. Session traffic (the per-session expected
// v4/v6/v6pd flows used by the `sessions-pending` control query) is a thin
// wrapper around the same verifier logic.
//

use std::time::{Duration, Instant};

use bbl_packet::bbl::{BblHeader, Direction, FlowSubType, FlowType};

/// Global TX interval every generator flow's per-tick budget is derived
/// from.
pub const DEFAULT_TX_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub struct FlowTemplate {
    pub flow_type: FlowType,
    pub sub_type: FlowSubType,
    pub direction: Direction,
    pub session_id: u32,
    pub outer_vlan: u16,
    pub inner_vlan: u16,
}

pub struct GeneratorFlow {
    pub flow_id: u64,
    pub template: FlowTemplate,
    pub target_pps: f64,
    pub enabled: bool,
    seq: u64,
    next_send: Instant,
    tx_interval: Duration,
    send_period: Duration,
}

impl GeneratorFlow {
    pub fn new(flow_id: u64, template: FlowTemplate, target_pps: f64, now: Instant) -> Self {
        let send_period = if target_pps > 0.0 {
            Duration::from_secs_f64(1.0 / target_pps)
        } else {
            Duration::from_secs(u64::MAX / 2)
        };
        GeneratorFlow {
            flow_id,
            template,
            target_pps,
            enabled: true,
            seq: 0,
            next_send: now,
            tx_interval: DEFAULT_TX_INTERVAL,
            send_period,
        }
    }

    /// Emits every packet due by `now`, spaced by `send_period`. Bounded by
    /// the caller's own per-tick packet budget via `max_packets`. `epoch`
    /// is the stable reference instant the BBL trailer's timestamp is
    /// relative to (see `BblHeader::timestamp_ns`); the verifier on the
    /// receiving side must be anchored to the same epoch.
    pub fn tick(&mut self, now: Instant, epoch: Instant, max_packets: usize) -> Vec<BblHeader> {
        let mut out = Vec::new();
        if !self.enabled {
            return out;
        }
        while self.next_send <= now && out.len() < max_packets {
            self.seq += 1;
            out.push(BblHeader {
                flow_type: self.template.flow_type,
                sub_type: self.template.sub_type,
                direction: self.template.direction,
                session_id: self.template.session_id,
                outer_vlan: self.template.outer_vlan,
                inner_vlan: self.template.inner_vlan,
                flow_id: self.flow_id,
                flow_seq: self.seq,
                timestamp_ns: now.saturating_duration_since(epoch).as_nanos() as u64,
            });
            self.next_send += self.send_period;
        }
        out
    }

    pub fn restart(&mut self, now: Instant) {
        self.seq = 0;
        self.next_send = now;
    }

    pub fn last_seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Default)]
pub struct VerifierFlow {
    pub flow_id: u64,
    pub rx_first_seq: Option<u64>,
    pub rx_last_seq: Option<u64>,
    pub loss: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub min_delay_ns: u64,
    pub max_delay_ns: u64,
    pub sum_delay_ns: u128,
}

impl VerifierFlow {
    pub fn new(flow_id: u64) -> Self {
        VerifierFlow {
            flow_id,
            ..Default::default()
        }
    }

    pub fn avg_delay_ns(&self) -> u64 {
        if self.rx_packets == 0 {
            0
        } else {
            (self.sum_delay_ns / self.rx_packets as u128) as u64
        }
    }

    /// Returns `true` the first time this flow sees traffic - used by the
    /// caller to bump the global "verified flows" counter exactly once
    ///.
    pub fn on_receive(&mut self, seq: u64, delay_ns: u64, bytes: u64) -> bool {
        let first = self.rx_first_seq.is_none();
        if first {
            self.rx_first_seq = Some(seq);
        }
        // I-SEQ: with no reordering, rx_last_seq advances by exactly one
        // per packet; any other transition - a gap or an out-of-order
        // arrival - counts as a single loss event regardless of how large
        // the gap actually was.
        let in_order = match self.rx_last_seq {
            None => true,
            Some(last) => seq == last.wrapping_add(1),
        };
        if !in_order {
            self.loss += 1;
        }
        self.rx_last_seq = Some(seq);
        self.rx_packets += 1;
        self.rx_bytes += bytes;
        self.sum_delay_ns += delay_ns as u128;
        if delay_ns > self.max_delay_ns {
            self.max_delay_ns = delay_ns;
        }
        // Out-of-order packets never pull the minimum down: only an in-order arrival can set a new floor.
        if in_order && (self.min_delay_ns == 0 || delay_ns < self.min_delay_ns) {
            self.min_delay_ns = delay_ns;
        }
        first
    }
}

/// Per-session expected traffic: the
/// first matching RX per address family flips a verified bit used by the
/// `sessions-pending` control query.
#[derive(Default)]
pub struct SessionTraffic {
    pub ipv4_flow: Option<u64>,
    pub ipv6_flow: Option<u64>,
    pub ipv6pd_flow: Option<u64>,
    pub ipv4_verified: bool,
    pub ipv6_verified: bool,
    pub ipv6pd_verified: bool,
}

impl SessionTraffic {
    pub fn pending(&self) -> bool {
        (self.ipv4_flow.is_some() && !self.ipv4_verified)
            || (self.ipv6_flow.is_some() && !self.ipv6_verified)
            || (self.ipv6pd_flow.is_some() && !self.ipv6pd_verified)
    }

    pub fn mark_verified(&mut self, sub_type: FlowSubType) {
        match sub_type {
            FlowSubType::Ipv4 => self.ipv4_verified = true,
            FlowSubType::Ipv6 => self.ipv6_verified = true,
            FlowSubType::Ipv6Pd => self.ipv6pd_verified = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_detection_counts_single_loss_regardless_of_gap_size() {
        let mut flow = VerifierFlow::new(1);
        for seq in [1, 2, 3, 5, 6] {
            flow.on_receive(seq, 100, 64);
        }
        assert_eq!(flow.loss, 1);
        assert_eq!(flow.rx_last_seq, Some(6));
    }

    #[test]
    fn delay_bounds_hold_after_one_rx() {
        let mut flow = VerifierFlow::new(1);
        flow.on_receive(1, 500, 64);
        flow.on_receive(2, 100, 64);
        flow.on_receive(3, 900, 64);
        assert!(flow.min_delay_ns <= flow.avg_delay_ns());
        assert!(flow.avg_delay_ns() <= flow.max_delay_ns);
    }

    #[test]
    fn out_of_order_counts_as_loss_and_skips_min_update() {
        let mut flow = VerifierFlow::new(1);
        flow.on_receive(1, 500, 64);
        flow.on_receive(3, 10, 64); // gap: counts as loss
        flow.on_receive(2, 1, 64); // out of order relative to last=3
        assert_eq!(flow.loss, 2);
        assert_eq!(flow.min_delay_ns, 500, "out-of-order rx must not lower the floor");
    }

    #[test]
    fn generator_respects_target_rate() {
        let now = Instant::now();
        let template = FlowTemplate {
            flow_type: FlowType::Unicast,
            sub_type: FlowSubType::Ipv4,
            direction: Direction::Downstream,
            session_id: 1,
            outer_vlan: 0,
            inner_vlan: 0,
        };
        let mut flow = GeneratorFlow::new(1, template, 1000.0, now);
        let packets = flow.tick(now + Duration::from_millis(10), now, 1000);
        assert!(packets.len() >= 9 && packets.len() <= 11);
    }
}
