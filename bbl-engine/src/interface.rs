//
// Interface port: a non-blocking send queue plus RX counters for one
// Ethernet interface. Raw packet I/O backends (AF_PACKET/DPDK/netmap)
// aren't implemented here - this module only defines the port contract
// those backends would implement, plus an in-memory loopback backend used
// by tests and by the A10NSP terminator to mirror traffic without a
// second real NIC.
//

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bbl_utils::config::InterfaceRole;
use bbl_utils::mac_addr::MacAddr;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendResult {
    Ok,
    Full,
    Error,
}

/// What a backend actually does with bytes. Modeled as a trait so the
/// engine's TX/RX tick logic never depends on a specific I/O mechanism.
pub trait InterfacePort {
    fn send(&mut self, frame: &[u8]) -> SendResult;
    fn try_recv(&mut self) -> Option<Vec<u8>>;
}

/// In-memory backend: frames written by `send` are immediately available to
/// whoever holds the other end. Used by unit/integration tests and by the
/// A10NSP terminator, which loops an access interface
/// back into itself rather than driving a second physical port.
#[derive(Default)]
pub struct LoopbackPort {
    inbound: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
    pub full: bool,
}

impl LoopbackPort {
    pub fn new() -> Self {
        LoopbackPort::default()
    }

    /// Injects a frame as if it had arrived from the wire.
    pub fn inject(&mut self, frame: Vec<u8>) {
        self.inbound.push_back(frame);
    }
}

impl InterfacePort for LoopbackPort {
    fn send(&mut self, frame: &[u8]) -> SendResult {
        if self.full {
            return SendResult::Full;
        }
        self.sent.push(frame.to_vec());
        SendResult::Ok
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.pop_front()
    }
}

/// Exponentially-weighted moving average over a fixed-size sliding window,
/// matching "counters ... rates averaged over a sliding window".
#[derive(Clone, Copy, Debug, Default)]
pub struct Ewma {
    value: f64,
    alpha: f64,
}

impl Ewma {
    pub fn new(alpha: f64) -> Self {
        Ewma { value: 0.0, alpha }
    }

    pub fn update(&mut self, sample: f64) {
        self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
    }

    pub fn get(&self) -> f64 {
        self.value
    }
}

#[derive(Default)]
pub struct InterfaceCounters {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub tx_dropped: u64,
    pub pps_rx: Ewma,
    pub pps_tx: Ewma,
    pub bps_rx: Ewma,
    pub bps_tx: Ewma,
}

/// Interval the EWMAs are sampled at.
pub const TX_TICK_INTERVAL: Duration = Duration::from_millis(1);

pub struct Interface<P: InterfacePort> {
    pub ifindex: u32,
    pub name: String,
    pub role: InterfaceRole,
    pub mac: MacAddr,
    pub counters: InterfaceCounters,
    port: P,
    tx_queue: VecDeque<Vec<u8>>,
    last_sample: Instant,
    sampled_rx_packets: u64,
    sampled_tx_packets: u64,
    sampled_rx_bytes: u64,
    sampled_tx_bytes: u64,
}

impl<P: InterfacePort> Interface<P> {
    pub fn new(ifindex: u32, name: String, role: InterfaceRole, mac: MacAddr, port: P, now: Instant) -> Self {
        Interface {
            ifindex,
            name,
            role,
            mac,
            counters: InterfaceCounters::default(),
            port,
            tx_queue: VecDeque::new(),
            last_sample: now,
            sampled_rx_packets: 0,
            sampled_tx_packets: 0,
            sampled_rx_bytes: 0,
            sampled_tx_bytes: 0,
        }
    }

    /// Queues a frame for transmission. Non-blocking: if the underlying
    /// port has no space the frame stays queued and is retried on the next
    /// `tx_tick`.
    pub fn send(&mut self, frame: Vec<u8>) {
        self.tx_queue.push_back(frame);
    }

    /// Drains as much of the TX queue as the backend accepts.
    pub fn tx_tick(&mut self) {
        while let Some(frame) = self.tx_queue.front() {
            match self.port.send(frame) {
                SendResult::Ok => {
                    let frame = self.tx_queue.pop_front().unwrap();
                    self.counters.tx_packets += 1;
                    self.counters.tx_bytes += frame.len() as u64;
                }
                SendResult::Full => break,
                SendResult::Error => {
                    self.tx_queue.pop_front();
                    self.counters.tx_dropped += 1;
                }
            }
        }
    }

    /// Drains every frame the backend has ready, updating RX counters.
    pub fn rx_tick(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.port.try_recv() {
            self.counters.rx_packets += 1;
            self.counters.rx_bytes += frame.len() as u64;
            frames.push(frame);
        }
        frames
    }

    /// Refreshes the pps/bps EWMAs. Called once per `sample_interval`.
    pub fn sample_rates(&mut self, now: Instant, sample_interval: Duration) {
        let elapsed = now.duration_since(self.last_sample).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        let d_rx_packets = (self.counters.rx_packets - self.sampled_rx_packets) as f64;
        let d_tx_packets = (self.counters.tx_packets - self.sampled_tx_packets) as f64;
        let d_rx_bytes = (self.counters.rx_bytes - self.sampled_rx_bytes) as f64;
        let d_tx_bytes = (self.counters.tx_bytes - self.sampled_tx_bytes) as f64;
        self.counters.pps_rx.update(d_rx_packets / elapsed);
        self.counters.pps_tx.update(d_tx_packets / elapsed);
        self.counters.bps_rx.update(d_rx_bytes * 8.0 / elapsed);
        self.counters.bps_tx.update(d_tx_bytes * 8.0 / elapsed);
        self.sampled_rx_packets = self.counters.rx_packets;
        self.sampled_tx_packets = self.counters.tx_packets;
        self.sampled_rx_bytes = self.counters.rx_bytes;
        self.sampled_tx_bytes = self.counters.tx_bytes;
        self.last_sample = now;
        let _ = sample_interval;
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_retries_while_full() {
        let mut iface = Interface::new(
            1,
            "eth1".into(),
            InterfaceRole::Access,
            MacAddr::from([2, 0, 0, 0, 0, 1]),
            LoopbackPort::new(),
            Instant::now(),
        );
        iface.port_mut().full = true;
        iface.send(vec![1, 2, 3]);
        iface.tx_tick();
        assert_eq!(iface.counters.tx_packets, 0);
        iface.port_mut().full = false;
        iface.tx_tick();
        assert_eq!(iface.counters.tx_packets, 1);
        assert_eq!(iface.counters.tx_bytes, 3);
    }

    #[test]
    fn rx_tick_drains_injected_frames() {
        let mut iface = Interface::new(
            1,
            "eth1".into(),
            InterfaceRole::Access,
            MacAddr::from([2, 0, 0, 0, 0, 1]),
            LoopbackPort::new(),
            Instant::now(),
        );
        iface.port_mut().inject(vec![1, 2, 3, 4]);
        iface.port_mut().inject(vec![5, 6]);
        let frames = iface.rx_tick();
        assert_eq!(frames.len(), 2);
        assert_eq!(iface.counters.rx_packets, 2);
        assert_eq!(iface.counters.rx_bytes, 6);
    }
}
