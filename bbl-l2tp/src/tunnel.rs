//
// L2TP LNS tunnel: control-channel reliable transport (Ns/Nr
// sequencing, reorder buffer, retransmission with exponential backoff) plus
// the tunnel-level Idle -> WaitCtlReply -> Established -> SendStopCcn ->
// Terminated state machine.
//

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use bbl_packet::l2tp::{
    avp_bytes, avp_u16, ControlMessage, L2tpHeader, MessageType, AVP_ASSIGNED_SESSION_ID,
    AVP_RESULT_CODE,
};
use bbl_timer::TimerHandle;
use bbl_utils::config::L2tpServerConfig;

use crate::debug::Debug;
use crate::error::Error;
use crate::session::{Session, SessionState};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TunnelState {
    Idle,
    WaitCtlReply,
    Established,
    SendStopCcn,
    Terminated,
}

struct PendingMessage {
    ns: u16,
    body: Vec<u8>,
    sent_at: Instant,
    attempt: u32,
}

/// Outcome of offering a just-received control message to the reliable
/// transport layer.
#[derive(Debug, Eq, PartialEq)]
pub enum ReceiveOutcome {
    /// Deliverable now, in order. May be followed by buffered messages that
    /// became deliverable as a result; call `drain_ready` to collect them.
    InOrder(ControlMessage),
    /// Ns is ahead of what we expect; buffered until the gap closes.
    Buffered,
    /// Already seen; counted and dropped.
    Duplicate,
}

pub struct Tunnel {
    pub tunnel_id: u16,
    pub peer_tunnel_id: u16,
    pub peer_addr: Ipv4Addr,
    pub peer_port: u16,
    pub state: TunnelState,
    ns: u16,
    nr: u16,
    window_size: u16,
    reorder_buffer: BTreeMap<u16, ControlMessage>,
    unacked: VecDeque<PendingMessage>,
    max_retries: u32,
    retry_timeout: Duration,
    pub hello_interval: Duration,
    pub secret: String,
    pub challenge: Option<Vec<u8>>,
    pub challenge_response: Option<[u8; 16]>,
    pub sessions: HashMap<u16, Session>,
    pub hello_timer: Option<TimerHandle>,
    pub control_rx_ooo: u64,
    pub control_rx_duplicate: u64,
    pub result_code: Option<u16>,
    pub error_code: Option<u16>,
    pub error_message: Option<String>,
}

impl Tunnel {
    pub fn new(
        tunnel_id: u16,
        peer_addr: Ipv4Addr,
        peer_port: u16,
        cfg: &L2tpServerConfig,
    ) -> Self {
        Tunnel {
            tunnel_id,
            peer_tunnel_id: 0,
            peer_addr,
            peer_port,
            state: TunnelState::Idle,
            ns: 0,
            nr: 0,
            window_size: cfg.receive_window_size,
            reorder_buffer: BTreeMap::new(),
            unacked: VecDeque::new(),
            max_retries: cfg.max_retries,
            retry_timeout: cfg.retry_timeout,
            hello_interval: cfg.hello_interval,
            secret: cfg.secret.clone(),
            challenge: None,
            challenge_response: None,
            sessions: HashMap::new(),
            hello_timer: None,
            control_rx_ooo: 0,
            control_rx_duplicate: 0,
            result_code: None,
            error_code: None,
            error_message: None,
        }
    }

    pub fn state_change(&mut self, new_state: TunnelState) {
        if self.state == new_state {
            return;
        }
        Debug::TunnelStateChange(self.tunnel_id, self.state, new_state).log();
        self.state = new_state;
    }

    /// Encodes `message` with the current Ns/Nr, appends it to the unacked
    /// list, and returns the full wire frame (header + body) ready to send.
    pub fn queue_control(&mut self, message: ControlMessage, now: Instant) -> Vec<u8> {
        let mut body = Vec::new();
        message.encode(&mut body);
        let header = L2tpHeader {
            control: true,
            tunnel_id: self.peer_tunnel_id,
            session_id: 0,
            ns: Some(self.ns),
            nr: Some(self.nr),
        };
        let mut frame = Vec::new();
        header.encode(&mut frame, body.len());
        frame.extend_from_slice(&body);
        Debug::ControlTx(self.tunnel_id, message_type_name(message.message_type), self.ns).log();
        self.unacked.push_back(PendingMessage {
            ns: self.ns,
            body,
            sent_at: now,
            attempt: 0,
        });
        self.ns = self.ns.wrapping_add(1);
        frame
    }

    /// Sends a bare ZLB (zero-length body) acknowledgement carrying only
    /// the current Nr, with no Ns advance of its own.
    pub fn zlb_ack(&self) -> Vec<u8> {
        let header = L2tpHeader {
            control: true,
            tunnel_id: self.peer_tunnel_id,
            session_id: 0,
            ns: Some(self.ns),
            nr: Some(self.nr),
        };
        let mut frame = Vec::new();
        header.encode(&mut frame, 0);
        frame
    }

    /// Offers a received control header+Ns/Nr to the reordering window,
    /// acknowledges everything the peer's Nr confirms, and reports whether
    /// the decoded message is immediately deliverable.
    pub fn receive(&mut self, header: &L2tpHeader, message: ControlMessage) -> ReceiveOutcome {
        if let Some(peer_nr) = header.nr {
            self.unacked.retain(|p| !seq_lt(p.ns, peer_nr));
        }
        let Some(peer_ns) = header.ns else {
            return ReceiveOutcome::Duplicate;
        };
        if seq_lt(peer_ns, self.nr) {
            self.control_rx_duplicate += 1;
            Debug::ControlDuplicate(self.tunnel_id, peer_ns).log();
            return ReceiveOutcome::Duplicate;
        }
        if peer_ns != self.nr {
            if self.reorder_buffer.len() < self.window_size as usize {
                self.reorder_buffer.insert(peer_ns, message);
            }
            self.control_rx_ooo += 1;
            Debug::ControlOutOfOrder(self.tunnel_id, self.nr, peer_ns).log();
            return ReceiveOutcome::Buffered;
        }
        Debug::ControlRx(self.tunnel_id, message_type_name(message.message_type), peer_ns).log();
        self.nr = self.nr.wrapping_add(1);
        ReceiveOutcome::InOrder(message)
    }

    /// Drains any buffered messages that became deliverable once `receive`
    /// advanced `nr` past a gap.
    pub fn drain_ready(&mut self) -> Vec<ControlMessage> {
        let mut out = Vec::new();
        while let Some(message) = self.reorder_buffer.remove(&self.nr) {
            out.push(message);
            self.nr = self.nr.wrapping_add(1);
        }
        out
    }

    /// Re-encodes every unacked message still due for retry with the
    /// current Nr, applying exponential backoff up to `retry_timeout` as
    /// the ceiling. Returns `Error::RetriesExhausted` once any message has
    /// exceeded `max_retries` - the caller tears the tunnel down.
    pub fn retransmit_due(&mut self, now: Instant) -> Result<Vec<Vec<u8>>, Error> {
        let mut frames = Vec::new();
        for pending in self.unacked.iter_mut() {
            let backoff = self.retry_timeout * 2u32.pow(pending.attempt.min(5));
            if now.duration_since(pending.sent_at) < backoff {
                continue;
            }
            if pending.attempt >= self.max_retries {
                Debug::RetriesExhausted(self.tunnel_id, "control channel").log();
                return Err(Error::RetriesExhausted);
            }
            pending.attempt += 1;
            pending.sent_at = now;
            Debug::Retransmit(self.tunnel_id, pending.ns, pending.attempt).log();
            let header = L2tpHeader {
                control: true,
                tunnel_id: self.peer_tunnel_id,
                session_id: 0,
                ns: Some(pending.ns),
                nr: Some(self.nr),
            };
            let mut frame = Vec::new();
            header.encode(&mut frame, pending.body.len());
            frame.extend_from_slice(&pending.body);
            frames.push(frame);
        }
        Ok(frames)
    }

    pub fn has_unacked(&self) -> bool {
        !self.unacked.is_empty()
    }

    /// Administratively tears the tunnel down: queues a StopCCN carrying `result_code`
    /// and the optional error code/message, and moves the tunnel to
    /// `SendStopCcn`. The caller removes the tunnel once the datagram is
    /// flushed.
    pub fn terminate(
        &mut self,
        result_code: u16,
        error_code: Option<u16>,
        error_message: Option<&str>,
        now: Instant,
    ) -> Vec<u8> {
        let mut value = result_code.to_be_bytes().to_vec();
        if let Some(error_code) = error_code {
            value.extend_from_slice(&error_code.to_be_bytes());
            if let Some(message) = error_message {
                value.extend_from_slice(message.as_bytes());
            }
        }
        self.result_code = Some(result_code);
        self.error_code = error_code;
        self.error_message = error_message.map(str::to_owned);
        let stopccn = ControlMessage {
            message_type: MessageType::StopCcn,
            avps: vec![avp_bytes(AVP_RESULT_CODE, &value)],
        };
        let frame = self.queue_control(stopccn, now);
        self.state_change(TunnelState::SendStopCcn);
        frame
    }

    /// Administratively tears a single call down with a CDN. Returns `None` if no such session exists
    /// in this tunnel.
    pub fn terminate_session(&mut self, session_id: u16, now: Instant) -> Option<Vec<u8>> {
        let session = self.sessions.get_mut(&session_id)?;
        session.state_change(SessionState::SendCdn);
        let peer_session_id = session.peer_session_id;
        let cdn = ControlMessage {
            message_type: MessageType::Cdn,
            avps: vec![
                avp_u16(AVP_ASSIGNED_SESSION_ID, peer_session_id),
                avp_u16(AVP_RESULT_CODE, 1),
            ],
        };
        let frame = self.queue_control(cdn, now);
        self.sessions.remove(&session_id);
        Some(frame)
    }

    /// Queues a CSURQ requesting a call-status update for `session_ids`
    /// ("CSURQ (call status update) may carry a list of
    /// session ids to query").
    pub fn request_csurq(&mut self, session_ids: &[u16], now: Instant) -> Vec<u8> {
        let avps = session_ids
            .iter()
            .map(|id| avp_u16(AVP_ASSIGNED_SESSION_ID, *id))
            .collect();
        self.queue_control(
            ControlMessage {
                message_type: MessageType::Csurq,
                avps,
            },
            now,
        )
    }

    /// Applies a bare ZLB's Nr to the unacked list without touching Ns/Nr
    /// sequencing (a ZLB carries no payload and is never itself sequenced).
    pub fn receive_ack_only(&mut self, header: &L2tpHeader) {
        if let Some(peer_nr) = header.nr {
            self.unacked.retain(|p| !seq_lt(p.ns, peer_nr));
        }
    }
}

fn seq_lt(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) < 0
}

fn message_type_name(mt: MessageType) -> &'static str {
    match mt {
        MessageType::Sccrq => "SCCRQ",
        MessageType::Sccrp => "SCCRP",
        MessageType::Scccn => "SCCCN",
        MessageType::StopCcn => "StopCCN",
        MessageType::Hello => "HELLO",
        MessageType::Icrq => "ICRQ",
        MessageType::Icrp => "ICRP",
        MessageType::Iccn => "ICCN",
        MessageType::Cdn => "CDN",
        MessageType::Wen => "WEN",
        MessageType::Csun => "CSUN",
        MessageType::Csurq => "CSURQ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbl_packet::l2tp::avp_u16;

    fn test_cfg() -> L2tpServerConfig {
        L2tpServerConfig {
            local_address: "10.0.0.1".parse().unwrap(),
            secret: "secret".into(),
            receive_window_size: 4,
            max_retries: 3,
            retry_timeout: Duration::from_millis(100),
            hello_interval: Duration::from_secs(30),
        }
    }

    #[test]
    fn out_of_order_messages_buffer_until_gap_closes() {
        let mut t = Tunnel::new(1, "10.0.0.2".parse().unwrap(), 1701, &test_cfg());
        let msg = |mt| ControlMessage {
            message_type: mt,
            avps: vec![avp_u16(bbl_packet::l2tp::AVP_ASSIGNED_TUNNEL_ID, 7)],
        };
        let hdr = |ns| L2tpHeader {
            control: true,
            tunnel_id: 1,
            session_id: 0,
            ns: Some(ns),
            nr: Some(0),
        };
        // ns=1 arrives before ns=0: buffered.
        assert_eq!(
            t.receive(&hdr(1), msg(MessageType::Sccrp)),
            ReceiveOutcome::Buffered
        );
        assert_eq!(t.control_rx_ooo, 1);
        // ns=0 arrives: delivered in order, and draining now yields ns=1 too.
        match t.receive(&hdr(0), msg(MessageType::Sccrq)) {
            ReceiveOutcome::InOrder(m) => assert_eq!(m.message_type, MessageType::Sccrq),
            other => panic!("expected in order, got {other:?}"),
        }
        let drained = t.drain_ready();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].message_type, MessageType::Sccrp);
    }

    #[test]
    fn duplicate_message_is_dropped_and_counted() {
        let mut t = Tunnel::new(1, "10.0.0.2".parse().unwrap(), 1701, &test_cfg());
        let msg = ControlMessage {
            message_type: MessageType::Sccrq,
            avps: vec![],
        };
        let hdr0 = L2tpHeader {
            control: true,
            tunnel_id: 1,
            session_id: 0,
            ns: Some(0),
            nr: Some(0),
        };
        assert!(matches!(t.receive(&hdr0, msg.clone()), ReceiveOutcome::InOrder(_)));
        assert_eq!(t.receive(&hdr0, msg), ReceiveOutcome::Duplicate);
        assert_eq!(t.control_rx_duplicate, 1);
    }

    #[test]
    fn retransmit_backs_off_and_eventually_exhausts() {
        let mut t = Tunnel::new(1, "10.0.0.2".parse().unwrap(), 1701, &test_cfg());
        let now = Instant::now();
        t.queue_control(
            ControlMessage {
                message_type: MessageType::Sccrq,
                avps: vec![],
            },
            now,
        );
        for _ in 0..3 {
            let later = now + Duration::from_secs(10);
            let frames = t.retransmit_due(later).unwrap();
            assert_eq!(frames.len(), 1);
        }
        let later = now + Duration::from_secs(20);
        assert!(matches!(t.retransmit_due(later), Err(Error::RetriesExhausted)));
    }

    #[test]
    fn ack_via_nr_clears_unacked() {
        let mut t = Tunnel::new(1, "10.0.0.2".parse().unwrap(), 1701, &test_cfg());
        let now = Instant::now();
        t.queue_control(
            ControlMessage {
                message_type: MessageType::Sccrq,
                avps: vec![],
            },
            now,
        );
        assert!(t.has_unacked());
        let ack_hdr = L2tpHeader {
            control: true,
            tunnel_id: 1,
            session_id: 0,
            ns: Some(0),
            nr: Some(1),
        };
        t.receive(
            &ack_hdr,
            ControlMessage {
                message_type: MessageType::Sccrp,
                avps: vec![],
            },
        );
        assert!(!t.has_unacked());
    }
}
