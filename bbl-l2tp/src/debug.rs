//
// L2TP debug logging, following the `Debug<'a>` + `.log()` pattern used
// throughout this workspace instead of scattering bare tracing calls.
//

use tracing::{debug, trace, warn};

use crate::session::SessionState;
use crate::tunnel::TunnelState;

#[derive(Debug)]
pub enum Debug<'a> {
    TunnelStateChange(u16, TunnelState, TunnelState),
    SessionStateChange(u16, u16, SessionState, SessionState),
    ControlTx(u16, &'static str, u16),
    ControlRx(u16, &'static str, u16),
    ControlDuplicate(u16, u16),
    ControlOutOfOrder(u16, u16, u16),
    Retransmit(u16, u16, u32),
    RetriesExhausted(u16, &'a str),
    HelloMissed(u16, u32),
}

impl Debug<'_> {
    pub fn log(&self) {
        match self {
            Debug::TunnelStateChange(tunnel_id, old, new) => {
                debug!(tunnel_id, ?old, ?new, "l2tp tunnel state change")
            }
            Debug::SessionStateChange(tunnel_id, session_id, old, new) => {
                debug!(tunnel_id, session_id, ?old, ?new, "l2tp session state change")
            }
            Debug::ControlTx(tunnel_id, message_type, ns) => {
                trace!(tunnel_id, message_type, ns, "l2tp control tx")
            }
            Debug::ControlRx(tunnel_id, message_type, ns) => {
                trace!(tunnel_id, message_type, ns, "l2tp control rx")
            }
            Debug::ControlDuplicate(tunnel_id, ns) => {
                trace!(tunnel_id, ns, "l2tp control duplicate dropped")
            }
            Debug::ControlOutOfOrder(tunnel_id, expected, got) => {
                debug!(tunnel_id, expected, got, "l2tp control out of order")
            }
            Debug::Retransmit(tunnel_id, ns, attempt) => {
                debug!(tunnel_id, ns, attempt, "l2tp control retransmit")
            }
            Debug::RetriesExhausted(tunnel_id, reason) => {
                warn!(tunnel_id, reason, "l2tp control retries exhausted")
            }
            Debug::HelloMissed(tunnel_id, missed) => {
                warn!(tunnel_id, missed, "l2tp hello reply missed")
            }
        }
    }
}
