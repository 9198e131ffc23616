//
// Session/engine debug logging, following the `Debug<'a>` + `.log()`
// pattern used throughout this workspace (see bbl-l2tp, bbl-isis) instead
// of scattering bare tracing calls through the state machines.
//

use tracing::{debug, info, trace, warn};

use crate::session::{SessionState, SessionType};

#[derive(Debug)]
pub enum Debug<'a> {
    SessionEstablished(u32, SessionType),
    SessionTerminated(u32, &'a str),
    SessionStateChange(u32, &'static str, SessionState, SessionState),
    SubStateChange(u32, &'static str, &'a str, &'a str),
    PacketDropped(u32, &'a str),
    AuthFailure(u32, &'a str),
    ControlConnected(u32),
    ControlCommand(&'a str),
    A10nspMirror(u32, &'a str),
    TrafficFlowStart(u64, &'a str),
    TrafficLoss(u64, u64),
}

impl Debug<'_> {
    pub fn log(&self) {
        match self {
            Debug::SessionEstablished(id, ty) => {
                info!(session_id = id, session_type = ?ty, "session established")
            }
            Debug::SessionTerminated(id, reason) => {
                info!(session_id = id, reason, "session terminated")
            }
            Debug::SessionStateChange(id, machine, old, new) => {
                debug!(session_id = id, machine, ?old, ?new, "session state change")
            }
            Debug::SubStateChange(id, machine, old, new) => {
                debug!(session_id = id, machine, old, new, "sub state machine change")
            }
            Debug::PacketDropped(id, reason) => {
                trace!(session_id = id, reason, "packet dropped")
            }
            Debug::AuthFailure(id, reason) => {
                warn!(session_id = id, reason, "authentication failure")
            }
            Debug::ControlConnected(fd) => {
                trace!(fd, "control socket client connected")
            }
            Debug::ControlCommand(command) => {
                debug!(command, "control socket command")
            }
            Debug::A10nspMirror(id, what) => {
                trace!(session_id = id, what, "a10nsp terminator action")
            }
            Debug::TrafficFlowStart(flow_id, name) => {
                debug!(flow_id, name, "traffic flow started")
            }
            Debug::TrafficLoss(flow_id, lost) => {
                warn!(flow_id, lost, "traffic flow loss detected")
            }
        }
    }
}
