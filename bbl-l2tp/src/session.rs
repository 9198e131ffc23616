//
// L2TP session: per-call state plus the
// peer-attribute bag an ICRQ/ICCN exchange fills in (proxy auth, called/
// calling numbers, negotiated rx/tx bps). The embedded PPP session itself
// lives in `bbl-engine`, which holds sessions by `SessionKey`; this struct
// only tracks the L2TP-local call metadata and links back to it.
//

use crate::debug::Debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    WaitConnect,
    Established,
    SendCdn,
    Terminated,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProxyAuthType {
    Pap,
    Chap,
}

#[derive(Clone, Debug, Default)]
pub struct ProxyAuth {
    pub auth_type: Option<ProxyAuthType>,
    pub name: Option<String>,
    /// PAP: ASCII password. CHAP: opaque challenge response bytes.
    pub response: Option<Vec<u8>>,
}

pub struct Session {
    pub tunnel_id: u16,
    pub session_id: u16,
    pub peer_session_id: u16,
    pub state: SessionState,
    pub call_serial_number: u32,
    pub called_number: Option<String>,
    pub calling_number: Option<String>,
    pub proxy_auth: ProxyAuth,
    pub rx_connect_speed_bps: u32,
    pub tx_connect_speed_bps: u32,
}

impl Session {
    pub fn new(tunnel_id: u16, session_id: u16, call_serial_number: u32) -> Self {
        Session {
            tunnel_id,
            session_id,
            peer_session_id: 0,
            state: SessionState::Idle,
            call_serial_number,
            called_number: None,
            calling_number: None,
            proxy_auth: ProxyAuth::default(),
            rx_connect_speed_bps: 0,
            tx_connect_speed_bps: 0,
        }
    }

    pub fn state_change(&mut self, new_state: SessionState) {
        if self.state == new_state {
            return;
        }
        Debug::SessionStateChange(self.tunnel_id, self.session_id, self.state, new_state).log();
        self.state = new_state;
    }
}
