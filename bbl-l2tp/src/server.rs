//
// L2TP LNS server: owns every tunnel keyed by local
// `tunnel_id`, dispatches decoded control messages through each tunnel's
// reliable-transport layer, and drives the tunnel/session state machines.
//
// Data-channel frames (the PPP payload riding inside established sessions)
// are left to the caller - `header.control == false` packets are returned
// via `Frame::Data` rather than processed here, since the embedded PPP
// state machine lives in `bbl-engine`.
//

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Instant;

use bbl_packet::l2tp::{
    avp_bytes, avp_str, avp_u16, Avp, ControlMessage, L2tpHeader, MessageType,
    AVP_ASSIGNED_SESSION_ID, AVP_ASSIGNED_TUNNEL_ID, AVP_CALLING_NUMBER, AVP_CALL_SERIAL_NUMBER,
    AVP_CHALLENGE, AVP_CHALLENGE_RESPONSE, AVP_HOST_NAME, AVP_PROTOCOL_VERSION,
    AVP_PROXY_AUTHEN_NAME, AVP_PROXY_AUTHEN_RESPONSE, AVP_PROXY_AUTHEN_TYPE,
    AVP_RECEIVE_WINDOW_SIZE,
};
use bbl_utils::config::L2tpServerConfig;

use crate::error::Error;
use crate::session::{ProxyAuth, ProxyAuthType, Session, SessionState};
use crate::tunnel::{ReceiveOutcome, Tunnel, TunnelState};

pub struct Datagram {
    pub dest_addr: Ipv4Addr,
    pub dest_port: u16,
    pub bytes: Vec<u8>,
}

/// What the caller should do after handing a raw UDP payload to `Lns`.
pub enum Dispatched {
    /// Control-channel work was handled; send any returned datagrams.
    Control(Vec<Datagram>),
    /// A data frame for an established session; caller decodes the PPP
    /// payload itself via `bbl_packet::ppp`.
    Data { tunnel_id: u16, session_id: u16 },
}

pub struct Lns {
    cfg: L2tpServerConfig,
    hostname: String,
    pub tunnels: HashMap<u16, Tunnel>,
    next_tunnel_id: u16,
    next_session_id: u16,
}

impl Lns {
    pub fn new(cfg: L2tpServerConfig, hostname: String) -> Self {
        Lns {
            cfg,
            hostname,
            tunnels: HashMap::new(),
            next_tunnel_id: 1,
            next_session_id: 1,
        }
    }

    /// Lists every live tunnel id, for the control socket's
    /// `l2tp-tunnels` handler.
    pub fn tunnel_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.tunnels.keys().copied()
    }

    /// Administratively terminates a tunnel: queues a StopCCN and returns the datagram
    /// to send. Removal from `self.tunnels` happens once the StopCCN's
    /// retransmission window elapses (mirrored by the caller's next
    /// `retransmit_due` pass), matching the `SendStopCcn -> Terminated`
    /// state machine.
    pub fn terminate_tunnel(
        &mut self,
        tunnel_id: u16,
        result_code: u16,
        error_code: Option<u16>,
        error_message: Option<&str>,
        now: Instant,
    ) -> Result<Datagram, Error> {
        let tunnel = self
            .tunnels
            .get_mut(&tunnel_id)
            .ok_or(Error::NoSuchTunnel(tunnel_id))?;
        let bytes = tunnel.terminate(result_code, error_code, error_message, now);
        Ok(Datagram {
            dest_addr: tunnel.peer_addr,
            dest_port: tunnel.peer_port,
            bytes,
        })
    }

    /// Administratively terminates one session within a tunnel: queues a CDN.
    pub fn terminate_session(
        &mut self,
        tunnel_id: u16,
        session_id: u16,
        now: Instant,
    ) -> Result<Datagram, Error> {
        let tunnel = self
            .tunnels
            .get_mut(&tunnel_id)
            .ok_or(Error::NoSuchTunnel(tunnel_id))?;
        let bytes = tunnel
            .terminate_session(session_id, now)
            .ok_or(Error::NoSuchSession(session_id))?;
        Ok(Datagram {
            dest_addr: tunnel.peer_addr,
            dest_port: tunnel.peer_port,
            bytes,
        })
    }

    /// Queues a CSURQ requesting a call-status update.
    pub fn request_csurq(
        &mut self,
        tunnel_id: u16,
        session_ids: &[u16],
        now: Instant,
    ) -> Result<Datagram, Error> {
        let tunnel = self
            .tunnels
            .get_mut(&tunnel_id)
            .ok_or(Error::NoSuchTunnel(tunnel_id))?;
        let bytes = tunnel.request_csurq(session_ids, now);
        Ok(Datagram {
            dest_addr: tunnel.peer_addr,
            dest_port: tunnel.peer_port,
            bytes,
        })
    }

    pub fn handle_datagram(
        &mut self,
        peer_addr: Ipv4Addr,
        peer_port: u16,
        mut data: bytes::Bytes,
        now: Instant,
    ) -> Result<Dispatched, Error> {
        let (header, payload) =
            L2tpHeader::decode(&mut data).map_err(|_| Error::MissingAvp("l2tp header"))?;
        if !header.control {
            return Ok(Dispatched::Data {
                tunnel_id: header.tunnel_id,
                session_id: header.session_id,
            });
        }
        if payload.is_empty() {
            // bare ZLB: just an ack, already applied via the Nr check below.
            if let Some(tunnel) = self.tunnels.get_mut(&header.tunnel_id) {
                tunnel.receive_ack_only(&header);
            }
            return Ok(Dispatched::Control(vec![]));
        }
        let mut body = payload;
        let message = ControlMessage::decode(&mut body)
            .map_err(|_| Error::MissingAvp("l2tp control message"))?;

        if message.message_type == MessageType::Sccrq {
            return self.handle_sccrq(peer_addr, peer_port, &header, message, now);
        }

        let tunnel_id = header.tunnel_id;
        let tunnel = self
            .tunnels
            .get_mut(&tunnel_id)
            .ok_or(Error::NoSuchTunnel(tunnel_id))?;
        let mut out = Vec::new();
        match tunnel.receive(&header, message) {
            ReceiveOutcome::Duplicate => {}
            ReceiveOutcome::Buffered => {
                out.push(tunnel.zlb_ack());
            }
            ReceiveOutcome::InOrder(message) => {
                let mut ready = vec![message];
                ready.extend(tunnel.drain_ready());
                for message in ready {
                    out.extend(Self::dispatch_control(
                        tunnel,
                        &self.cfg,
                        message,
                        now,
                        &mut self.next_session_id,
                    )?);
                }
            }
        }
        let datagrams = out
            .into_iter()
            .map(|bytes| Datagram {
                dest_addr: tunnel.peer_addr,
                dest_port: tunnel.peer_port,
                bytes,
            })
            .collect();
        Ok(Dispatched::Control(datagrams))
    }

    fn handle_sccrq(
        &mut self,
        peer_addr: Ipv4Addr,
        peer_port: u16,
        header: &L2tpHeader,
        message: ControlMessage,
        now: Instant,
    ) -> Result<Dispatched, Error> {
        let peer_tunnel_id = message
            .avp(AVP_ASSIGNED_TUNNEL_ID)
            .map(|a| u16::from_be_bytes([a.value[0], a.value[1]]))
            .ok_or(Error::MissingAvp("assigned tunnel id"))?;
        let tunnel_id = self.next_tunnel_id;
        self.next_tunnel_id = self.next_tunnel_id.wrapping_add(1).max(1);
        let mut tunnel = Tunnel::new(tunnel_id, peer_addr, peer_port, &self.cfg);
        tunnel.peer_tunnel_id = peer_tunnel_id;
        // consume the peer's Ns=0 (the SCCRQ itself) so our Nr tracks it.
        tunnel.receive(header, ControlMessage { message_type: MessageType::Sccrq, avps: vec![] });

        let challenge: Vec<u8> = (0..16).map(|i| (i * 7) as u8).collect();
        let response_avp = message
            .avp(AVP_CHALLENGE)
            .map(|a| {
                let digest = bbl_utils::crypto::chap_response(1, tunnel.secret.as_bytes(), &a.value);
                avp_bytes(AVP_CHALLENGE_RESPONSE, &digest)
            });
        tunnel.challenge = Some(challenge.clone());

        let mut avps = vec![
            avp_u16(AVP_PROTOCOL_VERSION, 0x0100),
            avp_str(AVP_HOST_NAME, &self.hostname),
            avp_u16(AVP_ASSIGNED_TUNNEL_ID, tunnel_id),
            avp_u16(AVP_RECEIVE_WINDOW_SIZE, self.cfg.receive_window_size),
            avp_bytes(AVP_CHALLENGE, &challenge),
        ];
        if let Some(r) = response_avp {
            avps.push(r);
        }
        let sccrp = ControlMessage {
            message_type: MessageType::Sccrp,
            avps,
        };
        let frame = tunnel.queue_control(sccrp, now);
        tunnel.state_change(TunnelState::WaitCtlReply);
        let datagram = Datagram {
            dest_addr: tunnel.peer_addr,
            dest_port: tunnel.peer_port,
            bytes: frame,
        };
        self.tunnels.insert(tunnel_id, tunnel);
        Ok(Dispatched::Control(vec![datagram]))
    }

    pub(crate) fn dispatch_control(
        tunnel: &mut Tunnel,
        cfg: &L2tpServerConfig,
        message: ControlMessage,
        now: Instant,
        next_session_id: &mut u16,
    ) -> Result<Vec<Vec<u8>>, Error> {
        let _ = cfg;
        let mut out = Vec::new();
        match message.message_type {
            MessageType::Scccn => {
                if let Some(expected) = &tunnel.challenge {
                    if let Some(response) = message.avp(AVP_CHALLENGE_RESPONSE) {
                        let digest =
                            bbl_utils::crypto::chap_response(1, tunnel.secret.as_bytes(), expected);
                        if digest.as_slice() != response.value.as_slice() {
                            return Err(Error::AuthenticationFailed);
                        }
                    }
                }
                tunnel.state_change(TunnelState::Established);
            }
            MessageType::Icrq => {
                let call_serial = message
                    .avp(AVP_CALL_SERIAL_NUMBER)
                    .map(|a| u32::from_be_bytes([a.value[0], a.value[1], a.value[2], a.value[3]]))
                    .unwrap_or(0);
                let session_id = *next_session_id;
                *next_session_id = next_session_id.wrapping_add(1).max(1);
                let peer_session_id = message
                    .avp(AVP_ASSIGNED_SESSION_ID)
                    .map(|a| u16::from_be_bytes([a.value[0], a.value[1]]))
                    .ok_or(Error::MissingAvp("assigned session id"))?;
                let mut session = Session::new(tunnel.tunnel_id, session_id, call_serial);
                session.peer_session_id = peer_session_id;
                session.calling_number = message
                    .avp(AVP_CALLING_NUMBER)
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                session.state_change(SessionState::WaitConnect);
                tunnel.sessions.insert(session_id, session);

                let icrp = ControlMessage {
                    message_type: MessageType::Icrp,
                    avps: vec![avp_u16(AVP_ASSIGNED_SESSION_ID, session_id)],
                };
                out.push(tunnel.queue_control(icrp, now));
            }
            MessageType::Iccn => {
                let session_id = tunnel
                    .sessions
                    .iter()
                    .find(|(_, s)| s.state == SessionState::WaitConnect)
                    .map(|(id, _)| *id)
                    .ok_or(Error::NoSuchSession(0))?;
                if let Some(session) = tunnel.sessions.get_mut(&session_id) {
                    if let Some(auth_type) = message.avp(AVP_PROXY_AUTHEN_TYPE) {
                        let type_code = auth_type
                            .value
                            .get(0..2)
                            .map(|v| u16::from_be_bytes([v[0], v[1]]))
                            .unwrap_or(0);
                        session.proxy_auth = ProxyAuth {
                            auth_type: Some(if type_code == 2 {
                                ProxyAuthType::Chap
                            } else {
                                ProxyAuthType::Pap
                            }),
                            name: message
                                .avp(AVP_PROXY_AUTHEN_NAME)
                                .map(|a| String::from_utf8_lossy(&a.value).into_owned()),
                            response: message.avp(AVP_PROXY_AUTHEN_RESPONSE).map(|a| a.value.clone()),
                        };
                    }
                    session.state_change(SessionState::Established);
                }
            }
            MessageType::Cdn => {
                if let Some(session_id) = find_session_by_result(&message) {
                    if let Some(session) = tunnel.sessions.get_mut(&session_id) {
                        session.state_change(SessionState::Terminated);
                    }
                    tunnel.sessions.remove(&session_id);
                }
            }
            MessageType::StopCcn => {
                tunnel.state_change(TunnelState::Terminated);
            }
            MessageType::Hello => {
                out.push(tunnel.zlb_ack());
            }
            MessageType::Csurq => {
                for session_id in message
                    .avps
                    .iter()
                    .filter(|a| a.attr_type == AVP_ASSIGNED_SESSION_ID)
                    .filter_map(|a| a.value.get(0..2))
                    .map(|v| u16::from_be_bytes([v[0], v[1]]))
                {
                    let avps = vec![avp_u16(AVP_ASSIGNED_SESSION_ID, session_id)];
                    out.push(tunnel.queue_control(
                        ControlMessage {
                            message_type: MessageType::Csun,
                            avps,
                        },
                        now,
                    ));
                }
            }
            MessageType::Wen | MessageType::Csun | MessageType::Sccrp | MessageType::Sccrq => {}
        }
        Ok(out)
    }
}

fn find_session_by_result(message: &ControlMessage) -> Option<u16> {
    message
        .avp(AVP_ASSIGNED_SESSION_ID)
        .and_then(|a: &Avp| a.value.get(0..2))
        .map(|v| u16::from_be_bytes([v[0], v[1]]))
}
