//! L2TPv2 LNS: tunnel/session state machines, the reliable
//! Ns/Nr control-channel transport, and control-message dispatch. Data
//! frames are handed back to the caller unparsed - the embedded PPP state
//! machine belongs to `bbl-engine`.

pub mod debug;
pub mod error;
pub mod server;
pub mod session;
pub mod tunnel;

pub use error::Error;
pub use server::{Datagram, Dispatched, Lns};
pub use session::{ProxyAuth, ProxyAuthType, Session, SessionState};
pub use tunnel::{ReceiveOutcome, Tunnel, TunnelState};

#[cfg(test)]
mod tests {
    use super::*;
    use bbl_packet::l2tp::{avp_bytes, avp_u16, ControlMessage, L2tpHeader, MessageType};
    use bbl_utils::config::L2tpServerConfig;
    use std::time::{Duration, Instant};

    fn test_cfg() -> L2tpServerConfig {
        L2tpServerConfig {
            local_address: "10.0.0.1".parse().unwrap(),
            secret: "l2tp-secret".into(),
            receive_window_size: 4,
            max_retries: 5,
            retry_timeout: Duration::from_millis(500),
            hello_interval: Duration::from_secs(30),
        }
    }

    fn encode(header: &L2tpHeader, message: &ControlMessage) -> Vec<u8> {
        let mut body = Vec::new();
        message.encode(&mut body);
        let mut frame = Vec::new();
        header.encode(&mut frame, body.len());
        frame.extend_from_slice(&body);
        frame
    }

    #[test]
    fn sccrq_brings_up_a_tunnel_and_replies_sccrp() {
        let mut lns = Lns::new(test_cfg(), "bngblaster-lns".into());
        let now = Instant::now();
        let sccrq = ControlMessage {
            message_type: MessageType::Sccrq,
            avps: vec![
                avp_u16(bbl_packet::l2tp::AVP_PROTOCOL_VERSION, 0x0100),
                avp_u16(bbl_packet::l2tp::AVP_ASSIGNED_TUNNEL_ID, 99),
            ],
        };
        let header = L2tpHeader {
            control: true,
            tunnel_id: 0,
            session_id: 0,
            ns: Some(0),
            nr: Some(0),
        };
        let frame = encode(&header, &sccrq);
        let dispatched = lns
            .handle_datagram(
                "192.0.2.1".parse().unwrap(),
                1701,
                bytes::Bytes::from(frame),
                now,
            )
            .unwrap();
        match dispatched {
            Dispatched::Control(datagrams) => {
                assert_eq!(datagrams.len(), 1);
                assert_eq!(lns.tunnels.len(), 1);
                let tunnel = lns.tunnels.values().next().unwrap();
                assert_eq!(tunnel.state, TunnelState::WaitCtlReply);
            }
            Dispatched::Data { .. } => panic!("expected control dispatch"),
        }
    }

    #[test]
    fn icrq_creates_a_session_awaiting_connect() {
        let mut tunnel = Tunnel::new(1, "192.0.2.1".parse().unwrap(), 1701, &test_cfg());
        tunnel.state_change(TunnelState::Established);
        let icrq = ControlMessage {
            message_type: MessageType::Icrq,
            avps: vec![
                avp_u16(bbl_packet::l2tp::AVP_ASSIGNED_SESSION_ID, 7),
                avp_bytes(bbl_packet::l2tp::AVP_CALL_SERIAL_NUMBER, &1u32.to_be_bytes()),
            ],
        };
        let mut next_session_id = 1u16;
        let cfg = test_cfg();
        let frames = Lns::dispatch_control(&mut tunnel, &cfg, icrq, Instant::now(), &mut next_session_id)
            .expect("dispatch ok");
        assert_eq!(frames.len(), 1);
        assert_eq!(tunnel.sessions.len(), 1);
        let session = tunnel.sessions.values().next().unwrap();
        assert_eq!(session.state, SessionState::WaitConnect);
        assert_eq!(session.peer_session_id, 7);
    }
}
