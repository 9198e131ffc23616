//
// JSON control socket: a single-line JSON request/response protocol the
// daemon's Unix-domain listener feeds every
// accepted connection through. Kept as a pure function over `&mut Context`
// so it can be unit tested without a real socket - the listener itself
// (accept/read/write) lives in the `bngblasterd` binary.
//
// Dispatch is table-driven: a single `match` over command names, each
// arm calling its handler function - functionally a name-to-handler
// mapping the way a static action table would be.
//

use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};

use bbl_isis::Level;
use bbl_packet::bbl::{Direction, FlowSubType};
use bbl_utils::config::InterfaceRole;
use bbl_utils::session_key::SessionKey;

use crate::context::Context;
use crate::debug::Debug;
use crate::session::SessionType;

/// HTTP-like status codes the control socket reports.
#[allow(dead_code)]
mod code {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 408;
    pub const RESOURCE: u16 = 409;
    pub const INTERNAL: u16 = 500;
    pub const NOT_IMPLEMENTED: u16 = 501;
}

#[derive(Serialize)]
struct Response {
    status: &'static str,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

impl Response {
    fn ok(fields: serde_json::Map<String, Value>) -> Response {
        Response {
            status: "ok",
            code: code::OK,
            message: None,
            fields,
        }
    }

    fn ok_empty() -> Response {
        Response::ok(serde_json::Map::new())
    }

    fn error(code: u16, message: impl Into<String>) -> Response {
        Response {
            status: "error",
            code,
            message: Some(message.into()),
            fields: serde_json::Map::new(),
        }
    }

    fn warning(code: u16, message: impl Into<String>) -> Response {
        Response {
            status: "warning",
            code,
            message: Some(message.into()),
            fields: serde_json::Map::new(),
        }
    }

    fn into_json(self) -> String {
        serde_json::to_string(&self).unwrap_or_else(|_| {
            r#"{"status":"error","code":500,"message":"response serialization failed"}"#.into()
        })
    }
}

impl From<crate::error::Error> for Response {
    fn from(err: crate::error::Error) -> Response {
        use crate::error::Error;
        let code = match err {
            Error::NoSuchSession(_)
            | Error::NoSuchInterface(_)
            | Error::NoSuchTunnel(_)
            | Error::NoSuchL2tpSession(_)
            | Error::NoSuchFlow(_)
            | Error::GroupNotFound => code::NOT_FOUND,
            Error::DuplicateKey(_) | Error::GroupAlreadyActive | Error::NoGroupSlot => code::RESOURCE,
            Error::UnexpectedState { .. } | Error::GroupInUseByZapping | Error::NotPppoe => code::CONFLICT,
            Error::IsisNotConfigured => code::BAD_REQUEST,
            Error::PoolExhausted | Error::AuthenticationFailed | Error::L2tp(_) | Error::Isis(_) => {
                code::INTERNAL
            }
        };
        Response::error(code, err.to_string())
    }
}

/// Processes one request line and returns the JSON response line to write
/// back. Never panics on malformed input - a bad request becomes a 400
/// response rather than aborting the connection.
pub fn dispatch(ctx: &mut Context, line: &str, now: Instant) -> String {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Response::error(code::BAD_REQUEST, format!("malformed request: {e}")).into_json(),
    };
    Debug::ControlCommand(&request.command).log();
    let args = &request.arguments;
    let response = match request.command.as_str() {
        "interfaces" => interfaces(ctx),
        "session-terminate" => session_terminate(ctx, args),
        "sessions-terminate" => {
            ctx.terminate_all();
            Response::ok_empty()
        }
        "session-info" => session_info(ctx, args, now),
        "session-counters" => session_counters(ctx, args),
        "sessions-pending" => sessions_pending(ctx),
        "ipcp-open" => resolve(ctx, args).and_then(|id| ctx.open_ipcp(id).map_err(Response::from)).unwrap_or_else(|r| r),
        "ipcp-close" => resolve(ctx, args).and_then(|id| ctx.close_ipcp(id).map_err(Response::from)).unwrap_or_else(|r| r),
        "ip6cp-open" => resolve(ctx, args).and_then(|id| ctx.open_ip6cp(id).map_err(Response::from)).unwrap_or_else(|r| r),
        "ip6cp-close" => resolve(ctx, args).and_then(|id| ctx.close_ip6cp(id).map_err(Response::from)).unwrap_or_else(|r| r),
        "igmp-join" => igmp_join(ctx, args, now),
        "igmp-leave" => igmp_leave(ctx, args, now),
        "igmp-info" => igmp_info(ctx, args),
        "l2tp-tunnels" => l2tp_tunnels(ctx),
        "l2tp-sessions" => l2tp_sessions(ctx, args),
        "l2tp-tunnel-terminate" => l2tp_tunnel_terminate(ctx, args, now),
        "l2tp-session-terminate" => l2tp_session_terminate(ctx, args, now),
        "l2tp-csurq" => l2tp_csurq(ctx, args, now),
        "stream-info" => stream_info(ctx, args),
        "stream-stats" => stream_stats(ctx, args),
        "stream-enable" => stream_set_enabled(ctx, args, true),
        "stream-disable" => stream_set_enabled(ctx, args, false),
        "cfm-cc-start" => cfm_set(ctx, args, now, |cfm, now| {
            cfm.enabled = true;
            cfm.last_defect = None;
            let _ = now;
        }),
        "cfm-cc-stop" => cfm_set(ctx, args, now, |cfm, _| cfm.enabled = false),
        "cfm-cc-rdi-on" => cfm_set(ctx, args, now, |cfm, now| {
            cfm.rdi = true;
            cfm.last_defect = Some(now);
        }),
        "cfm-cc-rdi-off" => cfm_set(ctx, args, now, |cfm, _| cfm.rdi = false),
        "traffic-start" => {
            ctx.traffic_start(now);
            Response::ok_empty()
        }
        "traffic-stop" => {
            ctx.traffic_stop();
            Response::ok_empty()
        }
        "multicast-traffic-start" => {
            ctx.multicast_traffic = true;
            Response::ok_empty()
        }
        "multicast-traffic-stop" => {
            ctx.multicast_traffic = false;
            Response::ok_empty()
        }
        "isis-adjacencies" => isis_adjacencies(ctx),
        "isis-database" => isis_database(ctx, args),
        "isis-load-mrt" => isis_load_mrt(ctx, args, now),
        "isis-external-lsp-update" => isis_external_lsp_update(ctx, args, now),
        other => Response::error(code::BAD_REQUEST, format!("unknown command '{other}'")),
    };
    response.into_json()
}

#[derive(serde::Deserialize)]
struct Request {
    command: String,
    #[serde(default)]
    arguments: Value,
}

/// Resolves a session id from `arguments`, accepting either a direct
/// `session-id` or the backward-compatible `(ifindex, outer-vlan,
/// inner-vlan)` tuple. `ifindex` may be omitted when there is
/// exactly one configured access interface.
fn resolve(ctx: &Context, args: &Value) -> Result<u32, Response> {
    if let Some(id) = args.get("session-id").and_then(Value::as_u64) {
        return ctx
            .registry
            .get(id as u32)
            .map(|_| id as u32)
            .ok_or_else(|| Response::warning(code::NOT_FOUND, format!("no such session {id}")));
    }
    let outer = args.get("outer-vlan").and_then(Value::as_u64);
    let inner = args.get("inner-vlan").and_then(Value::as_u64);
    if let (Some(outer), Some(inner)) = (outer, inner) {
        let ifindex = args
            .get("ifindex")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .or_else(|| {
                ctx.interfaces
                    .values()
                    .find(|i| i.role == InterfaceRole::Access)
                    .map(|i| i.ifindex)
            })
            .unwrap_or(0);
        let key = SessionKey::new(ifindex, outer as u16, inner as u16);
        return ctx
            .registry
            .resolve_id(&key)
            .ok_or_else(|| Response::warning(code::NOT_FOUND, "no session matches that key"));
    }
    Err(Response::error(
        code::BAD_REQUEST,
        "expected 'session-id' or 'outer-vlan'/'inner-vlan'",
    ))
}

fn interfaces(ctx: &Context) -> Response {
    let list: Vec<Value> = ctx
        .interfaces
        .values()
        .map(|i| {
            json!({
                "ifindex": i.ifindex,
                "name": i.name,
                "role": format!("{:?}", i.role),
                "rx-packets": i.counters.rx_packets,
                "tx-packets": i.counters.tx_packets,
            })
        })
        .collect();
    let mut fields = serde_json::Map::new();
    fields.insert("interfaces".into(), Value::Array(list));
    Response::ok(fields)
}

fn session_terminate(ctx: &mut Context, args: &Value) -> Response {
    match resolve(ctx, args) {
        Ok(id) => match ctx.terminate_session(id) {
            Ok(()) => Response::ok_empty(),
            Err(e) => Response::from(e),
        },
        Err(r) => r,
    }
}

fn session_info(ctx: &Context, args: &Value, now: Instant) -> Response {
    let id = match resolve(ctx, args) {
        Ok(id) => id,
        Err(r) => return r,
    };
    let session = ctx.registry.get(id).unwrap();
    let mut fields = serde_json::Map::new();
    fields.insert("session-id".into(), json!(id));
    fields.insert(
        "session-type".into(),
        json!(match session.session_type {
            SessionType::Pppoe => "pppoe",
            SessionType::Ipoe => "ipoe",
        }),
    );
    fields.insert("state".into(), json!(format!("{:?}", session.state)));
    fields.insert("outer-vlan".into(), json!(session.key.outer_vlan));
    fields.insert("inner-vlan".into(), json!(session.key.inner_vlan));
    fields.insert("ipv4-address".into(), json!(session.address.ipv4.map(|a| a.to_string())));
    fields.insert(
        "uptime-seconds".into(),
        json!(session
            .established_at
            .map(|at| now.saturating_duration_since(at).as_secs())),
    );
    Response::ok(fields)
}

fn session_counters(ctx: &Context, args: &Value) -> Response {
    let id = match resolve(ctx, args) {
        Ok(id) => id,
        Err(r) => return r,
    };
    let session = ctx.registry.get(id).unwrap();
    let mut fields = serde_json::Map::new();
    fields.insert("session-id".into(), json!(id));
    fields.insert("rx-packets".into(), json!(session.stats.rx_packets));
    fields.insert("tx-packets".into(), json!(session.stats.tx_packets));
    fields.insert("rx-bytes".into(), json!(session.stats.rx_bytes));
    fields.insert("tx-bytes".into(), json!(session.stats.tx_bytes));
    fields.insert("flapped".into(), json!(session.stats.flapped));
    Response::ok(fields)
}

fn sessions_pending(ctx: &Context) -> Response {
    let pending: Vec<u32> = ctx
        .registry
        .iter()
        .filter(|s| s.traffic.pending())
        .map(|s| s.session_id)
        .collect();
    let mut fields = serde_json::Map::new();
    fields.insert("pending".into(), json!(pending));
    Response::ok(fields)
}

fn igmp_join(ctx: &mut Context, args: &Value, now: Instant) -> Response {
    let id = match resolve(ctx, args) {
        Ok(id) => id,
        Err(r) => return r,
    };
    let Some(group) = args.get("group").and_then(Value::as_str).and_then(|s| s.parse().ok()) else {
        return Response::error(code::BAD_REQUEST, "missing or invalid 'group'");
    };
    match ctx.igmp_join(id, group, now) {
        Ok(()) => Response::ok_empty(),
        Err(e) => Response::from(e),
    }
}

fn igmp_leave(ctx: &mut Context, args: &Value, now: Instant) -> Response {
    let id = match resolve(ctx, args) {
        Ok(id) => id,
        Err(r) => return r,
    };
    let Some(group) = args.get("group").and_then(Value::as_str).and_then(|s| s.parse().ok()) else {
        return Response::error(code::BAD_REQUEST, "missing or invalid 'group'");
    };
    match ctx.igmp_leave(id, group, now) {
        Ok(()) => Response::ok_empty(),
        Err(e) => Response::from(e),
    }
}

fn igmp_info(ctx: &Context, args: &Value) -> Response {
    let id = match resolve(ctx, args) {
        Ok(id) => id,
        Err(r) => return r,
    };
    let session = ctx.registry.get(id).unwrap();
    let groups: Vec<Value> = session
        .igmp_groups
        .iter()
        .map(|g| {
            json!({
                "group": g.group.to_string(),
                "state": format!("{:?}", g.state),
                "packets-received": g.packets_received,
                "join-delay-ms": g.join_delay.map(|d| d.as_millis() as u64),
            })
        })
        .collect();
    let mut fields = serde_json::Map::new();
    fields.insert("session-id".into(), json!(id));
    fields.insert("groups".into(), Value::Array(groups));
    Response::ok(fields)
}

fn l2tp_tunnels(ctx: &Context) -> Response {
    let Some(l2tp) = &ctx.l2tp else {
        return Response::error(code::BAD_REQUEST, "l2tp server not configured");
    };
    let tunnels: Vec<Value> = l2tp
        .tunnels
        .values()
        .map(|t| {
            json!({
                "tunnel-id": t.tunnel_id,
                "peer-address": t.peer_addr.to_string(),
                "peer-port": t.peer_port,
                "state": format!("{:?}", t.state),
                "sessions": t.sessions.len(),
            })
        })
        .collect();
    let mut fields = serde_json::Map::new();
    fields.insert("tunnels".into(), Value::Array(tunnels));
    Response::ok(fields)
}

fn l2tp_sessions(ctx: &Context, args: &Value) -> Response {
    let Some(l2tp) = &ctx.l2tp else {
        return Response::error(code::BAD_REQUEST, "l2tp server not configured");
    };
    let Some(tunnel_id) = args.get("tunnel-id").and_then(Value::as_u64) else {
        return Response::error(code::BAD_REQUEST, "missing 'tunnel-id'");
    };
    let Some(tunnel) = l2tp.tunnels.get(&(tunnel_id as u16)) else {
        return Response::warning(code::NOT_FOUND, format!("no such tunnel {tunnel_id}"));
    };
    let sessions: Vec<Value> = tunnel
        .sessions
        .values()
        .map(|s| {
            json!({
                "session-id": s.session_id,
                "peer-session-id": s.peer_session_id,
                "state": format!("{:?}", s.state),
            })
        })
        .collect();
    let mut fields = serde_json::Map::new();
    fields.insert("tunnel-id".into(), json!(tunnel_id));
    fields.insert("sessions".into(), Value::Array(sessions));
    Response::ok(fields)
}

fn l2tp_tunnel_terminate(ctx: &mut Context, args: &Value, now: Instant) -> Response {
    let Some(tunnel_id) = args.get("tunnel-id").and_then(Value::as_u64) else {
        return Response::error(code::BAD_REQUEST, "missing 'tunnel-id'");
    };
    let result_code = args.get("result-code").and_then(Value::as_u64).unwrap_or(1) as u16;
    let error_code = args.get("error-code").and_then(Value::as_u64).map(|v| v as u16);
    let error_message = args.get("error-message").and_then(Value::as_str);
    match ctx.l2tp_tunnel_terminate(tunnel_id as u16, result_code, error_code, error_message, now) {
        Ok(()) => Response::ok_empty(),
        Err(e) => Response::from(e),
    }
}

fn l2tp_session_terminate(ctx: &mut Context, args: &Value, now: Instant) -> Response {
    let (Some(tunnel_id), Some(session_id)) = (
        args.get("tunnel-id").and_then(Value::as_u64),
        args.get("session-id").and_then(Value::as_u64),
    ) else {
        return Response::error(code::BAD_REQUEST, "missing 'tunnel-id'/'session-id'");
    };
    match ctx.l2tp_session_terminate(tunnel_id as u16, session_id as u16, now) {
        Ok(()) => Response::ok_empty(),
        Err(e) => Response::from(e),
    }
}

fn l2tp_csurq(ctx: &mut Context, args: &Value, now: Instant) -> Response {
    let Some(tunnel_id) = args.get("tunnel-id").and_then(Value::as_u64) else {
        return Response::error(code::BAD_REQUEST, "missing 'tunnel-id'");
    };
    let session_ids: Vec<u16> = args
        .get("session-ids")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_u64).map(|v| v as u16).collect())
        .unwrap_or_default();
    match ctx.l2tp_csurq(tunnel_id as u16, &session_ids, now) {
        Ok(()) => Response::ok_empty(),
        Err(e) => Response::from(e),
    }
}

fn stream_info(ctx: &Context, args: &Value) -> Response {
    let Some(flow_id) = args.get("flow-id").and_then(Value::as_u64) else {
        return Response::error(code::BAD_REQUEST, "missing 'flow-id'");
    };
    let Some(gen) = ctx.generators.get(&flow_id) else {
        return Response::warning(code::NOT_FOUND, format!("no such flow {flow_id}"));
    };
    let mut fields = serde_json::Map::new();
    fields.insert("flow-id".into(), json!(flow_id));
    fields.insert("enabled".into(), json!(gen.enabled));
    fields.insert("target-pps".into(), json!(gen.target_pps));
    fields.insert(
        "direction".into(),
        json!(format!("{:?}", gen.template.direction)),
    );
    fields.insert(
        "sub-type".into(),
        json!(format!("{:?}", gen.template.sub_type)),
    );
    Response::ok(fields)
}

fn stream_stats(ctx: &Context, args: &Value) -> Response {
    let Some(flow_id) = args.get("flow-id").and_then(Value::as_u64) else {
        return Response::error(code::BAD_REQUEST, "missing 'flow-id'");
    };
    let gen = ctx.generators.get(&flow_id);
    let ver = ctx.verifiers.get(&flow_id);
    if gen.is_none() && ver.is_none() {
        return Response::warning(code::NOT_FOUND, format!("no such flow {flow_id}"));
    }
    let mut fields = serde_json::Map::new();
    fields.insert("flow-id".into(), json!(flow_id));
    fields.insert("tx-seq".into(), json!(gen.map(|g| g.last_seq())));
    if let Some(ver) = ver {
        fields.insert("rx-packets".into(), json!(ver.rx_packets));
        fields.insert("loss".into(), json!(ver.loss));
        fields.insert("min-delay-ns".into(), json!(ver.min_delay_ns));
        fields.insert("max-delay-ns".into(), json!(ver.max_delay_ns));
        fields.insert("avg-delay-ns".into(), json!(ver.avg_delay_ns()));
    }
    Response::ok(fields)
}

fn stream_set_enabled(ctx: &mut Context, args: &Value, enabled: bool) -> Response {
    let Some(flow_id) = args.get("flow-id").and_then(Value::as_u64) else {
        return Response::error(code::BAD_REQUEST, "missing 'flow-id'");
    };
    match ctx.stream_set_enabled(flow_id, enabled) {
        Ok(()) => Response::ok_empty(),
        Err(e) => Response::from(e),
    }
}

fn cfm_set(ctx: &mut Context, args: &Value, now: Instant, f: impl FnOnce(&mut crate::session::CfmState, Instant)) -> Response {
    match resolve(ctx, args) {
        Ok(id) => {
            let session = ctx.registry.get_mut(id).unwrap();
            f(&mut session.cfm, now);
            Response::ok_empty()
        }
        Err(r) => r,
    }
}

fn isis_adjacencies(ctx: &Context) -> Response {
    let Some(isis) = &ctx.isis else {
        return Response::error(code::BAD_REQUEST, "isis not configured");
    };
    let adjacencies: Vec<Value> = isis
        .adjacencies
        .iter()
        .map(|a| {
            json!({
                "ifindex": a.ifindex,
                "level": format!("{:?}", a.level),
                "peer-system-id": a.peer_system_id,
                "state": format!("{:?}", a.state),
                "holding-time": a.holding_time,
            })
        })
        .collect();
    let mut fields = serde_json::Map::new();
    fields.insert("adjacencies".into(), Value::Array(adjacencies));
    Response::ok(fields)
}

fn isis_database(ctx: &Context, args: &Value) -> Response {
    let Some(isis) = &ctx.isis else {
        return Response::error(code::BAD_REQUEST, "isis not configured");
    };
    let level = match args.get("level").and_then(Value::as_u64) {
        Some(2) => Level::L2,
        _ => Level::L1,
    };
    let lsdb = if level == Level::L1 { &isis.lsdb_l1 } else { &isis.lsdb_l2 };
    let entries: Vec<Value> = lsdb
        .iter()
        .map(|(id, e)| {
            json!({
                "system-id": id.system_id,
                "sequence": e.sequence,
                "remaining-lifetime": e.remaining_lifetime,
                "expired": e.expired,
            })
        })
        .collect();
    let mut fields = serde_json::Map::new();
    fields.insert("level".into(), json!(if level == Level::L1 { 1 } else { 2 }));
    fields.insert("lsps".into(), Value::Array(entries));
    Response::ok(fields)
}

fn isis_load_mrt(ctx: &mut Context, args: &Value, now: Instant) -> Response {
    let level = match args.get("level").and_then(Value::as_u64) {
        Some(2) => Level::L2,
        _ => Level::L1,
    };
    let Some(path_or_hex) = args.get("data").and_then(Value::as_str) else {
        return Response::error(code::BAD_REQUEST, "missing 'data' (hex-encoded mrt dump)");
    };
    let Some(bytes) = decode_hex(path_or_hex) else {
        return Response::error(code::BAD_REQUEST, "'data' is not valid hex");
    };
    match ctx.isis_load_mrt(level, &bytes, now) {
        Ok(count) => {
            let mut fields = serde_json::Map::new();
            fields.insert("loaded".into(), json!(count));
            Response::ok(fields)
        }
        Err(e) => Response::from(e),
    }
}

fn isis_external_lsp_update(ctx: &mut Context, args: &Value, now: Instant) -> Response {
    let level = match args.get("level").and_then(Value::as_u64) {
        Some(2) => Level::L2,
        _ => Level::L1,
    };
    let Some(hex) = args.get("pdu").and_then(Value::as_str) else {
        return Response::error(code::BAD_REQUEST, "missing 'pdu' (hex-encoded lsp)");
    };
    let Some(bytes) = decode_hex(hex) else {
        return Response::error(code::BAD_REQUEST, "'pdu' is not valid hex");
    };
    match ctx.isis_load_external(level, &bytes, now) {
        Ok(()) => Response::ok_empty(),
        Err(e) => Response::from(e),
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use bbl_utils::config::{Config, InterfaceConfig, PppoeConfig};
    use bbl_utils::mac_addr::MacAddr;
    use std::sync::Arc;

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
    fn unknown_command_is_bad_request() {
        let now = Instant::now();
        let mut ctx = Context::new(test_config(), now);
        let reply = dispatch(&mut ctx, r#"{"command":"frobnicate","arguments":{}}"#, now);
        let v: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["code"], 400);
    }

    #[test]
    fn malformed_json_is_bad_request() {
        let now = Instant::now();
        let mut ctx = Context::new(test_config(), now);
        let reply = dispatch(&mut ctx, "not json", now);
        let v: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(v["code"], 400);
    }

    #[test]
    fn session_info_resolves_by_vlan_tuple_backward_compatibly() {
        let now = Instant::now();
        let mut ctx = Context::new(test_config(), now);
        let key = SessionKey::new(1, 10, 20);
        ctx.start_pppoe_session(key, MacAddr::from([2, 1, 1, 1, 1, 1])).unwrap();

        let reply = dispatch(
            &mut ctx,
            r#"{"command":"session-info","arguments":{"outer-vlan":10,"inner-vlan":20}}"#,
            now,
        );
        let v: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["session-id"], 1);
    }

    #[test]
    fn session_info_on_absent_key_is_404_warning() {
        let now = Instant::now();
        let mut ctx = Context::new(test_config(), now);
        let reply = dispatch(
            &mut ctx,
            r#"{"command":"session-info","arguments":{"outer-vlan":10,"inner-vlan":21}}"#,
            now,
        );
        let v: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(v["status"], "warning");
        assert_eq!(v["code"], 404);
    }

    #[test]
    fn interfaces_lists_the_one_configured_port() {
        let now = Instant::now();
        let mut ctx = Context::new(test_config(), now);
        let reply = dispatch(&mut ctx, r#"{"command":"interfaces","arguments":{}}"#, now);
        let v: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(v["interfaces"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn session_terminate_removes_session() {
        let now = Instant::now();
        let mut ctx = Context::new(test_config(), now);
        let key = SessionKey::new(1, 10, 20);
        let id = ctx.start_pppoe_session(key, MacAddr::from([2, 1, 1, 1, 1, 1])).unwrap();
        let reply = dispatch(
            &mut ctx,
            &format!(r#"{{"command":"session-terminate","arguments":{{"session-id":{id}}}}}"#),
            now,
        );
        let v: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(ctx.registry.len(), 0);
    }

    #[test]
    fn traffic_stop_then_start_disables_and_reenables_generators() {
        let now = Instant::now();
        let mut ctx = Context::new(test_config(), now);
        let template = crate::traffic::FlowTemplate {
            flow_type: bbl_packet::bbl::FlowType::Unicast,
            sub_type: FlowSubType::Ipv4,
            direction: Direction::Downstream,
            session_id: 1,
            outer_vlan: 0,
            inner_vlan: 0,
        };
        let flow_id = ctx.add_generator(template, 10.0, now);
        dispatch(&mut ctx, r#"{"command":"traffic-stop","arguments":{}}"#, now);
        assert!(!ctx.generators.get(&flow_id).unwrap().enabled);
        dispatch(&mut ctx, r#"{"command":"traffic-start","arguments":{}}"#, now);
        assert!(ctx.generators.get(&flow_id).unwrap().enabled);
    }
}
