//
// Static configuration tree, loaded once by the daemon binary and handed to
// every core component as an immutable `Arc<Config>`, a handle passed
// through call chains rather than reached via a global.
//
// Loading and validating the file from disk is the daemon's job; this
// module only defines the shape and a couple of sane constructors used by
// tests.
//

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub pppoe: PppoeConfig,
    #[serde(default)]
    pub dhcp: DhcpConfig,
    #[serde(default)]
    pub dhcpv6: Dhcpv6Config,
    #[serde(default)]
    pub access_line: AccessLineConfig,
    #[serde(default)]
    pub l2tp_server: Option<L2tpServerConfig>,
    #[serde(default)]
    pub isis: Option<IsisConfig>,
    #[serde(default)]
    pub control_socket: ControlSocketConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum InterfaceRole {
    Access,
    Network,
    A10nsp,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InterfaceConfig {
    pub name: String,
    pub ifindex: u32,
    pub role: InterfaceRole,
    pub mac: [u8; 6],
    #[serde(default)]
    pub outer_vlan_min: u16,
    #[serde(default)]
    pub outer_vlan_max: u16,
    #[serde(default)]
    pub inner_vlan_min: u16,
    #[serde(default)]
    pub inner_vlan_max: u16,
    #[serde(default)]
    pub qinq: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PppoeConfig {
    pub service_name: String,
    pub host_uniq: bool,
    pub discovery_timeout: Duration,
    pub discovery_retry: u32,
    pub lcp_conf_request_timeout: Duration,
    pub lcp_conf_request_retry: u32,
    pub lcp_keepalive_interval: Duration,
    pub lcp_keepalive_retry: u32,
    pub authentication: AuthProtocol,
    pub username: String,
    pub password: String,
    pub mru: u16,
}

impl Default for PppoeConfig {
    fn default() -> Self {
        PppoeConfig {
            service_name: String::new(),
            host_uniq: true,
            discovery_timeout: Duration::from_secs(5),
            discovery_retry: 10,
            lcp_conf_request_timeout: Duration::from_secs(5),
            lcp_conf_request_retry: 10,
            lcp_keepalive_interval: Duration::from_secs(30),
            lcp_keepalive_retry: 3,
            authentication: AuthProtocol::Pap,
            username: "user".into(),
            password: "password".into(),
            mru: 1492,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AuthProtocol {
    Pap,
    Chap,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DhcpConfig {
    pub enable: bool,
    pub discover_timeout: Duration,
    pub discover_retry: u32,
    pub t1_factor: f64,
    pub t2_factor: f64,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        DhcpConfig {
            enable: false,
            discover_timeout: Duration::from_secs(5),
            discover_retry: 10,
            t1_factor: 0.5,
            t2_factor: 0.875,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Dhcpv6Config {
    pub enable: bool,
    pub rapid_commit: bool,
    pub solicit_timeout: Duration,
    pub solicit_retry: u32,
}

impl Default for Dhcpv6Config {
    fn default() -> Self {
        Dhcpv6Config {
            enable: false,
            rapid_commit: true,
            solicit_timeout: Duration::from_secs(5),
            solicit_retry: 10,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AccessLineConfig {
    pub agent_circuit_id: Option<String>,
    pub agent_remote_id: Option<String>,
    pub rate_up: Option<u32>,
    pub rate_down: Option<u32>,
    pub dsl_type: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct L2tpServerConfig {
    pub local_address: Ipv4Addr,
    pub secret: String,
    pub receive_window_size: u16,
    pub max_retries: u32,
    pub retry_timeout: Duration,
    pub hello_interval: Duration,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IsisConfig {
    pub system_id: [u8; 6],
    pub area_addresses: Vec<Vec<u8>>,
    pub hostname: Option<String>,
    pub router_id: Option<Ipv4Addr>,
    pub level_type: IsisLevelType,
    pub hello_interval: Duration,
    pub holding_multiplier: u8,
    pub lsp_lifetime: Duration,
    pub lsp_refresh_interval: Duration,
    pub lsp_retry_interval: Duration,
    pub csnp_interval: Duration,
    pub psnp_interval: Duration,
    pub sr_enabled: bool,
    pub srgb_base: u32,
    pub srgb_range: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum IsisLevelType {
    L1,
    L2,
    L1L2,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ControlSocketConfig {
    pub path: String,
    pub accept_poll_interval: Duration,
}

impl Default for ControlSocketConfig {
    fn default() -> Self {
        ControlSocketConfig {
            path: "/var/run/bngblaster.sock".into(),
            accept_poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Ip6Defaults {
    pub link_local_prefix: [u16; 4],
}

impl Default for Ip6Defaults {
    fn default() -> Self {
        Ip6Defaults {
            link_local_prefix: [0xfe80, 0, 0, 0],
        }
    }
}

pub const IPV6_UNSPECIFIED: Ipv6Addr = Ipv6Addr::UNSPECIFIED;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_json() {
        let cfg = Config {
            interfaces: vec![InterfaceConfig {
                name: "eth1".into(),
                ifindex: 1,
                role: InterfaceRole::Access,
                mac: [2, 0, 0, 0, 0, 1],
                outer_vlan_min: 1,
                outer_vlan_max: 4094,
                inner_vlan_min: 0,
                inner_vlan_max: 0,
                qinq: false,
            }],
            ..Default::default()
        };
        let text = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(back.interfaces.len(), 1);
    }
}
