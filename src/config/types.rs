//! Configuration types

use crate::controller::{
    DEFAULT_LEASE_TIME, DEFAULT_SERVER_IP, DEFAULT_SERVER_MAC, DEFAULT_SUBNET_MASK, SwitchRole,
};
use crate::protocol::MacAddr;
use crate::telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// First address handed out by the default pool
pub const DEFAULT_POOL_START: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 3);
pub const DEFAULT_POOL_END: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 253);

/// User-defined configuration (config.toml)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: Option<LogConfig>,
    #[serde(default = "default_switches")]
    pub switches: Vec<SwitchConfig>,
    #[serde(default)]
    pub dhcp: DhcpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: None,
            switches: default_switches(),
            dhcp: DhcpConfig::default(),
        }
    }
}

fn default_switches() -> Vec<SwitchConfig> {
    vec![SwitchConfig {
        dpid: 1,
        role: SwitchRole::DhcpServer,
    }]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SwitchConfig {
    pub dpid: u64,
    #[serde(default)]
    pub role: SwitchRole,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DhcpConfig {
    pub server_ip: Option<Ipv4Addr>,
    pub server_mac: Option<MacAddr>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub lease_time: Option<u32>,
    #[serde(default)]
    pub allocation: AllocationConfig,
}

/// `[dhcp.allocation]`: how new clients get an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum AllocationConfig {
    /// One address for the whole network
    Fixed { address: Ipv4Addr },
    /// MAC -> address reservations
    Static { bindings: BTreeMap<MacAddr, Ipv4Addr> },
    /// Lowest free address in an inclusive range
    Pool { range: (Ipv4Addr, Ipv4Addr) },
}

impl Default for AllocationConfig {
    fn default() -> Self {
        AllocationConfig::Pool {
            range: (DEFAULT_POOL_START, DEFAULT_POOL_END),
        }
    }
}

impl AllocationConfig {
    /// Every address the policy can hand out, when enumerable
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        match self {
            AllocationConfig::Fixed { address } => vec![*address],
            AllocationConfig::Static { bindings } => bindings.values().copied().collect(),
            AllocationConfig::Pool { range } => vec![range.0, range.1],
        }
    }
}

// ============================================================================
// Lock file types (generated, includes all defaults)
// ============================================================================

/// Generated lock file with all defaults filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigLock {
    pub generated_at: String,
    pub logging: LogConfig,
    pub switches: Vec<SwitchLock>,
    pub dhcp: DhcpLock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchLock {
    pub dpid: u64,
    pub role: SwitchRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpLock {
    pub server_ip: Ipv4Addr,
    pub server_mac: MacAddr,
    pub subnet_mask: Ipv4Addr,
    pub lease_time: u32,
    pub allocation: AllocationConfig,
}

impl ConfigLock {
    pub fn from_config(config: &Config) -> Self {
        let switches = config
            .switches
            .iter()
            .map(|s| SwitchLock {
                dpid: s.dpid,
                role: s.role,
            })
            .collect();

        let dhcp = DhcpLock {
            server_ip: config.dhcp.server_ip.unwrap_or(DEFAULT_SERVER_IP),
            server_mac: config.dhcp.server_mac.unwrap_or(DEFAULT_SERVER_MAC),
            subnet_mask: config.dhcp.subnet_mask.unwrap_or(DEFAULT_SUBNET_MASK),
            lease_time: config.dhcp.lease_time.unwrap_or(DEFAULT_LEASE_TIME),
            allocation: config.dhcp.allocation.clone(),
        };

        ConfigLock {
            generated_at: chrono::Utc::now().to_rfc3339(),
            logging: config.logging.clone().unwrap_or_default(),
            switches,
            dhcp,
        }
    }
}
