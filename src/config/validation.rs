//! Configuration validation

use super::{AllocationConfig, Config};
use crate::controller::{
    DEFAULT_LEASE_TIME, DEFAULT_SERVER_IP, DEFAULT_SERVER_MAC, DEFAULT_SUBNET_MASK, SwitchRole,
};
use std::collections::HashSet;
use std::net::Ipv4Addr;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_switches(config, &mut result);
    validate_dhcp(config, &mut result);
    validate_allocation(config, &mut result);

    result
}

fn validate_switches(config: &Config, result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for (i, switch) in config.switches.iter().enumerate() {
        if !seen.insert(switch.dpid) {
            result.error(format!(
                "switches[{}]: duplicate dpid {:#x}",
                i, switch.dpid
            ));
        }
    }

    if !config
        .switches
        .iter()
        .any(|s| s.role == SwitchRole::DhcpServer)
    {
        result.warn("switches: no switch has role dhcp_server, DHCP will not be answered");
    }
}

fn validate_dhcp(config: &Config, result: &mut ValidationResult) {
    let dhcp = &config.dhcp;

    match dhcp.lease_time {
        None => result.warn(format!(
            "dhcp: lease_time not specified, using default {}",
            DEFAULT_LEASE_TIME
        )),
        Some(0) => result.error("dhcp: lease_time must be greater than 0"),
        Some(_) => {}
    }

    let mask = dhcp.subnet_mask.unwrap_or(DEFAULT_SUBNET_MASK);
    if !is_contiguous_mask(mask) {
        result.error(format!("dhcp: subnet_mask {} is not contiguous", mask));
    }

    let mac = dhcp.server_mac.unwrap_or(DEFAULT_SERVER_MAC);
    if mac.is_zero() || mac.is_multicast() {
        result.error(format!(
            "dhcp: server_mac {} must be a unicast, non-zero address",
            mac
        ));
    }
}

fn validate_allocation(config: &Config, result: &mut ValidationResult) {
    let server_ip = config.dhcp.server_ip.unwrap_or(DEFAULT_SERVER_IP);
    let mask = config.dhcp.subnet_mask.unwrap_or(DEFAULT_SUBNET_MASK);

    match &config.dhcp.allocation {
        AllocationConfig::Pool { range } => {
            let (start, end) = *range;
            if start > end {
                result.error(format!(
                    "dhcp.allocation: invalid range - start ({}) > end ({})",
                    start, end
                ));
            } else if start <= server_ip && server_ip <= end {
                result.error(format!(
                    "dhcp.allocation: range {}-{} contains server_ip {}",
                    start, end, server_ip
                ));
            }
        }
        AllocationConfig::Fixed { address } => {
            if *address == server_ip {
                result.error(format!(
                    "dhcp.allocation: address {} is the server_ip",
                    address
                ));
            }
        }
        AllocationConfig::Static { bindings } => {
            for (mac, ip) in bindings {
                if *ip == server_ip {
                    result.error(format!(
                        "dhcp.allocation.bindings.{}: {} is the server_ip",
                        mac, ip
                    ));
                }
            }
            if bindings.is_empty() {
                result.warn("dhcp.allocation: static policy with no bindings serves nobody");
            }
        }
    }

    for ip in config.dhcp.allocation.addresses() {
        if !same_subnet(ip, server_ip, mask) {
            result.warn(format!(
                "dhcp.allocation: {} is outside {}/{}",
                ip, server_ip, mask
            ));
        }
    }
}

/// Ones followed only by zeros
fn is_contiguous_mask(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.leading_ones() + bits.trailing_zeros() == 32
}

fn same_subnet(a: Ipv4Addr, b: Ipv4Addr, mask: Ipv4Addr) -> bool {
    let m = u32::from(mask);
    u32::from(a) & m == u32::from(b) & m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DhcpConfig, SwitchConfig};
    use crate::protocol::MacAddr;
    use std::collections::BTreeMap;

    fn make_config() -> Config {
        Config {
            logging: None,
            switches: vec![SwitchConfig {
                dpid: 1,
                role: SwitchRole::DhcpServer,
            }],
            dhcp: DhcpConfig {
                lease_time: Some(8640),
                ..DhcpConfig::default()
            },
        }
    }

    #[test]
    fn test_valid_minimal_config() {
        let result = validate(&make_config());
        assert!(!result.has_errors());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_dpid() {
        let mut config = make_config();
        config.switches.push(SwitchConfig {
            dpid: 1,
            role: SwitchRole::Plain,
        });
        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("duplicate dpid")));
    }

    #[test]
    fn test_no_dhcp_switch_warns() {
        let mut config = make_config();
        config.switches[0].role = SwitchRole::Plain;
        let result = validate(&config);
        assert!(!result.has_errors());
        assert!(result.warnings.iter().any(|w| w.contains("dhcp_server")));
    }

    #[test]
    fn test_lease_time() {
        let mut config = make_config();
        config.dhcp.lease_time = None;
        let result = validate(&config);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("lease_time not specified")));

        config.dhcp.lease_time = Some(0);
        assert!(validate(&config).has_errors());
    }

    #[test]
    fn test_non_contiguous_mask() {
        let mut config = make_config();
        config.dhcp.subnet_mask = Some(Ipv4Addr::new(255, 0, 255, 0));
        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("not contiguous")));

        assert!(is_contiguous_mask(Ipv4Addr::new(255, 255, 255, 0)));
        assert!(is_contiguous_mask(Ipv4Addr::new(0, 0, 0, 0)));
        assert!(is_contiguous_mask(Ipv4Addr::new(255, 255, 255, 255)));
    }

    #[test]
    fn test_bad_server_mac() {
        let mut config = make_config();
        config.dhcp.server_mac = Some(MacAddr::BROADCAST);
        assert!(validate(&config).has_errors());

        config.dhcp.server_mac = Some(MacAddr::ZERO);
        assert!(validate(&config).has_errors());
    }

    #[test]
    fn test_pool_range_errors() {
        let mut config = make_config();
        config.dhcp.allocation = AllocationConfig::Pool {
            range: (Ipv4Addr::new(10, 1, 1, 200), Ipv4Addr::new(10, 1, 1, 100)),
        };
        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("invalid range")));

        config.dhcp.allocation = AllocationConfig::Pool {
            range: (Ipv4Addr::new(10, 1, 1, 2), Ipv4Addr::new(10, 1, 1, 254)),
        };
        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("contains server_ip")));
    }

    #[test]
    fn test_static_binding_to_server_ip() {
        let mut config = make_config();
        let mut bindings = BTreeMap::new();
        bindings.insert(MacAddr([0, 1, 2, 3, 4, 5]), DEFAULT_SERVER_IP);
        config.dhcp.allocation = AllocationConfig::Static { bindings };

        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.contains("is the server_ip")));
    }

    #[test]
    fn test_address_outside_subnet_warns() {
        let mut config = make_config();
        config.dhcp.allocation = AllocationConfig::Fixed {
            address: Ipv4Addr::new(192, 168, 0, 5),
        };
        let result = validate(&config);
        assert!(!result.has_errors());
        assert!(result.warnings.iter().any(|w| w.contains("is outside")));
    }
}
