//! Forwarding Database (MAC address table)
//!
//! Per-switch MAC -> ingress port mappings for the learning switch.
//! Each switch has an independent table; entries are overwritten on every
//! observed frame and never aged out.

use crate::ofp::{PortNo, SwitchId};
use crate::protocol::MacAddr;
use std::collections::HashMap;

/// Storage for learned (switch, MAC) -> port entries.
///
/// `MacTable` is the default. Implement this to plug in a bounded or
/// evicting table; the controller is generic over it.
pub trait ForwardingTable {
    /// Record that `mac` was seen on `port` of `switch`, replacing any
    /// previous entry for that pair
    fn learn(&mut self, switch: SwitchId, mac: MacAddr, port: PortNo);

    fn lookup(&self, switch: SwitchId, mac: &MacAddr) -> Option<PortNo>;

    /// Total number of entries across all switches
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries learned on one switch, in no particular order
    fn entries_for(&self, switch: SwitchId) -> Vec<(MacAddr, PortNo)>;
}

/// Unbounded per-switch MAC table
#[derive(Debug, Default)]
pub struct MacTable {
    /// Switch -> (MAC -> port)
    tables: HashMap<SwitchId, HashMap<MacAddr, PortNo>>,
}

impl MacTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of switches with at least one entry
    pub fn switch_count(&self) -> usize {
        self.tables.len()
    }
}

impl ForwardingTable for MacTable {
    fn learn(&mut self, switch: SwitchId, mac: MacAddr, port: PortNo) {
        self.tables.entry(switch).or_default().insert(mac, port);
    }

    fn lookup(&self, switch: SwitchId, mac: &MacAddr) -> Option<PortNo> {
        self.tables.get(&switch)?.get(mac).copied()
    }

    fn len(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }

    fn entries_for(&self, switch: SwitchId) -> Vec<(MacAddr, PortNo)> {
        self.tables
            .get(&switch)
            .map(|t| t.iter().map(|(mac, port)| (*mac, *port)).collect())
            .unwrap_or_default()
    }
}
