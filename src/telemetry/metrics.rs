//! Controller metrics.
//!
//! Lock-free counters for event handling and DHCP outcomes, plus
//! per-switch statistics.

use crate::ofp::SwitchId;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Gauge holding the last observed value.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, val: usize) {
        self.0.store(val as u64, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-switch statistics.
#[derive(Debug, Default)]
pub struct SwitchStats {
    /// Packet-in events received.
    pub packet_ins: Counter,
    /// Captured bytes of those packet-ins.
    pub packet_in_bytes: Counter,
    /// Flow rules installed.
    pub flows: Counter,
    /// Packet-outs emitted.
    pub packet_outs: Counter,
}

/// Controller-wide metrics.
#[derive(Debug, Default)]
pub struct ControllerMetrics {
    switches: RwLock<HashMap<SwitchId, SwitchStats>>,

    // Event handling
    pub packet_in: Counter,
    /// Packet-ins whose Ethernet header could not be read.
    pub undecodable: Counter,
    pub flows_installed: Counter,
    pub packets_emitted: Counter,
    /// Forwarding decisions that flooded.
    pub floods: Counter,
    /// Commands the datapath refused.
    pub datapath_errors: Counter,

    // DHCP
    pub dhcp_offers: Counter,
    pub dhcp_acks: Counter,
    pub dhcp_naks: Counter,
    pub dhcp_ignored: Counter,

    // Table sizes
    pub fdb_size: Gauge,
    pub lease_count: Gauge,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the stats of `switch`, creating them on first use.
    fn with_switch(&self, switch: SwitchId, f: impl FnOnce(&SwitchStats)) {
        {
            let switches = self.switches.read().unwrap_or_else(|e| e.into_inner());
            if let Some(stats) = switches.get(&switch) {
                f(stats);
                return;
            }
        }
        let mut switches = self.switches.write().unwrap_or_else(|e| e.into_inner());
        f(switches.entry(switch).or_default());
    }

    pub fn record_packet_in(&self, switch: SwitchId, bytes: usize) {
        self.packet_in.inc();
        self.with_switch(switch, |s| {
            s.packet_ins.inc();
            s.packet_in_bytes.add(bytes as u64);
        });
    }

    pub fn record_flow(&self, switch: SwitchId) {
        self.flows_installed.inc();
        self.with_switch(switch, |s| s.flows.inc());
    }

    pub fn record_packet_out(&self, switch: SwitchId) {
        self.packets_emitted.inc();
        self.with_switch(switch, |s| s.packet_outs.inc());
    }

    /// Packet-in count for one switch, 0 if never seen
    pub fn switch_packet_ins(&self, switch: SwitchId) -> u64 {
        let switches = self.switches.read().unwrap_or_else(|e| e.into_inner());
        switches.get(&switch).map_or(0, |s| s.packet_ins.get())
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("packet_in".into(), self.packet_in.get()),
            ("undecodable".into(), self.undecodable.get()),
            ("flows_installed".into(), self.flows_installed.get()),
            ("packets_emitted".into(), self.packets_emitted.get()),
            ("floods".into(), self.floods.get()),
            ("datapath_errors".into(), self.datapath_errors.get()),
            ("dhcp_offers".into(), self.dhcp_offers.get()),
            ("dhcp_acks".into(), self.dhcp_acks.get()),
            ("dhcp_naks".into(), self.dhcp_naks.get()),
            ("dhcp_ignored".into(), self.dhcp_ignored.get()),
            ("fdb_size".into(), self.fdb_size.get()),
            ("lease_count".into(), self.lease_count.get()),
        ];

        let switches = self.switches.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<_> = switches.keys().copied().collect();
        ids.sort();
        for id in ids {
            if let Some(stats) = switches.get(&id) {
                result.extend([
                    (format!("switch_{}_packet_ins", id), stats.packet_ins.get()),
                    (format!("switch_{}_packet_in_bytes", id), stats.packet_in_bytes.get()),
                    (format!("switch_{}_flows", id), stats.flows.get()),
                    (format!("switch_{}_packet_outs", id), stats.packet_outs.get()),
                ]);
            }
        }

        result
    }
}
