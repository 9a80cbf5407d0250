//! Flow installation and packet emission
//!
//! The only place the controller talks to switches. Failures are logged
//! and counted, never retried.

use crate::ofp::{Datapath, FlowRule, PacketOut, SwitchId};
use crate::telemetry::ControllerMetrics;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Southbound<D> {
    datapath: D,
    metrics: Arc<ControllerMetrics>,
}

impl<D: Datapath> Southbound<D> {
    pub fn new(datapath: D, metrics: Arc<ControllerMetrics>) -> Self {
        Self { datapath, metrics }
    }

    /// Returns whether the switch accepted the rule
    pub fn install(&mut self, switch: SwitchId, rule: &FlowRule) -> bool {
        match self.datapath.install_flow(switch, rule) {
            Ok(()) => {
                debug!(
                    "Installed flow on {}: priority={} match={:?} actions={:?}",
                    switch, rule.priority, rule.match_, rule.actions
                );
                self.metrics.record_flow(switch);
                true
            }
            Err(e) => {
                warn!("Flow install on {} failed: {}", switch, e);
                self.metrics.datapath_errors.inc();
                false
            }
        }
    }

    /// Returns whether the switch accepted the packet-out
    pub fn emit(&mut self, switch: SwitchId, packet: &PacketOut) -> bool {
        match self.datapath.emit_packet(switch, packet) {
            Ok(()) => {
                self.metrics.record_packet_out(switch);
                true
            }
            Err(e) => {
                warn!("Packet-out on {} failed: {}", switch, e);
                self.metrics.datapath_errors.inc();
                false
            }
        }
    }

    pub fn datapath(&self) -> &D {
        &self.datapath
    }

    pub fn datapath_mut(&mut self) -> &mut D {
        &mut self.datapath
    }

    pub fn into_inner(self) -> D {
        self.datapath
    }
}
