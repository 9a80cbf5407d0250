//! Controller application
//!
//! Reacts to switch lifecycle and packet-in events:
//! - installs baseline rules when switches join and become ready
//! - answers DHCP at the controller for traffic redirected by the DHCP switch
//! - switches everything else as a learning L2 switch
//!
//! All state lives in [`Controller`]. Handlers run to completion on the
//! caller's thread and spawn nothing.

mod classifier;
mod dhcp_responder;
mod fdb;
mod lease_store;
mod southbound;
mod switching;
mod topology;

pub use classifier::{Classification, classify};
pub use dhcp_responder::{
    DEFAULT_LEASE_TIME, DEFAULT_SERVER_IP, DEFAULT_SERVER_MAC, DEFAULT_SUBNET_MASK, DhcpDecision,
    DhcpResponder, DhcpSettings, IgnoreReason,
};
pub use fdb::{ForwardingTable, MacTable};
pub use lease_store::{
    AllocationPolicy, FixedAddress, Lease, LeaseStore, SequentialPool, StaticBindings,
    policy_from_config,
};
pub use southbound::Southbound;
pub use switching::{ForwardPlan, plan_forwarding};
pub use topology::{SwitchRole, TopologyController};

use crate::config::{AllocationConfig, ConfigLock};
use crate::ofp::{Action, BufferId, Datapath, Event, PacketIn, PacketOut, PortNo, SwitchId};
use crate::protocol::dhcp::DhcpMessage;
use crate::protocol::{MacAddr, Packet};
use crate::telemetry::ControllerMetrics;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, trace};

/// Table-miss rule
pub const PRIORITY_TABLE_MISS: u16 = 0;
/// Rules cached by the learning switch
pub const PRIORITY_LEARNED: u16 = 1;
/// DHCP redirect on the DHCP-serving switch
pub const PRIORITY_DHCP_REDIRECT: u16 = 10;

/// Runtime options, usually built from config.lock
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    pub roles: HashMap<SwitchId, SwitchRole>,
    pub dhcp: DhcpSettings,
    pub allocation: AllocationConfig,
}

impl Default for ControllerOptions {
    /// Switch 1 serves DHCP; leases come from 10.1.1.3-10.1.1.253
    fn default() -> Self {
        Self {
            roles: HashMap::from([(SwitchId(1), SwitchRole::DhcpServer)]),
            dhcp: DhcpSettings::default(),
            allocation: AllocationConfig::default(),
        }
    }
}

impl ControllerOptions {
    pub fn from_lock(lock: &ConfigLock) -> Self {
        Self {
            roles: lock
                .switches
                .iter()
                .map(|s| (SwitchId(s.dpid), s.role))
                .collect(),
            dhcp: DhcpSettings {
                server_ip: lock.dhcp.server_ip,
                server_mac: lock.dhcp.server_mac,
                subnet_mask: lock.dhcp.subnet_mask,
                lease_time: lock.dhcp.lease_time,
            },
            allocation: lock.dhcp.allocation.clone(),
        }
    }
}

pub struct Controller<D: Datapath, F: ForwardingTable = MacTable> {
    topology: TopologyController,
    fdb: F,
    leases: LeaseStore,
    responder: DhcpResponder,
    southbound: Southbound<D>,
    metrics: Arc<ControllerMetrics>,
}

impl<D: Datapath> Controller<D, MacTable> {
    pub fn new(options: ControllerOptions, datapath: D) -> Self {
        Self::with_table(options, datapath, MacTable::new())
    }
}

impl<D: Datapath, F: ForwardingTable> Controller<D, F> {
    /// Controller using a custom forwarding table
    pub fn with_table(options: ControllerOptions, datapath: D, fdb: F) -> Self {
        let metrics = Arc::new(ControllerMetrics::new());
        Self {
            topology: TopologyController::new(options.roles),
            fdb,
            leases: LeaseStore::new(policy_from_config(&options.allocation)),
            responder: DhcpResponder::new(options.dhcp),
            southbound: Southbound::new(datapath, metrics.clone()),
            metrics,
        }
    }

    /// Replace the allocation policy built from the options
    pub fn with_policy(mut self, policy: Box<dyn AllocationPolicy>) -> Self {
        self.leases = LeaseStore::new(policy);
        self
    }

    /// Wrap for dispatch from several worker threads
    pub fn into_shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::SwitchJoin(switch) => self.switch_join(switch),
            Event::SwitchReady(switch) => self.switch_ready(switch),
            Event::PacketIn(packet_in) => self.packet_in(&packet_in),
        }
    }

    pub fn switch_join(&mut self, switch: SwitchId) {
        let role = self.topology.role(switch);
        info!("Switch {} joined ({:?})", switch, role);
        if let Some(rule) = self.topology.on_switch_join(switch) {
            self.southbound.install(switch, &rule);
        }
    }

    pub fn switch_ready(&mut self, switch: SwitchId) {
        info!("Switch {} ready, installing table-miss rule", switch);
        let rule = self.topology.on_switch_ready(switch);
        self.southbound.install(switch, &rule);
    }

    pub fn packet_in(&mut self, event: &PacketIn) {
        let switch = event.switch;
        self.metrics.record_packet_in(switch, event.data.len());
        if event.is_truncated() {
            debug!(
                "Packet-in on {} truncated: {} of {} bytes",
                switch,
                event.data.len(),
                event.total_len
            );
        }

        let packet = match Packet::decode(&event.data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping undecodable packet-in on {}: {}", switch, e);
                self.metrics.undecodable.inc();
                return;
            }
        };

        match classify(&packet) {
            Some(Classification::DhcpCandidate { src_mac, message }) => {
                self.handle_dhcp(switch, event.in_port, src_mac, message);
            }
            Some(Classification::OtherTraffic { src_mac, dst_mac }) => {
                self.handle_switching(event, src_mac, dst_mac);
            }
            None => {
                self.metrics.undecodable.inc();
            }
        }
    }

    fn handle_dhcp(
        &mut self,
        switch: SwitchId,
        in_port: PortNo,
        src_mac: MacAddr,
        message: Option<&DhcpMessage>,
    ) {
        let Some(msg) = message else {
            debug!(
                "Ignoring DHCP from {} on {}: {}",
                src_mac,
                switch,
                IgnoreReason::Undecodable
            );
            self.metrics.dhcp_ignored.inc();
            return;
        };

        let decision = self.responder.respond(src_mac, msg, &mut self.leases);
        self.metrics.lease_count.set(self.leases.len());

        match &decision {
            DhcpDecision::Ignore(reason) => {
                debug!("Ignoring DHCP from {} on {}: {}", src_mac, switch, reason);
                self.metrics.dhcp_ignored.inc();
                return;
            }
            DhcpDecision::Offer { ip, .. } => {
                info!("DHCP OFFER {} to {} via {}", ip, src_mac, switch);
                self.metrics.dhcp_offers.inc();
            }
            DhcpDecision::Ack { ip, .. } => {
                info!("DHCP ACK {} to {} via {}", ip, src_mac, switch);
                self.metrics.dhcp_acks.inc();
            }
            DhcpDecision::Nak => {
                info!("DHCP NAK to {} via {}", src_mac, switch);
                self.metrics.dhcp_naks.inc();
            }
        }

        let Some(frame) = self.responder.encode_reply(src_mac, msg, &decision) else {
            return;
        };
        let reply = PacketOut {
            buffer: None,
            in_port: PortNo::CONTROLLER,
            actions: vec![Action::output(in_port)],
            data: Some(frame),
        };
        self.southbound.emit(switch, &reply);
    }

    fn handle_switching(&mut self, event: &PacketIn, src: MacAddr, dst: MacAddr) {
        let plan = plan_forwarding(
            &mut self.fdb,
            event.switch,
            event.in_port,
            src,
            dst,
            event.buffer,
            &event.data,
        );
        self.metrics.fdb_size.set(self.fdb.len());
        trace!(
            "{} {} -> {} in_port={} out_port={}",
            event.switch, src, dst, event.in_port, plan.out_port
        );

        if plan.is_flood() {
            self.metrics.floods.inc();
        }
        if let Some(rule) = &plan.flow {
            self.southbound.install(event.switch, rule);
        }
        if let Some(out) = &plan.packet_out {
            self.southbound.emit(event.switch, out);
        }
    }

    pub fn forwarding_table(&self) -> &F {
        &self.fdb
    }

    pub fn leases(&self) -> &LeaseStore {
        &self.leases
    }

    pub fn topology(&self) -> &TopologyController {
        &self.topology
    }

    pub fn metrics(&self) -> Arc<ControllerMetrics> {
        self.metrics.clone()
    }

    pub fn datapath(&self) -> &D {
        self.southbound.datapath()
    }

    pub fn datapath_mut(&mut self) -> &mut D {
        self.southbound.datapath_mut()
    }
}

/// Convenience for building packet-in events from raw parts
pub fn packet_in_event(
    switch: SwitchId,
    in_port: PortNo,
    buffer_id: u32,
    data: Vec<u8>,
) -> Event {
    let total_len = u16::try_from(data.len()).unwrap_or(u16::MAX);
    Event::PacketIn(PacketIn {
        switch,
        in_port,
        buffer: BufferId::from_raw(buffer_id),
        data,
        total_len,
    })
}
