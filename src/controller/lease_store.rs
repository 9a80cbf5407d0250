//! Address lease store
//!
//! One lease per client MAC, created on the first DISCOVER and kept for the
//! life of the process. Which address a new client gets is decided by an
//! [`AllocationPolicy`]; the store itself guarantees that an address is
//! never bound to two MACs.

use crate::config::AllocationConfig;
use crate::protocol::MacAddr;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;
use tracing::debug;

/// A bound address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

/// Chooses an address for a client that has no lease yet.
///
/// `taken` holds every address already bound to some MAC. Returning one of
/// those, or `None`, makes the store refuse the allocation.
pub trait AllocationPolicy: Send {
    fn allocate(&mut self, mac: &MacAddr, taken: &HashSet<Ipv4Addr>) -> Option<Ipv4Addr>;
}

/// Hands out one fixed address, so only the first client is served
#[derive(Debug, Clone)]
pub struct FixedAddress {
    address: Ipv4Addr,
}

impl FixedAddress {
    pub fn new(address: Ipv4Addr) -> Self {
        Self { address }
    }
}

impl AllocationPolicy for FixedAddress {
    fn allocate(&mut self, _mac: &MacAddr, taken: &HashSet<Ipv4Addr>) -> Option<Ipv4Addr> {
        (!taken.contains(&self.address)).then_some(self.address)
    }
}

/// Per-MAC reservations; unknown MACs get nothing
#[derive(Debug, Clone, Default)]
pub struct StaticBindings {
    bindings: BTreeMap<MacAddr, Ipv4Addr>,
}

impl StaticBindings {
    pub fn new(bindings: BTreeMap<MacAddr, Ipv4Addr>) -> Self {
        Self { bindings }
    }
}

impl AllocationPolicy for StaticBindings {
    fn allocate(&mut self, mac: &MacAddr, taken: &HashSet<Ipv4Addr>) -> Option<Ipv4Addr> {
        self.bindings
            .get(mac)
            .copied()
            .filter(|ip| !taken.contains(ip))
    }
}

/// Lowest free address in an inclusive range
#[derive(Debug, Clone)]
pub struct SequentialPool {
    start: u32,
    end: u32,
}

impl SequentialPool {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Self {
        Self {
            start: u32::from(start),
            end: u32::from(end),
        }
    }

    pub fn size(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }
}

impl AllocationPolicy for SequentialPool {
    fn allocate(&mut self, _mac: &MacAddr, taken: &HashSet<Ipv4Addr>) -> Option<Ipv4Addr> {
        (self.start..=self.end)
            .map(Ipv4Addr::from)
            .find(|ip| !taken.contains(ip))
    }
}

/// Build the policy described by the `[dhcp.allocation]` section
pub fn policy_from_config(config: &AllocationConfig) -> Box<dyn AllocationPolicy> {
    match config {
        AllocationConfig::Fixed { address } => Box::new(FixedAddress::new(*address)),
        AllocationConfig::Static { bindings } => Box::new(StaticBindings::new(bindings.clone())),
        AllocationConfig::Pool { range } => Box::new(SequentialPool::new(range.0, range.1)),
    }
}

pub struct LeaseStore {
    leases: HashMap<MacAddr, Lease>,
    /// Every address currently bound
    assigned: HashSet<Ipv4Addr>,
    policy: Box<dyn AllocationPolicy>,
}

impl LeaseStore {
    pub fn new(policy: Box<dyn AllocationPolicy>) -> Self {
        Self {
            leases: HashMap::new(),
            assigned: HashSet::new(),
            policy,
        }
    }

    pub fn get(&self, mac: &MacAddr) -> Option<&Lease> {
        self.leases.get(mac)
    }

    /// Existing lease for `mac`, or a new one from the policy.
    /// `None` when the policy has nothing left to give.
    pub fn get_or_allocate(&mut self, mac: MacAddr) -> Option<Lease> {
        if let Some(lease) = self.leases.get(&mac) {
            return Some(*lease);
        }

        let ip = self.policy.allocate(&mac, &self.assigned)?;
        if !self.assigned.insert(ip) {
            debug!("Policy offered {} which is already bound, refusing", ip);
            return None;
        }

        let lease = Lease { mac, ip };
        self.leases.insert(mac, lease);
        debug!("New lease {} -> {}", mac, ip);
        Some(lease)
    }

    pub fn is_assigned(&self, ip: &Ipv4Addr) -> bool {
        self.assigned.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lease> + '_ {
        self.leases.values()
    }
}

impl std::fmt::Debug for LeaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseStore")
            .field("leases", &self.leases)
            .finish_non_exhaustive()
    }
}
