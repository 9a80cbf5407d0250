//! Southbound vocabulary shared with the switch control protocol engine
//!
//! These are the values the controller exchanges with an OpenFlow session:
//! events coming up from switches, and flow rules / packet-outs going down
//! through a [`Datapath`]. Wire serialization belongs to the engine.

mod recorder;

pub use recorder::{Command, RecordingDatapath};

use crate::protocol::MacAddr;
use crate::Result;
use std::fmt;

/// Datapath identifier of a switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwitchId(pub u64);

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Switch port number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortNo(pub u32);

impl PortNo {
    /// All ports except the ingress port
    pub const FLOOD: PortNo = PortNo(0xffff_fffb);
    /// Send to the controller
    pub const CONTROLLER: PortNo = PortNo(0xffff_fffd);

    pub fn is_reserved(&self) -> bool {
        self.0 >= 0xffff_ff00
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PortNo::FLOOD => write!(f, "FLOOD"),
            PortNo::CONTROLLER => write!(f, "CONTROLLER"),
            PortNo(n) => write!(f, "{}", n),
        }
    }
}

/// Switch-side packet buffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

impl BufferId {
    pub const NO_BUFFER: u32 = 0xffff_ffff;

    /// Normalize a raw buffer id; `NO_BUFFER` becomes `None`
    pub fn from_raw(raw: u32) -> Option<BufferId> {
        (raw != Self::NO_BUFFER).then_some(BufferId(raw))
    }
}

/// `max_len` asking the switch to send the whole packet to the controller
pub const MAX_LEN_NO_BUFFER: u16 = 0xffff;

/// Flow match; absent fields are wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    pub in_port: Option<PortNo>,
    pub eth_dst: Option<MacAddr>,
    pub eth_type: Option<u16>,
    pub ip_proto: Option<u8>,
    pub udp_dst: Option<u16>,
}

impl Match {
    /// Wildcard match
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Output { port: PortNo, max_len: u16 },
}

impl Action {
    pub fn output(port: PortNo) -> Self {
        Action::Output { port, max_len: 0 }
    }

    pub fn to_controller() -> Self {
        Action::Output {
            port: PortNo::CONTROLLER,
            max_len: MAX_LEN_NO_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    pub priority: u16,
    pub match_: Match,
    pub actions: Vec<Action>,
    /// Buffered packet the switch should release through the new rule
    pub buffer: Option<BufferId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer: Option<BufferId>,
    pub in_port: PortNo,
    pub actions: Vec<Action>,
    /// Raw frame, only sent when there is no switch-side buffer
    pub data: Option<Vec<u8>>,
}

/// Unmatched packet delivered to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub switch: SwitchId,
    pub in_port: PortNo,
    pub buffer: Option<BufferId>,
    pub data: Vec<u8>,
    /// Original frame length; larger than `data.len()` when truncated
    pub total_len: u16,
}

impl PacketIn {
    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.total_len as usize
    }
}

/// Events raised by the protocol engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Switch connected and identified
    SwitchJoin(SwitchId),
    /// Features handshake done; the switch accepts flow programming
    SwitchReady(SwitchId),
    PacketIn(PacketIn),
}

/// Commands the controller can issue to a switch
pub trait Datapath {
    fn install_flow(&mut self, switch: SwitchId, rule: &FlowRule) -> Result<()>;

    fn emit_packet(&mut self, switch: SwitchId, packet: &PacketOut) -> Result<()>;
}
