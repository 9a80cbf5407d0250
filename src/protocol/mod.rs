//! Packet codec
//!
//! Zero-copy parsers and builders for the layers the controller inspects
//! or originates: Ethernet, IPv4, UDP, ARP and DHCP.

pub mod arp;
pub mod dhcp;
pub mod ethernet;
pub mod ipv4;
pub mod packet;
pub mod types;
pub mod udp;

pub use packet::{Layer, Packet};
pub use types::*;
