//! ARP (Address Resolution Protocol) - RFC 826
//!
//! The controller never answers ARP itself; ARP frames are switched like any
//! other L2 traffic. Parsing exists so the decoder can report the layer.

use super::MacAddr;
use crate::{Error, Result};
use std::net::Ipv4Addr;

/// ARP packet size (for Ethernet/IPv4)
pub const ARP_PACKET_SIZE: usize = 28;

/// ARP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

/// ARP packet (Ethernet/IPv4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub operation: ArpOp,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < ARP_PACKET_SIZE {
            return Err(Error::Parse("ARP packet too short".into()));
        }
        // htype=1 (Ethernet), ptype=0x0800, hlen=6, plen=4
        if buffer[0..6] != [0x00, 0x01, 0x08, 0x00, 6, 4] {
            return Err(Error::Parse("unsupported ARP hardware/protocol".into()));
        }

        let operation = match u16::from_be_bytes([buffer[6], buffer[7]]) {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => return Err(Error::Parse(format!("invalid ARP operation {}", other))),
        };

        let ip_at = |i: usize| Ipv4Addr::new(buffer[i], buffer[i + 1], buffer[i + 2], buffer[i + 3]);
        let mac_at = |i: usize| MacAddr::from_slice(&buffer[i..]).unwrap_or_default();

        Ok(Self {
            operation,
            sender_mac: mac_at(8),
            sender_ip: ip_at(14),
            target_mac: mac_at(18),
            target_ip: ip_at(24),
        })
    }

    pub fn to_bytes(&self) -> [u8; ARP_PACKET_SIZE] {
        let mut buffer = [0u8; ARP_PACKET_SIZE];
        buffer[0..6].copy_from_slice(&[0x00, 0x01, 0x08, 0x00, 6, 4]);
        buffer[6..8].copy_from_slice(&(self.operation as u16).to_be_bytes());
        buffer[8..14].copy_from_slice(&self.sender_mac.0);
        buffer[14..18].copy_from_slice(&self.sender_ip.octets());
        buffer[18..24].copy_from_slice(&self.target_mac.0);
        buffer[24..28].copy_from_slice(&self.target_ip.octets());
        buffer
    }

    /// Who-has request for `target_ip`
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            operation: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }
}
