//! IPv4 protocol - RFC 791
//!
//! Only what the controller needs: reading headers of packet-in payloads and
//! building option-less headers for DHCP replies.

use crate::{Error, Result};
use std::net::Ipv4Addr;

/// Minimum IPv4 header size (without options)
pub const MIN_HEADER_SIZE: usize = 20;

/// Default TTL for controller-originated packets
pub const DEFAULT_TTL: u8 = 64;

/// IPv4 protocol numbers used by the controller
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

/// Parsed IPv4 header (zero-copy reference)
#[derive(Debug)]
pub struct Ipv4Header<'a> {
    buffer: &'a [u8],
    header_len: usize,
}

impl<'a> Ipv4Header<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < MIN_HEADER_SIZE {
            return Err(Error::Parse("IPv4 header too short".into()));
        }
        if buffer[0] >> 4 != 4 {
            return Err(Error::Parse("not an IPv4 packet".into()));
        }

        let header_len = ((buffer[0] & 0x0F) as usize) * 4;
        if header_len < MIN_HEADER_SIZE || buffer.len() < header_len {
            return Err(Error::Parse("IPv4 header truncated".into()));
        }

        Ok(Self { buffer, header_len })
    }

    pub fn total_length(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    pub fn ttl(&self) -> u8 {
        self.buffer[8]
    }

    pub fn protocol(&self) -> u8 {
        self.buffer[9]
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[12],
            self.buffer[13],
            self.buffer[14],
            self.buffer[15],
        )
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[16],
            self.buffer[17],
            self.buffer[18],
            self.buffer[19],
        )
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Payload bounded by the total length field when it is sane,
    /// otherwise everything after the header (frames may carry padding).
    pub fn payload(&self) -> &'a [u8] {
        let total = self.total_length() as usize;
        let end = if total >= self.header_len && total <= self.buffer.len() {
            total
        } else {
            self.buffer.len()
        };
        &self.buffer[self.header_len..end]
    }

    pub fn validate_checksum(&self) -> bool {
        checksum(&self.buffer[..self.header_len]) == 0
    }
}

/// Folded one's-complement sum of 16-bit words, seeded with `initial`
pub(crate) fn ones_complement_sum(initial: u32, data: &[u8]) -> u16 {
    let mut sum = initial;
    for chunk in data.chunks(2) {
        let word = match chunk {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [hi] => u16::from_be_bytes([*hi, 0]),
            _ => 0,
        };
        sum = sum.wrapping_add(word as u32);
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    sum as u16
}

/// Calculate IPv4 header checksum
pub fn checksum(header: &[u8]) -> u16 {
    !ones_complement_sum(0, header)
}

/// Builder for option-less IPv4 packets
#[derive(Debug, Clone)]
pub struct Ipv4Builder {
    ttl: u8,
    protocol: u8,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    payload: Vec<u8>,
}

impl Ipv4Builder {
    pub fn new() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            protocol: 0,
            src_addr: Ipv4Addr::UNSPECIFIED,
            dst_addr: Ipv4Addr::UNSPECIFIED,
            payload: Vec::new(),
        }
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn src_addr(mut self, addr: Ipv4Addr) -> Self {
        self.src_addr = addr;
        self
    }

    pub fn dst_addr(mut self, addr: Ipv4Addr) -> Self {
        self.dst_addr = addr;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let total_length = (MIN_HEADER_SIZE + self.payload.len()) as u16;
        let mut buffer = vec![0u8; MIN_HEADER_SIZE];

        buffer[0] = 0x45;
        buffer[2..4].copy_from_slice(&total_length.to_be_bytes());
        // Don't Fragment
        buffer[6] = 0x40;
        buffer[8] = self.ttl;
        buffer[9] = self.protocol;
        buffer[12..16].copy_from_slice(&self.src_addr.octets());
        buffer[16..20].copy_from_slice(&self.dst_addr.octets());

        let sum = checksum(&buffer);
        buffer[10..12].copy_from_slice(&sum.to_be_bytes());

        buffer.extend_from_slice(&self.payload);
        buffer
    }
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_udp_stub() -> Vec<u8> {
        Ipv4Builder::new()
            .protocol(protocol::UDP)
            .src_addr(Ipv4Addr::new(10, 1, 1, 254))
            .dst_addr(Ipv4Addr::BROADCAST)
            .payload(&[1, 2, 3, 4])
            .build()
    }

    #[test]
    fn test_builder_fields() {
        let data = build_udp_stub();
        let header = Ipv4Header::parse(&data).unwrap();

        assert_eq!(header.header_len(), MIN_HEADER_SIZE);
        assert_eq!(header.total_length(), 24);
        assert_eq!(header.ttl(), DEFAULT_TTL);
        assert_eq!(header.protocol(), protocol::UDP);
        assert_eq!(header.src_addr(), Ipv4Addr::new(10, 1, 1, 254));
        assert_eq!(header.dst_addr(), Ipv4Addr::BROADCAST);
        assert_eq!(header.payload(), &[1, 2, 3, 4]);
        assert!(header.validate_checksum());
    }

    #[test]
    fn test_payload_ignores_trailing_padding() {
        let mut data = build_udp_stub();
        // Ethernet minimum-size padding after the IP datagram
        data.extend_from_slice(&[0u8; 10]);
        let header = Ipv4Header::parse(&data).unwrap();
        assert_eq!(header.payload(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Ipv4Header::parse(&[0x45; 10]).is_err());

        let mut v6 = build_udp_stub();
        v6[0] = 0x65;
        assert!(Ipv4Header::parse(&v6).is_err());

        let mut long_ihl = build_udp_stub();
        long_ihl[0] = 0x4F;
        assert!(Ipv4Header::parse(&long_ihl).is_err());
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut data = build_udp_stub();
        data[8] = 1;
        let header = Ipv4Header::parse(&data).unwrap();
        assert!(!header.validate_checksum());
    }
}
