//! DHCP protocol - RFC 2131, 2132
//!
//! Decoding of client messages into an owned [`DhcpMessage`] view and
//! building of server replies.

use super::MacAddr;
use crate::{Error, Result};
use std::net::Ipv4Addr;

/// DHCP server port (bootps)
pub const DHCP_SERVER_PORT: u16 = 67;

/// DHCP client port (bootpc)
pub const DHCP_CLIENT_PORT: u16 = 68;

/// Fixed BOOTP header size (before the magic cookie)
pub const DHCP_HEADER_SIZE: usize = 236;

/// Magic cookie marking start of options
pub const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

/// Smallest datagram accepted: header + cookie
pub const MIN_PACKET_SIZE: usize = DHCP_HEADER_SIZE + MAGIC_COOKIE.len();

/// Replies are padded to the classic BOOTP size
const MIN_REPLY_SIZE: usize = 300;

/// BOOTP operation codes
pub const BOOTREQUEST: u8 = 1;
pub const BOOTREPLY: u8 = 2;

/// DHCP message types (Option 53)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DhcpMessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl DhcpMessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(DhcpMessageType::Discover),
            2 => Some(DhcpMessageType::Offer),
            3 => Some(DhcpMessageType::Request),
            4 => Some(DhcpMessageType::Decline),
            5 => Some(DhcpMessageType::Ack),
            6 => Some(DhcpMessageType::Nak),
            7 => Some(DhcpMessageType::Release),
            8 => Some(DhcpMessageType::Inform),
            _ => None,
        }
    }
}

/// DHCP option codes
pub mod options {
    pub const PAD: u8 = 0;
    pub const SUBNET_MASK: u8 = 1;
    pub const REQUESTED_IP: u8 = 50;
    pub const LEASE_TIME: u8 = 51;
    pub const MESSAGE_TYPE: u8 = 53;
    pub const SERVER_ID: u8 = 54;
    pub const PARAMETER_REQUEST: u8 = 55;
    pub const END: u8 = 255;
}

/// A single DHCP option (tag + value)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpOption {
    pub code: u8,
    pub data: Vec<u8>,
}

impl DhcpOption {
    pub fn new(code: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            data: data.into(),
        }
    }

    pub fn message_type(msg_type: DhcpMessageType) -> Self {
        Self::new(options::MESSAGE_TYPE, [msg_type as u8])
    }

    pub fn subnet_mask(mask: Ipv4Addr) -> Self {
        Self::new(options::SUBNET_MASK, mask.octets())
    }

    pub fn lease_time(seconds: u32) -> Self {
        Self::new(options::LEASE_TIME, seconds.to_be_bytes())
    }

    pub fn server_id(ip: Ipv4Addr) -> Self {
        Self::new(options::SERVER_ID, ip.octets())
    }

    pub fn requested_ip(ip: Ipv4Addr) -> Self {
        Self::new(options::REQUESTED_IP, ip.octets())
    }

    /// Value as an IPv4 address (exactly four bytes)
    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        let octets: [u8; 4] = self.data.as_slice().try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    /// Value as a big-endian u32 (exactly four bytes)
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.data.as_slice().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }
}

/// Parsed DHCP header (zero-copy reference)
#[derive(Debug)]
pub struct DhcpHeader<'a> {
    buffer: &'a [u8],
}

impl<'a> DhcpHeader<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < MIN_PACKET_SIZE {
            return Err(Error::Parse("DHCP message too short".into()));
        }
        if buffer[DHCP_HEADER_SIZE..MIN_PACKET_SIZE] != MAGIC_COOKIE {
            return Err(Error::Parse("invalid DHCP magic cookie".into()));
        }

        Ok(Self { buffer })
    }

    /// Operation code (1=request, 2=reply)
    pub fn op(&self) -> u8 {
        self.buffer[0]
    }

    /// Hardware address length (6 for Ethernet)
    pub fn hlen(&self) -> u8 {
        self.buffer[2]
    }

    /// Transaction ID
    pub fn xid(&self) -> u32 {
        u32::from_be_bytes([self.buffer[4], self.buffer[5], self.buffer[6], self.buffer[7]])
    }

    /// Flags (bit 15 = broadcast)
    pub fn flags(&self) -> u16 {
        u16::from_be_bytes([self.buffer[10], self.buffer[11]])
    }

    pub fn ciaddr(&self) -> Ipv4Addr {
        self.addr_at(12)
    }

    pub fn yiaddr(&self) -> Ipv4Addr {
        self.addr_at(16)
    }

    pub fn siaddr(&self) -> Ipv4Addr {
        self.addr_at(20)
    }

    /// Relay agent address
    pub fn giaddr(&self) -> Ipv4Addr {
        self.addr_at(24)
    }

    /// Client hardware address (16 bytes)
    pub fn chaddr(&self) -> [u8; 16] {
        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&self.buffer[28..44]);
        chaddr
    }

    fn addr_at(&self, offset: usize) -> Ipv4Addr {
        Ipv4Addr::new(
            self.buffer[offset],
            self.buffer[offset + 1],
            self.buffer[offset + 2],
            self.buffer[offset + 3],
        )
    }

    /// Iterate over options in wire order. Stops at END or at the first
    /// option whose length runs past the buffer.
    pub fn iter_options(&self) -> OptionIter<'a> {
        OptionIter {
            data: &self.buffer[MIN_PACKET_SIZE..],
            pos: 0,
        }
    }
}

/// Iterator over raw DHCP options, yields (code, value)
pub struct OptionIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for OptionIter<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&code) = self.data.get(self.pos) {
            match code {
                options::PAD => self.pos += 1,
                options::END => return None,
                _ => {
                    let len = *self.data.get(self.pos + 1)? as usize;
                    let start = self.pos + 2;
                    let value = self.data.get(start..start + len)?;
                    self.pos = start + len;
                    return Some((code, value));
                }
            }
        }
        None
    }
}

/// Owned, read-only view of a decoded DHCP datagram.
///
/// Options keep wire order and duplicates, so callers can tell a missing
/// option from a repeated one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpMessage {
    pub op: u8,
    pub xid: u32,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; 16],
    pub options: Vec<DhcpOption>,
}

impl DhcpMessage {
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        Ok(Self::from_header(&DhcpHeader::parse(buffer)?))
    }

    pub fn from_header(header: &DhcpHeader<'_>) -> Self {
        Self {
            op: header.op(),
            xid: header.xid(),
            flags: header.flags(),
            ciaddr: header.ciaddr(),
            giaddr: header.giaddr(),
            chaddr: header.chaddr(),
            options: header
                .iter_options()
                .map(|(code, value)| DhcpOption::new(code, value))
                .collect(),
        }
    }

    /// Client request with the given xid, chaddr and options
    pub fn request(xid: u32, client_mac: MacAddr, options: Vec<DhcpOption>) -> Self {
        let mut chaddr = [0u8; 16];
        chaddr[..6].copy_from_slice(&client_mac.0);
        Self {
            op: BOOTREQUEST,
            xid,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            options,
        }
    }

    /// All options carrying `code`, in wire order
    pub fn options_with(&self, code: u8) -> impl Iterator<Item = &DhcpOption> + '_ {
        self.options.iter().filter(move |opt| opt.code == code)
    }

    pub fn client_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.chaddr).unwrap_or_default()
    }

    /// Option 55 codes, first occurrence only
    pub fn parameter_request_list(&self) -> &[u8] {
        self.options_with(options::PARAMETER_REQUEST)
            .next()
            .map(|opt| opt.data.as_slice())
            .unwrap_or(&[])
    }

    /// Encode as a BOOTP datagram (used for client-side test traffic)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut builder = DhcpBuilder::from_fields(self.op, self.xid, self.flags, self.giaddr, self.chaddr);
        builder.ciaddr = self.ciaddr;
        for opt in &self.options {
            builder = builder.option(opt);
        }
        builder.build()
    }
}

/// DHCP message builder
#[derive(Debug, Clone)]
pub struct DhcpBuilder {
    op: u8,
    xid: u32,
    flags: u16,
    ciaddr: Ipv4Addr,
    yiaddr: Ipv4Addr,
    siaddr: Ipv4Addr,
    giaddr: Ipv4Addr,
    chaddr: [u8; 16],
    options: Vec<u8>,
}

impl DhcpBuilder {
    /// Start a reply to `request`: xid, flags, giaddr and chaddr are echoed
    pub fn reply(request: &DhcpMessage) -> Self {
        Self::from_fields(BOOTREPLY, request.xid, request.flags, request.giaddr, request.chaddr)
    }

    fn from_fields(op: u8, xid: u32, flags: u16, giaddr: Ipv4Addr, chaddr: [u8; 16]) -> Self {
        Self {
            op,
            xid,
            flags,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr,
            chaddr,
            options: Vec::new(),
        }
    }

    /// Set assigned IP address (yiaddr)
    pub fn yiaddr(mut self, ip: Ipv4Addr) -> Self {
        self.yiaddr = ip;
        self
    }

    /// Set next server IP address (siaddr)
    pub fn siaddr(mut self, ip: Ipv4Addr) -> Self {
        self.siaddr = ip;
        self
    }

    /// Append an option; values longer than 255 bytes are truncated
    pub fn option(mut self, opt: &DhcpOption) -> Self {
        let len = opt.data.len().min(u8::MAX as usize);
        self.options.push(opt.code);
        self.options.push(len as u8);
        self.options.extend_from_slice(&opt.data[..len]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut buffer = vec![0u8; MIN_PACKET_SIZE];
        buffer[0] = self.op;
        buffer[1] = 1; // htype: Ethernet
        buffer[2] = 6; // hlen
        buffer[4..8].copy_from_slice(&self.xid.to_be_bytes());
        buffer[10..12].copy_from_slice(&self.flags.to_be_bytes());
        buffer[12..16].copy_from_slice(&self.ciaddr.octets());
        buffer[16..20].copy_from_slice(&self.yiaddr.octets());
        buffer[20..24].copy_from_slice(&self.siaddr.octets());
        buffer[24..28].copy_from_slice(&self.giaddr.octets());
        buffer[28..44].copy_from_slice(&self.chaddr);
        buffer[DHCP_HEADER_SIZE..MIN_PACKET_SIZE].copy_from_slice(&MAGIC_COOKIE);

        buffer.extend_from_slice(&self.options);
        buffer.push(options::END);
        if buffer.len() < MIN_REPLY_SIZE {
            buffer.resize(MIN_REPLY_SIZE, options::PAD);
        }
        buffer
    }
}
