//! Layered decoding of packet-in payloads
//!
//! Turns raw frame bytes into an ordered list of layers, outermost first.
//! Only the Ethernet layer is mandatory; deeper layers are attached while
//! they keep parsing.

use super::arp::ArpPacket;
use super::dhcp::{DHCP_SERVER_PORT, DhcpMessage};
use super::ethernet::Frame;
use super::ipv4::{Ipv4Header, protocol};
use super::udp::UdpHeader;
use super::{EtherType, MacAddr, VlanTag};
use crate::Result;
use std::net::Ipv4Addr;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetLayer {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
    pub vlan: Option<VlanTag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Layer {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub ttl: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpLayer {
    pub src_port: u16,
    pub dst_port: u16,
}

/// One decoded protocol layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Ethernet(EthernetLayer),
    Ipv4(Ipv4Layer),
    Udp(UdpLayer),
    Arp(ArpPacket),
    Dhcp(DhcpMessage),
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub layers: Vec<Layer>,
}

impl Packet {
    /// Decode a frame. Fails only when the Ethernet header itself is
    /// unreadable; malformed inner layers just end the layer list.
    pub fn decode(data: &[u8]) -> Result<Packet> {
        let frame = Frame::parse(data)?;
        let mut layers = vec![Layer::Ethernet(EthernetLayer {
            dst: frame.dst_mac(),
            src: frame.src_mac(),
            ethertype: frame.ethertype(),
            vlan: frame.vlan_tag(),
        })];

        match EtherType::from_u16(frame.ethertype()) {
            Some(EtherType::Ipv4) => decode_ipv4(frame.payload(), &mut layers),
            Some(EtherType::Arp) => match ArpPacket::parse(frame.payload()) {
                Ok(arp) => layers.push(Layer::Arp(arp)),
                Err(e) => trace!("ARP layer not decoded: {}", e),
            },
            _ => {}
        }

        Ok(Packet { layers })
    }

    pub fn ethernet(&self) -> Option<&EthernetLayer> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Ethernet(eth) => Some(eth),
            _ => None,
        })
    }

    pub fn ipv4(&self) -> Option<&Ipv4Layer> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Ipv4(ip) => Some(ip),
            _ => None,
        })
    }

    pub fn udp(&self) -> Option<&UdpLayer> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Udp(udp) => Some(udp),
            _ => None,
        })
    }

    pub fn arp(&self) -> Option<&ArpPacket> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Arp(arp) => Some(arp),
            _ => None,
        })
    }

    pub fn dhcp(&self) -> Option<&DhcpMessage> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Dhcp(msg) => Some(msg),
            _ => None,
        })
    }
}

fn decode_ipv4(data: &[u8], layers: &mut Vec<Layer>) {
    let ip = match Ipv4Header::parse(data) {
        Ok(ip) => ip,
        Err(e) => {
            trace!("IPv4 layer not decoded: {}", e);
            return;
        }
    };
    layers.push(Layer::Ipv4(Ipv4Layer {
        src: ip.src_addr(),
        dst: ip.dst_addr(),
        protocol: ip.protocol(),
        ttl: ip.ttl(),
    }));

    if ip.protocol() != protocol::UDP {
        return;
    }
    let udp = match UdpHeader::parse(ip.payload()) {
        Ok(udp) => udp,
        Err(e) => {
            trace!("UDP layer not decoded: {}", e);
            return;
        }
    };
    layers.push(Layer::Udp(UdpLayer {
        src_port: udp.src_port(),
        dst_port: udp.dst_port(),
    }));

    if udp.dst_port() == DHCP_SERVER_PORT {
        match DhcpMessage::parse(udp.payload()) {
            Ok(msg) => layers.push(Layer::Dhcp(msg)),
            Err(e) => trace!("DHCP layer not decoded: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::dhcp::{DHCP_CLIENT_PORT, DhcpMessageType, DhcpOption};
    use crate::protocol::ethernet::FrameBuilder;
    use crate::protocol::ipv4::Ipv4Builder;
    use crate::protocol::udp::UdpBuilder;

    const CLIENT: MacAddr = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

    fn udp_frame(dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let udp = UdpBuilder::new()
            .src_port(DHCP_CLIENT_PORT)
            .dst_port(dst_port)
            .payload(payload)
            .build(Ipv4Addr::UNSPECIFIED, Ipv4Addr::BROADCAST);
        let ip = Ipv4Builder::new()
            .protocol(protocol::UDP)
            .src_addr(Ipv4Addr::UNSPECIFIED)
            .dst_addr(Ipv4Addr::BROADCAST)
            .payload(&udp)
            .build();
        FrameBuilder::new(MacAddr::BROADCAST, CLIENT, EtherType::Ipv4)
            .payload(&ip)
            .build()
    }

    #[test]
    fn test_decode_dhcp_discover() {
        let discover = DhcpMessage::request(
            1,
            CLIENT,
            vec![DhcpOption::message_type(DhcpMessageType::Discover)],
        );
        let packet = Packet::decode(&udp_frame(67, &discover.to_bytes())).unwrap();

        assert_eq!(packet.layers.len(), 4);
        assert_eq!(packet.ethernet().unwrap().src, CLIENT);
        assert_eq!(packet.ipv4().unwrap().protocol, protocol::UDP);
        assert_eq!(packet.udp().unwrap().dst_port, 67);
        assert_eq!(packet.dhcp(), Some(&discover));
    }

    #[test]
    fn test_decode_udp_67_garbage_has_no_dhcp_layer() {
        let packet = Packet::decode(&udp_frame(67, &[1, 2, 3])).unwrap();
        assert!(packet.udp().is_some());
        assert!(packet.dhcp().is_none());
    }

    #[test]
    fn test_decode_other_udp_port_skips_dhcp() {
        let discover = DhcpMessage::request(1, CLIENT, vec![]);
        let packet = Packet::decode(&udp_frame(5353, &discover.to_bytes())).unwrap();
        assert!(packet.dhcp().is_none());
    }

    #[test]
    fn test_decode_arp() {
        let arp = ArpPacket::request(CLIENT, Ipv4Addr::new(10, 1, 1, 3), Ipv4Addr::new(10, 1, 1, 1));
        let frame = FrameBuilder::new(MacAddr::BROADCAST, CLIENT, EtherType::Arp)
            .payload(&arp.to_bytes())
            .build();

        let packet = Packet::decode(&frame).unwrap();
        assert_eq!(packet.arp(), Some(&arp));
        assert!(packet.ipv4().is_none());
    }

    #[test]
    fn test_decode_runt_frame_fails() {
        assert!(Packet::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_decode_unknown_ethertype() {
        let frame = [0u8; 14];
        let packet = Packet::decode(&frame).unwrap();
        assert_eq!(packet.layers.len(), 1);
        assert_eq!(packet.ethernet().unwrap().ethertype, 0);
    }
}
