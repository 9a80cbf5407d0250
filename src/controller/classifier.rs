//! Packet-in classification

use crate::protocol::dhcp::{DHCP_SERVER_PORT, DhcpMessage};
use crate::protocol::ipv4::protocol;
use crate::protocol::{MacAddr, Packet};

/// Which path a packet-in takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    /// IPv4/UDP to port 67. Handled by the DHCP responder only.
    /// `message` is `None` when the payload is not a DHCP message.
    DhcpCandidate {
        src_mac: MacAddr,
        message: Option<&'a DhcpMessage>,
    },
    /// Everything else goes through the learning switch
    OtherTraffic { src_mac: MacAddr, dst_mac: MacAddr },
}

/// Classify a decoded packet. `None` if it carries no Ethernet layer.
pub fn classify(packet: &Packet) -> Option<Classification<'_>> {
    let eth = packet.ethernet()?;

    let is_dhcp = packet.ipv4().is_some_and(|ip| ip.protocol == protocol::UDP)
        && packet.udp().is_some_and(|udp| udp.dst_port == DHCP_SERVER_PORT);

    Some(if is_dhcp {
        Classification::DhcpCandidate {
            src_mac: eth.src,
            message: packet.dhcp(),
        }
    } else {
        Classification::OtherTraffic {
            src_mac: eth.src,
            dst_mac: eth.dst,
        }
    })
}
