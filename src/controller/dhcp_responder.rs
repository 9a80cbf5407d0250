//! Controller-side DHCP responder
//!
//! Answers DISCOVER with OFFER and REQUEST with ACK or NAK. Leases are
//! keyed by the Ethernet source address of the request, never expire, and
//! are never renewed. The decision step only touches the lease store; frame
//! construction is separate so either half can be tested alone.

use super::lease_store::LeaseStore;
use crate::protocol::dhcp::{
    DHCP_CLIENT_PORT, DHCP_SERVER_PORT, DhcpBuilder, DhcpMessage, DhcpMessageType, DhcpOption,
    options,
};
use crate::protocol::ethernet::FrameBuilder;
use crate::protocol::ipv4::{Ipv4Builder, protocol};
use crate::protocol::udp::UdpBuilder;
use crate::protocol::{EtherType, MacAddr};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{debug, trace, warn};

/// Default controller address used as DHCP server identity
pub const DEFAULT_SERVER_IP: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 254);
/// Default controller MAC used as source of DHCP replies
pub const DEFAULT_SERVER_MAC: MacAddr = MacAddr([0x00, 0x12, 0x34, 0x56, 0x78, 0x90]);
pub const DEFAULT_SUBNET_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
/// Lease time advertised in option 51, in seconds
pub const DEFAULT_LEASE_TIME: u32 = 8640;

/// Identity and parameters advertised in replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpSettings {
    pub server_ip: Ipv4Addr,
    pub server_mac: MacAddr,
    pub subnet_mask: Ipv4Addr,
    pub lease_time: u32,
}

impl Default for DhcpSettings {
    fn default() -> Self {
        Self {
            server_ip: DEFAULT_SERVER_IP,
            server_mac: DEFAULT_SERVER_MAC,
            subnet_mask: DEFAULT_SUBNET_MASK,
            lease_time: DEFAULT_LEASE_TIME,
        }
    }
}

/// Why a DHCP candidate got no reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Payload on UDP/67 did not decode as DHCP
    Undecodable,
    MissingMessageType,
    DuplicateMessageType,
    /// Option 53 present but not a single byte
    MalformedMessageType,
    /// Anything other than DISCOVER or REQUEST
    UnsupportedMessageType(u8),
    MissingRequestedIp,
    DuplicateRequestedIp,
    /// Option 50 present but not four bytes
    MalformedRequestedIp,
    /// REQUEST for an address other than the one bound to the client
    AddressMismatch { requested: Ipv4Addr, bound: Ipv4Addr },
    /// Allocation policy had no address for a new client
    PoolExhausted,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Undecodable => write!(f, "payload is not a DHCP message"),
            IgnoreReason::MissingMessageType => write!(f, "no message type option"),
            IgnoreReason::DuplicateMessageType => write!(f, "message type option repeated"),
            IgnoreReason::MalformedMessageType => write!(f, "message type option malformed"),
            IgnoreReason::UnsupportedMessageType(t) => write!(f, "unsupported message type {}", t),
            IgnoreReason::MissingRequestedIp => write!(f, "no requested IP option"),
            IgnoreReason::DuplicateRequestedIp => write!(f, "requested IP option repeated"),
            IgnoreReason::MalformedRequestedIp => write!(f, "requested IP option malformed"),
            IgnoreReason::AddressMismatch { requested, bound } => {
                write!(f, "requested {} but bound to {}", requested, bound)
            }
            IgnoreReason::PoolExhausted => write!(f, "no address available"),
        }
    }
}

/// Outcome of one DHCP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpDecision {
    Ignore(IgnoreReason),
    Offer { ip: Ipv4Addr, options: Vec<DhcpOption> },
    Ack { ip: Ipv4Addr, options: Vec<DhcpOption> },
    Nak,
}

impl DhcpDecision {
    /// Message type of the reply, if there is one
    pub fn reply_type(&self) -> Option<DhcpMessageType> {
        match self {
            DhcpDecision::Ignore(_) => None,
            DhcpDecision::Offer { .. } => Some(DhcpMessageType::Offer),
            DhcpDecision::Ack { .. } => Some(DhcpMessageType::Ack),
            DhcpDecision::Nak => Some(DhcpMessageType::Nak),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DhcpResponder {
    settings: DhcpSettings,
}

impl DhcpResponder {
    pub fn new(settings: DhcpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DhcpSettings {
        &self.settings
    }

    /// Decide how to answer `msg` from `src_mac`.
    ///
    /// Only a DISCOVER from a new client changes the store.
    pub fn respond(
        &self,
        src_mac: MacAddr,
        msg: &DhcpMessage,
        leases: &mut LeaseStore,
    ) -> DhcpDecision {
        let msg_type = match message_type(msg) {
            Ok(t) => t,
            Err(reason) => return DhcpDecision::Ignore(reason),
        };
        trace!(
            "DHCP {:?} from {} xid={:#010x} params={:?}",
            msg_type,
            src_mac,
            msg.xid,
            msg.parameter_request_list()
        );

        match msg_type {
            DhcpMessageType::Discover => match leases.get_or_allocate(src_mac) {
                Some(lease) => DhcpDecision::Offer {
                    ip: lease.ip,
                    options: self.lease_options(DhcpMessageType::Offer),
                },
                None => {
                    warn!("No address available for {}", src_mac);
                    DhcpDecision::Ignore(IgnoreReason::PoolExhausted)
                }
            },
            DhcpMessageType::Request => {
                let requested = match requested_ip(msg) {
                    Ok(ip) => ip,
                    Err(reason) => return DhcpDecision::Ignore(reason),
                };
                match leases.get(&src_mac) {
                    None => DhcpDecision::Nak,
                    Some(lease) if lease.ip != requested => {
                        DhcpDecision::Ignore(IgnoreReason::AddressMismatch {
                            requested,
                            bound: lease.ip,
                        })
                    }
                    Some(lease) => DhcpDecision::Ack {
                        ip: lease.ip,
                        options: self.lease_options(DhcpMessageType::Ack),
                    },
                }
            }
            other => DhcpDecision::Ignore(IgnoreReason::UnsupportedMessageType(other as u8)),
        }
    }

    /// Options for OFFER/ACK, in wire order
    fn lease_options(&self, msg_type: DhcpMessageType) -> Vec<DhcpOption> {
        vec![
            DhcpOption::message_type(msg_type),
            DhcpOption::subnet_mask(self.settings.subnet_mask),
            DhcpOption::lease_time(self.settings.lease_time),
            DhcpOption::server_id(self.settings.server_ip),
        ]
    }

    /// Build the Ethernet frame answering `request`. `None` for `Ignore`.
    pub fn encode_reply(
        &self,
        src_mac: MacAddr,
        request: &DhcpMessage,
        decision: &DhcpDecision,
    ) -> Option<Vec<u8>> {
        let (yiaddr, opts) = match decision {
            DhcpDecision::Ignore(_) => return None,
            DhcpDecision::Offer { ip, options } | DhcpDecision::Ack { ip, options } => {
                (*ip, options.clone())
            }
            DhcpDecision::Nak => (
                Ipv4Addr::UNSPECIFIED,
                vec![DhcpOption::message_type(DhcpMessageType::Nak)],
            ),
        };

        let dhcp = opts
            .iter()
            .fold(
                DhcpBuilder::reply(request)
                    .yiaddr(yiaddr)
                    .siaddr(self.settings.server_ip),
                |builder, opt| builder.option(opt),
            )
            .build();

        let udp = UdpBuilder::new()
            .src_port(DHCP_SERVER_PORT)
            .dst_port(DHCP_CLIENT_PORT)
            .payload(&dhcp)
            .build(self.settings.server_ip, Ipv4Addr::BROADCAST);

        let ip = Ipv4Builder::new()
            .protocol(protocol::UDP)
            .src_addr(self.settings.server_ip)
            .dst_addr(Ipv4Addr::BROADCAST)
            .payload(&udp)
            .build();

        let frame = FrameBuilder::new(src_mac, self.settings.server_mac, EtherType::Ipv4)
            .payload(&ip)
            .build();

        debug!(
            "Encoded DHCP {:?} for {} yiaddr={} ({} bytes)",
            decision.reply_type(),
            src_mac,
            yiaddr,
            frame.len()
        );
        Some(frame)
    }
}

/// Option 53, which must appear exactly once with a single byte
fn message_type(msg: &DhcpMessage) -> Result<DhcpMessageType, IgnoreReason> {
    let opt = single_option(msg, options::MESSAGE_TYPE)
        .ok_or(IgnoreReason::MissingMessageType)?
        .map_err(|_| IgnoreReason::DuplicateMessageType)?;

    match opt.data.as_slice() {
        [value] => DhcpMessageType::from_u8(*value)
            .ok_or(IgnoreReason::UnsupportedMessageType(*value)),
        _ => Err(IgnoreReason::MalformedMessageType),
    }
}

/// Option 50, which must appear exactly once with four bytes
fn requested_ip(msg: &DhcpMessage) -> Result<Ipv4Addr, IgnoreReason> {
    single_option(msg, options::REQUESTED_IP)
        .ok_or(IgnoreReason::MissingRequestedIp)?
        .map_err(|_| IgnoreReason::DuplicateRequestedIp)?
        .as_ipv4()
        .ok_or(IgnoreReason::MalformedRequestedIp)
}

/// `None` if absent, `Some(Err(()))` if repeated
fn single_option(msg: &DhcpMessage, code: u8) -> Option<Result<&DhcpOption, ()>> {
    let mut matches = msg.options_with(code);
    let first = matches.next()?;
    Some(if matches.next().is_some() { Err(()) } else { Ok(first) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::lease_store::SequentialPool;
    use crate::protocol::Packet;
    use crate::protocol::dhcp::{BOOTREPLY, DhcpHeader};

    const CLIENT: MacAddr = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const FIRST: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 3);

    fn store() -> LeaseStore {
        LeaseStore::new(Box::new(SequentialPool::new(FIRST, Ipv4Addr::new(10, 1, 1, 253))))
    }

    fn discover() -> DhcpMessage {
        DhcpMessage::request(
            0x1234,
            CLIENT,
            vec![DhcpOption::message_type(DhcpMessageType::Discover)],
        )
    }

    fn request(ip: Ipv4Addr) -> DhcpMessage {
        DhcpMessage::request(
            0x1235,
            CLIENT,
            vec![
                DhcpOption::message_type(DhcpMessageType::Request),
                DhcpOption::requested_ip(ip),
            ],
        )
    }

    // ========================================
    // Decision Tests
    // ========================================

    #[test]
    fn test_discover_offers_first_pool_address() {
        let responder = DhcpResponder::default();
        let mut leases = store();

        match responder.respond(CLIENT, &discover(), &mut leases) {
            DhcpDecision::Offer { ip, options } => {
                assert_eq!(ip, FIRST);
                assert_eq!(
                    options,
                    vec![
                        DhcpOption::new(53, [2]),
                        DhcpOption::new(1, [255, 255, 255, 0]),
                        DhcpOption::new(51, [0x00, 0x00, 0x21, 0xc0]),
                        DhcpOption::new(54, [10, 1, 1, 254]),
                    ]
                );
            }
            other => panic!("expected offer, got {:?}", other),
        }
        assert_eq!(leases.get(&CLIENT).unwrap().ip, FIRST);
    }

    #[test]
    fn test_repeated_discover_reuses_lease() {
        let responder = DhcpResponder::default();
        let mut leases = store();
        let first = responder.respond(CLIENT, &discover(), &mut leases);
        let second = responder.respond(CLIENT, &discover(), &mut leases);
        assert_eq!(first, second);
        assert_eq!(leases.len(), 1);
    }

    #[test]
    fn test_request_matching_lease_is_acked() {
        let responder = DhcpResponder::default();
        let mut leases = store();
        responder.respond(CLIENT, &discover(), &mut leases);

        let decision = responder.respond(CLIENT, &request(FIRST), &mut leases);
        assert!(matches!(decision, DhcpDecision::Ack { ip, .. } if ip == FIRST));
        assert_eq!(decision.reply_type(), Some(DhcpMessageType::Ack));
    }

    #[test]
    fn test_request_mismatch_is_ignored() {
        let responder = DhcpResponder::default();
        let mut leases = store();
        responder.respond(CLIENT, &discover(), &mut leases);

        let other = Ipv4Addr::new(10, 1, 1, 99);
        assert_eq!(
            responder.respond(CLIENT, &request(other), &mut leases),
            DhcpDecision::Ignore(IgnoreReason::AddressMismatch {
                requested: other,
                bound: FIRST
            })
        );
    }

    #[test]
    fn test_request_without_lease_is_nakked() {
        let responder = DhcpResponder::default();
        let mut leases = store();
        assert_eq!(responder.respond(CLIENT, &request(FIRST), &mut leases), DhcpDecision::Nak);
        assert!(leases.is_empty());
    }

    #[test]
    fn test_request_option_50_checked_before_lease() {
        let responder = DhcpResponder::default();
        let mut leases = store();

        let missing = DhcpMessage::request(
            1,
            CLIENT,
            vec![DhcpOption::message_type(DhcpMessageType::Request)],
        );
        assert_eq!(
            responder.respond(CLIENT, &missing, &mut leases),
            DhcpDecision::Ignore(IgnoreReason::MissingRequestedIp)
        );

        let mut twice = request(FIRST);
        twice.options.push(DhcpOption::requested_ip(FIRST));
        assert_eq!(
            responder.respond(CLIENT, &twice, &mut leases),
            DhcpDecision::Ignore(IgnoreReason::DuplicateRequestedIp)
        );

        let mut short = request(FIRST);
        short.options[1] = DhcpOption::new(50, [10, 1, 1]);
        assert_eq!(
            responder.respond(CLIENT, &short, &mut leases),
            DhcpDecision::Ignore(IgnoreReason::MalformedRequestedIp)
        );
    }

    #[test]
    fn test_message_type_validation() {
        let responder = DhcpResponder::default();
        let mut leases = store();

        let none = DhcpMessage::request(1, CLIENT, vec![]);
        assert_eq!(
            responder.respond(CLIENT, &none, &mut leases),
            DhcpDecision::Ignore(IgnoreReason::MissingMessageType)
        );

        let mut dup = discover();
        dup.options.push(DhcpOption::message_type(DhcpMessageType::Discover));
        assert_eq!(
            responder.respond(CLIENT, &dup, &mut leases),
            DhcpDecision::Ignore(IgnoreReason::DuplicateMessageType)
        );

        let release = DhcpMessage::request(
            1,
            CLIENT,
            vec![DhcpOption::message_type(DhcpMessageType::Release)],
        );
        assert_eq!(
            responder.respond(CLIENT, &release, &mut leases),
            DhcpDecision::Ignore(IgnoreReason::UnsupportedMessageType(7))
        );

        let wide = DhcpMessage::request(1, CLIENT, vec![DhcpOption::new(53, [1, 1])]);
        assert_eq!(
            responder.respond(CLIENT, &wide, &mut leases),
            DhcpDecision::Ignore(IgnoreReason::MalformedMessageType)
        );
        assert!(leases.is_empty());
    }

    #[test]
    fn test_lease_keyed_by_ethernet_source() {
        let responder = DhcpResponder::default();
        let mut leases = store();
        let relay_mac = MacAddr([0x02, 0, 0, 0, 0, 1]);

        responder.respond(relay_mac, &discover(), &mut leases);
        assert!(leases.get(&relay_mac).is_some());
        assert!(leases.get(&CLIENT).is_none());
    }

    #[test]
    fn test_exhausted_pool_is_ignored() {
        let responder = DhcpResponder::default();
        let mut leases = LeaseStore::new(Box::new(SequentialPool::new(FIRST, FIRST)));
        responder.respond(CLIENT, &discover(), &mut leases);

        let other = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x66]);
        assert_eq!(
            responder.respond(other, &discover(), &mut leases),
            DhcpDecision::Ignore(IgnoreReason::PoolExhausted)
        );
    }

    // ========================================
    // Encoding Tests
    // ========================================

    #[test]
    fn test_encode_offer_frame() {
        let responder = DhcpResponder::default();
        let mut leases = store();
        let msg = discover();
        let decision = responder.respond(CLIENT, &msg, &mut leases);
        let frame = responder.encode_reply(CLIENT, &msg, &decision).unwrap();

        let packet = Packet::decode(&frame).unwrap();
        let eth = packet.ethernet().unwrap();
        assert_eq!(eth.dst, CLIENT);
        assert_eq!(eth.src, DEFAULT_SERVER_MAC);

        let ip = packet.ipv4().unwrap();
        assert_eq!(ip.src, DEFAULT_SERVER_IP);
        assert_eq!(ip.dst, Ipv4Addr::BROADCAST);
        assert_eq!(ip.protocol, protocol::UDP);

        let udp = packet.udp().unwrap();
        assert_eq!((udp.src_port, udp.dst_port), (67, 68));

        // Port 68 is not decoded as DHCP by the packet decoder; read it directly
        let dhcp_start = 14 + 20 + 8;
        let header = DhcpHeader::parse(&frame[dhcp_start..]).unwrap();
        assert_eq!(header.op(), BOOTREPLY);
        assert_eq!(header.xid(), 0x1234);
        assert_eq!(header.yiaddr(), FIRST);
        assert_eq!(header.siaddr(), DEFAULT_SERVER_IP);
        assert_eq!(header.chaddr(), msg.chaddr);
        assert_eq!(header.iter_options().next(), Some((53, &[2u8][..])));
    }

    #[test]
    fn test_encode_nak_frame() {
        let responder = DhcpResponder::default();
        let msg = request(FIRST);
        let frame = responder.encode_reply(CLIENT, &msg, &DhcpDecision::Nak).unwrap();

        let header = DhcpHeader::parse(&frame[42..]).unwrap();
        assert_eq!(header.yiaddr(), Ipv4Addr::UNSPECIFIED);
        let opts: Vec<_> = header.iter_options().collect();
        assert_eq!(opts, vec![(53, &[6u8][..])]);
    }

    #[test]
    fn test_encode_ignore_is_none() {
        let responder = DhcpResponder::default();
        let decision = DhcpDecision::Ignore(IgnoreReason::MissingMessageType);
        assert!(responder.encode_reply(CLIENT, &discover(), &decision).is_none());
    }
}
