//! Learning-switch forwarding decision

use super::fdb::ForwardingTable;
use super::PRIORITY_LEARNED;
use crate::ofp::{Action, BufferId, FlowRule, Match, PacketOut, PortNo, SwitchId};
use crate::protocol::MacAddr;

/// What to do with one non-DHCP packet-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardPlan {
    pub out_port: PortNo,
    /// Rule caching a known destination
    pub flow: Option<FlowRule>,
    pub packet_out: Option<PacketOut>,
}

impl ForwardPlan {
    pub fn is_flood(&self) -> bool {
        self.out_port == PortNo::FLOOD
    }
}

/// Learn the source, then forward to the learned port of `dst` or flood.
///
/// A known destination produces a priority-1 rule on `{in_port, eth_dst}`.
/// When the switch buffered the packet the rule releases it, so no
/// packet-out is produced.
pub fn plan_forwarding<F: ForwardingTable + ?Sized>(
    table: &mut F,
    switch: SwitchId,
    in_port: PortNo,
    src: MacAddr,
    dst: MacAddr,
    buffer: Option<BufferId>,
    data: &[u8],
) -> ForwardPlan {
    table.learn(switch, src, in_port);

    let out_port = table.lookup(switch, &dst).unwrap_or(PortNo::FLOOD);
    let actions = vec![Action::output(out_port)];

    let flow = (out_port != PortNo::FLOOD).then(|| FlowRule {
        priority: PRIORITY_LEARNED,
        match_: Match {
            in_port: Some(in_port),
            eth_dst: Some(dst),
            ..Match::default()
        },
        actions: actions.clone(),
        buffer,
    });

    let packet_out = match (&flow, buffer) {
        (Some(_), Some(_)) => None,
        _ => Some(PacketOut {
            buffer,
            in_port,
            actions,
            data: buffer.is_none().then(|| data.to_vec()),
        }),
    };

    ForwardPlan {
        out_port,
        flow,
        packet_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::fdb::MacTable;

    const SW: SwitchId = SwitchId(1);
    const A: MacAddr = MacAddr([0x00, 0x00, 0x00, 0x00, 0x00, 0x0a]);
    const B: MacAddr = MacAddr([0x00, 0x00, 0x00, 0x00, 0x00, 0x0b]);

    #[test]
    fn test_unknown_destination_floods() {
        let mut table = MacTable::new();
        let plan = plan_forwarding(&mut table, SW, PortNo(1), A, B, None, &[1, 2]);

        assert!(plan.is_flood());
        assert!(plan.flow.is_none());
        let out = plan.packet_out.unwrap();
        assert_eq!(out.actions, vec![Action::output(PortNo::FLOOD)]);
        assert_eq!(out.data, Some(vec![1, 2]));
        assert_eq!(out.in_port, PortNo(1));
        assert_eq!(table.lookup(SW, &A), Some(PortNo(1)));
    }

    #[test]
    fn test_flood_with_buffer_sends_no_data() {
        let mut table = MacTable::new();
        let plan = plan_forwarding(&mut table, SW, PortNo(1), A, B, Some(BufferId(9)), &[1, 2]);

        let out = plan.packet_out.unwrap();
        assert_eq!(out.buffer, Some(BufferId(9)));
        assert_eq!(out.data, None);
    }

    #[test]
    fn test_known_destination_installs_flow() {
        let mut table = MacTable::new();
        table.learn(SW, B, PortNo(2));

        let plan = plan_forwarding(&mut table, SW, PortNo(1), A, B, None, &[7]);
        assert_eq!(plan.out_port, PortNo(2));

        let flow = plan.flow.unwrap();
        assert_eq!(flow.priority, 1);
        assert_eq!(flow.match_.in_port, Some(PortNo(1)));
        assert_eq!(flow.match_.eth_dst, Some(B));
        assert_eq!(flow.actions, vec![Action::output(PortNo(2))]);
        assert_eq!(flow.buffer, None);

        // no buffer: the frame still has to be sent
        assert_eq!(plan.packet_out.unwrap().data, Some(vec![7]));
    }

    #[test]
    fn test_known_destination_with_buffer_skips_packet_out() {
        let mut table = MacTable::new();
        table.learn(SW, B, PortNo(2));

        let plan = plan_forwarding(&mut table, SW, PortNo(1), A, B, Some(BufferId(3)), &[7]);
        assert_eq!(plan.flow.unwrap().buffer, Some(BufferId(3)));
        assert!(plan.packet_out.is_none());
    }

    #[test]
    fn test_hairpin_destination_is_not_filtered() {
        let mut table = MacTable::new();
        let plan = plan_forwarding(&mut table, SW, PortNo(4), A, A, None, &[]);
        assert_eq!(plan.out_port, PortNo(4));
        assert!(plan.flow.is_some());
    }
}
