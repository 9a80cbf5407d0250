//! Baseline flow rules installed when switches come up

use super::{PRIORITY_DHCP_REDIRECT, PRIORITY_TABLE_MISS};
use crate::ofp::{Action, FlowRule, Match, SwitchId};
use crate::protocol::EtherType;
use crate::protocol::dhcp::DHCP_SERVER_PORT;
use crate::protocol::ipv4::protocol;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a switch is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchRole {
    /// DHCP traffic from this switch is redirected to the controller
    DhcpServer,
    #[default]
    Plain,
}

#[derive(Debug, Clone, Default)]
pub struct TopologyController {
    roles: HashMap<SwitchId, SwitchRole>,
}

impl TopologyController {
    pub fn new(roles: HashMap<SwitchId, SwitchRole>) -> Self {
        Self { roles }
    }

    /// Unlisted switches are plain
    pub fn role(&self, switch: SwitchId) -> SwitchRole {
        self.roles.get(&switch).copied().unwrap_or_default()
    }

    /// DHCP redirect rule for DHCP-serving switches
    pub fn on_switch_join(&self, switch: SwitchId) -> Option<FlowRule> {
        if self.role(switch) != SwitchRole::DhcpServer {
            return None;
        }

        Some(FlowRule {
            priority: PRIORITY_DHCP_REDIRECT,
            match_: Match {
                eth_type: Some(EtherType::Ipv4 as u16),
                ip_proto: Some(protocol::UDP),
                udp_dst: Some(DHCP_SERVER_PORT),
                ..Match::default()
            },
            actions: vec![Action::to_controller()],
            buffer: None,
        })
    }

    /// Table-miss rule sending everything unmatched to the controller
    pub fn on_switch_ready(&self, _switch: SwitchId) -> FlowRule {
        FlowRule {
            priority: PRIORITY_TABLE_MISS,
            match_: Match::all(),
            actions: vec![Action::to_controller()],
            buffer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ofp::PortNo;

    fn topology() -> TopologyController {
        TopologyController::new(HashMap::from([(SwitchId(1), SwitchRole::DhcpServer)]))
    }

    #[test]
    fn test_dhcp_switch_gets_redirect() {
        let rule = topology().on_switch_join(SwitchId(1)).unwrap();
        assert_eq!(rule.priority, 10);
        assert_eq!(rule.match_.eth_type, Some(0x0800));
        assert_eq!(rule.match_.ip_proto, Some(17));
        assert_eq!(rule.match_.udp_dst, Some(67));
        assert_eq!(rule.match_.in_port, None);
        assert_eq!(
            rule.actions,
            vec![Action::Output {
                port: PortNo::CONTROLLER,
                max_len: 0xffff
            }]
        );
    }

    #[test]
    fn test_plain_switch_gets_nothing_on_join() {
        assert!(topology().on_switch_join(SwitchId(2)).is_none());
        assert_eq!(topology().role(SwitchId(2)), SwitchRole::Plain);
    }

    #[test]
    fn test_ready_installs_table_miss() {
        for dpid in [1, 2] {
            let rule = topology().on_switch_ready(SwitchId(dpid));
            assert_eq!(rule.priority, 0);
            assert!(rule.match_.is_all());
            assert_eq!(rule.actions, vec![Action::to_controller()]);
        }
    }
}
