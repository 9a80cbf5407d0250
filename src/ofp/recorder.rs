//! In-memory datapath
//!
//! Records every command instead of sending it. Useful for tests and for
//! dry runs of the controller against captured events.

use super::{Datapath, FlowRule, PacketOut, SwitchId};
use crate::{Error, Result};

/// A command issued to a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InstallFlow { switch: SwitchId, rule: FlowRule },
    EmitPacket { switch: SwitchId, packet: PacketOut },
}

#[derive(Debug, Default)]
pub struct RecordingDatapath {
    commands: Vec<Command>,
    fail_with: Option<String>,
}

impl RecordingDatapath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following command with `reason`
    pub fn fail_with(&mut self, reason: impl Into<String>) {
        self.fail_with = Some(reason.into());
    }

    /// Accept commands again
    pub fn recover(&mut self) {
        self.fail_with = None;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain recorded commands
    pub fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn flows(&self) -> impl Iterator<Item = (SwitchId, &FlowRule)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::InstallFlow { switch, rule } => Some((*switch, rule)),
            _ => None,
        })
    }

    pub fn packet_outs(&self) -> impl Iterator<Item = (SwitchId, &PacketOut)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::EmitPacket { switch, packet } => Some((*switch, packet)),
            _ => None,
        })
    }

    fn check(&self, switch: SwitchId) -> Result<()> {
        match &self.fail_with {
            Some(reason) => Err(Error::Datapath {
                switch,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Datapath for RecordingDatapath {
    fn install_flow(&mut self, switch: SwitchId, rule: &FlowRule) -> Result<()> {
        self.check(switch)?;
        self.commands.push(Command::InstallFlow {
            switch,
            rule: rule.clone(),
        });
        Ok(())
    }

    fn emit_packet(&mut self, switch: SwitchId, packet: &PacketOut) -> Result<()> {
        self.check(switch)?;
        self.commands.push(Command::EmitPacket {
            switch,
            packet: packet.clone(),
        });
        Ok(())
    }
}
