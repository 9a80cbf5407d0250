use crate::ofp::SwitchId;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("datapath {switch} rejected command: {reason}")]
    Datapath { switch: SwitchId, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
