//! Trekin - SDN controller application
//!
//! Turns every connected switch into a transparent Ethernet learning switch
//! and answers DHCP DISCOVER/REQUEST traffic at the controller.
//! The switch control protocol is reached through the [`ofp::Datapath`] trait.

pub mod config;
pub mod controller;
pub mod error;
pub mod ofp;
pub mod protocol;
pub mod telemetry;

pub use controller::{Controller, ControllerOptions};
pub use error::{Error, Result};
