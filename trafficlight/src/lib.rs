//! `trafficlight` - traffic phase controller for serial-attached rigs
//!
//! This library drives a traffic-light rig through the
//! `GO → CAUTION → STOP → CAUTION → GO` cycle by sending one-byte commands
//! over a serial link, with manual overrides, a console session and
//! structured observability.

pub mod channel;
pub mod cli;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod observability;
