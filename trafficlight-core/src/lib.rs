//! `trafficlight` Core shared phase, command and configuration types
//!
//! This crate provides the signal vocabulary (phases and the one-byte device
//! commands), the configuration schema and the configuration error types
//! shared by the `trafficlight` controller and CLI.

pub mod config;
pub mod error;
pub mod phase;

pub use phase::{Command, ParseCommandError, Phase};
