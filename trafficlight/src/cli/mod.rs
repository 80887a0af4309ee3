//! Command-line interface
//!
//! Argument definitions live in [`args`]; [`commands`] holds one handler per
//! subcommand.

pub mod args;
pub mod commands;
