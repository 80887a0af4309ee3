//! Configuration module
//!
//! Loads rig configuration files. The schema itself lives in
//! `trafficlight-core` and is re-exported here.

pub mod loader;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, env_or};
pub use trafficlight_core::config::*;
