//! Configuration schema
//!
//! Types deserialized from the rig's YAML configuration file, plus the
//! resolution step that turns them into concrete settings with defaults.

pub mod schema;

pub use schema::*;
