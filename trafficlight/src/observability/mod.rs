//! Observability module
//!
//! Logging, metrics, and the JSONL event stream that records what the rig
//! was told to show and when.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
