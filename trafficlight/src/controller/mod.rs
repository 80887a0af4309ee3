//! Traffic phase controller
//!
//! - [`state`]: the phase state value and cycle identities
//! - [`clock`]: the one-shot countdown seam
//! - [`engine`]: the transition rules
//! - [`runtime`]: the task that owns a controller and its clients' handle

pub mod clock;
pub mod engine;
pub mod runtime;
pub mod state;

pub use clock::{ClockFire, ManualClock, PhaseClock, TICK, TokioClock};
pub use engine::PhaseController;
pub use runtime::{ControllerHandle, ControllerOptions, spawn_controller};
pub use state::{CycleId, EntryReason, PhaseState};
