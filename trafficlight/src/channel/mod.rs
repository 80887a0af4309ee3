//! Command channel abstraction.
//!
//! Provides the [`CommandChannel`] trait the controller uses to tell the rig
//! which phase to show. Sending is fire-and-forget: implementations log and
//! count failures instead of returning them, and never block the caller.

pub mod detect;
pub mod serial;

pub use detect::{PortCandidate, best_port, scan};
pub use serial::SerialChannel;

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;
use trafficlight_core::Command;

use crate::observability::metrics::{self, CommandOutcome};

/// Outbound, best-effort link to the rig.
pub trait CommandChannel: Send {
    /// Hands one command to the link. Must return promptly.
    fn send(&mut self, command: Command);

    /// Short description for logs and events (device path, `dry-run`, ...).
    fn describe(&self) -> String;
}

impl<T: CommandChannel + ?Sized> CommandChannel for Box<T> {
    fn send(&mut self, command: Command) {
        (**self).send(command);
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Channel for running without hardware. Logs each command it would send.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunChannel;

impl CommandChannel for DryRunChannel {
    fn send(&mut self, command: Command) {
        info!(command = %command, phase = %command.phase(), "dry run, would send");
        metrics::record_command(command, CommandOutcome::Skipped);
    }

    fn describe(&self) -> String {
        "dry-run".to_string()
    }
}

/// Channel that keeps every command in memory.
///
/// Clones share the same log, so a test can keep one clone and hand the
/// other to a controller.
#[derive(Debug, Default, Clone)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<Command>>>,
}

impl RecordingChannel {
    /// Creates an empty recording channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Command> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the commands sent so far.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl CommandChannel for RecordingChannel {
    fn send(&mut self, command: Command) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}
