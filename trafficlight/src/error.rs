//! Error types for `trafficlight`
//!
//! This module provides the error hierarchy for the controller, the command
//! channel and the CLI, together with the process exit codes they map to.
//! Configuration errors live in `trafficlight-core` and are re-exported here.

use std::path::PathBuf;
use thiserror::Error;

pub use trafficlight_core::error::{ConfigError, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `trafficlight` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, strict validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Command channel error (no device, open failed)
    pub const CHANNEL_ERROR: i32 = 4;

    /// Controller error (runtime shut down)
    pub const CONTROLLER_ERROR: i32 = 5;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `trafficlight` operations.
///
/// Aggregates all domain-specific errors and maps each to an exit code.
#[derive(Debug, Error)]
pub enum TrafficLightError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Command channel error
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Controller runtime error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON report serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrafficLightError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Channel(_) => ExitCode::CHANNEL_ERROR,
            Self::Controller(_) => ExitCode::CONTROLLER_ERROR,
            Self::Json(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Channel Errors
// ============================================================================

/// Serial link errors.
///
/// The controller never sees these: the channel logs them and carries on.
/// They surface only from commands that talk to the device directly, such as
/// `trafficlight send`.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Auto-detection found no candidate device
    #[error("no serial device found")]
    NoDevice,

    /// Device could not be opened
    #[error("cannot open {path}: {source}")]
    Open {
        /// Device path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Write to the device failed
    #[error("write to {path} failed: {source}")]
    Write {
        /// Device path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Open or write did not finish within the configured bound
    #[error("timed out: {0}")]
    Timeout(String),

    /// Line speed / raw mode setup failed
    #[error("line setup failed: {0}")]
    LineSetup(String),
}

// ============================================================================
// Controller Errors
// ============================================================================

/// Controller runtime errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The runtime task has exited and no longer accepts requests
    #[error("controller is shut down")]
    Closed,

    /// The runtime task panicked or was aborted
    #[error("controller task failed: {0}")]
    Failed(String),
}

// ============================================================================
// Tests
// ============================================================================
