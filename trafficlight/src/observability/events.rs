//! Structured event stream for `trafficlight`.
//!
//! Discrete, typed events describing what the rig was told to show. Events
//! are serialized as newline-delimited JSON (JSONL) and carry a
//! monotonically increasing sequence number. Cycle identities let a reader
//! group every phase entry belonging to one automatic run.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use trafficlight_core::config::{ManualExpiry, PhaseDurations};
use trafficlight_core::{Command, Phase};

use crate::controller::{CycleId, EntryReason};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during controller operation.
///
/// Each variant is tagged with `"type"` when serialized to JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The controller runtime is up and accepting requests.
    ControllerStarted {
        /// When the runtime started.
        timestamp: DateTime<Utc>,
        /// Description of the command channel (device path or `dry-run`).
        channel: String,
        /// Configured phase durations.
        durations: PhaseDurations,
        /// Manual-expiry policy in effect.
        manual_expiry: ManualExpiry,
    },

    /// The controller runtime has shut down.
    ControllerStopped {
        /// When the runtime stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// An automatic cycle has started.
    CycleStarted {
        /// When the cycle started.
        timestamp: DateTime<Utc>,
        /// Identity of the new cycle.
        cycle_id: CycleId,
        /// `true` when an expired manual phase resumed cycling.
        resumed: bool,
    },

    /// An automatic cycle was stopped.
    CycleStopped {
        /// When the cycle stopped.
        timestamp: DateTime<Utc>,
        /// Identity of the stopped cycle.
        cycle_id: CycleId,
        /// Phase that was showing when the stop arrived.
        phase: Phase,
        /// Seconds that were left in that phase.
        remaining: u32,
    },

    /// A phase was entered and its command sent.
    PhaseEntered {
        /// When the phase was entered.
        timestamp: DateTime<Utc>,
        /// Phase entered.
        phase: Phase,
        /// Phase shown before.
        from: Phase,
        /// Duration of the new phase in seconds.
        remaining: u32,
        /// Why the phase was entered.
        reason: EntryReason,
        /// Most recent cycle identity.
        cycle_id: CycleId,
        /// Whether an automatic cycle is active.
        running: bool,
    },

    /// A device command could not be delivered.
    CommandFailed {
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
        /// Command that was lost.
        command: Command,
        /// Device path, if one was selected.
        port: String,
        /// What went wrong.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Non-blocking JSONL event emitter.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as a single JSON line and enqueues it. A writer task
/// owns the sink, so emitting from the controller never waits on I/O.
/// Serialization and I/O failures are dropped; the event stream never stops
/// the rig.
#[derive(Debug)]
pub struct EventEmitter {
    lines: Option<mpsc::UnboundedSender<String>>,
    sequence: AtomicU64,
}

impl EventEmitter {
    /// Creates an emitter whose serialized lines arrive on the returned
    /// receiver.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            lines: Some(tx),
            sequence: AtomicU64::new(0),
        };
        (emitter, rx)
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub const fn noop() -> Self {
        Self {
            lines: None,
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter drained into `writer` by a spawned task.
    ///
    /// The task exits once every clone of the emitter is dropped and the
    /// queue is written out; await the returned handle to flush the tail.
    #[must_use]
    pub fn spawn<W>(writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (emitter, lines) = Self::channel();
        let task = tokio::spawn(write_lines(lines, writer));
        (emitter, task)
    }

    /// Creates an emitter that appends to the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub async fn from_file(path: &Path) -> std::io::Result<(Self, JoinHandle<()>)> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self::spawn(file))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let Some(lines) = &self.lines else {
            return;
        };
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = lines.send(line);
        }
    }
}

async fn write_lines<W>(mut lines: mpsc::UnboundedReceiver<String>, writer: W)
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    let mut failed = false;
    while let Some(line) = lines.recv().await {
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            if !failed {
                warn!(error = %e, "event write failed, further failures are silent");
                failed = true;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
