//! Serial link to the rig.
//!
//! [`SerialChannel::send`] only enqueues. A writer task owns the device
//! handle and writes each command as a single byte, bounded by the
//! configured timeout. A failed write drops the handle; the next command
//! reopens it, at most once per [`RECONNECT_INTERVAL`]. While no handle is
//! open, commands are logged as "not connected, would send".

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trafficlight_core::Command;
use trafficlight_core::config::{PortSelection, SerialSettings};

use super::CommandChannel;
use super::detect;
use crate::error::ChannelError;
use crate::observability::metrics::{self, CommandOutcome};
use crate::observability::{Event, EventEmitter};

/// Commands buffered between the controller and the writer task.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Minimum spacing between reopen attempts.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

type DeviceWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Non-blocking [`CommandChannel`] backed by a serial device.
#[derive(Debug)]
pub struct SerialChannel {
    queue: mpsc::Sender<Command>,
    label: String,
}

impl SerialChannel {
    /// Starts a writer task for the device described by `settings`.
    ///
    /// The device is opened lazily on the first command. Dropping the
    /// channel lets the writer drain its queue and exit; await the returned
    /// handle to make sure the last command went out.
    #[must_use]
    pub fn spawn(settings: SerialSettings, events: Arc<EventEmitter>) -> (Self, JoinHandle<()>) {
        let label = settings.port.to_string();
        let writer = SerialWriter {
            write_timeout: settings.write_timeout,
            source: Source::Device(settings),
            port: None,
            port_label: label.clone(),
            last_attempt: None,
            events,
        };
        Self::start(writer, label)
    }

    /// Starts a writer task over an already-open writer. Nothing is reopened
    /// after a failure.
    #[must_use]
    pub fn from_writer<W>(
        writer: W,
        label: impl Into<String>,
        write_timeout: Duration,
        events: Arc<EventEmitter>,
    ) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let label = label.into();
        let writer = SerialWriter {
            write_timeout,
            source: Source::Fixed,
            port: Some(Box::new(writer)),
            port_label: label.clone(),
            last_attempt: None,
            events,
        };
        Self::start(writer, label)
    }

    fn start(writer: SerialWriter, label: String) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_DEPTH);
        let task = tokio::spawn(writer.run(rx));
        (Self { queue: tx, label }, task)
    }
}

impl CommandChannel for SerialChannel {
    fn send(&mut self, command: Command) {
        match self.queue.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                warn!(command = %command, port = %self.label, "serial queue full, dropping command");
                metrics::record_command(command, CommandOutcome::Dropped);
            }
            Err(TrySendError::Closed(command)) => {
                warn!(command = %command, port = %self.label, "serial writer stopped, dropping command");
                metrics::record_command(command, CommandOutcome::Dropped);
            }
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

enum Source {
    Device(SerialSettings),
    Fixed,
}

struct SerialWriter {
    write_timeout: Duration,
    source: Source,
    port: Option<DeviceWriter>,
    port_label: String,
    last_attempt: Option<Instant>,
    events: Arc<EventEmitter>,
}

impl SerialWriter {
    async fn run(mut self, mut queue: mpsc::Receiver<Command>) {
        while let Some(command) = queue.recv().await {
            self.deliver(command).await;
        }
        debug!(port = %self.port_label, "serial writer finished");
    }

    async fn deliver(&mut self, command: Command) {
        if self.port.is_none() {
            self.reconnect().await;
        }

        let Some(port) = self.port.as_mut() else {
            warn!(command = %command, port = %self.port_label, "not connected, would send");
            metrics::record_command(command, CommandOutcome::Skipped);
            self.report(command, "not connected".to_string());
            return;
        };

        let written = tokio::time::timeout(self.write_timeout, write_byte(port, command)).await;
        match written {
            Ok(Ok(())) => {
                debug!(command = %command, port = %self.port_label, "sent");
                metrics::record_command(command, CommandOutcome::Sent);
            }
            Ok(Err(e)) => self.fail(command, e.to_string()),
            Err(_) => self.fail(
                command,
                format!("write timed out after {}ms", self.write_timeout.as_millis()),
            ),
        }
    }

    fn fail(&mut self, command: Command, reason: String) {
        self.port = None;
        warn!(command = %command, port = %self.port_label, %reason, "serial write failed, closing port");
        metrics::record_command(command, CommandOutcome::Failed);
        metrics::record_error("channel");
        self.report(command, reason);
    }

    fn report(&self, command: Command, reason: String) {
        self.events.emit(Event::CommandFailed {
            timestamp: Utc::now(),
            command,
            port: self.port_label.clone(),
            reason,
        });
    }

    async fn reconnect(&mut self) {
        let Source::Device(settings) = &self.source else {
            return;
        };
        if self
            .last_attempt
            .is_some_and(|last| last.elapsed() < RECONNECT_INTERVAL)
        {
            return;
        }
        self.last_attempt = Some(Instant::now());

        let settings = settings.clone();
        let opened = tokio::time::timeout(settings.write_timeout, open_device(&settings)).await;
        match opened {
            Ok(Ok((path, file))) => {
                info!(port = %path.display(), baudrate = settings.baudrate, "serial port opened");
                self.port_label = path.display().to_string();
                self.port = Some(Box::new(file));
            }
            Ok(Err(e)) => {
                warn!(port = %self.port_label, error = %e, "cannot open serial port");
                metrics::record_error("channel");
            }
            Err(_) => {
                warn!(port = %self.port_label, "timed out opening serial port");
                metrics::record_error("channel");
            }
        }
    }
}

async fn write_byte(port: &mut DeviceWriter, command: Command) -> std::io::Result<()> {
    port.write_all(&[command.as_byte()]).await?;
    port.flush().await
}

/// Resolves the device path, configures the line and opens it for writing.
///
/// # Errors
///
/// Returns `ChannelError::NoDevice` when auto-detection finds nothing and
/// `ChannelError::Open` when the device cannot be opened. Line setup
/// failures are logged, not returned.
pub async fn open_device(
    settings: &SerialSettings,
) -> Result<(PathBuf, tokio::fs::File), ChannelError> {
    let path = match &settings.port {
        PortSelection::Auto => detect::best_port().ok_or(ChannelError::NoDevice)?,
        PortSelection::Path(path) => path.clone(),
    };

    if settings.configure_tty {
        if let Err(e) = configure_line(&path, settings.baudrate).await {
            warn!(port = %path.display(), error = %e, "line setup failed, opening anyway");
        }
    }

    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .await
        .map_err(|source| ChannelError::Open {
            path: path.clone(),
            source,
        })?;
    Ok((path, file))
}

/// Opens the device, writes one command and closes it.
///
/// Unlike [`SerialChannel`], every failure is returned.
///
/// # Errors
///
/// Returns a `ChannelError` if the device cannot be found or opened, or if
/// the open or the write does not finish within the configured timeout.
pub async fn send_once(settings: &SerialSettings, command: Command) -> Result<PathBuf, ChannelError> {
    let (path, file) = tokio::time::timeout(settings.write_timeout, open_device(settings))
        .await
        .map_err(|_| ChannelError::Timeout(format!("opening {}", settings.port)))??;

    let mut port: DeviceWriter = Box::new(file);
    tokio::time::timeout(settings.write_timeout, write_byte(&mut port, command))
        .await
        .map_err(|_| ChannelError::Timeout(format!("writing to {}", path.display())))?
        .map_err(|source| ChannelError::Write {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Sets line speed and raw mode with `stty`.
#[cfg(unix)]
async fn configure_line(path: &Path, baudrate: u32) -> Result<(), ChannelError> {
    let device_flag = if cfg!(target_os = "macos") { "-f" } else { "-F" };
    let output = tokio::process::Command::new("stty")
        .arg(device_flag)
        .arg(path)
        .arg(baudrate.to_string())
        .args(["raw", "-echo", "clocal"])
        .output()
        .await
        .map_err(|e| ChannelError::LineSetup(format!("cannot run stty: {e}")))?;

    if output.status.success() {
        debug!(port = %path.display(), baudrate, "line configured");
        Ok(())
    } else {
        Err(ChannelError::LineSetup(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

#[cfg(not(unix))]
async fn configure_line(_path: &Path, _baudrate: u32) -> Result<(), ChannelError> {
    Ok(())
}
