//! `trafficlight run`
//!
//! Starts the controller runtime on the configured link and hands stdin and
//! stdout to a console session. On exit the rig is turned off, and the
//! serial and event writers get a short grace period to drain.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::load_config;
use crate::channel::{CommandChannel, DryRunChannel, SerialChannel};
use crate::cli::args::RunArgs;
use crate::console;
use crate::controller::{ControllerOptions, spawn_controller};
use crate::error::{ControllerError, TrafficLightError};
use crate::observability::{EventEmitter, init_metrics};

/// Upper bound on waiting for queued commands after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Run the controller until the console session ends.
///
/// # Errors
///
/// Returns an error if configuration loading, metrics or event-file setup,
/// or the console session fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), TrafficLightError> {
    let mut config = load_config(&args.link)?;
    if let Some(expiry) = args.manual_expiry {
        config.manual_expiry = expiry;
    }

    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "metrics endpoint listening");
    }

    let (events, event_writer) = match &args.events_file {
        Some(path) => {
            let (emitter, task) = EventEmitter::from_file(path).await?;
            (Arc::new(emitter), Some(task))
        }
        None => (Arc::new(EventEmitter::noop()), None),
    };

    let (channel, writer): (Box<dyn CommandChannel>, Option<JoinHandle<()>>) =
        if args.link.dry_run {
            (Box::new(DryRunChannel), None)
        } else {
            let (channel, writer) = SerialChannel::spawn(config.serial.clone(), Arc::clone(&events));
            (Box::new(channel), Some(writer))
        };

    let runtime_cancel = cancel.child_token();
    let (handle, runtime) = spawn_controller(ControllerOptions {
        durations: config.durations,
        manual_expiry: config.manual_expiry,
        channel,
        events,
        cancel: runtime_cancel.clone(),
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let session = console::run_session(&handle, stdin, tokio::io::stdout(), args.autostart, &cancel).await;

    runtime_cancel.cancel();
    let last = runtime
        .await
        .map_err(|e| ControllerError::Failed(e.to_string()))?;
    info!(phase = %last.phase(), "controller shut down");

    if let Some(writer) = writer {
        if tokio::time::timeout(DRAIN_TIMEOUT, writer).await.is_err() {
            warn!("serial writer did not finish, final command may be lost");
        }
    }

    // Every emitter clone is gone once the runtime and serial writer exit
    if let Some(event_writer) = event_writer {
        if tokio::time::timeout(DRAIN_TIMEOUT, event_writer).await.is_err() {
            warn!("event writer did not finish, trailing events may be lost");
        }
    }

    let end = session?;
    info!(reason = end.as_str(), "session ended");
    Ok(())
}
