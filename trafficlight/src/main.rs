//! `trafficlight` - traffic phase controller for serial-attached rigs

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use trafficlight::cli::args::{Cli, OutputFormat};
use trafficlight::cli::commands;
use trafficlight::error::ExitCode;
use trafficlight::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = match cli.log_format {
            OutputFormat::Human => LogFormat::Human,
            OutputFormat::Json => LogFormat::Json,
        };
        init_logging(format, cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();
    let signal_exit = Arc::new(AtomicI32::new(ExitCode::SUCCESS));
    tokio::spawn(handle_signals(cancel.clone(), Arc::clone(&signal_exit)));

    let result = commands::dispatch(cli, cancel).await;

    match result {
        Ok(()) => std::process::exit(signal_exit.load(Ordering::SeqCst)),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// First SIGINT/SIGTERM cancels `cancel` and records the exit code; a
/// second one exits immediately.
async fn handle_signals(cancel: CancellationToken, exit_code: Arc<AtomicI32>) {
    let code = wait_for_signal().await;
    exit_code.store(code, Ordering::SeqCst);
    eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
    cancel.cancel();

    let code = wait_for_signal().await;
    std::process::exit(code);
}

#[cfg(unix)]
async fn wait_for_signal() -> i32 {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
            _ = sigterm.recv() => ExitCode::TERMINATED,
        },
        Err(e) => {
            tracing::warn!(error = %e, "cannot register SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            ExitCode::INTERRUPTED
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> i32 {
    let _ = tokio::signal::ctrl_c().await;
    ExitCode::INTERRUPTED
}
