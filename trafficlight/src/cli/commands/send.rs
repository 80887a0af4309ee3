//! `trafficlight send`
//!
//! Writes one command to the rig and exits. Unlike the controller, every
//! link failure is reported and sets the exit code.

use tracing::info;

use super::load_config;
use crate::channel::serial;
use crate::cli::args::SendArgs;
use crate::error::TrafficLightError;

/// Send a single command.
///
/// # Errors
///
/// Returns a configuration error if the configuration cannot be loaded, or a
/// channel error if the device cannot be found, opened or written.
pub async fn run(args: &SendArgs) -> Result<(), TrafficLightError> {
    let config = load_config(&args.link)?;

    if args.link.dry_run {
        println!(
            "would send {} ({}) to {}",
            args.command,
            args.command.phase(),
            config.serial.port
        );
        return Ok(());
    }

    let path = serial::send_once(&config.serial, args.command).await?;
    info!(command = %args.command, port = %path.display(), "command sent");
    println!("sent {} to {}", args.command, path.display());
    Ok(())
}
