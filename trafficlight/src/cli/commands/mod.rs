//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod ports;
pub mod run;
pub mod send;
pub mod validate;
pub mod version;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::args::{Cli, Commands, LinkArgs};
use crate::config::{ConfigLoader, PortSelection, ResolvedConfig};
use crate::error::TrafficLightError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` is triggered by the signal handler in `main`.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), TrafficLightError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Send(args) => send::run(&args).await,
        Commands::Ports(args) => ports::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads the configuration named by `link` and applies its overrides.
///
/// Load warnings are logged; values they refer to have already been
/// replaced by defaults.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read or parsed.
pub fn load_config(link: &LinkArgs) -> Result<ResolvedConfig, TrafficLightError> {
    let loaded = ConfigLoader::default().load_optional(link.config.as_deref())?;
    for warning in &loaded.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    let mut config = loaded.config;
    apply_overrides(&mut config, link);
    Ok(config)
}

fn apply_overrides(config: &mut ResolvedConfig, link: &LinkArgs) {
    if let Some(port) = link.port.as_deref().filter(|p| !p.trim().is_empty()) {
        config.serial.port = PortSelection::parse(port);
    }
    match link.baudrate {
        Some(0) => warn!("ignoring baudrate override of 0"),
        Some(rate) => config.serial.baudrate = rate,
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = ResolvedConfig::default();
        let link = LinkArgs {
            port: Some("auto".to_string()),
            baudrate: Some(115_200),
            ..LinkArgs::default()
        };
        apply_overrides(&mut config, &link);
        assert_eq!(config.serial.port, PortSelection::Auto);
        assert_eq!(config.serial.baudrate, 115_200);
    }

    #[test]
    fn test_blank_and_zero_overrides_are_ignored() {
        let mut config = ResolvedConfig::default();
        let link = LinkArgs {
            port: Some("  ".to_string()),
            baudrate: Some(0),
            ..LinkArgs::default()
        };
        apply_overrides(&mut config, &link);
        assert_eq!(config, ResolvedConfig::default());
    }

    #[test]
    fn test_load_config_without_file() {
        let link = LinkArgs {
            port: Some("/dev/ttyACM3".to_string()),
            ..LinkArgs::default()
        };
        let config = load_config(&link).unwrap();
        assert_eq!(
            config.serial.port,
            PortSelection::Path(PathBuf::from("/dev/ttyACM3"))
        );
        assert_eq!(config.durations.go, 15);
    }
}
