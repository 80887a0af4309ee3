//! CLI argument definitions
//!
//! All Clap derive structs for `trafficlight` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use trafficlight_core::Command;
use trafficlight_core::config::ManualExpiry;

// ============================================================================
// Root CLI
// ============================================================================

/// Traffic-light phase controller for serial-attached rigs.
#[derive(Parser, Debug)]
#[command(name = "trafficlight", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "TRAFFICLIGHT_COLOR")]
    pub color: ColorChoice,

    /// Log line format.
    #[arg(long, default_value = "human", global = true, env = "TRAFFICLIGHT_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller with an interactive console session.
    Run(RunArgs),

    /// Send a single command to the rig and exit.
    Send(SendArgs),

    /// List serial devices that look like the rig.
    Ports(PortsArgs),

    /// Validate configuration files.
    Validate(ValidateArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Serial link overrides shared by `run` and `send`.
#[derive(Args, Debug, Clone, Default)]
pub struct LinkArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "TRAFFICLIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial device path, or `auto` to scan for one.
    #[arg(short, long, env = "TRAFFICLIGHT_PORT")]
    pub port: Option<String>,

    /// Line speed.
    #[arg(short, long, env = "TRAFFICLIGHT_BAUDRATE")]
    pub baudrate: Option<u32>,

    /// Log commands instead of writing them to a device.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Serial link and configuration.
    #[command(flatten)]
    pub link: LinkArgs,

    /// Start an automatic cycle immediately.
    #[arg(long)]
    pub autostart: bool,

    /// What a manual phase does when its time runs out.
    #[arg(long, env = "TRAFFICLIGHT_MANUAL_EXPIRY")]
    pub manual_expiry: Option<ManualExpiry>,

    /// Append JSONL events to this file.
    #[arg(long, env = "TRAFFICLIGHT_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Serve Prometheus metrics on 127.0.0.1:<port>.
    #[arg(long, env = "TRAFFICLIGHT_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `send`.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command letter (G, Y, R, C) or name (go, caution, stop, clear).
    pub command: Command,

    /// Serial link and configuration.
    #[command(flatten)]
    pub link: LinkArgs,
}

/// Arguments for `ports`.
#[derive(Args, Debug)]
pub struct PortsArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as failures.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "trafficlight",
            "run",
            "--config",
            "rig.yaml",
            "--port",
            "auto",
            "--baudrate",
            "19200",
            "--autostart",
            "--manual-expiry",
            "resume-cycle",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.link.config, Some(PathBuf::from("rig.yaml")));
        assert_eq!(args.link.port.as_deref(), Some("auto"));
        assert_eq!(args.link.baudrate, Some(19200));
        assert!(args.autostart);
        assert!(!args.link.dry_run);
        assert_eq!(args.manual_expiry, Some(ManualExpiry::ResumeCycle));
    }

    #[test]
    fn test_send_parses_letter_and_name() {
        let cli = Cli::try_parse_from(["trafficlight", "send", "Y", "--dry-run"]).unwrap();
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.command, Command::Caution);
        assert!(args.link.dry_run);

        let cli = Cli::try_parse_from(["trafficlight", "send", "red"]).unwrap();
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.command, Command::Stop);
    }

    #[test]
    fn test_send_rejects_unknown_command() {
        let result = Cli::try_parse_from(["trafficlight", "send", "blue"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_files() {
        let result = Cli::try_parse_from(["trafficlight", "validate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["trafficlight", "ports", "-vv", "--color", "never"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.log_format, OutputFormat::Human);
    }

    #[test]
    fn test_help_output() {
        let err = Cli::try_parse_from(["trafficlight", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_output() {
        let err = Cli::try_parse_from(["trafficlight", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
