//! Configuration schema types
//!
//! This module defines the configuration file layout for a traffic-light rig
//! and resolves it into concrete settings. Every key is optional. Phase
//! durations are parsed leniently: a value that is missing, zero, negative,
//! fractional or unparseable falls back to its default and produces a
//! warning instead of an error.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::ValidationIssue;
use crate::phase::Phase;

// ============================================================================
// Defaults
// ============================================================================

/// Default GO (green) duration in seconds.
pub const DEFAULT_GO_SECS: u32 = 15;

/// Default CAUTION (yellow) duration in seconds.
pub const DEFAULT_CAUTION_SECS: u32 = 5;

/// Default STOP (red) duration in seconds.
pub const DEFAULT_STOP_SECS: u32 = 15;

/// Default serial device.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// Port value that requests auto-detection.
pub const AUTO_PORT: &str = "auto";

/// Default line speed.
pub const DEFAULT_BAUDRATE: u32 = 9600;

/// Default bound on a single device write, in milliseconds.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 1000;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a rig.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RigConfig {
    /// Serial link settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// Per-phase durations
    #[serde(default)]
    pub durations: DurationsConfig,

    /// What happens when a manually selected phase runs out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_expiry: Option<ManualExpiry>,
}

impl RigConfig {
    /// Resolves every section, applying defaults and collecting warnings.
    #[must_use]
    pub fn resolve(&self) -> ResolvedConfig {
        let (serial, mut issues) = self.serial.resolve();
        let (durations, duration_issues) = self.durations.resolve();
        issues.extend(duration_issues);

        ResolvedConfig {
            serial,
            durations,
            manual_expiry: self.manual_expiry.unwrap_or_default(),
            issues,
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Serial link settings.
    pub serial: SerialSettings,
    /// Per-phase durations.
    pub durations: PhaseDurations,
    /// Manual-expiry policy.
    pub manual_expiry: ManualExpiry,
    /// Values that were replaced by defaults.
    pub issues: Vec<ValidationIssue>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        RigConfig::default().resolve()
    }
}

// ============================================================================
// Manual Expiry
// ============================================================================

/// Policy applied when a manually forced phase counts down to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ManualExpiry {
    /// Go dark. The phase does not loop.
    #[default]
    Off,
    /// Start a new automatic cycle from the manual phase's successor.
    #[cfg_attr(feature = "clap", value(alias = "resume_cycle"))]
    ResumeCycle,
}

// ============================================================================
// Serial
// ============================================================================

/// Serial link section as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SerialConfig {
    /// Device path, or `auto`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Line speed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baudrate: Option<u32>,

    /// Per-write bound in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Whether to set line speed and raw mode before opening
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configure_tty: Option<bool>,
}

/// How the serial device is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    /// Scan for the most likely device at connect time.
    Auto,
    /// Use this device.
    Path(PathBuf),
}

impl PortSelection {
    /// Interprets a user-supplied port string. `auto` (any case) selects detection.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(AUTO_PORT) {
            Self::Auto
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }
}

impl std::fmt::Display for PortSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str(AUTO_PORT),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolved serial link settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Device selection.
    pub port: PortSelection,
    /// Line speed.
    pub baudrate: u32,
    /// Bound on a single write.
    pub write_timeout: Duration,
    /// Whether to configure the line before opening.
    pub configure_tty: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialConfig::default().resolve().0
    }
}

impl SerialConfig {
    /// Resolves the section, replacing unusable values with defaults.
    #[must_use]
    pub fn resolve(&self) -> (SerialSettings, Vec<ValidationIssue>) {
        let mut issues = Vec::new();

        let port = match self.port.as_deref() {
            Some(raw) if raw.trim().is_empty() => {
                issues.push(ValidationIssue::warning(
                    "serial.port",
                    format!("empty port, using {DEFAULT_SERIAL_PORT}"),
                ));
                PortSelection::Path(PathBuf::from(DEFAULT_SERIAL_PORT))
            }
            Some(raw) => PortSelection::parse(raw),
            None => PortSelection::Path(PathBuf::from(DEFAULT_SERIAL_PORT)),
        };

        let baudrate = match self.baudrate {
            Some(0) => {
                issues.push(ValidationIssue::warning(
                    "serial.baudrate",
                    format!("baudrate must be positive, using {DEFAULT_BAUDRATE}"),
                ));
                DEFAULT_BAUDRATE
            }
            Some(rate) => rate,
            None => DEFAULT_BAUDRATE,
        };

        let timeout_ms = match self.timeout_ms {
            Some(0) => {
                issues.push(ValidationIssue::warning(
                    "serial.timeout_ms",
                    format!("timeout must be positive, using {DEFAULT_WRITE_TIMEOUT_MS}"),
                ));
                DEFAULT_WRITE_TIMEOUT_MS
            }
            Some(ms) => ms,
            None => DEFAULT_WRITE_TIMEOUT_MS,
        };

        let settings = SerialSettings {
            port,
            baudrate,
            write_timeout: Duration::from_millis(timeout_ms),
            configure_tty: self.configure_tty.unwrap_or(true),
        };
        (settings, issues)
    }
}

// ============================================================================
// Durations
// ============================================================================

/// Duration section as written in the file.
///
/// Values are kept as raw YAML so that a bad value can be reported and
/// replaced instead of failing the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DurationsConfig {
    /// GO duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go: Option<Value>,

    /// CAUTION duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caution: Option<Value>,

    /// STOP duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
}

impl DurationsConfig {
    /// Resolves each duration, falling back to its default on any problem.
    #[must_use]
    pub fn resolve(&self) -> (PhaseDurations, Vec<ValidationIssue>) {
        let mut issues = Vec::new();
        let mut pick = |key: &str, raw: Option<&Value>, default: u32| -> u32 {
            match raw.map(parse_seconds) {
                None | Some(Ok(None)) => default,
                Some(Ok(Some(secs))) => secs,
                Some(Err(reason)) => {
                    issues.push(ValidationIssue::warning(
                        format!("durations.{key}"),
                        format!("{reason}, using default of {default}s"),
                    ));
                    default
                }
            }
        };

        let durations = PhaseDurations {
            go: pick("go", self.go.as_ref(), DEFAULT_GO_SECS),
            caution: pick("caution", self.caution.as_ref(), DEFAULT_CAUTION_SECS),
            stop: pick("stop", self.stop.as_ref(), DEFAULT_STOP_SECS),
        };
        (durations, issues)
    }
}

/// Whole-second duration of each lit phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    /// GO seconds.
    pub go: u32,
    /// CAUTION seconds.
    pub caution: u32,
    /// STOP seconds.
    pub stop: u32,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            go: DEFAULT_GO_SECS,
            caution: DEFAULT_CAUTION_SECS,
            stop: DEFAULT_STOP_SECS,
        }
    }
}

impl PhaseDurations {
    /// Returns the configured seconds for `phase`; `OFF` has no duration.
    #[must_use]
    pub const fn for_phase(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Off => 0,
            Phase::Go => self.go,
            Phase::Caution => self.caution,
            Phase::Stop => self.stop,
        }
    }
}

/// Parses a duration value into whole seconds.
///
/// Accepts positive integers, numeric strings, and humantime strings such as
/// `"15s"` or `"1m"`. `null` is treated as absent.
fn parse_seconds(value: &Value) -> Result<Option<u32>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(secs) = n.as_u64() {
                positive_seconds(secs).map(Some)
            } else if n.as_i64().is_some() {
                Err(format!("negative duration {n}"))
            } else {
                Err(format!("{n} is not a whole number of seconds"))
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(secs) = trimmed.parse::<u64>() {
                return positive_seconds(secs).map(Some);
            }
            let parsed = humantime::parse_duration(trimmed)
                .map_err(|e| format!("cannot parse duration '{trimmed}': {e}"))?;
            if parsed.subsec_nanos() != 0 {
                return Err(format!("'{trimmed}' is not a whole number of seconds"));
            }
            positive_seconds(parsed.as_secs()).map(Some)
        }
        _ => Err("expected whole seconds".to_string()),
    }
}

fn positive_seconds(secs: u64) -> Result<u32, String> {
    if secs == 0 {
        return Err("duration must be at least one second".to_string());
    }
    u32::try_from(secs).map_err(|_| format!("duration {secs}s is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> RigConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let resolved = parse("{}").resolve();
        assert_eq!(resolved.durations, PhaseDurations::default());
        assert_eq!(resolved.durations.go, 15);
        assert_eq!(resolved.durations.caution, 5);
        assert_eq!(resolved.durations.stop, 15);
        assert_eq!(
            resolved.serial.port,
            PortSelection::Path(PathBuf::from("/dev/ttyUSB0"))
        );
        assert_eq!(resolved.serial.baudrate, 9600);
        assert_eq!(resolved.serial.write_timeout, Duration::from_secs(1));
        assert!(resolved.serial.configure_tty);
        assert_eq!(resolved.manual_expiry, ManualExpiry::Off);
        assert!(resolved.issues.is_empty());
    }

    #[test]
    fn test_full_document() {
        let resolved = parse(
            r"
serial:
  port: /dev/ttyACM1
  baudrate: 115200
  timeout_ms: 250
  configure_tty: false
durations:
  go: 20
  caution: 3s
  stop: '1m'
manual_expiry: resume_cycle
",
        )
        .resolve();
        assert_eq!(
            resolved.durations,
            PhaseDurations {
                go: 20,
                caution: 3,
                stop: 60
            }
        );
        assert_eq!(
            resolved.serial.port,
            PortSelection::Path(PathBuf::from("/dev/ttyACM1"))
        );
        assert_eq!(resolved.serial.baudrate, 115_200);
        assert_eq!(resolved.serial.write_timeout, Duration::from_millis(250));
        assert!(!resolved.serial.configure_tty);
        assert_eq!(resolved.manual_expiry, ManualExpiry::ResumeCycle);
        assert!(resolved.issues.is_empty());
    }

    #[test]
    fn test_partial_durations_keep_other_defaults() {
        let resolved = parse("durations:\n  go: 30\n").resolve();
        assert_eq!(resolved.durations.go, 30);
        assert_eq!(resolved.durations.caution, DEFAULT_CAUTION_SECS);
        assert_eq!(resolved.durations.stop, DEFAULT_STOP_SECS);
    }

    #[test]
    fn test_invalid_durations_fall_back_with_warnings() {
        let resolved = parse(
            r"
durations:
  go: -4
  caution: 2.5
  stop: soon
",
        )
        .resolve();
        assert_eq!(resolved.durations, PhaseDurations::default());
        assert_eq!(resolved.issues.len(), 3);
        let paths: Vec<&str> = resolved.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, ["durations.go", "durations.caution", "durations.stop"]);
    }

    #[test]
    fn test_zero_duration_is_rejected() {
        let resolved = parse("durations:\n  go: 0\n").resolve();
        assert_eq!(resolved.durations.go, DEFAULT_GO_SECS);
        assert_eq!(resolved.issues.len(), 1);
        assert!(resolved.issues[0].message.contains("at least one second"));
    }

    #[test]
    fn test_null_duration_is_silent_default() {
        let resolved = parse("durations:\n  stop: ~\n").resolve();
        assert_eq!(resolved.durations.stop, DEFAULT_STOP_SECS);
        assert!(resolved.issues.is_empty());
    }

    #[test]
    fn test_fractional_humantime_rejected() {
        let resolved = parse("durations:\n  caution: 1500ms\n").resolve();
        assert_eq!(resolved.durations.caution, DEFAULT_CAUTION_SECS);
        assert_eq!(resolved.issues.len(), 1);
    }

    #[test]
    fn test_non_scalar_duration_rejected() {
        let resolved = parse("durations:\n  go: [1, 2]\n").resolve();
        assert_eq!(resolved.durations.go, DEFAULT_GO_SECS);
        assert_eq!(resolved.issues[0].path, "durations.go");
    }

    #[test]
    fn test_auto_port() {
        let resolved = parse("serial:\n  port: AUTO\n").resolve();
        assert_eq!(resolved.serial.port, PortSelection::Auto);
        assert_eq!(resolved.serial.port.to_string(), "auto");
    }

    #[test]
    fn test_zero_serial_values_fall_back() {
        let resolved = parse("serial:\n  baudrate: 0\n  timeout_ms: 0\n  port: ''\n").resolve();
        assert_eq!(resolved.serial, SerialSettings::default());
        assert_eq!(resolved.issues.len(), 3);
    }

    #[test]
    fn test_unknown_manual_expiry_is_parse_error() {
        assert!(serde_yaml::from_str::<RigConfig>("manual_expiry: sometimes").is_err());
    }

    #[test]
    fn test_for_phase() {
        let d = PhaseDurations {
            go: 1,
            caution: 2,
            stop: 3,
        };
        assert_eq!(d.for_phase(Phase::Off), 0);
        assert_eq!(d.for_phase(Phase::Go), 1);
        assert_eq!(d.for_phase(Phase::Caution), 2);
        assert_eq!(d.for_phase(Phase::Stop), 3);
    }
}
