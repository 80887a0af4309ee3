//! Configuration loader
//!
//! Loading runs in three stages:
//! 1. Size check and read (UTF-8 BOM stripped)
//! 2. YAML parsing into [`RigConfig`]
//! 3. Resolution: defaults applied, bad values replaced and reported
//!
//! Only unreadable or unparseable files are errors. Out-of-range values
//! become warnings on the [`LoadResult`].

use std::path::Path;

use crate::config::{ResolvedConfig, RigConfig};
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Limits applied to configuration files.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("TRAFFICLIGHT_MAX_CONFIG_SIZE", 64 * 1024),
        }
    }
}

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The resolved configuration.
    pub config: ResolvedConfig,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Loads and resolves a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist or cannot be read
    /// - The file exceeds the size limit
    /// - YAML parsing fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|e| read_error(path, e))?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.limits.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.limits.max_config_size),
            });
        }

        let raw_content = std::fs::read_to_string(path).map_err(|e| read_error(path, e))?;
        let content = raw_content.strip_prefix('\u{feff}').unwrap_or(&raw_content);

        // An empty document is a valid file with every key defaulted.
        let rig: RigConfig = if content.trim().is_empty() {
            RigConfig::default()
        } else {
            serde_yaml::from_str::<Option<RigConfig>>(content)
                .map_err(|e| ConfigError::ParseError {
                    path: path.to_path_buf(),
                    line: e.location().map(|l| l.line()),
                    message: e.to_string(),
                })?
                .unwrap_or_default()
        };

        let config = rig.resolve();
        let warnings = config
            .issues
            .iter()
            .map(|issue| LoadWarning {
                message: issue.message.clone(),
                location: Some(issue.path.clone()),
            })
            .collect();

        Ok(LoadResult { config, warnings })
    }

    /// Loads `path` if given, otherwise returns the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`ConfigLoader::load`].
    pub fn load_optional(&self, path: Option<&Path>) -> Result<LoadResult, ConfigError> {
        path.map_or_else(
            || {
                Ok(LoadResult {
                    config: ResolvedConfig::default(),
                    warnings: Vec::new(),
                })
            },
            |path| self.load(path),
        )
    }
}

fn read_error(path: &Path, source: std::io::Error) -> ConfigError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ConfigError::MissingFile {
            path: path.to_path_buf(),
        }
    } else {
        ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reads an environment variable and parses it, falling back to `default`.
pub fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ManualExpiry, PhaseDurations, PortSelection};
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            "serial:\n  port: auto\n  baudrate: 19200\ndurations:\n  go: 20\n  caution: 3s\n  stop: 1m\nmanual_expiry: resume_cycle\n",
        );
        let result = ConfigLoader::default().load(file.path()).unwrap();
        assert_eq!(result.config.serial.port, PortSelection::Auto);
        assert_eq!(result.config.serial.baudrate, 19200);
        assert_eq!(
            result.config.durations,
            PhaseDurations {
                go: 20,
                caution: 3,
                stop: 60
            }
        );
        assert_eq!(result.config.manual_expiry, ManualExpiry::ResumeCycle);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_load_bad_duration_warns_and_defaults() {
        let file = write_config("durations:\n  go: -4\n  caution: 2.5\n");
        let result = ConfigLoader::default().load(file.path()).unwrap();
        assert_eq!(result.config.durations, PhaseDurations::default());
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].location.as_deref(), Some("durations.go"));
        assert_eq!(
            result.warnings[1].location.as_deref(),
            Some("durations.caution")
        );
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let file = write_config("\u{feff}\n");
        let result = ConfigLoader::default().load(file.path()).unwrap();
        assert_eq!(result.config, ResolvedConfig::default());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigLoader::default()
            .load(Path::new("/nonexistent/trafficlight/rig.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_load_invalid_utf8_keeps_io_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"durations:\n  go: \xff\xfe\n").unwrap();

        let err = ConfigLoader::default().load(file.path()).unwrap_err();
        match err {
            ConfigError::ReadFailed { ref source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
            }
            ref other => panic!("expected ReadFailed, got {other:?}"),
        }
        assert!(!err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_directory_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::default().load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn test_dollar_text_is_kept_verbatim() {
        let file = write_config("# ${unclosed in a comment\nserial:\n  port: /dev/tty$1\n");
        let result = ConfigLoader::default().load(file.path()).unwrap();
        assert_eq!(
            result.config.serial.port,
            PortSelection::Path("/dev/tty$1".into())
        );
    }

    #[test]
    fn test_load_parse_error_has_line() {
        let file = write_config("durations:\n  go: [1, 2\n");
        let err = ConfigLoader::default().load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { line: Some(_), .. }));
    }

    #[test]
    fn test_load_size_limit() {
        let file = write_config("durations:\n  go: 10\n");
        let loader = ConfigLoader::new(ConfigLimits { max_config_size: 4 });
        let err = loader.load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "file_size"));
    }

    #[test]
    fn test_load_optional_none_is_default() {
        let result = ConfigLoader::default().load_optional(None).unwrap();
        assert_eq!(result.config.durations, PhaseDurations::default());
    }

    #[test]
    fn test_env_or() {
        assert_eq!(env_or("TRAFFICLIGHT_TEST_ENV_OR_UNSET_XYZ", 7usize), 7);
    }
}
