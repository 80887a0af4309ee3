//! `trafficlight validate`
//!
//! Loads each file the way `run` would and reports what was replaced by a
//! default. Unreadable or unparseable files always fail; with `--strict`,
//! files with warnings fail too.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadWarning, PhaseDurations};
use crate::error::{ConfigError, TrafficLightError};

/// Outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    durations: Option<PhaseDurations>,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Validate every file and print a report.
///
/// # Errors
///
/// Returns `ConfigError::ValidationFailed` if any file failed.
pub fn run(args: &ValidateArgs) -> Result<(), TrafficLightError> {
    let loader = ConfigLoader::default();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| check(&loader, path, args.strict))
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        return Err(ConfigError::ValidationFailed { count: failed }.into());
    }
    Ok(())
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    info!(file = %path.display(), "validating configuration");
    let file = path.display().to_string();

    match loader.load(path) {
        Ok(loaded) => {
            let warnings: Vec<String> = loaded.warnings.iter().map(LoadWarning::to_string).collect();
            FileReport {
                file,
                valid: !strict || warnings.is_empty(),
                durations: Some(loaded.config.durations),
                warnings,
                error: None,
            }
        }
        Err(e) => FileReport {
            file,
            valid: false,
            durations: None,
            warnings: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}

fn print_human(report: &FileReport) {
    match (&report.error, report.durations) {
        (Some(error), _) => println!("{}: error: {error}", report.file),
        (None, Some(d)) => {
            let status = if report.valid { "ok" } else { "failed (strict)" };
            println!(
                "{}: {status} (go {}s, caution {}s, stop {}s)",
                report.file, d.go, d.caution, d.stop
            );
        }
        (None, None) => println!("{}: ok", report.file),
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_check_valid_file() {
        let file = write_config("durations:\n  go: 10\n");
        let report = check(&ConfigLoader::default(), file.path(), true);
        assert!(report.valid);
        assert_eq!(report.durations.unwrap().go, 10);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_strict_fails_on_warnings() {
        let file = write_config("durations:\n  go: 0\n");
        let lenient = check(&ConfigLoader::default(), file.path(), false);
        assert!(lenient.valid);
        assert_eq!(lenient.warnings.len(), 1);
        assert!(lenient.warnings[0].contains("durations.go"));

        let strict = check(&ConfigLoader::default(), file.path(), true);
        assert!(!strict.valid);
    }

    #[test]
    fn test_run_reports_failure_count() {
        let good = write_config("{}\n");
        let bad = write_config("durations: [\n");
        let args = ValidateArgs {
            files: vec![good.path().to_path_buf(), bad.path().to_path_buf()],
            format: OutputFormat::Json,
            strict: false,
        };
        let err = run(&args).unwrap_err();
        assert!(matches!(
            err,
            TrafficLightError::Config(ConfigError::ValidationFailed { count: 1 })
        ));
    }
}
