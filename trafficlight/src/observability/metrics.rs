//! Metrics collection for `trafficlight`.
//!
//! Provides Prometheus-compatible metrics and typed convenience functions for
//! recording them. Every label value comes from a closed set (phase names,
//! command letters, outcome names), so label cardinality is bounded.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use trafficlight_core::{Command, Phase};

use crate::error::TrafficLightError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// What happened to a command handed to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Written to the device.
    Sent,
    /// Logged instead of written (dry run or no device).
    Skipped,
    /// The write failed or timed out.
    Failed,
    /// The outbound queue was full or closed.
    Dropped,
}

impl CommandOutcome {
    /// Label value for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Dropped => "dropped",
        }
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `TrafficLightError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), TrafficLightError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| TrafficLightError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "trafficlight_phase_transitions_total",
        "Total number of phase entries"
    );
    describe_gauge!(
        "trafficlight_current_phase",
        "Currently displayed phase (1 = active)"
    );
    describe_gauge!(
        "trafficlight_remaining_seconds",
        "Seconds left in the current phase"
    );
    describe_counter!(
        "trafficlight_cycles_started_total",
        "Automatic cycles started, including resumed ones"
    );
    describe_counter!(
        "trafficlight_commands_total",
        "Device commands by letter and outcome"
    );
    describe_counter!(
        "trafficlight_errors_total",
        "Total number of errors by category"
    );
}

/// Records a phase entry.
pub fn record_phase_transition(from: Phase, to: Phase) {
    counter!(
        "trafficlight_phase_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Sets the current phase gauge, zeroing the previous phase's label.
pub fn set_current_phase(phase: Phase, previous: Phase) {
    if previous != phase {
        gauge!("trafficlight_current_phase", "phase" => previous.as_str()).set(0.0);
    }
    gauge!("trafficlight_current_phase", "phase" => phase.as_str()).set(1.0);
}

/// Sets the remaining-seconds gauge.
pub fn set_remaining(seconds: u32) {
    gauge!("trafficlight_remaining_seconds").set(f64::from(seconds));
}

/// Records the start of an automatic cycle.
pub fn record_cycle_started(resumed: bool) {
    let kind = if resumed { "resumed" } else { "operator" };
    counter!("trafficlight_cycles_started_total", "kind" => kind).increment(1);
}

/// Records what happened to a device command.
pub fn record_command(command: Command, outcome: CommandOutcome) {
    counter!(
        "trafficlight_commands_total",
        "command" => command.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Records an error by category.
pub fn record_error(category: &'static str) {
    counter!("trafficlight_errors_total", "category" => category).increment(1);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Runs `f` against a local Prometheus recorder and returns the rendered
    /// exposition text.
    pub(crate) fn capture_metrics(f: impl FnOnce()) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, f);
        handle.render()
    }

    /// Value of the first sample of `name` carrying every label in `labels`.
    pub(crate) fn sample(rendered: &str, name: &str, labels: &[&str]) -> Option<f64> {
        rendered
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter(|line| {
                line.strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
            })
            .find(|line| labels.iter().all(|label| line.contains(label)))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(CommandOutcome::Sent.as_str(), "sent");
        assert_eq!(CommandOutcome::Skipped.as_str(), "skipped");
        assert_eq!(CommandOutcome::Failed.as_str(), "failed");
        assert_eq!(CommandOutcome::Dropped.as_str(), "dropped");
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // metrics macros no-op when no global recorder is installed
        record_phase_transition(Phase::Go, Phase::Caution);
        set_current_phase(Phase::Caution, Phase::Go);
        set_remaining(5);
        record_cycle_started(false);
        record_command(Command::Clear, CommandOutcome::Failed);
        record_error("channel");
    }

    #[test]
    fn command_counter_uses_wire_letters() {
        let rendered = capture_metrics(|| {
            record_command(Command::Caution, CommandOutcome::Sent);
            record_command(Command::Caution, CommandOutcome::Sent);
            record_command(Command::Clear, CommandOutcome::Failed);
        });

        assert_eq!(
            sample(&rendered, "trafficlight_commands_total", &[r#"command="Y""#, r#"outcome="sent""#]),
            Some(2.0)
        );
        assert_eq!(
            sample(&rendered, "trafficlight_commands_total", &[r#"command="C""#, r#"outcome="failed""#]),
            Some(1.0)
        );
    }

    #[test]
    fn phase_gauge_moves_with_the_light() {
        let rendered = capture_metrics(|| {
            record_phase_transition(Phase::Go, Phase::Caution);
            set_current_phase(Phase::Go, Phase::Off);
            set_current_phase(Phase::Caution, Phase::Go);
            set_remaining(5);
            record_cycle_started(true);
        });

        assert_eq!(
            sample(&rendered, "trafficlight_current_phase", &[r#"phase="CAUTION""#]),
            Some(1.0)
        );
        assert_eq!(
            sample(&rendered, "trafficlight_current_phase", &[r#"phase="GO""#]),
            Some(0.0)
        );
        assert_eq!(sample(&rendered, "trafficlight_remaining_seconds", &[]), Some(5.0));
        assert_eq!(
            sample(&rendered, "trafficlight_phase_transitions_total", &[r#"from="GO""#, r#"to="CAUTION""#]),
            Some(1.0)
        );
        assert_eq!(
            sample(&rendered, "trafficlight_cycles_started_total", &[r#"kind="resumed""#]),
            Some(1.0)
        );
    }
}
