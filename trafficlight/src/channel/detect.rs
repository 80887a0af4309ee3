//! Serial port auto-detection.
//!
//! Scans well-known device name patterns and ranks the matches. Lower
//! scores are better; ties are broken by path.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

/// Device patterns scanned by [`scan`].
pub const PORT_PATTERNS: [&str; 5] = [
    "/dev/ttyUSB*",
    "/dev/ttyACM*",
    "/dev/tty.usbmodem*",
    "/dev/tty.usbserial*",
    "/dev/cu.*",
];

/// A device that might be the rig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCandidate {
    /// Device path.
    pub path: PathBuf,
    /// Rank; lower is more likely.
    pub score: u32,
}

/// Ranks a device path by how likely it is to be a USB serial adapter.
#[must_use]
pub fn score_port(path: &Path) -> u32 {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if name.starts_with("ttyUSB") || name.starts_with("tty.usbmodem") {
        1
    } else if name.starts_with("ttyACM") || name.starts_with("tty.usbserial") {
        2
    } else if name.starts_with("cu.") {
        20
    } else if name.to_ascii_lowercase().contains("usb") {
        10
    } else {
        100
    }
}

/// Expands `patterns` and returns every match, best first.
#[must_use]
pub fn scan_patterns(patterns: &[&str]) -> Vec<PortCandidate> {
    let mut candidates: Vec<PortCandidate> = patterns
        .iter()
        .filter_map(|pattern| match glob::glob(pattern) {
            Ok(paths) => Some(paths),
            Err(e) => {
                debug!(pattern, error = %e, "invalid port pattern");
                None
            }
        })
        .flatten()
        .filter_map(Result::ok)
        .map(|path| PortCandidate {
            score: score_port(&path),
            path,
        })
        .collect();

    candidates.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.path.cmp(&b.path)));
    candidates.dedup_by(|a, b| a.path == b.path);
    candidates
}

/// Scans the standard device patterns.
#[must_use]
pub fn scan() -> Vec<PortCandidate> {
    scan_patterns(&PORT_PATTERNS)
}

/// Returns the most likely device, if any.
#[must_use]
pub fn best_port() -> Option<PathBuf> {
    let best = scan().into_iter().next().map(|c| c.path);
    debug!(port = ?best, "auto-detected serial port");
    best
}
