//! `trafficlight ports`
//!
//! Lists serial devices that could be the rig, best candidate first.

use crate::channel::detect;
use crate::cli::args::{OutputFormat, PortsArgs};
use crate::error::TrafficLightError;

/// Print the detected candidates.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(args: &PortsArgs) -> Result<(), TrafficLightError> {
    let candidates = detect::scan();

    match args.format {
        OutputFormat::Human => {
            if candidates.is_empty() {
                println!("no serial devices found");
            }
            for candidate in &candidates {
                println!("{:>4}  {}", candidate.score, candidate.path.display());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
    }
    Ok(())
}
