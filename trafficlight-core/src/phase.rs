//! Signal phases and device commands
//!
//! A [`Phase`] is what the light is showing; a [`Command`] is the single
//! ASCII byte sent to the rig to show it. Every phase maps to exactly one
//! command.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The controller's output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// All lamps dark.
    #[default]
    Off,
    /// Green.
    #[cfg_attr(feature = "clap", value(alias = "green"))]
    Go,
    /// Yellow, visited between GO and STOP in both directions.
    #[cfg_attr(feature = "clap", value(alias = "yellow"))]
    Caution,
    /// Red.
    #[cfg_attr(feature = "clap", value(alias = "red"))]
    Stop,
}

impl Phase {
    /// All phases, in display order.
    pub const ALL: [Self; 4] = [Self::Off, Self::Go, Self::Caution, Self::Stop];

    /// Returns the command that puts the rig into this phase.
    #[must_use]
    pub const fn command(self) -> Command {
        match self {
            Self::Off => Command::Clear,
            Self::Go => Command::Go,
            Self::Caution => Command::Caution,
            Self::Stop => Command::Stop,
        }
    }

    /// Upper-case label used in logs, events and the console display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Go => "GO",
            Self::Caution => "CAUTION",
            Self::Stop => "STOP",
        }
    }

    /// Returns `true` for every phase except [`Phase::Off`].
    #[must_use]
    pub const fn is_lit(self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-byte command understood by the rig firmware.
///
/// Sent as a bare ASCII byte; no newline terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Command {
    /// `G`: green on.
    #[serde(rename = "G")]
    Go = b'G',
    /// `Y`: yellow on.
    #[serde(rename = "Y")]
    Caution = b'Y',
    /// `R`: red on.
    #[serde(rename = "R")]
    Stop = b'R',
    /// `C`: all lamps off.
    #[serde(rename = "C")]
    Clear = b'C',
}

impl Command {
    /// Returns the wire byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns the wire letter as a string, for labels and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Go => "G",
            Self::Caution => "Y",
            Self::Stop => "R",
            Self::Clear => "C",
        }
    }

    /// Returns the wire byte as a `char`.
    #[must_use]
    pub const fn as_char(self) -> char {
        self.as_byte() as char
    }

    /// Decodes a wire byte. Lower-case letters are accepted.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte.to_ascii_uppercase() {
            b'G' => Some(Self::Go),
            b'Y' => Some(Self::Caution),
            b'R' => Some(Self::Stop),
            b'C' => Some(Self::Clear),
            _ => None,
        }
    }

    /// Returns the phase this command displays.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::Go => Phase::Go,
            Self::Caution => Phase::Caution,
            Self::Stop => Phase::Stop,
            Self::Clear => Phase::Off,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command '{0}': expected one of G, Y, R, C (or go, caution, stop, clear)")]
pub struct ParseCommandError(pub String);

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Accepts the wire letter or the phase-style name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let [byte] = trimmed.as_bytes() {
            if let Some(command) = Self::from_byte(*byte) {
                return Ok(command);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "go" | "green" => Ok(Self::Go),
            "caution" | "yellow" => Ok(Self::Caution),
            "stop" | "red" => Ok(Self::Stop),
            "clear" | "off" => Ok(Self::Clear),
            _ => Err(ParseCommandError(trimmed.to_string())),
        }
    }
}
