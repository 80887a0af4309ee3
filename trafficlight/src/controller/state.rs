//! Phase state representation
//!
//! [`PhaseState`] is a plain value owned by the controller. Observers only
//! ever see copies of it.

use std::fmt;

use serde::Serialize;
use trafficlight_core::Phase;

/// Identity of an automatic cycle.
///
/// Incremented each time a cycle is started or resumed and never reused.
/// `CycleId(0)` means no cycle has run yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct CycleId(pub u64);

impl CycleId {
    /// Returns the identity that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a phase was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    /// First phase of a cycle started by the operator.
    CycleStart,
    /// Countdown reached zero while cycling.
    Automatic,
    /// Operator forced the phase.
    Manual,
    /// Cycle stopped; the light goes dark.
    Stopped,
    /// A manual phase ran out and the light went dark.
    Expired,
    /// A manual phase ran out and cycling resumed from its successor.
    Resumed,
}

impl EntryReason {
    /// Label used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CycleStart => "cycle_start",
            Self::Automatic => "automatic",
            Self::Manual => "manual",
            Self::Stopped => "stopped",
            Self::Expired => "expired",
            Self::Resumed => "resumed",
        }
    }
}

impl fmt::Display for EntryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the controller: what is lit, for how long, and whether it
/// will advance on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseState {
    phase: Phase,
    remaining: u32,
    running: bool,
    caution_successor: Phase,
    cycle: CycleId,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            phase: Phase::Off,
            remaining: 0,
            running: false,
            caution_successor: Phase::Stop,
            cycle: CycleId::default(),
        }
    }
}

impl PhaseState {
    /// Phase currently shown.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whole seconds left before the phase ends.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Whether an automatic cycle is active.
    #[must_use]
    pub const fn running(&self) -> bool {
        self.running
    }

    /// Phase that follows the current CAUTION instance.
    #[must_use]
    pub const fn caution_successor(&self) -> Phase {
        self.caution_successor
    }

    /// Most recent cycle identity.
    #[must_use]
    pub const fn cycle(&self) -> CycleId {
        self.cycle
    }

    pub(crate) const fn set_phase(&mut self, phase: Phase, remaining: u32) {
        self.phase = phase;
        self.remaining = remaining;
    }

    pub(crate) const fn set_remaining(&mut self, remaining: u32) {
        self.remaining = remaining;
    }

    pub(crate) const fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub(crate) const fn set_caution_successor(&mut self, successor: Phase) {
        self.caution_successor = successor;
    }

    pub(crate) const fn begin_cycle(&mut self) -> CycleId {
        self.cycle = self.cycle.next();
        self.running = true;
        self.cycle
    }
}

impl fmt::Display for PhaseState {
    /// Console rendering: `LIGHT: GO  TIMER: 12`, with the cycle while running.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LIGHT: {}  TIMER: {}", self.phase, self.remaining)?;
        if self.running {
            write!(f, "  CYCLE: {}", self.cycle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_dark() {
        let state = PhaseState::default();
        assert_eq!(state.phase(), Phase::Off);
        assert_eq!(state.remaining(), 0);
        assert!(!state.running());
        assert_eq!(state.cycle(), CycleId(0));
    }

    #[test]
    fn test_begin_cycle_increments() {
        let mut state = PhaseState::default();
        assert_eq!(state.begin_cycle(), CycleId(1));
        assert_eq!(state.begin_cycle(), CycleId(2));
        assert!(state.running());
    }

    #[test]
    fn test_display() {
        let mut state = PhaseState::default();
        assert_eq!(state.to_string(), "LIGHT: OFF  TIMER: 0");
        state.begin_cycle();
        state.set_phase(Phase::Go, 15);
        assert_eq!(state.to_string(), "LIGHT: GO  TIMER: 15  CYCLE: #1");
    }

    #[test]
    fn test_entry_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EntryReason::CycleStart).unwrap(),
            "\"cycle_start\""
        );
        assert_eq!(EntryReason::Resumed.to_string(), "resumed");
    }
}
