//! Phase controller
//!
//! Owns the [`PhaseState`] and applies every transition rule. The automatic
//! cycle is `GO → CAUTION → STOP → CAUTION → GO → …`; CAUTION is visited in
//! both directions, so the state records which phase follows it.
//!
//! Every phase entry sends exactly one command and leaves at most one clock
//! schedule outstanding. Entering OFF sends `C` and cancels the clock.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, trace};
use trafficlight_core::Phase;
use trafficlight_core::config::{ManualExpiry, PhaseDurations};

use super::clock::{ClockFire, PhaseClock, TICK};
use super::state::{EntryReason, PhaseState};
use crate::channel::CommandChannel;
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter};

/// Single-owner traffic phase state machine.
pub struct PhaseController<C, K> {
    state: PhaseState,
    durations: PhaseDurations,
    manual_expiry: ManualExpiry,
    channel: C,
    clock: K,
    events: Arc<EventEmitter>,
}

impl<C, K> std::fmt::Debug for PhaseController<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseController")
            .field("state", &self.state)
            .field("durations", &self.durations)
            .field("manual_expiry", &self.manual_expiry)
            .finish_non_exhaustive()
    }
}

impl<C: CommandChannel, K: PhaseClock> PhaseController<C, K> {
    /// Creates a dark controller. Nothing is sent until the first operation.
    #[must_use]
    pub fn new(
        durations: PhaseDurations,
        manual_expiry: ManualExpiry,
        channel: C,
        clock: K,
    ) -> Self {
        Self {
            state: PhaseState::default(),
            durations,
            manual_expiry,
            channel,
            clock,
            events: Arc::new(EventEmitter::noop()),
        }
    }

    /// Routes structured events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PhaseState {
        self.state
    }

    /// Command channel in use.
    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    /// Clock in use.
    #[must_use]
    pub const fn clock(&self) -> &K {
        &self.clock
    }

    /// Starts an automatic cycle at GO.
    ///
    /// Returns `false` and changes nothing if a cycle is already running.
    pub fn start_cycle(&mut self) -> bool {
        if self.state.running() {
            debug!(cycle = %self.state.cycle(), "cycle already running");
            return false;
        }

        let cycle = self.state.begin_cycle();
        self.state.set_caution_successor(Phase::Stop);
        info!(cycle = %cycle, "cycle started");
        metrics::record_cycle_started(false);
        self.events.emit(Event::CycleStarted {
            timestamp: Utc::now(),
            cycle_id: cycle,
            resumed: false,
        });

        self.enter(Phase::Go, EntryReason::CycleStart);
        true
    }

    /// Stops cycling and turns the light off.
    ///
    /// Always sends `C`, even when already dark.
    pub fn stop_cycle(&mut self) {
        let was = self.state;
        self.state.set_running(false);
        self.clock.cancel();

        if was.running() {
            info!(cycle = %was.cycle(), phase = %was.phase(), remaining = was.remaining(), "cycle stopped");
            self.events.emit(Event::CycleStopped {
                timestamp: Utc::now(),
                cycle_id: was.cycle(),
                phase: was.phase(),
                remaining: was.remaining(),
            });
        }

        self.enter(Phase::Off, EntryReason::Stopped);
    }

    /// Forces `phase` for its configured duration without cycling.
    ///
    /// The light goes dark first (`C`), then the requested phase is sent.
    /// `manual(Phase::Off)` is the same as [`stop_cycle`](Self::stop_cycle).
    pub fn manual(&mut self, phase: Phase) {
        let previous = self.state.phase();
        self.stop_cycle();

        let successor = match phase {
            Phase::Off => return,
            Phase::Go => Phase::Stop,
            Phase::Stop => Phase::Go,
            Phase::Caution if previous == Phase::Stop => Phase::Go,
            Phase::Caution => Phase::Stop,
        };
        self.state.set_caution_successor(successor);
        self.enter(phase, EntryReason::Manual);
    }

    /// Applies one elapsed second.
    pub fn tick(&mut self) {
        if !self.state.phase().is_lit() {
            trace!("tick while dark ignored");
            return;
        }

        let remaining = self.state.remaining().saturating_sub(1);
        self.state.set_remaining(remaining);
        metrics::set_remaining(remaining);
        trace!(phase = %self.state.phase(), remaining, "tick");

        if remaining > 0 {
            self.clock.schedule(TICK);
        } else if self.state.running() {
            self.advance(EntryReason::Automatic);
        } else {
            self.expire_manual();
        }
    }

    /// Handles a clock fire. Stale fires are ignored.
    ///
    /// Returns `true` if the fire was current and a tick was applied.
    pub fn on_fire(&mut self, fire: ClockFire) -> bool {
        if self.clock.accept(fire) {
            self.tick();
            true
        } else {
            debug!(generation = fire.generation, "stale clock fire ignored");
            false
        }
    }

    fn advance(&mut self, reason: EntryReason) {
        let next = match self.state.phase() {
            Phase::Go => {
                self.state.set_caution_successor(Phase::Stop);
                Phase::Caution
            }
            Phase::Caution => self.state.caution_successor(),
            Phase::Stop => {
                self.state.set_caution_successor(Phase::Go);
                Phase::Caution
            }
            Phase::Off => return,
        };
        self.enter(next, reason);
    }

    fn expire_manual(&mut self) {
        match self.manual_expiry {
            ManualExpiry::Off => {
                info!(phase = %self.state.phase(), "manual phase expired");
                self.enter(Phase::Off, EntryReason::Expired);
            }
            ManualExpiry::ResumeCycle => {
                let cycle = self.state.begin_cycle();
                info!(cycle = %cycle, phase = %self.state.phase(), "manual phase expired, resuming cycle");
                metrics::record_cycle_started(true);
                self.events.emit(Event::CycleStarted {
                    timestamp: Utc::now(),
                    cycle_id: cycle,
                    resumed: true,
                });
                self.advance(EntryReason::Resumed);
            }
        }
    }

    fn enter(&mut self, phase: Phase, reason: EntryReason) {
        let from = self.state.phase();
        let duration = self.durations.for_phase(phase);
        self.state.set_phase(phase, duration);

        self.channel.send(phase.command());
        if phase.is_lit() {
            self.clock.schedule(TICK);
        } else {
            self.clock.cancel();
        }

        info!(
            phase = %phase,
            from = %from,
            remaining = duration,
            reason = %reason,
            cycle = %self.state.cycle(),
            running = self.state.running(),
            "phase entered"
        );
        metrics::record_phase_transition(from, phase);
        metrics::set_current_phase(phase, from);
        metrics::set_remaining(duration);
        self.events.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            phase,
            from,
            remaining: duration,
            reason,
            cycle_id: self.state.cycle(),
            running: self.state.running(),
        });
    }
}
