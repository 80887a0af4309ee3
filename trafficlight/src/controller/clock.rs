//! Phase clock
//!
//! A one-shot, cancellable countdown. At most one fire is outstanding per
//! clock: scheduling replaces the previous schedule, and a fire that arrives
//! after a cancel or reschedule is rejected by its generation.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One tick of the countdown.
pub const TICK: Duration = Duration::from_secs(1);

/// Message delivered when a scheduled delay elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockFire {
    /// Schedule this fire belongs to.
    pub generation: u64,
}

/// Countdown seam between the controller and time.
pub trait PhaseClock: Send {
    /// Arranges for one fire after `delay`, replacing any pending schedule.
    fn schedule(&mut self, delay: Duration);

    /// Cancels the pending schedule. No fire from it will be accepted.
    fn cancel(&mut self);

    /// Whether a schedule is outstanding.
    fn is_pending(&self) -> bool;

    /// Consumes a fire. Returns `true` only for the current schedule's fire.
    fn accept(&mut self, fire: ClockFire) -> bool;
}

/// Clock backed by tokio timers.
///
/// Each schedule spawns a sleeping task that posts a [`ClockFire`] into the
/// receiver returned by [`TokioClock::new`]. Must be used inside a runtime.
#[derive(Debug)]
pub struct TokioClock {
    fires: mpsc::UnboundedSender<ClockFire>,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl TokioClock {
    /// Creates a clock and the receiver its fires arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClockFire>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let clock = Self {
            fires: tx,
            generation: 0,
            pending: None,
        };
        (clock, rx)
    }
}

impl PhaseClock for TokioClock {
    fn schedule(&mut self, delay: Duration) {
        self.cancel();
        let fire = ClockFire {
            generation: self.generation,
        };
        let fires = self.fires.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fires.send(fire);
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn accept(&mut self, fire: ClockFire) -> bool {
        if self.pending.is_some() && fire.generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

impl Drop for TokioClock {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

/// Clock driven by hand. Records every call for assertions.
#[derive(Debug, Default)]
pub struct ManualClock {
    generation: u64,
    pending: bool,
    scheduled: Vec<Duration>,
}

impl ManualClock {
    /// Creates an idle clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fire for the pending schedule, if any.
    #[must_use]
    pub const fn fire(&self) -> Option<ClockFire> {
        if self.pending {
            Some(ClockFire {
                generation: self.generation,
            })
        } else {
            None
        }
    }

    /// Every delay passed to `schedule`, in order.
    #[must_use]
    pub fn scheduled(&self) -> &[Duration] {
        &self.scheduled
    }
}

impl PhaseClock for ManualClock {
    fn schedule(&mut self, delay: Duration) {
        self.cancel();
        self.scheduled.push(delay);
        self.pending = true;
    }

    fn cancel(&mut self) {
        self.pending = false;
        self.generation = self.generation.wrapping_add(1);
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    fn accept(&mut self, fire: ClockFire) -> bool {
        if self.pending && fire.generation == self.generation {
            self.pending = false;
            true
        } else {
            false
        }
    }
}
