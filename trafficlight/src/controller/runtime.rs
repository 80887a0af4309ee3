//! Controller runtime
//!
//! One task owns the [`PhaseController`] and serializes everything that
//! mutates it: operator requests, clock fires and shutdown. Clients talk to
//! it through a cloneable [`ControllerHandle`] and observe it through a
//! watch channel of [`PhaseState`] snapshots.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use trafficlight_core::Phase;
use trafficlight_core::config::{ManualExpiry, PhaseDurations};

use super::clock::TokioClock;
use super::engine::PhaseController;
use super::state::PhaseState;
use crate::channel::CommandChannel;
use crate::error::ControllerError;
use crate::observability::{Event, EventEmitter};

/// Pending operator requests before senders wait.
const REQUEST_QUEUE_DEPTH: usize = 16;

/// Everything needed to start a controller runtime.
pub struct ControllerOptions<C> {
    /// Phase durations.
    pub durations: PhaseDurations,
    /// What an expired manual phase does.
    pub manual_expiry: ManualExpiry,
    /// Outbound command channel.
    pub channel: C,
    /// Structured event sink.
    pub events: Arc<EventEmitter>,
    /// Shuts the runtime down when cancelled.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy)]
enum Request {
    StartCycle,
    StopCycle,
    Manual(Phase),
}

struct Envelope {
    request: Request,
    reply: oneshot::Sender<PhaseState>,
}

/// Client side of a running controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    requests: mpsc::Sender<Envelope>,
    snapshots: watch::Receiver<PhaseState>,
}

impl ControllerHandle {
    /// Starts an automatic cycle. Ignored if one is running.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Closed` if the runtime has shut down.
    pub async fn start_cycle(&self) -> Result<PhaseState, ControllerError> {
        self.request(Request::StartCycle).await
    }

    /// Stops cycling and turns the light off.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Closed` if the runtime has shut down.
    pub async fn stop_cycle(&self) -> Result<PhaseState, ControllerError> {
        self.request(Request::StopCycle).await
    }

    /// Forces a phase for its configured duration.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Closed` if the runtime has shut down.
    pub async fn manual(&self, phase: Phase) -> Result<PhaseState, ControllerError> {
        self.request(Request::Manual(phase)).await
    }

    /// Latest published state.
    #[must_use]
    pub fn snapshot(&self) -> PhaseState {
        *self.snapshots.borrow()
    }

    /// Receiver that is notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PhaseState> {
        self.snapshots.clone()
    }

    async fn request(&self, request: Request) -> Result<PhaseState, ControllerError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Envelope { request, reply })
            .await
            .map_err(|_| ControllerError::Closed)?;
        response.await.map_err(|_| ControllerError::Closed)
    }
}

/// Spawns the runtime task.
///
/// The task ends when `options.cancel` is cancelled or every handle is
/// dropped. Before exiting it stops the cycle so the rig is left dark, and
/// its join handle yields the final state. The command channel is dropped
/// with the task.
pub fn spawn_controller<C>(options: ControllerOptions<C>) -> (ControllerHandle, JoinHandle<PhaseState>)
where
    C: CommandChannel + 'static,
{
    let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    let (snapshots_tx, snapshots_rx) = watch::channel(PhaseState::default());

    let task = tokio::spawn(run(options, requests_rx, snapshots_tx));
    let handle = ControllerHandle {
        requests: requests_tx,
        snapshots: snapshots_rx,
    };
    (handle, task)
}

async fn run<C: CommandChannel>(
    options: ControllerOptions<C>,
    mut requests: mpsc::Receiver<Envelope>,
    snapshots: watch::Sender<PhaseState>,
) -> PhaseState {
    let ControllerOptions {
        durations,
        manual_expiry,
        channel,
        events,
        cancel,
    } = options;

    let (clock, mut fires) = TokioClock::new();
    let mut controller = PhaseController::new(durations, manual_expiry, channel, clock)
        .with_events(Arc::clone(&events));

    let channel_label = controller.channel().describe();
    info!(channel = %channel_label, go = durations.go, caution = durations.caution, stop = durations.stop, "controller started");
    events.emit(Event::ControllerStarted {
        timestamp: Utc::now(),
        channel: channel_label,
        durations,
        manual_expiry,
    });

    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break "cancelled",
            Some(fire) = fires.recv() => {
                controller.on_fire(fire);
                publish(&snapshots, controller.state());
            }
            envelope = requests.recv() => {
                let Some(Envelope { request, reply }) = envelope else {
                    break "all handles dropped";
                };
                debug!(?request, "controller request");
                match request {
                    Request::StartCycle => {
                        controller.start_cycle();
                    }
                    Request::StopCycle => controller.stop_cycle(),
                    Request::Manual(phase) => controller.manual(phase),
                }
                publish(&snapshots, controller.state());
                let _ = reply.send(controller.state());
            }
        }
    };

    controller.stop_cycle();
    let last = controller.state();
    publish(&snapshots, last);
    info!(reason, "controller stopped");
    events.emit(Event::ControllerStopped {
        timestamp: Utc::now(),
        reason: reason.to_string(),
    });
    last
}

fn publish(snapshots: &watch::Sender<PhaseState>, state: PhaseState) {
    snapshots.send_if_modified(|current| {
        if *current == state {
            false
        } else {
            *current = state;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use trafficlight_core::Command;

    use super::*;
    use crate::channel::RecordingChannel;

    fn spawn(
        expiry: ManualExpiry,
    ) -> (
        ControllerHandle,
        JoinHandle<PhaseState>,
        RecordingChannel,
        CancellationToken,
    ) {
        let recorder = RecordingChannel::new();
        let cancel = CancellationToken::new();
        let (handle, task) = spawn_controller(ControllerOptions {
            durations: PhaseDurations::default(),
            manual_expiry: expiry,
            channel: recorder.clone(),
            events: Arc::new(EventEmitter::noop()),
            cancel: cancel.clone(),
        });
        (handle, task, recorder, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_advances_with_time() {
        let (handle, _task, recorder, cancel) = spawn(ManualExpiry::Off);

        let state = handle.start_cycle().await.unwrap();
        assert_eq!((state.phase(), state.remaining()), (Phase::Go, 15));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        let state = handle.snapshot();
        assert_eq!((state.phase(), state.remaining()), (Phase::Go, 5));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = handle.snapshot();
        assert_eq!((state.phase(), state.remaining()), (Phase::Caution, 5));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.snapshot().phase(), Phase::Stop);
        assert_eq!(
            recorder.sent(),
            vec![Command::Go, Command::Caution, Command::Stop]
        );
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_freezes_state() {
        let (handle, _task, recorder, cancel) = spawn(ManualExpiry::Off);

        handle.start_cycle().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(handle.snapshot().remaining(), 10);

        let state = handle.stop_cycle().await.unwrap();
        assert_eq!((state.phase(), state.remaining()), (Phase::Off, 0));
        assert!(!state.running());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.snapshot(), state);
        assert_eq!(recorder.sent(), vec![Command::Go, Command::Clear]);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_phase_expires_to_off() {
        let (handle, _task, recorder, cancel) = spawn(ManualExpiry::Off);

        let state = handle.manual(Phase::Stop).await.unwrap();
        assert_eq!((state.phase(), state.remaining()), (Phase::Stop, 15));

        tokio::time::sleep(Duration::from_millis(15_500)).await;
        let state = handle.snapshot();
        assert_eq!((state.phase(), state.remaining()), (Phase::Off, 0));
        assert_eq!(
            recorder.sent(),
            vec![Command::Clear, Command::Stop, Command::Clear]
        );
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_changes() {
        let (handle, _task, _recorder, cancel) = spawn(ManualExpiry::Off);
        let mut updates = handle.subscribe();

        handle.manual(Phase::Caution).await.unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().phase(), Phase::Caution);

        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().remaining(), 4);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_rig_dark() {
        let (handle, task, recorder, cancel) = spawn(ManualExpiry::Off);

        handle.start_cycle().await.unwrap();
        cancel.cancel();
        let last = task.await.unwrap();

        assert_eq!((last.phase(), last.remaining()), (Phase::Off, 0));
        assert_eq!(recorder.sent().last(), Some(&Command::Clear));
        assert!(matches!(
            handle.start_cycle().await,
            Err(ControllerError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_ends_runtime() {
        let (handle, task, recorder, _cancel) = spawn(ManualExpiry::Off);

        handle.manual(Phase::Go).await.unwrap();
        drop(handle);
        let last = task.await.unwrap();

        assert_eq!(last.phase(), Phase::Off);
        assert_eq!(
            recorder.sent(),
            vec![Command::Clear, Command::Go, Command::Clear]
        );
    }
}
