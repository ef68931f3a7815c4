//! Run-level control: start, advance, stop and status.
//!
//! A [`RunController`] owns the state of the current run and the broadcaster
//! every subscriber reads from. At most one run is active at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::broadcast::{EventBroadcaster, SharedBroadcaster, Subscription};
use crate::config::{Config, DebateSettings, StreamSettings};
use crate::debate_format::{available_formats, get_format};
use crate::error::DebateError;
use crate::events::{DebateEvent, EventSink};
use crate::gate::PacingGate;
use crate::orchestrator::{DebateOrchestrator, Motion};
use crate::participant::Roster;
use crate::transcript::Transcript;

/// Signals shared between the controller and the worker of one run.
#[derive(Debug)]
pub struct RunSignals {
    gate: PacingGate,
    stopped: AtomicBool,
    started_at: Instant,
    time_limit: Option<Duration>,
}

impl RunSignals {
    pub fn new(time_limit: Option<Duration>) -> Self {
        Self {
            gate: PacingGate::new(),
            stopped: AtomicBool::new(false),
            started_at: Instant::now(),
            time_limit,
        }
    }

    pub fn gate(&self) -> &PacingGate {
        &self.gate
    }

    /// Raise the stop flag and release a worker blocked on the gate.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.gate.open();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn budget_exceeded(&self) -> bool {
        self.time_limit
            .is_some_and(|limit| self.elapsed() >= limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Finished,
}

/// Snapshot returned by [`RunController::status`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: RunStatus,
    pub topic: Option<String>,
    pub elapsed_secs: u64,
    /// `m:ss`
    pub elapsed: String,
    pub subscribers: usize,
}

/// "m:ss"
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

struct RunState {
    status: RunStatus,
    run_id: u64,
    motion: Option<Motion>,
    signals: Option<Arc<RunSignals>>,
    /// Elapsed time frozen when the run finished.
    final_elapsed: Option<Duration>,
    transcript: Option<Arc<Transcript>>,
    worker_done: Option<watch::Receiver<bool>>,
}

impl RunState {
    fn worker_active(&self) -> bool {
        let Some(done) = self.worker_done.as_ref() else {
            return false;
        };
        let finished = *done.borrow();
        // A dropped sender means the worker is gone as well.
        !finished && done.has_changed().is_ok()
    }

    fn finish(&mut self) {
        self.status = RunStatus::Finished;
        if self.final_elapsed.is_none() {
            self.final_elapsed = self.signals.as_ref().map(|s| s.elapsed());
        }
    }
}

struct Inner {
    roster: Arc<Roster>,
    settings: DebateSettings,
    broadcaster: SharedBroadcaster,
    state: Mutex<RunState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Owns the current run. Cheap to clone; clones share the same run.
#[derive(Clone)]
pub struct RunController {
    inner: Arc<Inner>,
}

impl RunController {
    pub fn new(roster: Roster, settings: DebateSettings, stream: &StreamSettings) -> Self {
        let broadcaster =
            EventBroadcaster::new(stream.subscriber_capacity, stream.heartbeat()).shared();
        Self {
            inner: Arc::new(Inner {
                roster: Arc::new(roster),
                settings,
                broadcaster,
                state: Mutex::new(RunState {
                    status: RunStatus::Idle,
                    run_id: 0,
                    motion: None,
                    signals: None,
                    final_elapsed: None,
                    transcript: None,
                    worker_done: None,
                }),
            }),
        }
    }

    /// Build the lineup from config, with an OpenAI-compatible source per speaker.
    pub fn from_config(config: &Config) -> Result<Self, DebateError> {
        let roster = Roster::from_config(config)?;
        Ok(Self::new(roster, config.debate.clone(), &config.stream))
    }

    pub fn roster(&self) -> &Roster {
        &self.inner.roster
    }

    pub fn settings(&self) -> &DebateSettings {
        &self.inner.settings
    }

    /// Register a live subscriber.
    pub fn subscribe(&self) -> Subscription {
        self.inner.broadcaster.subscribe()
    }

    /// Start a debate in the background. Must be called within a tokio runtime.
    ///
    /// Rejected while another run is active.
    pub fn start(
        &self,
        topic: &str,
        pro_position: &str,
        con_position: &str,
    ) -> Result<(), DebateError> {
        let motion = Motion::new(topic, pro_position, con_position)?;
        let settings = &self.inner.settings;
        let format = get_format(&settings.format, settings.free_rounds).ok_or_else(|| {
            DebateError::UnknownFormat(format!(
                "{} (available: {})",
                settings.format,
                available_formats().join(", ")
            ))
        })?;

        let mut state = self.inner.lock();
        if state.status == RunStatus::Running || state.worker_active() {
            warn!(topic = %motion.topic, "start rejected; a debate is already running");
            return Err(DebateError::AlreadyRunning);
        }

        let signals = Arc::new(RunSignals::new(settings.time_limit()));
        let (done_tx, done_rx) = watch::channel(false);
        let (sink, rx) = EventSink::channel();

        state.run_id += 1;
        state.status = RunStatus::Running;
        state.motion = Some(motion.clone());
        state.signals = Some(Arc::clone(&signals));
        state.final_elapsed = None;
        state.transcript = None;
        state.worker_done = Some(done_rx);

        info!(
            run = state.run_id,
            topic = %motion.topic,
            free_rounds = settings.free_rounds,
            time_limit_secs = settings.time_limit_secs,
            "debate run starting"
        );

        let orchestrator = DebateOrchestrator::new(
            motion,
            Arc::clone(&self.inner.roster),
            format,
            settings.clone(),
            signals,
            sink,
        );
        tokio::spawn(drive(
            Arc::clone(&self.inner),
            state.run_id,
            orchestrator,
            rx,
            done_tx,
        ));

        Ok(())
    }

    /// Reopen the pacing gate so the next turn may start.
    ///
    /// Returns false when no run is active. Advancing an open gate does nothing.
    pub fn advance(&self) -> bool {
        let state = self.inner.lock();
        match (&state.signals, state.status) {
            (Some(signals), RunStatus::Running) => {
                signals.gate().open();
                true
            }
            _ => false,
        }
    }

    /// Stop the active run after its in-flight turn. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        let mut state = self.inner.lock();
        if state.status != RunStatus::Running {
            return false;
        }
        if let Some(signals) = &state.signals {
            signals.stop();
        }
        state.finish();
        info!(run = state.run_id, "debate stop requested");
        true
    }

    pub fn status(&self) -> StatusReport {
        let state = self.inner.lock();
        let elapsed = match state.status {
            RunStatus::Running => state.signals.as_ref().map(|s| s.elapsed()),
            _ => state.final_elapsed,
        }
        .unwrap_or_default();

        StatusReport {
            status: state.status,
            topic: state.motion.as_ref().map(|m| m.topic.clone()),
            elapsed_secs: elapsed.as_secs(),
            elapsed: format_elapsed(elapsed),
            subscribers: self.inner.broadcaster.subscriber_count(),
        }
    }

    /// Wait until the current run's worker has exited.
    pub async fn wait(&self) {
        let done = self.inner.lock().worker_done.clone();
        if let Some(mut done) = done {
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Transcript of the last run whose worker finished normally.
    pub fn transcript(&self) -> Option<Arc<Transcript>> {
        self.inner.lock().transcript.clone()
    }
}

/// Run the worker and forward its events to the broadcaster until it exits.
async fn drive(
    inner: Arc<Inner>,
    run_id: u64,
    orchestrator: DebateOrchestrator,
    mut rx: mpsc::UnboundedReceiver<DebateEvent>,
    done: watch::Sender<bool>,
) {
    let worker = tokio::spawn(orchestrator.run());

    while let Some(event) = rx.recv().await {
        inner.broadcaster.publish(event);
    }

    let transcript = match worker.await {
        Ok(Ok(transcript)) => Some(transcript),
        Ok(Err(e)) => {
            error!(run = run_id, error = %e, "debate worker failed");
            inner.broadcaster.publish(DebateEvent::Error {
                message: e.to_string(),
            });
            None
        }
        Err(e) => {
            error!(run = run_id, error = %e, "debate worker aborted");
            inner.broadcaster.publish(DebateEvent::Error {
                message: DebateError::WorkerFailed(e.to_string()).to_string(),
            });
            None
        }
    };

    {
        let mut state = inner.lock();
        if state.run_id == run_id {
            state.finish();
            state.transcript = transcript.map(Arc::new);
        }
    }
    let _ = done.send(true);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "1:05");
        assert_eq!(format_elapsed(Duration::from_secs(600)), "10:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_tracking() {
        let signals = RunSignals::new(Some(Duration::from_secs(5)));
        assert!(!signals.budget_exceeded());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(signals.budget_exceeded());

        let unlimited = RunSignals::new(None);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!unlimited.budget_exceeded());
    }

    #[tokio::test]
    async fn test_stop_opens_gate() {
        let signals = RunSignals::new(None);
        signals.gate().wait_and_close().await;
        assert!(!signals.gate().is_open());

        signals.stop();
        assert!(signals.is_stopped());
        assert!(signals.gate().is_open());
    }
}
