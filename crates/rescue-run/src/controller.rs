//! Run lifecycle and the stepping loop.
//!
//! A run moves through `Initializing → Running ⇄ Paused` and ends in exactly
//! one of `Completed`, `Stopped` or `Failed`. The loop lives on its own OS
//! thread; the control surface only flips the pause and stop flags in
//! [`RunControl`], and only the loop writes the step counter.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rescue_engine::{ArtifactBuffer, EngineFactory};
use rescue_scenario::ScenarioDescription;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::frame::{CompletionReason, StreamEvent};
use crate::source::{FrameSource, StepResult};
use crate::stream::FrameStream;

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunPhase {
    Initializing = 0,
    Running = 1,
    Paused = 2,
    Completed = 3,
    Stopped = 4,
    Failed = 5,
}

impl RunPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunPhase::Initializing,
            1 => RunPhase::Running,
            2 => RunPhase::Paused,
            3 => RunPhase::Completed,
            4 => RunPhase::Stopped,
            _ => RunPhase::Failed,
        }
    }

    /// Whether the run has ended.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::Stopped | RunPhase::Failed
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(CompletionReason),
    Stopped,
    Failed(String),
}

impl RunOutcome {
    /// Terminal phase matching this outcome.
    pub fn phase(&self) -> RunPhase {
        match self {
            RunOutcome::Completed(_) => RunPhase::Completed,
            RunOutcome::Stopped => RunPhase::Stopped,
            RunOutcome::Failed(_) => RunPhase::Failed,
        }
    }
}

/// Snapshot of a run for the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    pub active: bool,
    pub paused: bool,
    pub step: u64,
    pub max_steps: u64,
    pub phase: Option<RunPhase>,
}

impl RunStatus {
    /// Status when no run exists.
    pub fn idle(max_steps: u64) -> Self {
        Self {
            active: false,
            paused: false,
            step: 0,
            max_steps,
            phase: None,
        }
    }
}

/// Flags shared between the stepping loop and the control surface.
#[derive(Debug)]
pub(crate) struct RunControl {
    paused: AtomicBool,
    stopped: AtomicBool,
    active: AtomicBool,
    step: AtomicU64,
    phase: AtomicU8,
}

impl RunControl {
    pub(crate) fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            active: AtomicBool::new(true),
            step: AtomicU64::new(0),
            phase: AtomicU8::new(RunPhase::Initializing as u8),
        }
    }

    pub(crate) fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: RunPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }
}

/// Releases run resources when the stepping thread leaves `run`, however it
/// leaves.
struct Cleanup {
    source: Option<FrameSource>,
    buffer: ArtifactBuffer,
    control: Arc<RunControl>,
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        match self.source.as_mut() {
            Some(source) => source.close(),
            None => {
                if let Err(e) = self.buffer.clear() {
                    warn!("Failed to clear {}: {e}", self.buffer.dir().display());
                }
            }
        }
        if !self.control.phase().is_terminal() {
            self.control.set_phase(RunPhase::Failed);
        }
        self.control.active.store(false, Ordering::SeqCst);
        debug!("Run resources released");
    }
}

/// Drives one run on a dedicated thread.
pub struct RunController {
    factory: Arc<dyn EngineFactory>,
    scenario: ScenarioDescription,
    buffer: ArtifactBuffer,
    config: RunConfig,
    control: Arc<RunControl>,
}

impl RunController {
    /// Start a run. Frames arrive on the returned stream; the handle controls
    /// the run.
    pub fn launch(
        factory: Arc<dyn EngineFactory>,
        scenario: ScenarioDescription,
        buffer: ArtifactBuffer,
        config: RunConfig,
    ) -> Result<(RunHandle, FrameStream)> {
        let control = Arc::new(RunControl::new());
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let max_steps = config.max_steps;

        let controller = RunController {
            factory,
            scenario,
            buffer,
            config,
            control: Arc::clone(&control),
        };

        let thread = thread::Builder::new()
            .name("rescue-run".into())
            .spawn(move || controller.run(tx))
            .map_err(Error::Io)?;

        let handle = RunHandle {
            control: Arc::clone(&control),
            max_steps,
            thread: Some(thread),
        };
        Ok((handle, FrameStream::new(rx, control)))
    }

    // `cleanup` is a local, so it drops before the `tx` parameter and the
    // consumer never sees the channel close ahead of cleanup.
    fn run(self, tx: mpsc::Sender<StreamEvent>) -> RunOutcome {
        let mut cleanup = Cleanup {
            source: None,
            buffer: self.buffer.clone(),
            control: Arc::clone(&self.control),
        };

        let source = match FrameSource::open(
            self.factory.as_ref(),
            &self.scenario,
            self.buffer.clone(),
            self.config.artifact_wait,
        ) {
            Ok(source) => cleanup.source.insert(source),
            Err(e) => {
                error!("{e}");
                let message = e.to_string();
                let outcome = self.fail(&tx, message);
                self.control.set_phase(outcome.phase());
                return outcome;
            }
        };

        info!(max_steps = self.config.max_steps, "Simulation run started");
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.drive(source, &tx))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = format!("Simulation panicked: {}", panic_message(payload.as_ref()));
                error!("{message}");
                self.fail(&tx, message)
            }
        };

        self.control.set_phase(outcome.phase());
        info!(
            steps = self.control.step.load(Ordering::SeqCst),
            outcome = ?outcome,
            "Simulation run finished"
        );
        outcome
    }

    fn drive(&self, source: &mut FrameSource, tx: &mpsc::Sender<StreamEvent>) -> RunOutcome {
        let mut steps = 0u64;

        loop {
            if self.control.is_stopped() {
                return RunOutcome::Stopped;
            }

            if self.control.is_paused() {
                self.control.set_phase(RunPhase::Paused);
                thread::sleep(self.config.pause_poll);
                continue;
            }
            self.control.set_phase(RunPhase::Running);

            if steps >= self.config.max_steps {
                info!(steps, "Step budget exhausted");
                return self.complete(tx, CompletionReason::BudgetExhausted);
            }

            match source.step() {
                StepResult::Produced(frame) => {
                    steps += 1;
                    self.control.step.store(steps, Ordering::SeqCst);
                    if !self.emit(tx, StreamEvent::Frame(frame)) {
                        return RunOutcome::Stopped;
                    }
                    if !self.config.frame_interval.is_zero() {
                        thread::sleep(self.config.frame_interval);
                    }
                }
                StepResult::NoFrameAvailable => {
                    steps += 1;
                    self.control.step.store(steps, Ordering::SeqCst);
                }
                StepResult::Done => {
                    info!(steps, "All goals reached");
                    return self.complete(tx, CompletionReason::GoalsReached);
                }
                StepResult::Failed(message) => {
                    error!(steps, "{message}");
                    return self.fail(tx, message);
                }
            }
        }
    }

    fn complete(&self, tx: &mpsc::Sender<StreamEvent>, reason: CompletionReason) -> RunOutcome {
        if self.emit(tx, StreamEvent::Completed { reason }) {
            RunOutcome::Completed(reason)
        } else {
            RunOutcome::Stopped
        }
    }

    fn fail(&self, tx: &mpsc::Sender<StreamEvent>, message: String) -> RunOutcome {
        if self.emit(
            tx,
            StreamEvent::Error {
                message: message.clone(),
            },
        ) {
            RunOutcome::Failed(message)
        } else {
            RunOutcome::Stopped
        }
    }

    /// Hand an event to the consumer, waiting while the channel is full.
    ///
    /// Returns `false` once the run is stopped or the consumer has gone.
    fn emit(&self, tx: &mpsc::Sender<StreamEvent>, mut event: StreamEvent) -> bool {
        loop {
            if self.control.is_stopped() {
                return false;
            }
            match tx.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Full(returned)) => {
                    event = returned;
                    thread::sleep(self.config.handoff_poll);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Frame consumer disconnected");
                    self.control.request_stop();
                    return false;
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Control surface for one run.
///
/// Dropping the handle requests a stop but does not wait for it.
pub struct RunHandle {
    control: Arc<RunControl>,
    max_steps: u64,
    thread: Option<JoinHandle<RunOutcome>>,
}

impl RunHandle {
    /// Pause or resume stepping.
    pub fn set_paused(&self, paused: bool) {
        self.control.paused.store(paused, Ordering::SeqCst);
        if paused {
            info!("Simulation paused");
        } else {
            info!("Simulation resumed");
        }
    }

    /// Ask the stepping loop to stop at its next check.
    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    /// Whether the run still holds resources.
    pub fn is_active(&self) -> bool {
        self.control.is_active()
    }

    pub fn status(&self) -> RunStatus {
        let active = self.control.is_active();
        RunStatus {
            active,
            paused: active && self.control.is_paused(),
            step: self.control.step.load(Ordering::SeqCst),
            max_steps: self.max_steps,
            phase: Some(self.control.phase()),
        }
    }

    /// Wait for the stepping thread to finish and return how the run ended.
    pub async fn join(mut self) -> RunOutcome {
        let Some(thread) = self.thread.take() else {
            return RunOutcome::Stopped;
        };
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(payload)) => RunOutcome::Failed(format!(
                "Run thread panicked: {}",
                panic_message(payload.as_ref())
            )),
            Err(e) => RunOutcome::Failed(format!("Failed to join run thread: {e}")),
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.control.request_stop();
        }
    }
}
