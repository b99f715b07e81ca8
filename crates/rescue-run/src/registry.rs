//! The single active run.

use std::sync::Arc;

use rescue_engine::{ArtifactBuffer, EngineFactory};
use rescue_scenario::ScenarioDescription;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::controller::{RunController, RunHandle, RunOutcome, RunStatus};
use crate::error::{Error, Result};
use crate::stream::FrameStream;

/// Owns at most one run and serializes starts against it.
///
/// `current` is only held for flag reads and swaps. Joining a finishing run
/// happens outside it, so pause and status never wait on the stepping loop.
pub struct RunRegistry {
    factory: Arc<dyn EngineFactory>,
    buffer: ArtifactBuffer,
    config: RunConfig,
    starting: Mutex<()>,
    current: Mutex<Option<RunHandle>>,
}

impl RunRegistry {
    pub fn new(factory: Arc<dyn EngineFactory>, buffer: ArtifactBuffer, config: RunConfig) -> Self {
        Self {
            factory,
            buffer,
            config,
            starting: Mutex::new(()),
            current: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Start a run for `scenario`, first stopping any previous run and
    /// waiting for its cleanup.
    pub async fn start(&self, scenario: ScenarioDescription) -> Result<FrameStream> {
        let _starting = self.starting.lock().await;

        let previous = self.current.lock().await.take();
        if let Some(previous) = previous {
            previous.request_stop();
            let outcome = previous.join().await;
            debug!(?outcome, "Previous run finished before new start");
        }

        let (handle, stream) = RunController::launch(
            Arc::clone(&self.factory),
            scenario,
            self.buffer.clone(),
            self.config.clone(),
        )?;
        *self.current.lock().await = Some(handle);
        Ok(stream)
    }

    /// Pause or resume the active run.
    pub async fn set_paused(&self, paused: bool) -> Result<()> {
        let current = self.current.lock().await;
        match current.as_ref() {
            Some(handle) if handle.is_active() => {
                handle.set_paused(paused);
                Ok(())
            }
            _ => Err(Error::NoActiveRun),
        }
    }

    /// Stop the active run and wait for its cleanup.
    pub async fn stop(&self) -> Result<RunOutcome> {
        let taken = self.current.lock().await.take();
        let Some(handle) = taken else {
            return Err(Error::NoActiveRun);
        };

        let was_active = handle.is_active();
        handle.request_stop();
        let outcome = handle.join().await;
        if !was_active {
            return Err(Error::NoActiveRun);
        }
        info!(?outcome, "Simulation stopped");
        Ok(outcome)
    }

    /// Status of the active run, or idle.
    pub async fn status(&self) -> RunStatus {
        let current = self.current.lock().await;
        match current.as_ref() {
            Some(handle) => handle.status(),
            None => RunStatus::idle(self.config.max_steps),
        }
    }
}
