//! Frame production from a simulation engine.
//!
//! Each call to [`FrameSource::step`] advances the engine one tick, asks it to
//! render, and collects the artifact it wrote. The artifact is read back from
//! the buffer directory with a bounded number of attempts; a frame that never
//! shows up is skipped rather than failing the run.

use std::io;
use std::thread;

use rescue_engine::{ArtifactBuffer, EngineFactory, SimulationEngine};
use rescue_scenario::ScenarioDescription;
use tracing::{debug, info, warn};

use crate::config::ArtifactWait;
use crate::error::{Error, Result};
use crate::frame::Frame;

/// Outcome of one [`FrameSource::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The step rendered a frame
    Produced(Frame),
    /// The step ran but its frame never appeared
    NoFrameAvailable,
    /// Every goal has been reached; no further steps
    Done,
    /// Stepping or rendering failed
    Failed(String),
}

/// Adapter that turns engine ticks into frames.
pub struct FrameSource {
    engine: Option<Box<dyn SimulationEngine>>,
    buffer: ArtifactBuffer,
    wait: ArtifactWait,
    renders: u64,
    finished: bool,
}

impl FrameSource {
    /// Clear the artifact buffer and build an engine for `scenario`.
    pub fn open(
        factory: &dyn EngineFactory,
        scenario: &ScenarioDescription,
        buffer: ArtifactBuffer,
        wait: ArtifactWait,
    ) -> Result<Self> {
        let stale = buffer.prepare().map_err(|e| {
            Error::EngineInit(format!(
                "artifact buffer {} unusable: {e}",
                buffer.dir().display()
            ))
        })?;
        if stale > 0 {
            debug!(stale, "Cleared stale render artifacts");
        }

        let engine = factory
            .create(scenario, &buffer)
            .map_err(|e| Error::EngineInit(e.to_string()))?;

        info!(
            robots = scenario.robots.len(),
            obstacles = scenario.obstacles.len(),
            "Initialized simulation engine"
        );

        Ok(Self {
            engine: Some(engine),
            buffer,
            wait,
            renders: 0,
            finished: false,
        })
    }

    /// Advance one tick and collect its frame.
    ///
    /// When the engine reports completion on the same tick that produced a
    /// frame, the frame is returned first and `Done` on the next call.
    pub fn step(&mut self) -> StepResult {
        if self.finished {
            return StepResult::Done;
        }
        let Some(engine) = self.engine.as_mut() else {
            return StepResult::Failed("frame source is closed".into());
        };

        if let Err(e) = engine.step() {
            return StepResult::Failed(Error::Step(e.to_string()).to_string());
        }
        if let Err(e) = engine.render() {
            return StepResult::Failed(Error::Step(format!("render: {e}")).to_string());
        }
        self.finished = engine.done();

        let index = self.renders;
        self.renders += 1;

        match self.await_artifact(index) {
            Ok(Some(bytes)) => StepResult::Produced(Frame::new(index, bytes)),
            Ok(None) if self.finished => StepResult::Done,
            Ok(None) => {
                warn!("{}", Error::ArtifactTimeout { step: index });
                StepResult::NoFrameAvailable
            }
            Err(e) => StepResult::Failed(
                Error::Step(format!("reading artifact {index}: {e}")).to_string(),
            ),
        }
    }

    fn await_artifact(&self, index: u64) -> io::Result<Option<Vec<u8>>> {
        let attempts = self.wait.attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(bytes) = self.buffer.take(index)? {
                return Ok(Some(bytes));
            }
            if attempt < attempts {
                thread::sleep(self.wait.poll);
            }
        }
        Ok(None)
    }

    /// Release the engine and clear the artifact buffer.
    ///
    /// Only the first call does anything.
    pub fn close(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        engine.end();
        match self.buffer.clear() {
            Ok(removed) => debug!(removed, "Cleared render artifacts"),
            Err(e) => warn!("Failed to clear {}: {e}", self.buffer.dir().display()),
        }
        info!(frames = self.renders, "Closed simulation engine");
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// Ticks rendered so far.
    pub fn renders(&self) -> u64 {
        self.renders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scenario, Script, ScriptedFactory};
    use std::time::Duration;

    fn wait() -> ArtifactWait {
        ArtifactWait {
            poll: Duration::from_millis(1),
            attempts: 3,
        }
    }

    fn open(
        script: Script,
        dir: &std::path::Path,
    ) -> (std::sync::Arc<ScriptedFactory>, FrameSource) {
        let factory = ScriptedFactory::new(script);
        let buffer = ArtifactBuffer::new(dir, "frame");
        let source = FrameSource::open(factory.as_ref(), &scenario(), buffer, wait()).unwrap();
        (factory, source)
    }

    #[test]
    fn produces_frames_in_step_order() {
        let dir = tempfile::tempdir().unwrap();
        let (_factory, mut source) = open(Script::default(), dir.path());

        for i in 0..3u64 {
            match source.step() {
                StepResult::Produced(frame) => {
                    assert_eq!(frame.step, i);
                    assert_eq!(frame.data.as_ref(), format!("frame-{i}").as_bytes());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(source.renders(), 3);
    }

    #[test]
    fn final_frame_precedes_done() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script {
            done_after: Some(2),
            ..Script::default()
        };
        let (_factory, mut source) = open(script, dir.path());

        assert!(matches!(source.step(), StepResult::Produced(_)));
        assert!(matches!(source.step(), StepResult::Produced(f) if f.step == 1));
        assert_eq!(source.step(), StepResult::Done);
        assert_eq!(source.step(), StepResult::Done);
    }

    #[test]
    fn missing_artifact_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script {
            skip_render: vec![1],
            ..Script::default()
        };
        let (_factory, mut source) = open(script, dir.path());

        assert!(matches!(source.step(), StepResult::Produced(_)));
        assert_eq!(source.step(), StepResult::NoFrameAvailable);
        assert!(matches!(source.step(), StepResult::Produced(f) if f.step == 2));
    }

    #[test]
    fn engine_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script {
            fail_at: Some(0),
            ..Script::default()
        };
        let (_factory, mut source) = open(script, dir.path());

        match source.step() {
            StepResult::Failed(reason) => assert!(reason.contains("scripted step failure")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn init_failure_is_engine_init_error() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ScriptedFactory::new(Script {
            fail_init: true,
            ..Script::default()
        });
        let buffer = ArtifactBuffer::new(dir.path(), "frame");

        let result = FrameSource::open(factory.as_ref(), &scenario(), buffer, wait());
        assert!(matches!(result, Err(Error::EngineInit(_))));
    }

    #[test]
    fn open_clears_stale_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = ArtifactBuffer::new(dir.path(), "frame");
        buffer.prepare().unwrap();
        buffer.publish(0, b"stale").unwrap();

        let (_factory, mut source) = open(Script::default(), dir.path());
        match source.step() {
            StepResult::Produced(frame) => assert_eq!(frame.data.as_ref(), b"frame-0"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn close_is_idempotent_and_clears_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let (factory, mut source) = open(Script::default(), dir.path());
        source.step();
        // Leave an unread artifact behind
        ArtifactBuffer::new(dir.path(), "frame")
            .publish(9, b"left over")
            .unwrap();

        source.close();
        source.close();

        assert!(source.is_closed());
        assert_eq!(factory.ended(), 1);
        assert_eq!(ArtifactBuffer::new(dir.path(), "frame").pending().unwrap(), 0);
        assert_eq!(
            source.step(),
            StepResult::Failed("frame source is closed".into())
        );
    }
}
