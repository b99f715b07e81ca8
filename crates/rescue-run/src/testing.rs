//! Scripted engine for exercising the controller without real rendering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rescue_engine::{ArtifactBuffer, EngineError, EngineFactory, SimulationEngine};
use rescue_scenario::{PixelPoint, ScenarioBuilder, ScenarioDescription};

use crate::config::{ArtifactWait, RunConfig};

/// What the scripted engine does, by tick.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    /// Report done once this many ticks have run
    pub done_after: Option<u64>,
    /// Fail the step with this (zero-based) tick index
    pub fail_at: Option<u64>,
    /// Panic in the step with this tick index
    pub panic_at: Option<u64>,
    /// Render without publishing an artifact at these ticks
    pub skip_render: Vec<u64>,
    /// Refuse to build the engine
    pub fail_init: bool,
    /// Sleep this long inside every step after the first
    pub step_delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub created: AtomicUsize,
    pub ended: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
}

pub(crate) struct ScriptedFactory {
    script: Script,
    pub counters: Arc<Counters>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            counters: Arc::default(),
        })
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> usize {
        self.counters.ended.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }
}

impl EngineFactory for ScriptedFactory {
    fn create(
        &self,
        _scenario: &ScenarioDescription,
        buffer: &ArtifactBuffer,
    ) -> rescue_engine::Result<Box<dyn SimulationEngine>> {
        if self.script.fail_init {
            return Err(EngineError::InvalidScenario("scripted init failure".into()));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            script: self.script.clone(),
            buffer: buffer.clone(),
            counters: Arc::clone(&self.counters),
            tick: 0,
            ended: false,
        }))
    }
}

struct ScriptedEngine {
    script: Script,
    buffer: ArtifactBuffer,
    counters: Arc<Counters>,
    tick: u64,
    ended: bool,
}

impl SimulationEngine for ScriptedEngine {
    fn step(&mut self) -> rescue_engine::Result<()> {
        if self.script.fail_at == Some(self.tick) {
            return Err(EngineError::Io(std::io::Error::other("scripted step failure")));
        }
        if self.script.panic_at == Some(self.tick) {
            panic!("scripted panic at tick {}", self.tick);
        }
        if let Some(delay) = self.script.step_delay.filter(|_| self.tick > 0) {
            std::thread::sleep(delay);
        }
        self.tick += 1;
        Ok(())
    }

    fn render(&mut self) -> rescue_engine::Result<()> {
        let index = self.tick - 1;
        if !self.script.skip_render.contains(&index) {
            self.buffer
                .publish(index, format!("frame-{index}").as_bytes())?;
        }
        Ok(())
    }

    fn done(&self) -> bool {
        self.script.done_after.is_some_and(|n| self.tick >= n)
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            self.counters.ended.fetch_add(1, Ordering::SeqCst);
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Timings short enough for tests.
pub(crate) fn fast_config() -> RunConfig {
    RunConfig {
        max_steps: 3000,
        pause_poll: Duration::from_millis(5),
        frame_interval: Duration::ZERO,
        artifact_wait: ArtifactWait {
            poll: Duration::from_millis(1),
            attempts: 2,
        },
        handoff_poll: Duration::from_millis(1),
        channel_capacity: 1,
    }
}

pub(crate) fn scenario() -> ScenarioDescription {
    ScenarioBuilder::default()
        .build(
            "arena.png",
            1,
            PixelPoint::new(100.0, 500.0),
            &[PixelPoint::new(400.0, 100.0)],
        )
        .expect("valid scenario")
}
