//! Rescue Engine
//!
//! The seam between the run controller and whatever integrates and renders
//! the world. An engine is built from a
//! [`ScenarioDescription`](rescue_scenario::ScenarioDescription) by an
//! [`EngineFactory`], then stepped, rendered and queried for completion
//! through [`SimulationEngine`].
//!
//! Rendered frames are handed over through an [`ArtifactBuffer`]: the engine
//! writes `<stem>_<NNNN>.png` for its N-th render and the reader picks it up
//! from the same directory.
//!
//! [`KinematicEngine`] is the built-in implementation: differential-drive and
//! omnidirectional robots that dash toward their goal, circular obstacles,
//! and a PNG renderer that draws over the scenario's background map.

mod artifact;
mod error;
mod kinematic;
mod render;

pub use artifact::ArtifactBuffer;
pub use error::{EngineError, Result};
pub use kinematic::{KinematicEngine, KinematicEngineFactory, MotionLimits};

use rescue_scenario::ScenarioDescription;

/// A stepwise simulation engine.
pub trait SimulationEngine: Send {
    /// Advance the simulation by one tick.
    fn step(&mut self) -> Result<()>;

    /// Render the current state into the artifact buffer.
    fn render(&mut self) -> Result<()>;

    /// Whether every robot has reached its goal.
    fn done(&self) -> bool;

    /// Release engine resources. Called once, after the last step.
    fn end(&mut self);
}

/// Builds engines for scenarios.
pub trait EngineFactory: Send + Sync {
    /// Construct an engine that renders into `buffer`.
    fn create(
        &self,
        scenario: &ScenarioDescription,
        buffer: &ArtifactBuffer,
    ) -> Result<Box<dyn SimulationEngine>>;
}
