//! Rescue Run
//!
//! Drives one simulation run at a time and streams its rendered frames.
//!
//! # Architecture
//!
//! - **FrameSource**: steps the engine once, renders, and picks the frame up
//!   from the artifact buffer with a bounded wait
//! - **RunController**: the stepping loop on its own thread; polls the
//!   pause/stop flags every iteration, enforces the step budget, and cleans
//!   up on every exit path
//! - **FrameStream**: the consumer end, an ordered [`futures::Stream`] of
//!   [`StreamEvent`]s that stops the run when dropped
//! - **RunRegistry**: owns the single active run and serializes start, pause
//!   and stop requests against it
//!
//! ```text
//!  start/pause/stop          ┌──────────────┐   frames    ┌─────────────┐
//!  ───────────────────────→  │ RunRegistry  │             │ FrameStream │ ──→ client
//!                            └──────┬───────┘             └──────▲──────┘
//!                            flags  │                            │ bounded channel
//!                            ┌──────▼────────┐   step()   ┌──────┴──────┐
//!                            │ RunController │ ─────────→ │ FrameSource │ ──→ engine
//!                            └───────────────┘            └─────────────┘
//! ```
//!
//! A run that is not stopped from outside ends its stream with exactly one
//! [`StreamEvent::Completed`] or [`StreamEvent::Error`]. A stopped run ends
//! the stream with no further events.

mod config;
mod controller;
mod error;
mod frame;
mod registry;
mod source;
mod stream;

#[cfg(test)]
mod testing;

pub use config::{ArtifactWait, RunConfig};
pub use controller::{RunController, RunHandle, RunOutcome, RunPhase, RunStatus};
pub use error::{Error, Result};
pub use frame::{CompletionReason, Frame, StreamEvent};
pub use registry::RunRegistry;
pub use source::{FrameSource, StepResult};
pub use stream::FrameStream;
