//! Timing and budget of a run.

use std::time::Duration;

/// Bounded wait for a render artifact to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactWait {
    /// Delay between reads
    pub poll: Duration,
    /// Reads before giving up on the frame
    pub attempts: u32,
}

impl Default for ArtifactWait {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(20),
            attempts: 5,
        }
    }
}

impl ArtifactWait {
    /// Longest time a single frame can be waited for.
    pub fn budget(&self) -> Duration {
        self.poll * self.attempts.saturating_sub(1)
    }
}

/// Configuration for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Hard cap on engine steps
    pub max_steps: u64,
    /// Sleep between flag checks while paused
    pub pause_poll: Duration,
    /// Pacing delay after each emitted frame
    pub frame_interval: Duration,
    pub artifact_wait: ArtifactWait,
    /// Sleep between retries while the consumer is behind
    pub handoff_poll: Duration,
    /// Events buffered between the stepping loop and the consumer
    pub channel_capacity: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 3000,
            pause_poll: Duration::from_millis(100),
            frame_interval: Duration::from_millis(50),
            artifact_wait: ArtifactWait::default(),
            handoff_poll: Duration::from_millis(10),
            channel_capacity: 1,
        }
    }
}
