//! Frames and the events carried by a frame stream.

use bytes::Bytes;

/// One rendered step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Engine step that produced the frame
    pub step: u64,
    /// Encoded image bytes
    pub data: Bytes,
}

impl Frame {
    /// Create a frame.
    pub fn new(step: u64, data: impl Into<Bytes>) -> Self {
        Self {
            step,
            data: data.into(),
        }
    }
}

/// Why a run completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The engine reported every goal reached
    GoalsReached,
    /// The step budget ran out first
    BudgetExhausted,
}

/// An event delivered to the stream consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Frame(Frame),
    Completed { reason: CompletionReason },
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Frame(_))
    }
}
