//! Consumer side of a run.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::controller::RunControl;
use crate::frame::StreamEvent;

/// Ordered, finite stream of [`StreamEvent`]s from one run.
///
/// The stream yields at most one terminal event, after which it ends once the
/// stepping loop has released its resources. A run stopped from outside ends
/// the stream without a terminal event. Dropping the stream stops the run.
pub struct FrameStream {
    rx: mpsc::Receiver<StreamEvent>,
    control: Arc<RunControl>,
    terminal_seen: bool,
    closed: bool,
}

impl FrameStream {
    pub(crate) fn new(rx: mpsc::Receiver<StreamEvent>, control: Arc<RunControl>) -> Self {
        Self {
            rx,
            control,
            terminal_seen: false,
            closed: false,
        }
    }
}

impl Stream for FrameStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(None);
        }
        if !this.terminal_seen && this.control.is_stopped() {
            this.closed = true;
            this.rx.close();
            return Poll::Ready(None);
        }

        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(_)) if this.terminal_seen => continue,
                Poll::Ready(Some(event)) => {
                    if event.is_terminal() {
                        this.terminal_seen = true;
                    }
                    return Poll::Ready(Some(event));
                }
                Poll::Ready(None) => {
                    this.closed = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        if !self.terminal_seen {
            self.control.request_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CompletionReason, Frame};
    use futures::StreamExt;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn control() -> Arc<RunControl> {
        Arc::new(RunControl::new())
    }

    #[test]
    fn terminal_event_waits_for_channel_close() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = task::spawn(FrameStream::new(rx, control()));

        tx.try_send(StreamEvent::Frame(Frame::new(0, vec![1])))
            .unwrap();
        tx.try_send(StreamEvent::Completed {
            reason: CompletionReason::GoalsReached,
        })
        .unwrap();

        assert_ready_eq!(
            stream.poll_next(),
            Some(StreamEvent::Frame(Frame::new(0, vec![1])))
        );
        assert_ready_eq!(
            stream.poll_next(),
            Some(StreamEvent::Completed {
                reason: CompletionReason::GoalsReached
            })
        );
        assert_pending!(stream.poll_next());

        drop(tx);
        assert!(stream.is_woken());
        assert_ready_eq!(stream.poll_next(), None);
        assert_ready_eq!(stream.poll_next(), None);
    }

    #[test]
    fn events_after_terminal_are_discarded() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = task::spawn(FrameStream::new(rx, control()));

        tx.try_send(StreamEvent::Error {
            message: "boom".into(),
        })
        .unwrap();
        tx.try_send(StreamEvent::Frame(Frame::new(7, vec![])))
            .unwrap();
        drop(tx);

        assert_ready_eq!(
            stream.poll_next(),
            Some(StreamEvent::Error {
                message: "boom".into()
            })
        );
        assert_ready_eq!(stream.poll_next(), None);
    }

    #[tokio::test]
    async fn stopped_run_ends_stream_immediately() {
        let (tx, rx) = mpsc::channel(4);
        let run = control();
        let mut stream = FrameStream::new(rx, Arc::clone(&run));

        tx.try_send(StreamEvent::Frame(Frame::new(0, vec![])))
            .unwrap();
        run.request_stop();

        assert_eq!(stream.next().await, None);
        assert!(tx.is_closed());
    }

    #[test]
    fn drop_requests_stop_unless_terminal_seen() {
        let abandoned = control();
        let (_tx, rx) = mpsc::channel::<StreamEvent>(1);
        drop(FrameStream::new(rx, Arc::clone(&abandoned)));
        assert!(abandoned.is_stopped());

        let finished = control();
        let (tx, rx) = mpsc::channel(1);
        let mut stream = task::spawn(FrameStream::new(rx, Arc::clone(&finished)));
        tx.try_send(StreamEvent::Completed {
            reason: CompletionReason::BudgetExhausted,
        })
        .unwrap();
        assert_ready_eq!(
            stream.poll_next(),
            Some(StreamEvent::Completed {
                reason: CompletionReason::BudgetExhausted
            })
        );
        drop(stream);
        assert!(!finished.is_stopped());
    }
}
