//! Bounded, backpressured stream channel
//!
//! The conduit between a pipeline's subprocess reader and a consumer. The
//! channel holds no business logic beyond FIFO ordering and capacity
//! enforcement: a full channel suspends the producer, `close()` is
//! idempotent and wakes any blocked receiver, and no event is delivered
//! after close is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use upd_types::Phase;

use crate::event::{EventEnvelope, StreamEvent};

/// Error returned when sending on a closed channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream channel closed")]
pub struct ChannelClosed;

#[derive(Debug)]
struct Shared {
    closed: AtomicBool,
    notify: Notify,
}

/// Producer half of a stream channel. Cloneable; all clones share the same
/// closed state.
#[derive(Debug, Clone)]
pub struct StreamSender {
    pipeline: Arc<str>,
    tx: mpsc::Sender<EventEnvelope>,
    shared: Arc<Shared>,
}

/// Consumer half of a stream channel.
#[derive(Debug)]
pub struct StreamReceiver {
    rx: mpsc::Receiver<EventEnvelope>,
    shared: Arc<Shared>,
    finished: bool,
}

/// Create a bounded stream channel for `pipeline` with the given capacity.
///
/// # Panics
///
/// Panics if `capacity` is zero (a zero-capacity channel could never carry
/// an event).
#[must_use]
pub fn channel(pipeline: impl Into<String>, capacity: usize) -> (StreamSender, StreamReceiver) {
    assert!(capacity > 0, "stream channel capacity must be non-zero");
    let (tx, rx) = mpsc::channel(capacity);
    let shared = Arc::new(Shared {
        closed: AtomicBool::new(false),
        notify: Notify::new(),
    });
    let pipeline: Arc<str> = Arc::from(pipeline.into());
    (
        StreamSender {
            pipeline,
            tx,
            shared: Arc::clone(&shared),
        },
        StreamReceiver {
            rx,
            shared,
            finished: false,
        },
    )
}

impl StreamSender {
    /// Send an event, waiting while the channel is full.
    ///
    /// Backpressure is deliberate: the producer suspends rather than
    /// dropping events, because the last progress event before phase
    /// completion carries the final state a consumer displays.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelClosed`] if the channel was closed or the receiver
    /// dropped.
    pub async fn send(&self, event: StreamEvent) -> Result<(), ChannelClosed> {
        if self.is_closed() {
            return Err(ChannelClosed);
        }
        let envelope = EventEnvelope::new(self.pipeline.as_ref(), event);
        self.tx.send(envelope).await.map_err(|_| ChannelClosed)
    }

    /// Forward an already-enveloped event, preserving its attribution.
    ///
    /// Used by the scheduler's merge forwarders.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelClosed`] if the channel was closed or the receiver
    /// dropped.
    pub async fn forward(&self, envelope: EventEnvelope) -> Result<(), ChannelClosed> {
        if self.is_closed() {
            return Err(ChannelClosed);
        }
        self.tx.send(envelope).await.map_err(|_| ChannelClosed)
    }

    /// Close the channel. Idempotent; wakes any blocked receiver. No event
    /// is delivered after the receiver observes the close.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(pipeline = %self.pipeline, "stream channel closed");
            self.shared.notify.notify_waiters();
        }
    }

    /// Whether the channel has been closed (by either side).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// Emit a plain output line.
    pub async fn emit_output(&self, text: impl Into<String>) -> Result<(), ChannelClosed> {
        self.send(StreamEvent::Output { text: text.into() }).await
    }

    /// Emit an error message.
    pub async fn emit_error(&self, message: impl Into<String>) -> Result<(), ChannelClosed> {
        self.send(StreamEvent::Error {
            message: message.into(),
        })
        .await
    }

    /// Emit a phase completion marker.
    pub async fn emit_phase_complete(
        &self,
        phase: Phase,
        success: bool,
    ) -> Result<(), ChannelClosed> {
        self.send(StreamEvent::PhaseComplete { phase, success }).await
    }
}

impl StreamReceiver {
    /// Receive the next event, or `None` once the channel is closed.
    ///
    /// Events already in the buffer at close time are still delivered, so
    /// no event is lost; the `None` indication is terminal, and nothing a
    /// producer raced in afterwards is ever delivered.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        if self.finished {
            return None;
        }
        loop {
            // Drain buffered events before honoring the close flag.
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.finished = true;
                    return None;
                }
                Err(mpsc::error::TryRecvError::Empty) => {}
            }
            // Register for the close notification before checking the flag,
            // otherwise a close between check and await is missed.
            let notified = self.shared.notify.notified();
            if self.shared.closed.load(Ordering::Acquire) {
                self.finished = true;
                return None;
            }
            tokio::select! {
                event = self.rx.recv() => {
                    if event.is_none() {
                        self.finished = true;
                    }
                    return event;
                }
                () = notified => {}
            }
        }
    }

    /// Whether the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}
