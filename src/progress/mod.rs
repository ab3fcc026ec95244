//! Progress events and the stream that carries them to an observer
//!
//! The orchestrator holds the only [`ProgressSender`]; the caller holds the
//! matching [`ProgressStream`]. The stream ends when the sender is dropped,
//! which happens right after the terminal event.

use crate::research::PipelineState;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// One buffered event keeps the producer at most one step ahead of the observer
const PROGRESS_CHANNEL_CAPACITY: usize = 1;

/// What an event carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ProgressPayload {
    /// Human-readable status line
    Status(String),
    /// Terminal success: the report's markdown body
    Report(String),
    /// Terminal failure: sanitized description of what went wrong
    Failure { kind: String, description: String },
}

/// One notification in a run's progress sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Position in the run, starting at 0
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// State the pipeline was in when the event was emitted
    pub stage: PipelineState,
    pub payload: ProgressPayload,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.payload,
            ProgressPayload::Report(_) | ProgressPayload::Failure { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.payload, ProgressPayload::Failure { .. })
    }

    /// Text an observer would render for this event
    pub fn display_text(&self) -> &str {
        match &self.payload {
            ProgressPayload::Status(text) | ProgressPayload::Report(text) => text,
            ProgressPayload::Failure { description, .. } => description,
        }
    }
}

/// Producer end, owned by the orchestrator
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
    next_sequence: u64,
    observer_gone: bool,
}

impl ProgressSender {
    /// Emit one event; waits while the observer is behind
    ///
    /// A dropped observer does not stop the run; later events are discarded.
    pub async fn emit(&mut self, stage: PipelineState, payload: ProgressPayload) {
        let event = ProgressEvent {
            sequence: self.next_sequence,
            timestamp: Utc::now(),
            stage,
            payload,
        };
        self.next_sequence += 1;

        if self.observer_gone {
            return;
        }
        if self.tx.send(event).await.is_err() {
            debug!(stage = %stage, "Progress observer dropped; discarding further events");
            self.observer_gone = true;
        }
    }

    pub async fn status(&mut self, stage: PipelineState, message: impl Into<String>) {
        self.emit(stage, ProgressPayload::Status(message.into())).await;
    }

    pub fn emitted(&self) -> u64 {
        self.next_sequence
    }
}

/// Consumer end: a lazy, finite, non-restartable stream of events
pub struct ProgressStream {
    inner: ReceiverStream<ProgressEvent>,
}

impl ProgressStream {
    /// Drain the stream into a vector
    pub async fn collect_all(self) -> Vec<ProgressEvent> {
        use futures::StreamExt;
        self.collect().await
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Create a connected producer/consumer pair
pub fn progress_channel() -> (ProgressSender, ProgressStream) {
    let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    (
        ProgressSender {
            tx,
            next_sequence: 0,
            observer_gone: false,
        },
        ProgressStream {
            inner: ReceiverStream::new(rx),
        },
    )
}
