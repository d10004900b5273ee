//! Low-level stream events produced by a transport and the handle used to
//! consume them.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        tool_call_id: String,
        output: serde_json::Value,
    },
}

impl StreamEvent {
    pub fn event_type_name(&self) -> &'static str {
        match self {
            StreamEvent::TextStart { .. } => "text-start",
            StreamEvent::TextDelta { .. } => "text-delta",
            StreamEvent::TextEnd { .. } => "text-end",
            StreamEvent::ReasoningStart { .. } => "reasoning-start",
            StreamEvent::ReasoningDelta { .. } => "reasoning-delta",
            StreamEvent::ReasoningEnd { .. } => "reasoning-end",
            StreamEvent::ToolInputAvailable { .. } => "tool-input-available",
            StreamEvent::ToolOutputAvailable { .. } => "tool-output-available",
        }
    }
}

/// How a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOutcome {
    /// Every part was emitted
    Completed,
    /// Stopped early; the stream is left unterminated
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream consumer went away")]
pub struct SinkClosed;

/// Destination for stream events
pub trait StreamSink: Send {
    fn write(&mut self, event: StreamEvent) -> Result<(), SinkClosed>;
}

impl StreamSink for Vec<StreamEvent> {
    fn write(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
        self.push(event);
        Ok(())
    }
}

impl StreamSink for mpsc::UnboundedSender<StreamEvent> {
    fn write(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
        self.send(event).map_err(|_| SinkClosed)
    }
}

/// Events of one assistant turn, produced by a background task.
///
/// Consume it as a [`Stream`] or through [`next_event`](Self::next_event),
/// then call [`finish`](Self::finish) for the outcome.
pub struct ReplayStream {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    task: Option<JoinHandle<ReplayOutcome>>,
}

impl ReplayStream {
    /// Run `produce` on a tokio task, streaming whatever it writes
    pub fn spawn<F, Fut>(produce: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedSender<StreamEvent>) -> Fut,
        Fut: Future<Output = ReplayOutcome> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(produce(tx));
        Self {
            events: rx,
            task: Some(task),
        }
    }

    /// A stream that has already completed without emitting anything
    pub fn empty() -> Self {
        let (_, rx) = mpsc::unbounded_channel();
        Self {
            events: rx,
            task: None,
        }
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Discard any unread events and wait for the producer to stop
    pub async fn finish(mut self) -> ReplayOutcome {
        while self.events.recv().await.is_some() {}

        match self.task.take() {
            Some(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Replay stream task failed: {e}");
                    ReplayOutcome::Cancelled
                }
            },
            None => ReplayOutcome::Completed,
        }
    }

    /// Read every event, then the outcome
    pub async fn collect(mut self) -> (Vec<StreamEvent>, ReplayOutcome) {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        let outcome = self.finish().await;
        (events, outcome)
    }
}

impl Stream for ReplayStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for ReplayStream {
    fn drop(&mut self) {
        // An unread stream has no consumer left; stop producing into it.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
