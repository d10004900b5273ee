use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cassette::{Cassette, CassettePart, CassetteRole};
use crate::replay::stream::{ReplayOutcome, ReplayStream, StreamEvent, StreamSink};
use crate::replay::timing::{sleep, Cancelled};
use crate::replay::ReplayOptions;

/// Source of assistant turns for a chat runtime
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start streaming the next assistant turn. Cancelling `cancel` stops the
    /// stream without a terminating event.
    async fn send_messages(&self, cancel: CancellationToken) -> ReplayStream;
}

/// Serves a cassette's assistant turns one call at a time.
pub struct ReplayTransport {
    cassette: Arc<Cassette>,
    options: ReplayOptions,
    /// Index of the next cassette message to serve; only ever moves forward
    cursor: Mutex<usize>,
}

impl ReplayTransport {
    pub fn new(cassette: Arc<Cassette>, options: ReplayOptions) -> Self {
        Self {
            cassette,
            options,
            cursor: Mutex::new(0),
        }
    }

    pub fn cursor(&self) -> usize {
        *self.cursor.lock()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor() >= self.cassette.messages.len()
    }

    /// Advance past at most one user message, then take every assistant
    /// message up to the next user message.
    pub fn next_turn(&self) -> ReplayTurn {
        let messages = &self.cassette.messages;
        let mut cursor = self.cursor.lock();

        let mut index = *cursor;
        if messages
            .get(index)
            .is_some_and(|m| m.role == CassetteRole::User)
        {
            index += 1;
        }
        let start = index;
        while messages
            .get(index)
            .is_some_and(|m| m.role == CassetteRole::Assistant)
        {
            index += 1;
        }
        *cursor = index;

        ReplayTurn {
            parts: messages[start..index]
                .iter()
                .flat_map(|m| m.content.iter().cloned())
                .collect(),
            options: self.options,
        }
    }
}

#[async_trait]
impl ChatTransport for ReplayTransport {
    async fn send_messages(&self, cancel: CancellationToken) -> ReplayStream {
        let turn = self.next_turn();
        if turn.is_empty() {
            tracing::debug!(cursor = self.cursor(), "No assistant messages left to replay");
            return ReplayStream::empty();
        }

        ReplayStream::spawn(move |mut tx| async move { turn.write_to(&mut tx, &cancel).await })
    }
}

/// The recorded parts of one assistant turn, in cassette order
#[derive(Debug, Clone)]
pub struct ReplayTurn {
    parts: Vec<CassettePart>,
    options: ReplayOptions,
}

impl ReplayTurn {
    pub fn parts(&self) -> &[CassettePart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Emit the turn into `sink` with the configured pacing.
    ///
    /// Nothing is written once `cancel` fires or the sink closes; either ends
    /// the turn as [`ReplayOutcome::Cancelled`].
    pub async fn write_to<S: StreamSink>(
        &self,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> ReplayOutcome {
        if self.parts.is_empty() {
            return ReplayOutcome::Completed;
        }

        match self.write_parts(sink, cancel).await {
            Ok(()) => ReplayOutcome::Completed,
            Err(Cancelled) => {
                tracing::debug!("Replay turn cancelled");
                ReplayOutcome::Cancelled
            }
        }
    }

    async fn write_parts<S: StreamSink>(
        &self,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<(), Cancelled> {
        sleep(self.options.assistant_start_delay, cancel).await?;

        for part in &self.parts {
            match part {
                CassettePart::Text { text } => {
                    self.write_typed(sink, cancel, text, TypedKind::Text).await?
                }
                CassettePart::Reasoning { text } => {
                    self.write_typed(sink, cancel, text, TypedKind::Reasoning)
                        .await?
                }
                CassettePart::ToolCall {
                    tool_call_id,
                    tool_name,
                    args,
                    result,
                } => {
                    emit(
                        sink,
                        cancel,
                        StreamEvent::ToolInputAvailable {
                            tool_call_id: tool_call_id.clone(),
                            tool_name: tool_name.clone(),
                            input: args.clone(),
                        },
                    )?;
                    // Without a recorded result the call stays open
                    if let Some(output) = result {
                        sleep(self.options.tool_result_delay, cancel).await?;
                        emit(
                            sink,
                            cancel,
                            StreamEvent::ToolOutputAvailable {
                                tool_call_id: tool_call_id.clone(),
                                output: output.clone(),
                            },
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn write_typed<S: StreamSink>(
        &self,
        sink: &mut S,
        cancel: &CancellationToken,
        text: &str,
        kind: TypedKind,
    ) -> Result<(), Cancelled> {
        let id = Uuid::new_v4().to_string();
        emit(sink, cancel, kind.start(&id))?;
        for ch in text.chars() {
            emit(sink, cancel, kind.delta(&id, ch))?;
            sleep(self.options.typing_speed, cancel).await?;
        }
        emit(sink, cancel, kind.end(id))
    }
}

#[derive(Debug, Clone, Copy)]
enum TypedKind {
    Text,
    Reasoning,
}

impl TypedKind {
    fn start(self, id: &str) -> StreamEvent {
        let id = id.to_string();
        match self {
            TypedKind::Text => StreamEvent::TextStart { id },
            TypedKind::Reasoning => StreamEvent::ReasoningStart { id },
        }
    }

    fn delta(self, id: &str, ch: char) -> StreamEvent {
        let id = id.to_string();
        let delta = ch.to_string();
        match self {
            TypedKind::Text => StreamEvent::TextDelta { id, delta },
            TypedKind::Reasoning => StreamEvent::ReasoningDelta { id, delta },
        }
    }

    fn end(self, id: String) -> StreamEvent {
        match self {
            TypedKind::Text => StreamEvent::TextEnd { id },
            TypedKind::Reasoning => StreamEvent::ReasoningEnd { id },
        }
    }
}

fn emit<S: StreamSink>(
    sink: &mut S,
    cancel: &CancellationToken,
    event: StreamEvent,
) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    tracing::trace!(event = event.event_type_name(), "replay event");
    sink.write(event).map_err(|_| Cancelled)
}
