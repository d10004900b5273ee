//! In-memory conversation thread kept by a chat runtime.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::replay::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ThreadPart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },
    Image {
        image: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub role: ThreadRole,
    pub content: Vec<ThreadPart>,
}

impl ThreadMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ThreadRole::System,
            content: vec![ThreadPart::Text { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ThreadRole::User,
            content: vec![ThreadPart::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ThreadPart>) -> Self {
        Self {
            role: ThreadRole::Assistant,
            content,
        }
    }
}

/// Builds one assistant message out of a run's stream events.
#[derive(Debug, Default)]
pub(crate) struct AssistantAssembler {
    parts: Vec<ThreadPart>,
    /// Stream part id -> index into `parts` for text/reasoning parts still open
    open: HashMap<String, usize>,
}

impl AssistantAssembler {
    /// Apply one event. Returns the index of the text part that grew, if any.
    pub(crate) fn apply(&mut self, event: &StreamEvent) -> Option<usize> {
        match event {
            StreamEvent::TextStart { id } => {
                self.open_part(id, ThreadPart::Text { text: String::new() });
                None
            }
            StreamEvent::ReasoningStart { id } => {
                self.open_part(id, ThreadPart::Reasoning { text: String::new() });
                None
            }
            StreamEvent::TextDelta { id, delta } | StreamEvent::ReasoningDelta { id, delta } => {
                let Some(&index) = self.open.get(id) else {
                    tracing::trace!(part_id = %id, "delta for unknown stream part");
                    return None;
                };
                match self.parts.get_mut(index) {
                    Some(ThreadPart::Text { text }) => {
                        text.push_str(delta);
                        Some(index)
                    }
                    Some(ThreadPart::Reasoning { text }) => {
                        text.push_str(delta);
                        None
                    }
                    _ => None,
                }
            }
            StreamEvent::TextEnd { id } | StreamEvent::ReasoningEnd { id } => {
                self.open.remove(id);
                None
            }
            StreamEvent::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                self.parts.push(ThreadPart::ToolCall {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: tool_name.clone(),
                    args: input.clone(),
                    result: None,
                });
                None
            }
            StreamEvent::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                for part in &mut self.parts {
                    if let ThreadPart::ToolCall {
                        tool_call_id: id,
                        result,
                        ..
                    } = part
                    {
                        if id == tool_call_id {
                            *result = Some(output.clone());
                        }
                    }
                }
                None
            }
        }
    }

    fn open_part(&mut self, id: &str, part: ThreadPart) {
        self.parts.push(part);
        self.open.insert(id.to_string(), self.parts.len() - 1);
    }

    /// Current text of a text part
    pub(crate) fn text_at(&self, index: usize) -> Option<&str> {
        match self.parts.get(index) {
            Some(ThreadPart::Text { text }) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn finish(self) -> ThreadMessage {
        ThreadMessage::assistant(self.parts)
    }
}
