//! Recorded chat transcripts ("cassettes") and their JSON file format.
//!
//! A cassette is a flat list of user and assistant messages. It is built once
//! (by recording a runtime thread) or loaded once (for replay) and is never
//! mutated afterwards; replay shares it behind an `Arc`.

mod error;
mod recording;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

pub use error::CassetteError;

/// Who produced a cassette message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CassetteRole {
    User,
    Assistant,
}

/// One content part of a recorded message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CassettePart {
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
        #[serde(default)]
        args: serde_json::Value,
        /// `None` when no result was recorded. An explicit JSON `null` is a
        /// recorded result and stays `Some(Value::Null)`.
        #[serde(
            default,
            deserialize_with = "present_value",
            skip_serializing_if = "Option::is_none"
        )]
        result: Option<serde_json::Value>,
    },
}

impl CassettePart {
    pub fn text(text: impl Into<String>) -> Self {
        CassettePart::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        CassettePart::Reasoning { text: text.into() }
    }

    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
        result: Option<serde_json::Value>,
    ) -> Self {
        CassettePart::ToolCall {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
            result,
        }
    }

    /// Part type name as written in the JSON format
    pub fn type_name(&self) -> &'static str {
        match self {
            CassettePart::Text { .. } => "text",
            CassettePart::Reasoning { .. } => "reasoning",
            CassettePart::ToolCall { .. } => "tool-call",
        }
    }
}

/// Field deserializer that keeps an explicit `null` as `Some(Value::Null)`.
/// Only invoked when the field is present; absence falls back to `default`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CassetteMessage {
    pub role: CassetteRole,
    pub content: Vec<CassettePart>,
}

impl CassetteMessage {
    /// A user message with a single text part
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: CassetteRole::User,
            content: vec![CassettePart::text(text)],
        }
    }

    pub fn assistant(content: Vec<CassettePart>) -> Self {
        Self {
            role: CassetteRole::Assistant,
            content,
        }
    }

    /// Text submitted to a runtime when this message is replayed as a user
    /// turn: every text part, joined by newlines.
    pub fn user_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                CassettePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A recorded, replayable conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cassette {
    pub messages: Vec<CassetteMessage>,
}

impl Cassette {
    pub fn new(messages: Vec<CassetteMessage>) -> Self {
        Self { messages }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of user turns the controller will submit
    pub fn user_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == CassetteRole::User)
            .count()
    }

    pub fn from_json_str(json: &str) -> Result<Self, CassetteError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CassetteError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a cassette from a JSON file
    pub fn load(path: &Path) -> Result<Self, CassetteError> {
        let contents = fs::read_to_string(path).map_err(|source| CassetteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cassette = Self::from_json_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            messages = cassette.messages.len(),
            "loaded cassette"
        );
        Ok(cassette)
    }

    /// Write the cassette as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), CassetteError> {
        let json = self.to_json_pretty()?;
        fs::write(path, json).map_err(|source| CassetteError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
