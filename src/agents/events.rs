use serde::{Deserialize, Serialize};

/// Sub-agent lifecycle event carried inside a streamed marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SubAgentEvent {
    /// A sub-agent was spawned
    #[serde(rename = "sub_agent.spawn")]
    Spawn(SpawnEvent),

    /// Streamed output of a sub-agent
    #[serde(rename = "sub_agent.delta")]
    Delta(DeltaEvent),

    /// A sub-agent invoked a tool
    #[serde(rename = "sub_agent.tool_call")]
    ToolCall(ToolCallEvent),

    /// A sub-agent tool call returned
    #[serde(rename = "sub_agent.tool_result")]
    ToolResult(ToolResultEvent),

    /// A sub-agent finished
    #[serde(rename = "sub_agent.complete")]
    Complete(CompleteEvent),
}

/// Number of leading content characters folded into a delta's dedup key
const DELTA_KEY_PREFIX_CHARS: usize = 50;

impl SubAgentEvent {
    /// Id of the agent this event refers to
    pub fn agent_id(&self) -> &str {
        match self {
            SubAgentEvent::Spawn(e) => &e.agent_id,
            SubAgentEvent::Delta(e) => &e.agent_id,
            SubAgentEvent::ToolCall(e) => &e.agent_id,
            SubAgentEvent::ToolResult(e) => &e.agent_id,
            SubAgentEvent::Complete(e) => &e.agent_id,
        }
    }

    /// Wire name of the event type
    pub fn event_type_name(&self) -> &'static str {
        match self {
            SubAgentEvent::Spawn(_) => "sub_agent.spawn",
            SubAgentEvent::Delta(_) => "sub_agent.delta",
            SubAgentEvent::ToolCall(_) => "sub_agent.tool_call",
            SubAgentEvent::ToolResult(_) => "sub_agent.tool_result",
            SubAgentEvent::Complete(_) => "sub_agent.complete",
        }
    }

    /// Key identifying this event for duplicate suppression.
    ///
    /// Deltas are fingerprinted by content length and prefix, so two distinct
    /// deltas with equal length and prefix collide. The store's buffer tracker
    /// keys deltas by per-agent position instead; see `ContentTracker`.
    pub fn event_key(&self) -> String {
        match self {
            SubAgentEvent::Spawn(e) => format!("spawn:{}", e.agent_id),
            SubAgentEvent::Delta(e) => {
                let prefix: String = e.content.chars().take(DELTA_KEY_PREFIX_CHARS).collect();
                format!(
                    "delta:{}:{}:{}",
                    e.agent_id,
                    e.content.chars().count(),
                    prefix
                )
            }
            SubAgentEvent::ToolCall(e) => format!("tool_call:{}:{}", e.agent_id, e.tool_call_id),
            SubAgentEvent::ToolResult(e) => {
                format!("tool_result:{}:{}", e.agent_id, e.tool_call_id)
            }
            SubAgentEvent::Complete(e) => format!("complete:{}", e.agent_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnEvent {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub agent_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEvent {
    pub agent_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultEvent {
    pub agent_id: String,
    pub tool_call_id: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteEvent {
    pub agent_id: String,
    pub status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final status reported by a `complete` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// Upstream producers write `completed`
    #[serde(alias = "completed")]
    Succeeded,
    Failed,
}
