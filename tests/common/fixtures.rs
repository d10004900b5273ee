//! Cassette and sub-agent event fixtures

use gram_replay::agents::{
    encode_marker, CompleteEvent, CompletionStatus, DeltaEvent, SpawnEvent, SubAgentEvent,
    ToolCallEvent, ToolResultEvent,
};
use gram_replay::Cassette;

/// The two-message cassette `hi` -> `ok`
pub const HI_OK_CASSETTE: &str = r#"{
  "messages": [
    { "role": "user", "content": [ { "type": "text", "text": "hi" } ] },
    { "role": "assistant", "content": [ { "type": "text", "text": "ok" } ] }
  ]
}"#;

/// Two turns exercising every part kind, including a tool call whose result
/// was recorded as `null` and one with no result at all
pub const MULTI_TURN_CASSETTE: &str = r#"{
  "messages": [
    { "role": "user", "content": [ { "type": "text", "text": "find the docs" } ] },
    { "role": "assistant", "content": [
        { "type": "reasoning", "text": "search first" },
        { "type": "tool-call", "toolCallId": "call-1", "toolName": "search",
          "args": { "query": "docs" }, "result": { "hits": 2 } },
        { "type": "tool-call", "toolCallId": "call-2", "toolName": "ping",
          "args": {}, "result": null },
        { "type": "text", "text": "Found 2." }
    ] },
    { "role": "user", "content": [ { "type": "text", "text": "open one" } ] },
    { "role": "assistant", "content": [
        { "type": "tool-call", "toolCallId": "call-3", "toolName": "open",
          "args": { "index": 0 } },
        { "type": "text", "text": "Opening." }
    ] }
  ]
}"#;

pub fn cassette(json: &str) -> Cassette {
    Cassette::from_json_str(json).expect("fixture cassette should parse")
}

/// Builder for scripted sub-agent events
///
/// # Example
/// ```ignore
/// let script = AgentScript::new()
///     .spawn("planner", None)
///     .delta("planner", "thinking")
///     .complete("planner", CompletionStatus::Succeeded);
/// let text = script.to_marker_text();
/// ```
#[derive(Debug, Clone, Default)]
pub struct AgentScript {
    events: Vec<SubAgentEvent>,
}

impl AgentScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(mut self, agent_id: &str, parent_id: Option<&str>) -> Self {
        self.events.push(SubAgentEvent::Spawn(SpawnEvent {
            agent_id: agent_id.into(),
            parent_id: parent_id.map(String::from),
            name: format!("{agent_id} agent"),
            description: format!("handles {agent_id}"),
            task: format!("do {agent_id}"),
        }));
        self
    }

    pub fn delta(mut self, agent_id: &str, content: &str) -> Self {
        self.events.push(SubAgentEvent::Delta(DeltaEvent {
            agent_id: agent_id.into(),
            content: content.into(),
        }));
        self
    }

    pub fn tool_call(mut self, agent_id: &str, tool_call_id: &str, tool_name: &str) -> Self {
        self.events.push(SubAgentEvent::ToolCall(ToolCallEvent {
            agent_id: agent_id.into(),
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
        }));
        self
    }

    pub fn tool_result(
        mut self,
        agent_id: &str,
        tool_call_id: &str,
        result: &str,
        is_error: bool,
    ) -> Self {
        self.events.push(SubAgentEvent::ToolResult(ToolResultEvent {
            agent_id: agent_id.into(),
            tool_call_id: tool_call_id.into(),
            result: result.into(),
            is_error,
        }));
        self
    }

    pub fn complete(mut self, agent_id: &str, status: CompletionStatus) -> Self {
        let (result, error) = match status {
            CompletionStatus::Succeeded => (Some(format!("{agent_id} done")), None),
            CompletionStatus::Failed => (None, Some(format!("{agent_id} failed"))),
        };
        self.events.push(SubAgentEvent::Complete(CompleteEvent {
            agent_id: agent_id.into(),
            status,
            result,
            error,
        }));
        self
    }

    pub fn events(&self) -> &[SubAgentEvent] {
        &self.events
    }

    /// Markers for every event, concatenated without separators
    pub fn to_marker_text(&self) -> String {
        self.events.iter().map(marker).collect()
    }
}

pub fn marker(event: &SubAgentEvent) -> String {
    encode_marker(event).expect("fixture event should encode")
}

/// Cassette with one user turn whose assistant text interleaves prose and
/// sub-agent markers
pub fn cassette_with_agent_text(user: &str, assistant_text: &str) -> Cassette {
    let json = serde_json::json!({
        "messages": [
            { "role": "user", "content": [ { "type": "text", "text": user } ] },
            { "role": "assistant", "content": [ { "type": "text", "text": assistant_text } ] }
        ]
    });
    Cassette::from_json_str(&json.to_string()).expect("generated cassette should parse")
}
