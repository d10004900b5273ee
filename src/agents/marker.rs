//! Extraction of sub-agent events embedded in streamed assistant text.
//!
//! Producers embed events as HTML comments wrapping a JSON payload:
//! `<!--GRAM_AGENT:{"type":"sub_agent.spawn",...}-->`. Text arrives in
//! arbitrary chunks, so a marker (even its opening delimiter) can be cut at
//! any character. [`parse_agent_events`] always works on the full text
//! accumulated so far and holds back anything that may still turn into a
//! marker.

use crate::agents::events::SubAgentEvent;

/// Opening delimiter of an embedded event
pub const MARKER_OPEN: &str = "<!--GRAM_AGENT:";
/// Closing delimiter of an embedded event
pub const MARKER_CLOSE: &str = "-->";

/// Result of scanning accumulated text for markers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContent {
    /// Displayable text with every marker removed
    pub clean_content: String,
    /// Events from complete markers, in text order
    pub events: Vec<SubAgentEvent>,
    /// Held-back suffix that may be the start of an incomplete marker
    pub trailing_partial: String,
}

/// Parse the full accumulated text for embedded agent events.
///
/// Stateless: calling this on successively longer prefixes of a stream ends
/// with the same result as one call on the whole text. Callers that apply
/// events on every call must skip events they already applied.
pub fn parse_agent_events(content: &str) -> ParsedContent {
    let mut events = Vec::new();
    let mut clean_content = String::with_capacity(content.len());
    let mut rest = content;

    // Complete markers. The payload ends at the first closing delimiter.
    while let Some(start) = rest.find(MARKER_OPEN) {
        let payload_start = start + MARKER_OPEN.len();
        let Some(payload_len) = rest[payload_start..].find(MARKER_CLOSE) else {
            break;
        };

        clean_content.push_str(&rest[..start]);
        let payload = &rest[payload_start..payload_start + payload_len];
        match serde_json::from_str::<SubAgentEvent>(payload) {
            Ok(event) => events.push(event),
            Err(e) => {
                // Drop this marker only; keep scanning the rest of the buffer
                tracing::warn!("Failed to parse agent event: {e}. Payload: {payload}");
            }
        }
        rest = &rest[payload_start + payload_len + MARKER_CLOSE.len()..];
    }
    clean_content.push_str(rest);

    let mut trailing_partial = String::new();

    // An opened marker still waiting for its closing delimiter.
    if let Some(last_open) = clean_content.rfind(MARKER_OPEN) {
        if !clean_content[last_open..].contains(MARKER_CLOSE) {
            trailing_partial = clean_content.split_off(last_open);
        }
    }

    // The opening delimiter itself may be cut mid-token.
    if trailing_partial.is_empty() {
        if let Some(len) = (1..=MARKER_OPEN.len())
            .rev()
            .find(|&len| clean_content.ends_with(&MARKER_OPEN[..len]))
        {
            let split_at = clean_content.len() - len;
            trailing_partial = clean_content.split_off(split_at);
        }
    }

    ParsedContent {
        clean_content,
        events,
        trailing_partial,
    }
}

/// Render an event as a marker ready to embed in streamed text.
///
/// `<`, `>` and `&` inside the JSON are written as unicode escapes so that
/// payload text can never contain the closing delimiter.
pub fn encode_marker(event: &SubAgentEvent) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    let mut escaped = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            other => escaped.push(other),
        }
    }
    Ok(format!("{MARKER_OPEN}{escaped}{MARKER_CLOSE}"))
}
