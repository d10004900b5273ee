use crate::runtime::{ThreadMessage, ThreadPart, ThreadRole};

use super::{Cassette, CassetteMessage, CassettePart, CassetteRole};

impl Cassette {
    /// Capture a runtime thread as a cassette.
    ///
    /// System messages are dropped since they are never displayed, as are
    /// empty text/reasoning parts and image parts. Messages left with no parts
    /// are skipped entirely.
    pub fn record(thread: &[ThreadMessage]) -> Cassette {
        let messages = thread
            .iter()
            .filter_map(|message| {
                let role = match message.role {
                    ThreadRole::System => return None,
                    ThreadRole::User => CassetteRole::User,
                    ThreadRole::Assistant => CassetteRole::Assistant,
                };

                let content: Vec<CassettePart> =
                    message.content.iter().filter_map(to_cassette_part).collect();
                if content.is_empty() {
                    return None;
                }
                Some(CassetteMessage { role, content })
            })
            .collect();

        Cassette { messages }
    }
}

fn to_cassette_part(part: &ThreadPart) -> Option<CassettePart> {
    match part {
        ThreadPart::Text { text } if !text.is_empty() => Some(CassettePart::text(text.clone())),
        ThreadPart::Reasoning { text } if !text.is_empty() => {
            Some(CassettePart::reasoning(text.clone()))
        }
        ThreadPart::ToolCall {
            tool_call_id,
            tool_name,
            args,
            result,
        } => Some(CassettePart::ToolCall {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool_name.clone(),
            args: args.clone(),
            result: result.clone(),
        }),
        // Empty text, empty reasoning and images are not recorded.
        _ => None,
    }
}
