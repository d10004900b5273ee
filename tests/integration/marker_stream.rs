//! Integration tests for incremental marker extraction
//!
//! Feeds text into the parser and the store the way a streaming runtime does:
//! the whole accumulated buffer on every growth.

use proptest::prelude::*;

use gram_replay::agents::{
    parse_agent_events, AgentsConfig, CompletionStatus, ContentTracker, SubAgentEvent,
    SubAgentStore,
};

use super::common::{marker, AgentScript};

/// Parse each growing prefix and return the final parse plus every
/// intermediate clean text
fn feed_chunks(chunks: &[&str]) -> (gram_replay::ParsedContent, Vec<String>) {
    let mut buffer = String::new();
    let mut cleans = Vec::new();
    let mut last = parse_agent_events("");
    for chunk in chunks {
        buffer.push_str(chunk);
        last = parse_agent_events(&buffer);
        cleans.push(last.clean_content.clone());
    }
    (last, cleans)
}

fn representative_text() -> String {
    let script = AgentScript::new()
        .spawn("a1", None)
        .delta("a1", "look <here> & --> there");
    format!("Intro. {}Outro.", script.to_marker_text())
}

#[test]
fn test_every_two_way_split_matches_single_parse() {
    let text = representative_text();
    let whole = parse_agent_events(&text);
    assert_eq!(whole.clean_content, "Intro. Outro.");
    assert_eq!(whole.events.len(), 2);

    for (offset, _) in text.char_indices().skip(1) {
        let (first, second) = text.split_at(offset);
        let (last, cleans) = feed_chunks(&[first, second]);

        assert_eq!(last, whole, "split at {offset}");
        assert!(
            whole.clean_content.starts_with(&cleans[0]),
            "split at {offset}: {:?} is not a prefix",
            cleans[0]
        );
    }
}

#[test]
fn test_character_stream_through_store_applies_each_event_once() {
    let script = AgentScript::new()
        .spawn("a1", None)
        .delta("a1", ".")
        .delta("a1", ".")
        .tool_call("a1", "t1", "grep")
        .tool_result("a1", "t1", "3 matches", false)
        .complete("a1", CompletionStatus::Succeeded);
    let text = format!("before {}after", script.to_marker_text());

    let mut store = SubAgentStore::new(AgentsConfig::default());
    let mut buffer = String::new();
    let mut clean = String::new();
    for ch in text.chars() {
        buffer.push(ch);
        clean = store.process_content(&buffer);
    }
    // A final re-parse of the same buffer is a no-op
    let version = store.snapshot().version();
    assert_eq!(store.process_content(&buffer), clean);
    assert_eq!(store.snapshot().version(), version);

    assert_eq!(clean, "before after");
    assert_eq!(version, script.events().len() as u64);
    let agent = store.agent("a1").unwrap();
    assert_eq!(agent.messages[0].content, "..");
    assert_eq!(agent.messages[1].content, "3 matches");
}

#[test]
fn test_malformed_marker_in_stream_is_dropped_once_complete() {
    let good = marker(&AgentScript::new().spawn("ok", None).events()[0]);
    let text = format!("x<!--GRAM_AGENT:{{\"type\":\"sub_agent.nope\"}}-->y{good}z");

    let mut store = SubAgentStore::new(AgentsConfig::default());
    let mut tracker = ContentTracker::new();
    let mut clean = String::new();
    for end in text.char_indices().map(|(i, c)| i + c.len_utf8()) {
        clean = store.process_content_with(&mut tracker, &text[..end]);
    }

    assert_eq!(clean, "xyz");
    assert_eq!(store.snapshot().len(), 1);
    assert_eq!(tracker.applied_count(), 1);
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Event(SubAgentEvent),
}

fn event_strategy() -> impl Strategy<Value = SubAgentEvent> {
    let ids = prop::sample::select(vec!["a1", "a2", "a3"]);
    prop_oneof![
        (ids.clone(), prop::option::of(ids.clone())).prop_map(|(id, parent)| {
            AgentScript::new().spawn(id, parent).events()[0].clone()
        }),
        (ids.clone(), "[a-z<>&\\- ]{0,8}")
            .prop_map(|(id, content)| AgentScript::new().delta(id, &content).events()[0].clone()),
        (ids.clone(), prop::sample::select(vec!["t1", "t2"])).prop_map(|(id, call)| {
            AgentScript::new().tool_call(id, call, "grep").events()[0].clone()
        }),
        (ids, any::<bool>()).prop_map(|(id, ok)| {
            let status = if ok {
                CompletionStatus::Succeeded
            } else {
                CompletionStatus::Failed
            };
            AgentScript::new().complete(id, status).events()[0].clone()
        }),
    ]
}

/// Plain text alternating with events. Text segments are shorter than the
/// opening delimiter so they can never contain one.
fn document_strategy() -> impl Strategy<Value = Vec<Segment>> {
    prop::collection::vec(
        ("[a-zA-Z0-9 .<>!\\-]{0,12}", event_strategy()),
        0..6,
    )
    .prop_flat_map(|pairs| {
        "[a-zA-Z0-9 .<>!\\-]{0,12}".prop_map(move |tail| {
            let mut segments = Vec::new();
            for (text, event) in pairs.clone() {
                segments.push(Segment::Text(text));
                segments.push(Segment::Event(event));
            }
            segments.push(Segment::Text(tail));
            segments
        })
    })
}

fn render(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => text.clone(),
            Segment::Event(event) => marker(event),
        })
        .collect()
}

/// Split points as fractions of the text, turned into char boundaries
fn split_text<'a>(text: &'a str, cuts: &[u16]) -> Vec<&'a str> {
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let mut offsets: Vec<usize> = cuts
        .iter()
        .map(|cut| boundaries[*cut as usize % boundaries.len()])
        .collect();
    offsets.push(0);
    offsets.push(text.len());
    offsets.sort_unstable();
    offsets.dedup();
    offsets.windows(2).map(|w| &text[w[0]..w[1]]).collect()
}

proptest! {
    #[test]
    fn prop_chunked_delivery_matches_single_parse(
        segments in document_strategy(),
        cuts in prop::collection::vec(any::<u16>(), 0..12),
    ) {
        let text = render(&segments);
        let whole = parse_agent_events(&text);
        let chunks = split_text(&text, &cuts);
        let (last, _) = feed_chunks(&chunks);

        if !chunks.is_empty() {
            prop_assert_eq!(&last, &whole);
        }

        let mut expected_events = Vec::new();
        let mut plain = String::new();
        for segment in &segments {
            match segment {
                Segment::Event(event) => expected_events.push(event.clone()),
                Segment::Text(text) => plain.push_str(text),
            }
        }
        // Held-back text is a suffix of the clean text that could still open
        // a marker, e.g. a literal `<` left in front of a stripped marker
        prop_assert_eq!(format!("{}{}", whole.clean_content, whole.trailing_partial), plain);
        prop_assert_eq!(whole.events, expected_events);
    }

    #[test]
    fn prop_store_state_independent_of_chunking(
        segments in document_strategy(),
        cuts in prop::collection::vec(any::<u16>(), 0..12),
    ) {
        let text = render(&segments);

        let mut single = SubAgentStore::new(AgentsConfig::default());
        let single_clean = single.process_content(&text);

        let mut chunked = SubAgentStore::new(AgentsConfig::default());
        let mut buffer = String::new();
        let mut chunked_clean = String::new();
        for chunk in split_text(&text, &cuts) {
            buffer.push_str(chunk);
            chunked_clean = chunked.process_content(&buffer);
        }

        prop_assert_eq!(chunked_clean, single_clean);
        let a = single.snapshot();
        let b = chunked.snapshot();
        prop_assert_eq!(a.version(), b.version());
        prop_assert_eq!(a.root_agent_ids(), b.root_agent_ids());
        for agent in a.agents() {
            let other = b.agent(&agent.id);
            prop_assert!(other.is_some());
            let other = other.unwrap();
            prop_assert_eq!(&agent.children, &other.children);
            prop_assert_eq!(agent.status, other.status);
            let left: Vec<_> = agent.messages.iter().map(|m| &m.content).collect();
            let right: Vec<_> = other.messages.iter().map(|m| &m.content).collect();
            prop_assert_eq!(left, right);
        }
    }
}
