//! Integration tests for cassette playback
//!
//! Tests the flow: Cassette -> ReplayController -> LocalRuntime ->
//! ReplayTransport -> stream events / recorded thread / sub-agent tree

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use gram_replay::agents::{AgentStatus, AgentsConfig, CompletionStatus, SubAgentRole};
use gram_replay::{
    Cassette, ChatRuntime, LocalRuntime, ReplayController, ReplayOptions, ReplayOutcome,
    ReplayTransport, StreamEvent, SubAgentStore,
};

use super::common::{cassette, cassette_with_agent_text, AgentScript, HI_OK_CASSETTE, MULTI_TURN_CASSETTE};

struct Harness {
    controller: ReplayController,
    runtime: LocalRuntime,
    store: Arc<Mutex<SubAgentStore>>,
    events: Arc<Mutex<Vec<StreamEvent>>>,
}

fn harness(cassette: Cassette, options: ReplayOptions) -> Harness {
    let cassette = Arc::new(cassette);
    let controller = ReplayController::new(cassette.clone(), options);
    let store = Arc::new(Mutex::new(SubAgentStore::new(AgentsConfig::default())));
    let runtime = LocalRuntime::new(Arc::new(ReplayTransport::new(cassette, options)))
        .with_store(store.clone())
        .with_cancel_token(controller.cancel_token());

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    runtime.on_stream_event(move |event| sink.lock().push(event.clone()));

    Harness {
        controller,
        runtime,
        store,
        events,
    }
}

fn event_types(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type_name()).collect()
}

/// `hi` -> `ok` streams two characters and completes exactly once
#[tokio::test(start_paused = true)]
async fn test_hi_ok_cassette_streams_characters_and_completes_once() {
    let h = harness(cassette(HI_OK_CASSETTE), ReplayOptions::default());
    let completions = Arc::new(AtomicUsize::new(0));
    let counter = completions.clone();
    h.controller.on_complete(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let outcome = h.controller.run(&h.runtime).await.unwrap();

    assert_eq!(outcome, ReplayOutcome::Completed);
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    let events = h.events.lock().clone();
    assert_eq!(
        event_types(&events),
        vec!["text-start", "text-delta", "text-delta", "text-end"]
    );
    let deltas: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec!["o", "k"]);
}

/// Replay then record reproduces the cassette, part for part
#[tokio::test(start_paused = true)]
async fn test_replay_round_trips_through_recording() {
    let source = cassette(MULTI_TURN_CASSETTE);
    let h = harness(source.clone(), ReplayOptions::default());

    let outcome = h.controller.run(&h.runtime).await.unwrap();
    assert_eq!(outcome, ReplayOutcome::Completed);

    let recorded = Cassette::record(&h.runtime.thread());
    assert_eq!(recorded, source);
    assert_eq!(h.runtime.state().completed_runs, 2);
}

/// The open tool call never gets an output event
#[tokio::test]
async fn test_tool_call_without_result_stays_open() {
    let h = harness(cassette(MULTI_TURN_CASSETTE), ReplayOptions::instant());
    h.controller.run(&h.runtime).await.unwrap();

    let events = h.events.lock().clone();
    let outputs: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolOutputAvailable { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(outputs, vec!["call-1", "call-2"]);
}

/// Markers inside replayed assistant text build the execution tree
#[tokio::test]
async fn test_replayed_markers_build_execution_tree() {
    let script = AgentScript::new()
        .spawn("planner", None)
        .delta("planner", "Splitting ")
        .delta("planner", "work")
        .spawn("coder", Some("planner"))
        .tool_call("coder", "t1", "write_file")
        .tool_result("coder", "t1", "disk full", true)
        .complete("coder", CompletionStatus::Failed)
        .complete("planner", CompletionStatus::Succeeded);
    let text = format!("Working on it. {} All done.", script.to_marker_text());

    let h = harness(cassette_with_agent_text("go", &text), ReplayOptions::instant());
    h.controller.run(&h.runtime).await.unwrap();

    let store = h.store.lock();
    let tree = store.snapshot();
    assert_eq!(tree.root_agent_ids(), &["planner".to_string()]);

    let planner = tree.agent("planner").unwrap();
    assert_eq!(planner.status, AgentStatus::Succeeded);
    assert_eq!(planner.children, vec!["coder".to_string()]);
    assert_eq!(planner.messages.len(), 1);
    assert_eq!(planner.messages[0].content, "Splitting work");

    let coder = tree.agent("coder").unwrap();
    assert_eq!(coder.parent_id.as_deref(), Some("planner"));
    assert_eq!(coder.status, AgentStatus::Failed);
    assert_eq!(coder.error.as_deref(), Some("coder failed"));
    assert_eq!(coder.messages[0].role, SubAgentRole::Tool);
    assert_eq!(coder.messages[0].content, "Error: disk full");
    assert_eq!(tree.depth("coder"), Some(1));
    assert_eq!(tree.version(), script.events().len() as u64);

    // The thread keeps the raw text, markers included
    let thread = h.runtime.thread();
    let recorded = Cassette::record(&thread);
    assert_eq!(recorded.messages[1].content[0], gram_replay::CassettePart::text(text));
}

/// Cancelling mid-turn stops the loop and suppresses the completion callback
#[tokio::test(start_paused = true)]
async fn test_cancel_mid_turn_skips_remaining_turns() {
    let h = harness(cassette(MULTI_TURN_CASSETTE), ReplayOptions::default());
    let completions = Arc::new(AtomicUsize::new(0));
    let counter = completions.clone();
    h.controller.on_complete(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let cancel = h.controller.cancel_token();
    tokio::spawn(async move {
        // User delay (800ms) + assistant start (400ms) + a little reasoning
        tokio::time::sleep(Duration::from_millis(1250)).await;
        cancel.cancel();
    });

    let outcome = h.controller.run(&h.runtime).await.unwrap();

    assert_eq!(outcome, ReplayOutcome::Cancelled);
    assert_eq!(completions.load(Ordering::SeqCst), 0);

    let events = h.events.lock().clone();
    assert_eq!(events[0].event_type_name(), "reasoning-start");
    assert!(events.iter().all(|e| e.event_type_name() != "reasoning-end"));
    assert!(events
        .iter()
        .all(|e| !matches!(e, StreamEvent::ToolInputAvailable { .. })));

    // Only the first user turn was appended
    let thread = h.runtime.thread();
    assert_eq!(thread.len(), 2);
}

/// A cassette saved to disk replays the same as the in-memory original
#[tokio::test]
async fn test_saved_cassette_replays_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let source = cassette(MULTI_TURN_CASSETTE);
    source.save(&path).unwrap();

    let controller = ReplayController::load(&path, ReplayOptions::instant()).unwrap();
    let runtime = LocalRuntime::new(Arc::new(ReplayTransport::new(
        controller.cassette(),
        controller.options(),
    )));
    controller.run(&runtime).await.unwrap();

    assert_eq!(Cassette::record(&runtime.thread()), source);
}
