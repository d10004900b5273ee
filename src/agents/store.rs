//! Owner of the sub-agent execution tree.
//!
//! All mutation goes through [`SubAgentStore::handle_event`]. Readers take
//! [`SubAgentStore::snapshot`]s or register subscribers; a snapshot handed out
//! is never modified afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::agents::events::{
    CompleteEvent, DeltaEvent, SpawnEvent, SubAgentEvent, ToolCallEvent, ToolResultEvent,
};
use crate::agents::marker::parse_agent_events;
use crate::agents::tree::{
    AgentExecutionTree, AgentStatus, SubAgentMessage, SubAgentRole, SubAgentState,
};

/// Sub-agent display behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentsConfig {
    /// Expand every agent as soon as it is spawned
    pub auto_expand_sub_agents: bool,
}

pub type SubscriptionId = u64;

type Subscriber = Box<dyn Fn(&Arc<AgentExecutionTree>) + Send + Sync>;

/// Remembers which events of one growing text buffer were already applied.
///
/// Deltas are keyed by their position among the same agent's deltas in the
/// buffer, so identical deltas are each applied once and a re-parse of the
/// same buffer applies nothing. Other events use [`SubAgentEvent::event_key`].
#[derive(Debug, Clone, Default)]
pub struct ContentTracker {
    applied: HashSet<String>,
}

impl ContentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn reset(&mut self) {
        self.applied.clear();
    }

    /// Filter the events of one parse down to those not applied before,
    /// marking them applied. Order is preserved.
    pub fn take_unapplied(&mut self, events: Vec<SubAgentEvent>) -> Vec<SubAgentEvent> {
        let mut delta_seq: HashMap<String, usize> = HashMap::new();
        events
            .into_iter()
            .filter(|event| {
                let key = match event {
                    SubAgentEvent::Delta(delta) => {
                        let seq = delta_seq.entry(delta.agent_id.clone()).or_default();
                        let key = format!("delta:{}#{}", delta.agent_id, seq);
                        *seq += 1;
                        key
                    }
                    other => other.event_key(),
                };
                self.applied.insert(key)
            })
            .collect()
    }
}

/// Holds the execution tree plus the orthogonal expand/collapse state.
pub struct SubAgentStore {
    tree: Arc<AgentExecutionTree>,
    expanded: HashSet<String>,
    config: AgentsConfig,
    tracker: ContentTracker,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
}

impl SubAgentStore {
    pub fn new(config: AgentsConfig) -> Self {
        Self {
            tree: Arc::new(AgentExecutionTree::new()),
            expanded: HashSet::new(),
            config,
            tracker: ContentTracker::new(),
            subscribers: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Start from pre-existing agents (inspection and tests)
    pub fn with_initial_agents(config: AgentsConfig, initial: Vec<SubAgentState>) -> Self {
        let mut store = Self::new(config);
        if config.auto_expand_sub_agents {
            store.expanded = initial.iter().map(|a| a.id.clone()).collect();
        }
        store.tree = Arc::new(AgentExecutionTree::from_agents(initial));
        store
    }

    pub fn config(&self) -> AgentsConfig {
        self.config
    }

    /// Current tree. Later mutations never show up in a returned snapshot.
    pub fn snapshot(&self) -> Arc<AgentExecutionTree> {
        Arc::clone(&self.tree)
    }

    pub fn agent(&self, agent_id: &str) -> Option<&SubAgentState> {
        self.tree.agent(agent_id)
    }

    pub fn root_agents(&self) -> Vec<&SubAgentState> {
        self.tree.root_agents()
    }

    pub fn child_agents(&self, agent_id: &str) -> Vec<&SubAgentState> {
        self.tree.child_agents(agent_id)
    }

    /// Register a callback invoked with the new snapshot after each mutation
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&Arc<AgentExecutionTree>) + Send + Sync + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    pub fn toggle_expanded(&mut self, agent_id: &str) {
        if !self.expanded.remove(agent_id) {
            self.expanded.insert(agent_id.to_string());
        }
    }

    pub fn is_expanded(&self, agent_id: &str) -> bool {
        self.expanded.contains(agent_id)
    }

    pub fn expanded_agents(&self) -> HashSet<String> {
        self.expanded.clone()
    }

    /// Apply one event to the tree. Events referring to unknown agents,
    /// parents or tool calls leave the tree (and its version) untouched.
    pub fn handle_event(&mut self, event: SubAgentEvent) {
        if let Some(reason) = rejection(&self.tree, &event) {
            tracing::debug!(
                agent_id = %event.agent_id(),
                event = event.event_type_name(),
                "ignoring agent event: {reason}"
            );
            return;
        }

        let tree = Arc::make_mut(&mut self.tree);
        match event {
            SubAgentEvent::Spawn(spawn) => {
                if self.config.auto_expand_sub_agents {
                    self.expanded.insert(spawn.agent_id.clone());
                }
                apply_spawn(tree, spawn);
            }
            SubAgentEvent::Delta(delta) => apply_delta(tree, delta),
            SubAgentEvent::ToolCall(call) => apply_tool_call(tree, call),
            SubAgentEvent::ToolResult(result) => apply_tool_result(tree, result),
            SubAgentEvent::Complete(complete) => apply_complete(tree, complete),
        }
        tree.bump_version();
        self.notify();
    }

    /// Extract markers from the accumulated text of the store's default
    /// buffer, apply the events not seen before and return the clean text.
    pub fn process_content(&mut self, content: &str) -> String {
        let mut tracker = std::mem::take(&mut self.tracker);
        let clean = self.process_content_with(&mut tracker, content);
        self.tracker = tracker;
        clean
    }

    /// Like [`process_content`](Self::process_content) for a buffer whose
    /// applied events are tracked by the caller.
    pub fn process_content_with(&mut self, tracker: &mut ContentTracker, content: &str) -> String {
        let parsed = parse_agent_events(content);
        for event in tracker.take_unapplied(parsed.events) {
            self.handle_event(event);
        }
        parsed.clean_content
    }

    /// Drop every agent, the expanded set and the default buffer's history
    pub fn clear(&mut self) {
        let mut empty = AgentExecutionTree::new();
        empty.set_version(self.tree.version() + 1);
        self.tree = Arc::new(empty);
        self.expanded.clear();
        self.tracker.reset();
        self.notify();
    }

    fn notify(&self) {
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.tree);
        }
    }
}

impl Default for SubAgentStore {
    fn default() -> Self {
        Self::new(AgentsConfig::default())
    }
}

/// Why an event cannot be applied to the tree, if it cannot
fn rejection(tree: &AgentExecutionTree, event: &SubAgentEvent) -> Option<&'static str> {
    match event {
        SubAgentEvent::Spawn(spawn) if tree.contains(&spawn.agent_id) => Some("duplicate spawn"),
        SubAgentEvent::Spawn(_) => None,
        SubAgentEvent::ToolResult(result) => match tree.agent(&result.agent_id) {
            None => Some("unknown agent"),
            Some(agent) if agent.tool_message(&result.tool_call_id).is_none() => {
                Some("no matching tool call")
            }
            Some(_) => None,
        },
        other if !tree.contains(other.agent_id()) => Some("unknown agent"),
        _ => None,
    }
}

fn apply_spawn(tree: &mut AgentExecutionTree, spawn: SpawnEvent) {
    let parent_id = spawn.parent_id.filter(|p| !p.is_empty());
    let agent_id = spawn.agent_id;

    let mut attached_parent = None;
    match parent_id {
        Some(parent_id) => match tree.agent_mut(&parent_id) {
            Some(parent) => {
                parent.children.push(agent_id.clone());
                attached_parent = Some(parent_id);
            }
            None => {
                // Parent never spawned: the agent stays reachable by id only
                tracing::debug!(
                    agent_id = %agent_id,
                    parent_id = %parent_id,
                    "spawn references unknown parent"
                );
            }
        },
        None => tree.push_root(agent_id.clone()),
    }

    tree.insert(SubAgentState {
        id: agent_id,
        parent_id: attached_parent,
        name: spawn.name,
        description: spawn.description,
        task: spawn.task,
        status: AgentStatus::Running,
        messages: Vec::new(),
        children: Vec::new(),
        started_at: Utc::now(),
        completed_at: None,
        result: None,
        error: None,
    });
}

fn apply_delta(tree: &mut AgentExecutionTree, delta: DeltaEvent) {
    let Some(agent) = tree.agent_mut(&delta.agent_id) else {
        return;
    };

    match agent.messages.last_mut() {
        Some(last) if last.role == SubAgentRole::Assistant => {
            last.content.push_str(&delta.content);
        }
        _ => agent.messages.push(SubAgentMessage {
            id: format!("msg-{}", Uuid::new_v4()),
            role: SubAgentRole::Assistant,
            content: delta.content,
            tool_name: None,
            tool_call_id: None,
            timestamp: Utc::now(),
        }),
    }
}

fn apply_tool_call(tree: &mut AgentExecutionTree, call: ToolCallEvent) {
    let Some(agent) = tree.agent_mut(&call.agent_id) else {
        return;
    };

    agent.messages.push(SubAgentMessage {
        id: call.tool_call_id.clone(),
        role: SubAgentRole::Tool,
        content: format!("Calling {}...", call.tool_name),
        tool_name: Some(call.tool_name),
        tool_call_id: Some(call.tool_call_id),
        timestamp: Utc::now(),
    });
}

fn apply_tool_result(tree: &mut AgentExecutionTree, result: ToolResultEvent) {
    let Some(agent) = tree.agent_mut(&result.agent_id) else {
        return;
    };

    let content = if result.is_error {
        format!("Error: {}", result.result)
    } else {
        result.result
    };
    for message in agent
        .messages
        .iter_mut()
        .filter(|m| m.tool_call_id.as_deref() == Some(result.tool_call_id.as_str()))
    {
        message.content = content.clone();
    }
}

fn apply_complete(tree: &mut AgentExecutionTree, complete: CompleteEvent) {
    let Some(agent) = tree.agent_mut(&complete.agent_id) else {
        return;
    };

    agent.status = complete.status.into();
    agent.result = complete.result;
    agent.error = complete.error;
    agent.completed_at = Some(Utc::now());
}
