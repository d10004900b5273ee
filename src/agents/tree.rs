//! Execution tree of sub-agents observed during a session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::events::CompletionStatus;

/// Lifecycle status of a sub-agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
}

impl AgentStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, AgentStatus::Running)
    }
}

impl From<CompletionStatus> for AgentStatus {
    fn from(status: CompletionStatus) -> Self {
        match status {
            CompletionStatus::Succeeded => AgentStatus::Succeeded,
            CompletionStatus::Failed => AgentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentRole {
    Assistant,
    Tool,
}

/// One entry in a sub-agent's message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentMessage {
    pub id: String,
    pub role: SubAgentRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// State of a single sub-agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentState {
    pub id: String,
    /// `None` for root agents and for agents whose parent was never seen
    pub parent_id: Option<String>,
    pub name: String,
    pub description: String,
    pub task: String,
    pub status: AgentStatus,
    pub messages: Vec<SubAgentMessage>,
    /// Ids of spawned children, in spawn order
    pub children: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubAgentState {
    /// Create a running root agent with no messages
    pub fn new(id: impl Into<String>, name: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            name: name.into(),
            description: String::new(),
            task: task.into(),
            status: AgentStatus::Running,
            messages: Vec::new(),
            children: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.children = children;
        self
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    /// Message log entry for a tool call, if present
    pub fn tool_message(&self, tool_call_id: &str) -> Option<&SubAgentMessage> {
        self.messages
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some(tool_call_id))
    }
}

/// Immutable view of every known sub-agent.
///
/// Agent records are shared between successive snapshots; a record is copied
/// only when an event changes it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentExecutionTree {
    agents: HashMap<String, Arc<SubAgentState>>,
    root_agent_ids: Vec<String>,
    version: u64,
}

impl AgentExecutionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from pre-existing agents. Agents without a parent become
    /// roots, in input order.
    pub fn from_agents(initial: Vec<SubAgentState>) -> Self {
        let mut tree = Self::new();
        for agent in initial {
            if agent.parent_id.is_none() {
                tree.root_agent_ids.push(agent.id.clone());
            }
            tree.agents.insert(agent.id.clone(), Arc::new(agent));
        }
        tree
    }

    /// Monotonic counter bumped by every mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    pub fn agent(&self, agent_id: &str) -> Option<&SubAgentState> {
        self.agents.get(agent_id).map(Arc::as_ref)
    }

    pub fn agents(&self) -> impl Iterator<Item = &SubAgentState> {
        self.agents.values().map(Arc::as_ref)
    }

    pub fn root_agent_ids(&self) -> &[String] {
        &self.root_agent_ids
    }

    /// Root agents in spawn order. Ids without a record are skipped.
    pub fn root_agents(&self) -> Vec<&SubAgentState> {
        self.root_agent_ids
            .iter()
            .filter_map(|id| self.agent(id))
            .collect()
    }

    /// Children of an agent in spawn order; empty for unknown agents
    pub fn child_agents(&self, agent_id: &str) -> Vec<&SubAgentState> {
        let Some(agent) = self.agent(agent_id) else {
            return Vec::new();
        };
        agent
            .children
            .iter()
            .filter_map(|id| self.agent(id))
            .collect()
    }

    /// Distance from the nearest root (0 for roots); `None` for unknown or
    /// detached agents
    pub fn depth(&self, agent_id: &str) -> Option<usize> {
        let mut current = self.agent(agent_id)?;
        let mut depth = 0;
        while let Some(parent_id) = current.parent_id.as_deref() {
            current = self.agent(parent_id)?;
            depth += 1;
            if depth > self.agents.len() {
                return None;
            }
        }
        self.root_agent_ids
            .iter()
            .any(|id| id == &current.id)
            .then_some(depth)
    }

    pub(crate) fn insert(&mut self, agent: SubAgentState) {
        self.agents.insert(agent.id.clone(), Arc::new(agent));
    }

    pub(crate) fn push_root(&mut self, agent_id: String) {
        self.root_agent_ids.push(agent_id);
    }

    /// Mutable access to one record, cloning it first if a snapshot still
    /// shares it
    pub(crate) fn agent_mut(&mut self, agent_id: &str) -> Option<&mut SubAgentState> {
        self.agents.get_mut(agent_id).map(Arc::make_mut)
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
