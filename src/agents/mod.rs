pub mod events;
pub mod marker;
pub mod store;
pub mod tree;

pub use events::*;
pub use marker::{encode_marker, parse_agent_events, ParsedContent, MARKER_CLOSE, MARKER_OPEN};
pub use store::{AgentsConfig, ContentTracker, SubAgentStore, SubscriptionId};
pub use tree::{AgentExecutionTree, AgentStatus, SubAgentMessage, SubAgentRole, SubAgentState};
