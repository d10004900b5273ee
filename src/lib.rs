pub mod agents;
pub mod cassette;
pub mod config;
pub mod replay;
pub mod runtime;
pub mod util;

pub use agents::{
    encode_marker, parse_agent_events, AgentExecutionTree, AgentStatus, AgentsConfig,
    ContentTracker, ParsedContent, SubAgentEvent, SubAgentState, SubAgentStore,
};
pub use cassette::{Cassette, CassetteError, CassetteMessage, CassettePart, CassetteRole};
pub use config::{Config, ConfigError};
pub use replay::{
    ChatTransport, ReplayController, ReplayError, ReplayOptions, ReplayOutcome, ReplayStream,
    ReplayTransport, StreamEvent,
};
pub use runtime::{ChatRuntime, LocalRuntime, RuntimeState, ThreadMessage};
