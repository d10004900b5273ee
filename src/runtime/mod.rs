//! Chat runtimes a replay can drive.

mod local;
mod thread;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::replay::ReplayError;

pub use local::{LocalRuntime, StreamObserver};
pub use thread::{ThreadMessage, ThreadPart, ThreadRole};
pub(crate) use thread::AssistantAssembler;

/// Observable run state of a chat runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeState {
    /// An assistant turn is being produced
    pub is_running: bool,
    /// Number of assistant turns that have finished, for any reason
    pub completed_runs: u64,
}

/// A conversation that accepts user messages and produces assistant turns
#[async_trait]
pub trait ChatRuntime: Send + Sync {
    /// Append a user message and start the assistant turn answering it
    async fn append(&self, text: String) -> Result<(), ReplayError>;

    fn state(&self) -> RuntimeState;

    /// Watch for run state changes
    fn subscribe(&self) -> watch::Receiver<RuntimeState>;
}
