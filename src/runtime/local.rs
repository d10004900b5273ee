use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::agents::{ContentTracker, SubAgentStore};
use crate::replay::{ChatTransport, ReplayError, ReplayOutcome, ReplayStream, StreamEvent};
use crate::runtime::{AssistantAssembler, ChatRuntime, RuntimeState, ThreadMessage};

/// Callback invoked with every stream event of every run
pub type StreamObserver = Box<dyn Fn(&StreamEvent) + Send + Sync>;

/// In-process chat runtime backed by a [`ChatTransport`].
///
/// Each appended user message starts one run: the transport's stream is
/// consumed on a background task into an assistant message, and the text of
/// every text part is fed through the sub-agent store as it grows.
pub struct LocalRuntime {
    transport: Arc<dyn ChatTransport>,
    thread: Arc<Mutex<Vec<ThreadMessage>>>,
    state: Arc<watch::Sender<RuntimeState>>,
    store: Option<Arc<Mutex<SubAgentStore>>>,
    observers: Arc<Mutex<Vec<StreamObserver>>>,
    cancel: CancellationToken,
}

impl LocalRuntime {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        let (state, _) = watch::channel(RuntimeState::default());
        Self {
            transport,
            thread: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(state),
            store: None,
            observers: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Extract sub-agent events from assistant text into `store`
    pub fn with_store(mut self, store: Arc<Mutex<SubAgentStore>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a token shared with other components (e.g. a replay controller)
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_system_message(self, text: impl Into<String>) -> Self {
        self.thread.lock().push(ThreadMessage::system(text));
        self
    }

    pub fn on_stream_event<F>(&self, observer: F)
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.observers.lock().push(Box::new(observer));
    }

    /// Abort the in-flight run. The token stays cancelled, so later runs end
    /// immediately as well.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> Option<Arc<Mutex<SubAgentStore>>> {
        self.store.clone()
    }

    /// Messages recorded so far
    pub fn thread(&self) -> Vec<ThreadMessage> {
        self.thread.lock().clone()
    }
}

#[async_trait]
impl ChatRuntime for LocalRuntime {
    async fn append(&self, text: String) -> Result<(), ReplayError> {
        let accepted = self.state.send_if_modified(|state| {
            if state.is_running {
                return false;
            }
            state.is_running = true;
            true
        });
        if !accepted {
            return Err(ReplayError::Busy);
        }

        self.thread.lock().push(ThreadMessage::user(text));
        let stream = self.transport.send_messages(self.cancel.clone()).await;

        let run = Run {
            thread: self.thread.clone(),
            state: self.state.clone(),
            store: self.store.clone(),
            observers: self.observers.clone(),
        };
        tokio::spawn(run.consume(stream));
        Ok(())
    }

    fn state(&self) -> RuntimeState {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<RuntimeState> {
        self.state.subscribe()
    }
}

/// Everything a background run needs from its runtime
struct Run {
    thread: Arc<Mutex<Vec<ThreadMessage>>>,
    state: Arc<watch::Sender<RuntimeState>>,
    store: Option<Arc<Mutex<SubAgentStore>>>,
    observers: Arc<Mutex<Vec<StreamObserver>>>,
}

impl Run {
    async fn consume(self, mut stream: ReplayStream) {
        let mut assembler = AssistantAssembler::default();
        // One tracker per text part: each part is its own growing buffer
        let mut trackers: HashMap<usize, ContentTracker> = HashMap::new();

        while let Some(event) = stream.next_event().await {
            for observer in self.observers.lock().iter() {
                observer(&event);
            }

            let Some(index) = assembler.apply(&event) else {
                continue;
            };
            if let (Some(store), Some(text)) = (&self.store, assembler.text_at(index)) {
                let tracker = trackers.entry(index).or_default();
                store.lock().process_content_with(tracker, text);
            }
        }

        let outcome = stream.finish().await;
        if outcome == ReplayOutcome::Cancelled {
            tracing::debug!("Run cancelled");
        }

        if !assembler.is_empty() {
            self.thread.lock().push(assembler.finish());
        }
        self.state.send_modify(|state| {
            state.is_running = false;
            state.completed_runs += 1;
        });
    }
}
