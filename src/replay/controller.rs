use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cassette::{Cassette, CassetteRole};
use crate::replay::error::ReplayError;
use crate::replay::stream::ReplayOutcome;
use crate::replay::timing::sleep;
use crate::replay::ReplayOptions;
use crate::runtime::{ChatRuntime, RuntimeState};

type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Drives a chat runtime through a cassette's user turns.
///
/// Share [`cancel_token`](Self::cancel_token) with the runtime's transport so
/// that one cancellation stops both the loop and the in-flight turn.
pub struct ReplayController {
    cassette: Arc<Cassette>,
    options: ReplayOptions,
    cancel: CancellationToken,
    on_complete: Mutex<Option<CompletionCallback>>,
    started: AtomicBool,
}

impl ReplayController {
    pub fn new(cassette: Arc<Cassette>, options: ReplayOptions) -> Self {
        Self {
            cassette,
            options,
            cancel: CancellationToken::new(),
            on_complete: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Load the cassette from a JSON file
    pub fn load(path: &Path, options: ReplayOptions) -> Result<Self, ReplayError> {
        let cassette = Cassette::load(path)?;
        Ok(Self::new(Arc::new(cassette), options))
    }

    pub fn cassette(&self) -> Arc<Cassette> {
        self.cassette.clone()
    }

    pub fn options(&self) -> ReplayOptions {
        self.options
    }

    /// Called once after every user turn has been replayed. Never called when
    /// the replay is cancelled. Replaces any earlier callback.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.on_complete.lock() = Some(Box::new(callback));
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Replay every user turn into `runtime`, waiting for each assistant turn
    /// to finish before moving on. A controller runs at most once.
    pub async fn run(&self, runtime: &dyn ChatRuntime) -> Result<ReplayOutcome, ReplayError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ReplayError::AlreadyStarted);
        }

        tracing::info!(turns = self.cassette.user_turns(), "Starting replay");
        let mut state = runtime.subscribe();
        let user_turns = self
            .cassette
            .messages
            .iter()
            .filter(|m| m.role == CassetteRole::User);

        for (turn, message) in user_turns.enumerate() {
            if self.cancel.is_cancelled() {
                tracing::debug!(turn, "Replay cancelled before turn");
                return Ok(ReplayOutcome::Cancelled);
            }
            if sleep(self.options.user_message_delay, &self.cancel)
                .await
                .is_err()
            {
                tracing::debug!(turn, "Replay cancelled during user message delay");
                return Ok(ReplayOutcome::Cancelled);
            }

            let baseline = state.borrow_and_update().completed_runs;
            tracing::info!(turn, "Replaying user message");
            runtime.append(message.user_text()).await?;
            wait_for_turn(&mut state, baseline).await?;
        }

        tracing::info!("Replay complete");
        if let Some(callback) = self.on_complete.lock().take() {
            callback();
        }
        Ok(ReplayOutcome::Completed)
    }
}

/// Wait for the run started by the last append to finish.
///
/// A run may start and finish before the first state check, so "started" is
/// also satisfied by the completed-run counter moving past `baseline`.
async fn wait_for_turn(
    state: &mut watch::Receiver<RuntimeState>,
    baseline: u64,
) -> Result<(), ReplayError> {
    state
        .wait_for(|s| s.is_running || s.completed_runs > baseline)
        .await
        .map_err(|_| ReplayError::RuntimeClosed)?;
    state
        .wait_for(|s| !s.is_running)
        .await
        .map_err(|_| ReplayError::RuntimeClosed)?;
    Ok(())
}
