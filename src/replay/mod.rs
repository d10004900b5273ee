//! Cassette playback: a transport that streams recorded assistant turns and
//! a controller that feeds recorded user turns into a chat runtime.

mod controller;
mod error;
mod stream;
pub mod timing;
mod transport;

use std::time::Duration;

pub use controller::ReplayController;
pub use error::ReplayError;
pub use stream::{ReplayOutcome, ReplayStream, SinkClosed, StreamEvent, StreamSink};
pub use transport::{ChatTransport, ReplayTransport, ReplayTurn};

/// Delay between a tool call and its recorded result
pub const TOOL_RESULT_DELAY: Duration = Duration::from_millis(300);

/// Pacing of a replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Pause after each streamed character
    pub typing_speed: Duration,
    /// Pause before each recorded user message is appended
    pub user_message_delay: Duration,
    /// Pause before the first part of an assistant turn
    pub assistant_start_delay: Duration,
    /// Pause between a tool call and its result
    pub tool_result_delay: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            typing_speed: Duration::from_millis(15),
            user_message_delay: Duration::from_millis(800),
            assistant_start_delay: Duration::from_millis(400),
            tool_result_delay: TOOL_RESULT_DELAY,
        }
    }
}

impl ReplayOptions {
    /// No pacing at all
    pub fn instant() -> Self {
        Self {
            typing_speed: Duration::ZERO,
            user_message_delay: Duration::ZERO,
            assistant_start_delay: Duration::ZERO,
            tool_result_delay: Duration::ZERO,
        }
    }

    pub fn with_typing_speed(mut self, typing_speed: Duration) -> Self {
        self.typing_speed = typing_speed;
        self
    }

    pub fn with_user_message_delay(mut self, delay: Duration) -> Self {
        self.user_message_delay = delay;
        self
    }

    pub fn with_assistant_start_delay(mut self, delay: Duration) -> Self {
        self.assistant_start_delay = delay;
        self
    }

    pub fn with_tool_result_delay(mut self, delay: Duration) -> Self {
        self.tool_result_delay = delay;
        self
    }
}
