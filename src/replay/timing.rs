use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A wait was cut short by its cancellation token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("replay cancelled")]
pub struct Cancelled;

/// Sleep for `duration` unless `cancel` fires first.
///
/// An already-cancelled token fails immediately, even for a zero duration.
pub async fn sleep(duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
