use thiserror::Error;

use crate::cassette::CassetteError;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("chat runtime closed its state channel")]
    RuntimeClosed,

    #[error("chat runtime is busy with another run")]
    Busy,

    #[error("replay already started")]
    AlreadyStarted,

    #[error(transparent)]
    Cassette(#[from] CassetteError),
}
