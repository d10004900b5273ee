use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or saving cassette files
#[derive(Error, Debug)]
pub enum CassetteError {
    #[error("failed to access cassette file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cassette JSON: {0}")]
    Json(#[from] serde_json::Error),
}
