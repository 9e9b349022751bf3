// Error taxonomy for the service.
//
// - `PrimerParseError`: the `primer` query text is not a list of integers.
//   Propagates to the endpoint, which reports it as an unhandled failure.
// - `WindowError`: the primer already covers the requested duration. The
//   request pipeline logs it and produces no file; it never reaches the
//   client as an error of its own.
// - `ServiceError`: everything else, wrapping the model and sequence crates.

use pianoroll_model::ModelError;
use pianoroll_sequence::SequenceError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed primer pitch list {text:?}: {reason}")]
pub struct PrimerParseError {
    pub text: String,
    pub reason: String,
}

impl PrimerParseError {
    pub(crate) fn new(text: &str, reason: impl Into<String>) -> Self {
        PrimerParseError {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error(
    "priming sequence is longer than the total number of steps requested: \
     priming sequence length: {start_time}s, total length requested: {end_time}s"
)]
pub struct WindowError {
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    ConfigFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Primer(#[from] PrimerParseError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to start HTTP server: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
