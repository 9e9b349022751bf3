// Errors for bundle loading, model configuration, and generation.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read bundle {path}: {source}")]
    BundleIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed bundle {path}: {source}")]
    BundleFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no model configuration for generator id '{0}'")]
    UnknownGeneratorId(String),

    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error(transparent)]
    HParams(#[from] HParamsError),

    #[error("invalid generator options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HParamsError {
    #[error("malformed hparams entry '{0}', expected name=value")]
    Malformed(String),

    #[error("unknown hparam '{0}'")]
    UnknownName(String),

    #[error("could not parse '{value}' for hparam '{name}' as {expected}")]
    TypeMismatch {
        name: String,
        value: String,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
