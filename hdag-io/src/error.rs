use std::io;
use thiserror::Error;

use hdag_core::{DagError, GenomeError};

/// Error type for hdag-io operations.
#[derive(Error, Debug)]
pub enum MadError {
    /// Wire or flat input that does not describe a valid history DAG.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The DAG lacks the label fields an operation needs.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Genome(#[from] GenomeError),

    #[error(transparent)]
    Dag(#[from] DagError),

    /// IO error occurred during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to decode protobuf data: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("Invalid load config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type alias for hdag-io operations.
pub type Result<T> = std::result::Result<T, MadError>;
