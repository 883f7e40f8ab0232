use std::time::Duration;
use thiserror::Error;

/// Error taxonomy shared across the workspace.
///
/// An empty retrieval is not represented here: it is a valid outcome
/// (`Ok(vec![])`) feeding the fallback path, so the orchestrator can tell
/// "nothing relevant" apart from "retrieval broken".
#[derive(Debug, Error)]
pub enum LecternError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding provider failed: {0}")]
    Embedding(String),

    #[error("vector store failed: {0}")]
    Store(String),

    #[error("generation backend failed: {0}")]
    Generation(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, LecternError>;
