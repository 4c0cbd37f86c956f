//! Errors for the workload driver.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("I/O error reading workload stream: {0}")]
    Io(#[from] io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("workload stream ended mid-object")]
    TruncatedInput,

    #[error(transparent)]
    Core(#[from] rimm_core::CoreError),
}
