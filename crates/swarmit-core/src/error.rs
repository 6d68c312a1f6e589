//! Error types for swarmit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("job store error: {0}")]
    Store(String),

    #[error("inference error: {0}")]
    Oracle(String),

    #[error("malformed oracle response after {attempts} attempts: {message}")]
    MalformedResponse { attempts: u32, message: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
