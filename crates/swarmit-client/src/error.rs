//! Client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { status: 409, .. })
    }

    /// Map a job-store failure into the core error space.
    pub fn into_store_error(self) -> swarmit_core::Error {
        match self {
            e if e.is_not_found() => swarmit_core::Error::NotFound(e.to_string()),
            e if e.is_conflict() => swarmit_core::Error::Conflict(e.to_string()),
            e => swarmit_core::Error::Store(e.to_string()),
        }
    }

    /// Map an inference failure into the core error space.
    pub fn into_oracle_error(self) -> swarmit_core::Error {
        swarmit_core::Error::Oracle(self.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
