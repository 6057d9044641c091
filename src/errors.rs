//! Centralised error type for the query library.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Collection not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Driver errors pass through untouched.
    #[error(transparent)]
    Connection(#[from] mongodb::error::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl QueryError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        QueryError::InvalidArgument(msg.into())
    }
}
