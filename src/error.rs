//! Crate-wide error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    /// Missing or malformed request input.
    #[error("{0}")]
    InvalidInput(String),
    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),
    /// Vendor API failure, auth failure or missing vendor config.
    #[error("upstream: {0}")]
    Upstream(String),
    #[error("config: {0}")]
    Config(String),
    #[error("task: {0}")]
    Task(String),
}

impl HubError {
    pub fn invalid(msg: impl Into<String>) -> Self { Self::InvalidInput(msg.into()) }
    pub fn upstream(msg: impl Into<String>) -> Self { Self::Upstream(msg.into()) }
}

impl From<reqwest::Error> for HubError {
    fn from(e: reqwest::Error) -> Self { Self::Upstream(e.to_string()) }
}

pub type HubResult<T> = Result<T, HubError>;
