//! Error types for the RateLimit client binary

use ratelimit_core::StateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Net(#[from] ratelimit_net::Error),

    #[error(transparent)]
    Core(#[from] ratelimit_core::Error),

    #[error("State machine error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not determine the {0} directory")]
    NoProjectDirs(&'static str),
}

impl AppError {
    /// The server could not be reached or turned us away
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, AppError::Net(e) if e.is_connect_failure())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
