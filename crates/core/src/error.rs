//! Error types for RateLimit Core

use thiserror::Error;

use crate::state::StateId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Unknown key name: {0}")]
    UnknownKey(String),

    #[error("Malformed {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Misuse of the state stack; always a programming error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("No state registered for {0:?}")]
    Unregistered(StateId),

    #[error("State stack is empty")]
    EmptyStack,

    #[error("Cannot {action} state {state:?} while it is {status:?}")]
    Lifecycle {
        state: StateId,
        action: &'static str,
        status: crate::state::Status,
    },
}

impl Error {
    /// Wrap a serde_json failure with what was being decoded
    pub fn decode(what: &'static str, source: serde_json::Error) -> Self {
        Error::Decode { what, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
