use thiserror::Error;

use crate::grid::AgentId;

/// Errors raised by the simulation kernel.
///
/// Configuration and sequencing errors always reach the caller. Malformed
/// actions are recovered inside a tick as a penalized stay and only surface
/// through [`crate::resolver::Rejection::InvalidAction`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Action index {0} is not in the legal action set")]
    InvalidAction(usize),

    #[error("Unknown or inactive agent: {0}")]
    UnknownAgent(AgentId),
}

impl GridError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        GridError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        GridError::InvalidState(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GridError>;
