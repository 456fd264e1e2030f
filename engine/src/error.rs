//! Error taxonomy for the engine.
//!
//! Per-participant failures ([`TransportError`], [`PromptError`]) are recovered
//! inside a collection and degrade to "no answer". Only [`GameError`] crosses
//! the session lifecycle boundary.

use thiserror::Error;

/// A participant's connection failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection died while a response was outstanding.
    #[error("connection lost")]
    ConnectionLost,
    /// The outbound half is closed; nothing can be written.
    #[error("connection closed")]
    Closed,
}

/// A prompt could not make sense of a raw answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse answer for prompt {prompt}: {message}")]
pub struct PromptError {
    prompt: String,
    message: String,
}

impl PromptError {
    pub fn parse_failure(prompt: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum GameError {
    /// The session was asked to terminate. Callers unwind; this is not a fault.
    #[error("game is terminating")]
    Terminating,
    /// An ambient helper ran outside a game task.
    #[error("no game is bound to the current task")]
    NoCurrentGame,
    #[error("invalid input request: {0}")]
    InvalidRequest(String),
    /// Parse failure escalated because the game runs in debug mode.
    #[error(transparent)]
    Parse(#[from] PromptError),
    #[error("game left the running state without ending")]
    NotEnded,
    /// Anything else raised by the action processor.
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

impl GameError {
    /// Whether this error is the cooperative termination signal rather than a fault.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        matches!(self, Self::Terminating)
    }
}
