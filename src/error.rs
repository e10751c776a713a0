//! Error taxonomy for the chat core.
//!
//! Validation failures (`Conflict`, `NotRegistered`, `EmptyDraft`) are always
//! returned synchronously to the caller. Truncation and check timeouts are
//! not errors: they are reported through `AppendStatus::Truncated` and
//! `CheckOutcome::TimedOut`.

use thiserror::Error;

/// Errors returned by the broker, the talking stick and draft sessions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The id is already held by an active participant.
    #[error("participant '{id}' is already registered")]
    Conflict { id: String },

    /// The acting participant is unknown or no longer active.
    #[error("participant '{id}' is not registered")]
    NotRegistered { id: String },

    /// `push` was called with no committed fragments.
    #[error("draft is empty; append text before pushing")]
    EmptyDraft,

    /// The talking stick is held by someone else.
    #[error("talking stick is held by '{holder}'")]
    Denied { holder: String },

    /// The broker is shutting down.
    #[error("chat server is shutting down")]
    Unavailable,
}

impl ChatError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "conflict",
            Self::NotRegistered { .. } => "not_registered",
            Self::EmptyDraft => "empty_draft",
            Self::Denied { .. } => "denied",
            Self::Unavailable => "unavailable",
        }
    }

    pub(crate) fn not_registered(id: &str) -> Self {
        Self::NotRegistered { id: id.to_string() }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
