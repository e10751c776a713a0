//! Chat messages and server notices.
//!
//! A [`Message`] is immutable once created. Chat messages come only from a
//! successful push; system messages come only from server notices. The wire
//! shape is `{id, sender, content, timestamp, kind}` so renderers never need
//! to re-parse conversational text to tell the two apart.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender name used for every server-generated notice.
pub const SERVER_SENDER: &str = "Server";

/// Stable classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Text pushed by a participant.
    Chat,
    /// Notice generated by the server (join, leave, stick, waiting, shutdown).
    System,
}

/// A single delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
}

impl Message {
    /// A chat message from `sender`.
    pub fn chat(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::build(sender.into(), content.into(), MessageKind::Chat)
    }

    /// A server notice.
    pub fn notice(content: impl Into<String>) -> Self {
        Self::build(SERVER_SENDER.to_string(), content.into(), MessageKind::System)
    }

    fn build(sender: String, content: String, kind: MessageKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            content,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.sender, self.content)
    }
}

/// Render a batch as one `[sender]: content` line per message.
pub fn render_batch(messages: &[Message]) -> String {
    messages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Notice texts
// ---------------------------------------------------------------------------

/// Server notice payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice<'a> {
    Joined(&'a str),
    Left(&'a str),
    StickClaimed(&'a str),
    StickReleased(&'a str),
    Waiting(&'a str),
    StillWaiting(&'a str),
    StreamClosed(&'a str),
    Shutdown,
}

impl Notice<'_> {
    pub fn text(&self) -> String {
        match self {
            Self::Joined(id) => format!("{id} has joined the chat"),
            Self::Left(id) => format!("{id} has left the chat"),
            Self::StickClaimed(id) => {
                format!("{id} has claimed the talking stick and wants to speak")
            }
            Self::StickReleased(id) => format!("{id} has released the talking stick"),
            Self::Waiting(id) => format!("{id} is waiting for a response"),
            Self::StillWaiting(id) => format!("{id} is still waiting for a response"),
            Self::StreamClosed(id) => format!("{id} is no longer registered; closing stream"),
            Self::Shutdown => "Server shutting down...".to_string(),
        }
    }

    pub fn into_message(self) -> Message {
        Message::notice(self.text())
    }
}
