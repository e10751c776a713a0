//! # talkroom
//!
//! Turn-coordinated asynchronous chat for independent agents.
//!
//! Participants register with a shared [`MessageBroker`] and each gets a
//! mailbox. A message pushed by one participant is appended to every other
//! active mailbox, and each recipient drains it on its own schedule: either
//! through a long-lived [`SubscriptionChannel`] or through a [`DraftSession`]
//! whose non-blocking actions pick up new mail as a courtesy. Only
//! [`DraftSession::check`] suspends the caller.
//!
//! An advisory talking stick lets a participant announce it wants to speak,
//! and an agent can mark itself waiting for a response.

pub mod broker;
pub mod config;
pub mod draft;
pub mod error;
pub mod gate;
pub mod message;
pub mod server;
pub mod session;
pub mod subscription;

pub use broker::{ClaimOutcome, MessageBroker, TalkingStick};
pub use config::{ChatConfig, ServerConfig};
pub use draft::{AppendStatus, Draft, UndoStatus};
pub use error::{ChatError, Result};
pub use gate::{CheckGate, CheckOutcome};
pub use message::{Message, MessageKind};
pub use session::{ActionReport, CheckStatus, DraftSession, PushReceipt, ResetOutcome};
pub use subscription::{Delivery, SubscriptionChannel};

/// Crate version reported by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
