//! Check gate: the only place a caller may suspend waiting for mail.
//!
//! Two ways to read a mailbox:
//!
//! - [`CheckGate::poll`]: a zero-wait drain. Every non-blocking draft
//!   action calls it as a courtesy so new messages ride along with results.
//! - [`CheckGate::wait`]: suspends until the mailbox is non-empty or the
//!   optional timeout elapses. Backs `DraftSession::check` and mirrors the
//!   empty-mailbox wait of `SubscriptionChannel::next`.
//!
//! Waiting registers interest in the mailbox signal *before* draining, so an
//! append landing between the drain and the await still wakes the waiter.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::broker::MessageBroker;
use crate::error::{ChatError, Result};
use crate::message::Message;

/// Result of a suspending check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// At least one message was available.
    Delivered(Vec<Message>),
    /// The timeout elapsed with an empty mailbox.
    TimedOut,
}

impl CheckOutcome {
    pub fn messages(&self) -> &[Message] {
        match self {
            Self::Delivered(messages) => messages,
            Self::TimedOut => &[],
        }
    }

    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Delivered(messages) => messages,
            Self::TimedOut => Vec::new(),
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Mailbox reader bound to one participant.
///
/// A gate built with [`CheckGate::for_registration`] only reads the mailbox
/// while that registration is current; once the id is registered anew by
/// someone else it fails with `NotRegistered`.
#[derive(Debug, Clone)]
pub struct CheckGate {
    broker: Arc<MessageBroker>,
    id: String,
    epoch: Option<u64>,
}

impl CheckGate {
    pub fn new(broker: Arc<MessageBroker>, id: impl Into<String>) -> Self {
        Self {
            broker,
            id: id.into(),
            epoch: None,
        }
    }

    pub fn for_registration(broker: Arc<MessageBroker>, id: impl Into<String>, epoch: u64) -> Self {
        Self {
            broker,
            id: id.into(),
            epoch: Some(epoch),
        }
    }

    pub fn participant(&self) -> &str {
        &self.id
    }

    /// Drain whatever is available right now. Never suspends.
    pub fn poll(&self) -> Result<Vec<Message>> {
        self.broker.drain_as(&self.id, self.epoch)
    }

    /// Suspend until mail arrives or `timeout` elapses (`None` waits forever).
    ///
    /// Fails with `NotRegistered` once the participant's mailbox is gone.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<CheckOutcome> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let signal = self.broker.signal(&self.id)?;
            let notified = signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.broker.drain_as(&self.id, self.epoch)?;
            if !batch.is_empty() {
                return Ok(CheckOutcome::Delivered(batch));
            }
            if !self.broker.holds(&self.id, self.epoch) {
                return Err(ChatError::not_registered(&self.id));
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(CheckOutcome::TimedOut);
                    }
                }
                None => notified.await,
            }
        }
    }
}
