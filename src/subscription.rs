//! Long-lived per-participant delivery channel.
//!
//! A [`SubscriptionChannel`] is pulled by its transport: each call to
//! [`SubscriptionChannel::next`] waits on the mailbox signal, drains the
//! mailbox and hands the batch over in drain order. When the mailbox stays
//! empty for a keepalive interval a [`Delivery::Keepalive`] is returned
//! instead so the transport can detect a stale connection.
//!
//! The mailbox is drained only when the transport asks for its next item, so
//! nothing is taken from it ahead of the reader. A transport that goes away
//! simply stops pulling and every undelivered message stays in the mailbox
//! for the next connection.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use tracing::{debug, info};

use crate::broker::MessageBroker;
use crate::error::{ChatError, Result};
use crate::message::{Message, Notice};

/// One item handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Messages drained in one swap, oldest first.
    Batch(Vec<Message>),
    /// Nothing arrived within the keepalive interval.
    Keepalive,
    /// Final notice; the channel yields nothing after it.
    Closed(Message),
}

/// Delivery channel for one participant.
#[derive(Debug)]
pub struct SubscriptionChannel {
    broker: Arc<MessageBroker>,
    participant: String,
    keepalive: Duration,
    closed: bool,
}

impl SubscriptionChannel {
    /// Open a delivery channel for an active participant.
    pub fn open(broker: Arc<MessageBroker>, participant: impl Into<String>) -> Result<Self> {
        let participant = participant.into();
        if !broker.is_active(&participant) {
            return Err(ChatError::NotRegistered { id: participant });
        }

        let keepalive = broker.config().keepalive_interval();
        info!("Delivery channel opened for {}", participant);
        Ok(Self {
            broker,
            participant,
            keepalive,
            closed: false,
        })
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Next delivery, or `None` once the channel has closed.
    ///
    /// Cancel safe: dropping the future before it completes leaves the
    /// mailbox untouched.
    pub async fn next(&mut self) -> Option<Delivery> {
        if self.closed {
            return None;
        }

        loop {
            let Ok(signal) = self.broker.signal(&self.participant) else {
                return Some(self.close());
            };
            let notified = signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.broker.drain(&self.participant) {
                Ok(batch) if !batch.is_empty() => return Some(Delivery::Batch(batch)),
                Ok(_) => {}
                Err(_) => return Some(self.close()),
            }

            if !self.broker.is_active(&self.participant) {
                return Some(self.close());
            }

            tokio::select! {
                _ = notified.as_mut() => {}
                _ = tokio::time::sleep(self.keepalive) => return Some(Delivery::Keepalive),
            }
        }
    }

    /// Adapt the channel into a stream for a streaming transport. The stream
    /// ends after the final [`Delivery::Closed`].
    pub fn into_stream(self) -> impl Stream<Item = Delivery> + Send {
        stream::unfold(self, |mut channel| async move {
            let delivery = channel.next().await?;
            Some((delivery, channel))
        })
    }

    fn close(&mut self) -> Delivery {
        self.closed = true;
        info!("Delivery channel closed for {}", self.participant);
        Delivery::Closed(Notice::StreamClosed(&self.participant).into_message())
    }
}

impl Drop for SubscriptionChannel {
    fn drop(&mut self) {
        if !self.closed {
            debug!("Transport for {} went away; mailbox left intact", self.participant);
        }
    }
}
