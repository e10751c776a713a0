//! In-process participant handle: a local draft plus the five chat actions.
//!
//! A `DraftSession` owns its participant's [`Draft`] exclusively and talks to
//! the shared [`MessageBroker`] only through its entry points. `append`,
//! `undo`, `reset` and `push` never suspend; each also performs a zero-wait
//! drain so newly arrived messages ride along with the action's result.
//! [`DraftSession::check`] is the one action that may suspend.
//!
//! A session is bound to the registration it created. If the participant is
//! unregistered from elsewhere, reports come back with `connected == false`
//! and broker actions fail with `NotRegistered`; a later registration of the
//! same id by someone else is never touched by this session, not even when
//! it is dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::broker::{ClaimOutcome, MessageBroker};
use crate::draft::{AppendStatus, Draft, UndoStatus};
use crate::error::{ChatError, Result};
use crate::gate::{CheckGate, CheckOutcome};
use crate::message::{render_batch, Message};

/// Result of one session action plus any messages drained alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport<T> {
    pub outcome: T,
    pub messages: Vec<Message>,
    /// Whether the session's registration was still current when the
    /// report was built.
    pub connected: bool,
}

impl<T> ActionReport<T> {
    fn new(outcome: T, messages: Vec<Message>, connected: bool) -> Self {
        Self {
            outcome,
            messages,
            connected,
        }
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    /// The drained messages as `[sender]: content` lines.
    pub fn render_messages(&self) -> String {
        render_batch(&self.messages)
    }
}

/// Identity of a pushed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReceipt {
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    /// Fragments discarded.
    pub cleared: usize,
    pub released_stick: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Delivered,
    TimedOut,
}

/// One participant's connection to the chat.
pub struct DraftSession {
    id: String,
    broker: Arc<MessageBroker>,
    epoch: u64,
    gate: CheckGate,
    draft: Draft,
    closed: bool,
}

impl std::fmt::Debug for DraftSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftSession")
            .field("id", &self.id)
            .field("epoch", &self.epoch)
            .field("draft", &self.draft)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl DraftSession {
    /// Register `id` and open a session for it.
    ///
    /// Draft limits come from the broker's configuration. The initial report
    /// carries a local note listing who is in the room.
    pub fn connect(broker: Arc<MessageBroker>, id: impl Into<String>) -> Result<(Self, ActionReport<()>)> {
        let id = id.into();
        let epoch = broker.register(&id)?;
        let config = broker.config();
        let draft = Draft::new(config.max_fragment_length, config.preview_length);

        let session = Self {
            gate: CheckGate::for_registration(Arc::clone(&broker), id.clone(), epoch),
            draft,
            id,
            epoch,
            broker,
            closed: false,
        };

        let roster = Message::notice(format!(
            "Current participants: {}",
            session.broker.participants().join(", ")
        ));
        let mut report = session.report(());
        report.messages.insert(0, roster);
        info!("Session opened for {} (registration {})", session.id, epoch);
        Ok((session, report))
    }

    pub fn participant(&self) -> &str {
        &self.id
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Whether this session's registration is still the current one.
    pub fn is_connected(&self) -> bool {
        !self.closed && self.broker.holds(&self.id, Some(self.epoch))
    }

    // -----------------------------------------------------------------------
    // Draft actions (never suspend)
    // -----------------------------------------------------------------------

    pub fn append(&mut self, text: &str) -> ActionReport<AppendStatus> {
        let status = self.draft.append(text);
        if let AppendStatus::Truncated { dropped, .. } = &status {
            debug!("{} appended a fragment, {} chars dropped", self.id, dropped);
        }
        self.report(status)
    }

    pub fn undo(&mut self) -> ActionReport<UndoStatus> {
        let status = self.draft.undo();
        self.report(status)
    }

    /// Broadcast the whole draft as one message.
    ///
    /// The draft is cleared only once the broadcast succeeds; a rejected
    /// push leaves it intact for a retry.
    pub fn push(&mut self) -> Result<ActionReport<PushReceipt>> {
        if self.draft.is_empty() {
            return Err(ChatError::EmptyDraft);
        }
        let message = self
            .broker
            .broadcast_as(&self.id, Some(self.epoch), &self.draft.text())?;
        self.draft.clear();

        let receipt = PushReceipt {
            id: message.id,
            timestamp: message.timestamp,
        };
        Ok(self.report(receipt))
    }

    /// Discard every fragment and release the talking stick if this
    /// participant holds it. Always succeeds.
    pub fn reset(&mut self) -> ActionReport<ResetOutcome> {
        let cleared = self.draft.fragments().len();
        self.draft.clear();
        let released_stick = self.broker.release_stick_as(&self.id, Some(self.epoch));
        self.report(ResetOutcome {
            cleared,
            released_stick,
        })
    }

    // -----------------------------------------------------------------------
    // Talking stick
    // -----------------------------------------------------------------------

    pub fn claim_stick(&mut self) -> Result<ActionReport<ClaimOutcome>> {
        let outcome = self.broker.claim_stick_as(&self.id, Some(self.epoch))?;
        Ok(self.report(outcome))
    }

    pub fn release_stick(&mut self) -> ActionReport<bool> {
        let released = self.broker.release_stick_as(&self.id, Some(self.epoch));
        self.report(released)
    }

    // -----------------------------------------------------------------------
    // Waiting
    // -----------------------------------------------------------------------

    /// Suspend until mail arrives or `timeout` elapses (`None` waits
    /// forever).
    ///
    /// If nothing has arrived after `announce_waiting_after_ms`, the other
    /// participants are told this one is waiting, once, and the wait goes on
    /// for the remainder of `timeout`.
    pub async fn check(&mut self, timeout: Option<Duration>) -> Result<ActionReport<CheckStatus>> {
        let announce_after = self.broker.config().announce_waiting_after();
        let started = Instant::now();

        let outcome = match timeout {
            Some(limit) if limit <= announce_after => self.gate.wait(Some(limit)).await?,
            _ => match self.gate.wait(Some(announce_after)).await? {
                CheckOutcome::TimedOut => {
                    self.broker.mark_waiting_as(&self.id, Some(self.epoch))?;
                    let rest = timeout.map(|limit| limit.saturating_sub(started.elapsed()));
                    self.gate.wait(rest).await?
                }
                delivered => delivered,
            },
        };

        let status = if outcome.is_timed_out() {
            CheckStatus::TimedOut
        } else {
            CheckStatus::Delivered
        };
        Ok(ActionReport::new(status, outcome.into_messages(), true))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Leave the chat. Dropping the session has the same effect. A session
    /// whose registration was already replaced leaves the new one alone.
    pub fn close(mut self) {
        self.leave();
    }

    fn leave(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.broker.unregister_if(&self.id, self.epoch) {
            info!("Session closed for {}", self.id);
        } else {
            debug!("Session for {} closed after its registration ended", self.id);
        }
    }

    /// Wrap `outcome` with a zero-wait drain and the registration status.
    fn report<T>(&self, outcome: T) -> ActionReport<T> {
        let messages = match self.gate.poll() {
            Ok(messages) => messages,
            Err(err) => {
                debug!("Courtesy drain for {} skipped: {}", self.id, err);
                Vec::new()
            }
        };
        let connected = self.broker.holds(&self.id, Some(self.epoch));
        if !connected {
            warn!("Session for {} is no longer registered", self.id);
        }
        ActionReport::new(outcome, messages, connected)
    }
}

impl Drop for DraftSession {
    fn drop(&mut self) {
        self.leave();
    }
}
