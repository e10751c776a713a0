//! Talking stick: an advisory single-holder speaking token.
//!
//! State machine `Free -> Held(id) -> Free`. The stick lives inside the
//! broker's state so claims, releases and the notices announcing them are
//! serialized with every other mailbox mutation.

use tracing::{debug, info};

use super::MessageBroker;
use crate::error::{ChatError, Result};
use crate::message::Notice;

/// Current holder of the talking stick, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TalkingStick {
    #[default]
    Free,
    Held(String),
}

/// Successful claim result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The stick was free and is now held by the caller.
    Granted,
    /// The caller already held the stick; nothing changed.
    AlreadyHeld,
}

impl TalkingStick {
    pub fn holder(&self) -> Option<&str> {
        match self {
            Self::Free => None,
            Self::Held(id) => Some(id),
        }
    }

    /// Try to take the stick for `id`.
    pub fn claim(&mut self, id: &str) -> Result<ClaimOutcome> {
        match self {
            Self::Free => {
                *self = Self::Held(id.to_string());
                Ok(ClaimOutcome::Granted)
            }
            Self::Held(holder) if holder == id => Ok(ClaimOutcome::AlreadyHeld),
            Self::Held(holder) => Err(ChatError::Denied {
                holder: holder.clone(),
            }),
        }
    }

    /// Free the stick if `id` holds it. Returns whether anything changed.
    pub fn release(&mut self, id: &str) -> bool {
        if self.holder() == Some(id) {
            *self = Self::Free;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Broker entry points
// ---------------------------------------------------------------------------

impl MessageBroker {
    /// Claim the talking stick for `id`.
    ///
    /// A fresh claim is announced to every other active participant.
    /// Re-claiming a stick already held by `id` is a silent success; a stick
    /// held by someone else yields `Denied`.
    pub fn claim_stick(&self, id: &str) -> Result<ClaimOutcome> {
        self.claim_stick_as(id, None)
    }

    pub(crate) fn claim_stick_as(&self, id: &str, epoch: Option<u64>) -> Result<ClaimOutcome> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(ChatError::Unavailable);
        }
        state.require_active(id, epoch)?;

        let outcome = match state.stick.claim(id) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!("Stick claim by '{}' denied: {}", id, err);
                return Err(err);
            }
        };
        if outcome == ClaimOutcome::AlreadyHeld {
            return Ok(outcome);
        }

        let notice = Notice::StickClaimed(id).into_message();
        state.fan_out(Some(id), &notice);
        self.publish(notice);
        drop(state);

        info!("Talking stick claimed by {}", id);
        Ok(outcome)
    }

    /// Release the stick if `id` holds it and announce the release.
    ///
    /// A no-op (returning `false`) when the stick is free or held by someone
    /// else.
    pub fn release_stick(&self, id: &str) -> bool {
        self.release_stick_as(id, None)
    }

    /// Like [`release_stick`](Self::release_stick), but a no-op unless
    /// `epoch`, if given, is `id`'s current registration.
    pub(crate) fn release_stick_as(&self, id: &str, epoch: Option<u64>) -> bool {
        let mut state = self.state.lock();
        if epoch.is_some() && !state.holds(id, epoch) {
            return false;
        }
        if !state.stick.release(id) {
            return false;
        }
        let notice = Notice::StickReleased(id).into_message();
        state.fan_out(Some(id), &notice);
        self.publish(notice);
        drop(state);

        info!("Talking stick released by {}", id);
        true
    }

    pub fn stick_holder(&self) -> Option<String> {
        self.state.lock().stick.holder().map(str::to_string)
    }
}
