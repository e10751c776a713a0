//! "Waiting for a response" signals and their periodic reminders.
//!
//! Waiting is purely informational: it never blocks anyone. A participant
//! is marked waiting until somebody broadcasts a chat message; while the
//! mark stands, a reminder is re-broadcast every `waiting_reminder_secs`.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::MessageBroker;
use crate::error::{ChatError, Result};
use crate::message::Notice;

impl MessageBroker {
    /// Announce that `id` is waiting for a response.
    pub fn mark_waiting(&self, id: &str) -> Result<()> {
        self.mark_waiting_as(id, None)
    }

    pub(crate) fn mark_waiting_as(&self, id: &str, epoch: Option<u64>) -> Result<()> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(ChatError::Unavailable);
        }
        state.require_active(id, epoch)?;

        state.waiting.insert(id.to_string(), Instant::now());
        let notice = Notice::Waiting(id).into_message();
        state.fan_out(Some(id), &notice);
        self.publish(notice);
        drop(state);

        info!("{} is waiting for a response", id);
        Ok(())
    }

    /// Sorted ids of participants currently marked waiting.
    pub fn waiting(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state.waiting.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Re-announce every participant that has waited at least the reminder
    /// interval, restarting their timers. Returns how many were reminded.
    pub fn remind_waiting(&self) -> usize {
        self.remind_waiting_at(Instant::now())
    }

    pub(crate) fn remind_waiting_at(&self, now: Instant) -> usize {
        let threshold = self.config.waiting_reminder();
        let mut state = self.state.lock();
        if !state.running {
            return 0;
        }

        let mut due: Vec<String> = state
            .waiting
            .iter()
            .filter(|(_, since)| now.saturating_duration_since(**since) >= threshold)
            .map(|(id, _)| id.clone())
            .collect();
        due.sort();

        for id in &due {
            state.waiting.insert(id.clone(), now);
            let notice = Notice::StillWaiting(id).into_message();
            state.fan_out(Some(id), &notice);
            self.publish(notice);
        }
        drop(state);

        if !due.is_empty() {
            debug!("Reminded {} waiting participants", due.len());
        }
        due.len()
    }
}

/// Spawn the background task that periodically calls
/// [`MessageBroker::remind_waiting`]. Exits once the broker stops.
pub fn spawn_reminder_sweep(broker: Arc<MessageBroker>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = broker.config().reminder_sweep();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !broker.is_running() {
                break;
            }
            broker.remind_waiting();
        }
        debug!("Reminder sweep stopped");
    })
}
