//! Message broker: participant registry, mailboxes and broadcast delivery.
//!
//! All shared chat state (the mailbox map, the talking stick and the waiting
//! marks) lives in one [`BrokerState`] aggregate behind a single
//! `parking_lot::Mutex`. Every public operation takes the lock once, does
//! bounded work (at most O(participants)) and returns; nothing awaits while
//! holding it. One coarse lock keeps per-mailbox ordering trivially
//! linearizable and is cheap for the handful of participants a chat room
//! has; a per-mailbox lock would only pay off with many concurrent senders.
//! Feed publication happens under the same lock, so observers see messages
//! in the order mailboxes received them.
//!
//! Every successful `register`/`reconnect` hands out a registration epoch.
//! Entry points ending in `_as` take an optional epoch and refuse to act for
//! a registration that has since been replaced by a newer one of the same id.
//!
//! Callers that want to suspend until mail arrives use the mailbox signal
//! (see [`crate::gate`] and [`crate::subscription`]); the broker itself
//! never blocks.

mod mailbox;
pub mod stick;
pub mod waiting;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::message::{Message, Notice};

use mailbox::Mailbox;
pub use stick::{ClaimOutcome, TalkingStick};
pub use waiting::spawn_reminder_sweep;

/// The single owned aggregate of shared chat state.
#[derive(Debug)]
struct BrokerState {
    mailboxes: HashMap<String, Mailbox>,
    stick: TalkingStick,
    waiting: HashMap<String, Instant>,
    running: bool,
    last_epoch: u64,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            mailboxes: HashMap::new(),
            stick: TalkingStick::default(),
            waiting: HashMap::new(),
            running: true,
            last_epoch: 0,
        }
    }

    fn issue_epoch(&mut self) -> u64 {
        self.last_epoch += 1;
        self.last_epoch
    }

    fn is_active(&self, id: &str) -> bool {
        self.holds(id, None)
    }

    /// `id` is active and, if `epoch` is given, still under that registration.
    fn holds(&self, id: &str, epoch: Option<u64>) -> bool {
        self.mailboxes
            .get(id)
            .is_some_and(|mailbox| mailbox.is_active() && epoch.map_or(true, |e| mailbox.epoch() == e))
    }

    fn require_active(&self, id: &str, epoch: Option<u64>) -> Result<()> {
        if self.holds(id, epoch) {
            Ok(())
        } else {
            Err(ChatError::not_registered(id))
        }
    }

    /// Append `message` to every active mailbox except `skip`'s.
    ///
    /// The active set is read under the same lock as the appends, so the
    /// snapshot and the fan-out are one atomic step.
    fn fan_out(&mut self, skip: Option<&str>, message: &Message) -> usize {
        let mut delivered = 0;
        for (id, mailbox) in self.mailboxes.iter_mut() {
            if !mailbox.is_active() || skip == Some(id.as_str()) {
                continue;
            }
            mailbox.push(message.clone());
            delivered += 1;
        }
        delivered
    }
}

// ---------------------------------------------------------------------------
// MessageBroker
// ---------------------------------------------------------------------------

/// Owns the participant registry and per-participant mailboxes.
///
/// Shared as `Arc<MessageBroker>` between the transport, delivery loops and
/// in-process draft sessions.
pub struct MessageBroker {
    state: Mutex<BrokerState>,
    feed: broadcast::Sender<Message>,
    config: ChatConfig,
}

impl std::fmt::Debug for MessageBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBroker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for MessageBroker {
    fn default() -> Self {
        Self::new(ChatConfig::default())
    }
}

impl MessageBroker {
    pub fn new(config: ChatConfig) -> Self {
        let (feed, _) = broadcast::channel(config.feed_capacity.max(1));
        Self {
            state: Mutex::new(BrokerState::new()),
            feed,
            config,
        }
    }

    /// Convenience constructor returning the broker already wrapped in an `Arc`.
    pub fn shared(config: ChatConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register `id` with a fresh, empty mailbox and announce the join to
    /// every other active participant. Returns the registration epoch.
    ///
    /// Fails with `Conflict` if `id` is currently active. An id whose
    /// mailbox is still retained after unregistering may register again;
    /// its undrained messages are discarded (use [`reconnect`](Self::reconnect)
    /// to keep them).
    pub fn register(&self, id: &str) -> Result<u64> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(ChatError::Unavailable);
        }
        let epoch = state.issue_epoch();
        match state.mailboxes.get_mut(id) {
            Some(mailbox) if mailbox.is_active() => {
                debug!("Registration conflict for '{}'", id);
                return Err(ChatError::Conflict { id: id.to_string() });
            }
            Some(mailbox) => {
                debug!("Discarding {} retained messages for '{}'", mailbox.len(), id);
                mailbox.clear();
                mailbox.activate(epoch);
            }
            None => {
                state.mailboxes.insert(id.to_string(), Mailbox::new(epoch));
            }
        }

        let delivered = self.announce_join(&mut state, id);
        info!("Participant registered: {} (announced to {})", id, delivered);
        Ok(epoch)
    }

    /// Re-attach `id` after a dropped connection. Returns the registration
    /// epoch now in force.
    ///
    /// A retained mailbox is reactivated with its pending messages intact;
    /// an unknown id is registered; an already active id succeeds as is.
    pub fn reconnect(&self, id: &str) -> Result<u64> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(ChatError::Unavailable);
        }
        let fresh = state.issue_epoch();
        match state.mailboxes.get_mut(id) {
            Some(mailbox) if mailbox.is_active() => {
                debug!("Reconnect for already active '{}'", id);
                Ok(mailbox.epoch())
            }
            Some(mailbox) => {
                mailbox.activate(fresh);
                info!("Participant reconnected: {} ({} pending)", id, mailbox.len());
                Ok(fresh)
            }
            None => {
                state.mailboxes.insert(id.to_string(), Mailbox::new(fresh));
                let delivered = self.announce_join(&mut state, id);
                info!("Participant registered on reconnect: {} (announced to {})", id, delivered);
                Ok(fresh)
            }
        }
    }

    fn announce_join(&self, state: &mut BrokerState, id: &str) -> usize {
        let notice = Notice::Joined(id).into_message();
        let delivered = state.fan_out(Some(id), &notice);
        self.publish(notice);
        delivered
    }

    /// Remove `id` from the active set. Idempotent.
    ///
    /// The mailbox is retained until drained so in-flight messages can still
    /// be collected. If `id` held the talking stick, the stick is freed.
    pub fn unregister(&self, id: &str) {
        let mut state = self.state.lock();
        self.retire(&mut state, id, None);
    }

    /// Unregister `id` only if `epoch` is still its current registration.
    /// Returns whether anything changed.
    pub fn unregister_if(&self, id: &str, epoch: u64) -> bool {
        let mut state = self.state.lock();
        self.retire(&mut state, id, Some(epoch))
    }

    fn retire(&self, state: &mut BrokerState, id: &str, epoch: Option<u64>) -> bool {
        if !state.holds(id, epoch) {
            return false;
        }
        if let Some(mailbox) = state.mailboxes.get_mut(id) {
            mailbox.deactivate();
            if mailbox.is_empty() {
                state.mailboxes.remove(id);
            }
        }
        state.waiting.remove(id);

        if state.stick.release(id) {
            let notice = Notice::StickReleased(id).into_message();
            state.fan_out(Some(id), &notice);
            self.publish(notice);
        }
        let notice = Notice::Left(id).into_message();
        let delivered = state.fan_out(Some(id), &notice);
        self.publish(notice);

        info!("Participant unregistered: {} (announced to {})", id, delivered);
        true
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.state.lock().is_active(id)
    }

    /// Epoch of `id`'s current registration, if it is active.
    pub fn registration(&self, id: &str) -> Option<u64> {
        let state = self.state.lock();
        state
            .mailboxes
            .get(id)
            .filter(|mailbox| mailbox.is_active())
            .map(|mailbox| mailbox.epoch())
    }

    pub(crate) fn holds(&self, id: &str, epoch: Option<u64>) -> bool {
        self.state.lock().holds(id, epoch)
    }

    /// Sorted ids of all active participants.
    pub fn participants(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state
            .mailboxes
            .iter()
            .filter(|(_, mailbox)| mailbox.is_active())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Broadcast / drain
    // -----------------------------------------------------------------------

    /// Append a chat message from `sender` to every other active mailbox.
    ///
    /// Returns the created message. Participants that unregistered before
    /// the append simply do not receive it. Clears every waiting mark since
    /// somebody has now spoken.
    pub fn broadcast(&self, sender: &str, content: &str) -> Result<Message> {
        self.broadcast_as(sender, None, content)
    }

    pub(crate) fn broadcast_as(&self, sender: &str, epoch: Option<u64>, content: &str) -> Result<Message> {
        let mut state = self.state.lock();
        if !state.running {
            return Err(ChatError::Unavailable);
        }
        state.require_active(sender, epoch)?;
        if self.config.enforce_talking_stick {
            if let Some(holder) = state.stick.holder() {
                if holder != sender {
                    return Err(ChatError::Denied {
                        holder: holder.to_string(),
                    });
                }
            }
        }

        let message = Message::chat(sender, content);
        state.waiting.clear();
        let delivered = state.fan_out(Some(sender), &message);
        self.publish(message.clone());
        drop(state);

        debug!("Broadcast {} from {} to {} participants", message.id, sender, delivered);
        Ok(message)
    }

    /// Atomically swap `id`'s mailbox for an empty one and return its prior
    /// contents in order.
    ///
    /// Works for retained mailboxes of unregistered participants; once such
    /// a mailbox is drained empty it is dropped and later drains fail with
    /// `NotRegistered`.
    pub fn drain(&self, id: &str) -> Result<Vec<Message>> {
        self.drain_as(id, None)
    }

    /// [`drain`](Self::drain) restricted to the registration `epoch`, if given.
    pub(crate) fn drain_as(&self, id: &str, epoch: Option<u64>) -> Result<Vec<Message>> {
        let mut state = self.state.lock();
        let mailbox = state
            .mailboxes
            .get_mut(id)
            .filter(|mailbox| epoch.map_or(true, |e| mailbox.epoch() == e))
            .ok_or_else(|| ChatError::not_registered(id))?;
        let batch = mailbox.take();
        if !mailbox.is_active() {
            state.mailboxes.remove(id);
            debug!("Retired mailbox for '{}' after final drain", id);
        }
        Ok(batch)
    }

    /// Number of undelivered messages waiting for `id`.
    pub fn pending(&self, id: &str) -> Result<usize> {
        let state = self.state.lock();
        state
            .mailboxes
            .get(id)
            .map(Mailbox::len)
            .ok_or_else(|| ChatError::not_registered(id))
    }

    /// Wake-up signal for `id`'s mailbox. Notified on every append and on
    /// every lifecycle change of the owner.
    pub(crate) fn signal(&self, id: &str) -> Result<Arc<Notify>> {
        let state = self.state.lock();
        state
            .mailboxes
            .get(id)
            .map(Mailbox::signal)
            .ok_or_else(|| ChatError::not_registered(id))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Stop accepting registrations and broadcasts.
    ///
    /// Every active participant receives a shutdown notice and becomes
    /// inactive; their mailboxes stay drainable. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        state.running = false;
        state.stick = TalkingStick::Free;
        state.waiting.clear();

        let notice = Notice::Shutdown.into_message();
        let notified = state.fan_out(None, &notice);
        for mailbox in state.mailboxes.values_mut() {
            mailbox.deactivate();
        }
        self.publish(notice);
        drop(state);

        info!("Broker stopping, notified {} participants", notified);
    }

    // -----------------------------------------------------------------------
    // Feed
    // -----------------------------------------------------------------------

    /// Subscribe to a read-only copy of every message the broker creates.
    ///
    /// Slow observers may lag and lose feed items; mailboxes are unaffected.
    pub fn feed(&self) -> broadcast::Receiver<Message> {
        self.feed.subscribe()
    }

    /// Called with the state lock held so feed order matches mailbox order.
    fn publish(&self, message: Message) {
        // No observers is the normal case.
        let _ = self.feed.send(message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn contents(batch: &[Message]) -> Vec<&str> {
        batch.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_register_and_conflict() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        assert_eq!(
            broker.register("alice"),
            Err(ChatError::Conflict { id: "alice".into() })
        );
        assert_eq!(broker.participants(), vec!["alice"]);
    }

    #[test]
    fn test_join_notice_goes_to_others_only() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();

        let alice = broker.drain("alice").unwrap();
        assert_eq!(contents(&alice), vec!["bob has joined the chat"]);
        assert_eq!(alice[0].kind, MessageKind::System);
        assert!(broker.drain("bob").unwrap().is_empty());
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.drain("alice").unwrap();

        let sent = broker.broadcast("alice", "hello").unwrap();
        assert_eq!(sent.kind, MessageKind::Chat);
        assert!(broker.drain("alice").unwrap().is_empty());

        let bob = broker.drain("bob").unwrap();
        assert_eq!(bob, vec![sent]);
    }

    #[test]
    fn test_broadcast_requires_registration() {
        let broker = MessageBroker::default();
        assert_eq!(
            broker.broadcast("ghost", "boo"),
            Err(ChatError::NotRegistered { id: "ghost".into() })
        );
    }

    #[test]
    fn test_unregister_is_idempotent_and_announced() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.drain("alice").unwrap();

        broker.unregister("bob");
        broker.unregister("bob");
        broker.unregister("never-there");

        assert_eq!(contents(&broker.drain("alice").unwrap()), vec!["bob has left the chat"]);
        assert!(!broker.is_active("bob"));
        assert_eq!(broker.participants(), vec!["alice"]);
    }

    #[test]
    fn test_retained_mailbox_drains_after_unregister() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.broadcast("alice", "in flight").unwrap();

        broker.unregister("bob");
        assert_eq!(broker.pending("bob").unwrap(), 1);
        assert_eq!(contents(&broker.drain("bob").unwrap()), vec!["in flight"]);
        assert_eq!(
            broker.drain("bob"),
            Err(ChatError::NotRegistered { id: "bob".into() })
        );
    }

    #[test]
    fn test_unregistered_participant_misses_later_broadcasts() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.register("carol").unwrap();
        broker.drain("carol").unwrap();

        broker.unregister("carol");
        broker.broadcast("alice", "after carol left").unwrap();
        assert!(broker.drain("carol").is_err());
    }

    #[test]
    fn test_register_after_unregister_starts_empty() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.broadcast("alice", "stale").unwrap();
        broker.unregister("bob");

        broker.register("bob").unwrap();
        assert!(broker.drain("bob").unwrap().is_empty());
    }

    #[test]
    fn test_reconnect_keeps_pending_messages() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.broadcast("alice", "kept").unwrap();
        broker.unregister("bob");

        broker.reconnect("bob").unwrap();
        assert!(broker.is_active("bob"));
        assert_eq!(contents(&broker.drain("bob").unwrap()), vec!["kept"]);

        broker.reconnect("bob").unwrap();
        broker.reconnect("dave").unwrap();
        assert!(broker.is_active("dave"));
    }

    #[test]
    fn test_shutdown_rejects_new_work_but_allows_drain() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.drain("alice").unwrap();

        broker.shutdown();
        broker.shutdown();

        assert!(!broker.is_running());
        assert_eq!(broker.register("carol"), Err(ChatError::Unavailable));
        assert_eq!(broker.reconnect("alice"), Err(ChatError::Unavailable));
        assert_eq!(broker.broadcast("alice", "late"), Err(ChatError::Unavailable));
        assert!(broker.participants().is_empty());

        assert_eq!(contents(&broker.drain("alice").unwrap()), vec!["Server shutting down..."]);
        broker.unregister("bob");
        assert_eq!(contents(&broker.drain("bob").unwrap()), vec!["Server shutting down..."]);
    }

    #[test]
    fn test_per_sender_order_is_preserved() {
        let broker = MessageBroker::default();
        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.drain("alice").unwrap();

        for i in 0..50 {
            broker.broadcast("alice", &i.to_string()).unwrap();
        }
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        let got: Vec<String> = broker
            .drain("bob")
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_concurrent_broadcast_and_drain_no_loss_no_duplicates() {
        let broker = Arc::new(MessageBroker::default());
        broker.register("reader").unwrap();
        let senders = ["s0", "s1", "s2", "s3"];
        for s in senders {
            broker.register(s).unwrap();
        }
        broker.drain("reader").unwrap();

        const PER_SENDER: usize = 250;
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let reader = {
            let broker = Arc::clone(&broker);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    let finished = done.load(std::sync::atomic::Ordering::SeqCst);
                    seen.extend(broker.drain("reader").unwrap());
                    if finished {
                        break;
                    }
                }
                seen
            })
        };

        let writers: Vec<_> = senders
            .iter()
            .map(|s| {
                let broker = Arc::clone(&broker);
                let s = s.to_string();
                std::thread::spawn(move || {
                    for i in 0..PER_SENDER {
                        broker.broadcast(&s, &format!("{s}:{i}")).unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        done.store(true, std::sync::atomic::Ordering::SeqCst);
        let seen = reader.join().unwrap();

        assert_eq!(seen.len(), senders.len() * PER_SENDER);
        let ids: std::collections::HashSet<_> = seen.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids.len(), seen.len());

        for s in senders {
            let order: Vec<usize> = seen
                .iter()
                .filter(|m| m.sender == s)
                .map(|m| m.content.rsplit(':').next().unwrap().parse().unwrap())
                .collect();
            assert_eq!(order, (0..PER_SENDER).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_concurrent_register_single_winner() {
        let broker = Arc::new(MessageBroker::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let broker = Arc::clone(&broker);
                std::thread::spawn(move || broker.register("x"))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == ChatError::Conflict { id: "x".into() }));
    }

    #[test]
    fn test_registration_epochs() {
        let broker = MessageBroker::default();
        let first = broker.register("alice").unwrap();
        assert_eq!(broker.registration("alice"), Some(first));
        assert_eq!(broker.reconnect("alice"), Ok(first));

        broker.unregister("alice");
        assert_eq!(broker.registration("alice"), None);
        let second = broker.register("alice").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_unregister_if_ignores_replaced_registration() {
        let broker = MessageBroker::default();
        let stale = broker.register("alice").unwrap();
        broker.unregister("alice");
        let current = broker.register("alice").unwrap();

        assert!(!broker.unregister_if("alice", stale));
        assert!(broker.is_active("alice"));
        assert!(broker.unregister_if("alice", current));
        assert!(!broker.is_active("alice"));
        assert!(!broker.unregister_if("alice", current));
    }

    #[test]
    fn test_epoch_scoped_entry_points() {
        let broker = MessageBroker::default();
        broker.register("bob").unwrap();
        let stale = broker.register("alice").unwrap();
        broker.broadcast("bob", "for the first alice").unwrap();
        broker.unregister("alice");
        broker.drain("alice").unwrap();
        let current = broker.register("alice").unwrap();
        broker.broadcast("bob", "for the second alice").unwrap();

        assert_eq!(
            broker.broadcast_as("alice", Some(stale), "impostor"),
            Err(ChatError::NotRegistered { id: "alice".into() })
        );
        assert!(broker.drain_as("alice", Some(stale)).is_err());
        assert_eq!(broker.pending("alice").unwrap(), 1);
        assert_eq!(
            contents(&broker.drain_as("alice", Some(current)).unwrap()),
            vec!["for the second alice"]
        );
    }

    #[test]
    fn test_concurrent_reconnect_never_conflicts() {
        for _ in 0..50 {
            let broker = Arc::new(MessageBroker::default());
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let broker = Arc::clone(&broker);
                    std::thread::spawn(move || {
                        if i % 2 == 0 {
                            broker.reconnect("x").map(|_| ())
                        } else {
                            broker.register("x").map(|_| ()).or_else(|err| match err {
                                ChatError::Conflict { .. } => Ok(()),
                                other => Err(other),
                            })
                        }
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), Ok(()));
            }
            assert_eq!(broker.participants(), vec!["x"]);
        }
    }

    #[test]
    fn test_feed_order_matches_mailbox_order() {
        let broker = Arc::new(MessageBroker::default());
        broker.register("reader").unwrap();
        let senders = ["s0", "s1", "s2", "s3"];
        for s in senders {
            broker.register(s).unwrap();
        }
        broker.drain("reader").unwrap();
        let mut feed = broker.feed();

        let writers: Vec<_> = senders
            .iter()
            .map(|s| {
                let broker = Arc::clone(&broker);
                let s = s.to_string();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        broker.broadcast(&s, &format!("{s}:{i}")).unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let mailbox: Vec<String> = broker
            .drain("reader")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        let mut observed = Vec::new();
        while let Ok(message) = feed.try_recv() {
            observed.push(message.id);
        }
        assert_eq!(observed.len(), 400);
        assert_eq!(observed, mailbox);
    }

    #[tokio::test]
    async fn test_feed_sees_every_created_message() {
        let broker = MessageBroker::default();
        let mut feed = broker.feed();

        broker.register("alice").unwrap();
        broker.register("bob").unwrap();
        broker.broadcast("alice", "hi").unwrap();

        let seen: Vec<_> = (0..3).map(|_| feed.try_recv().unwrap().content).collect();
        assert_eq!(
            seen,
            vec!["alice has joined the chat", "bob has joined the chat", "hi"]
        );
    }
}
