//! Per-participant FIFO mailbox.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Notify;

use crate::message::Message;

/// Ordered queue of undelivered messages for one participant.
///
/// The mailbox outlives registration: after its owner unregisters it stays
/// in the broker, inactive, until drained empty. The `signal` is shared with
/// every waiter (delivery loops and `check()` calls) and is woken on each
/// append and on every lifecycle change of the owner.
///
/// `epoch` identifies the registration that last activated the mailbox, so a
/// handle left over from an earlier registration of the same id can tell it
/// no longer owns it.
#[derive(Debug)]
pub(crate) struct Mailbox {
    messages: VecDeque<Message>,
    active: bool,
    epoch: u64,
    signal: Arc<Notify>,
}

impl Mailbox {
    pub(crate) fn new(epoch: u64) -> Self {
        Self {
            messages: VecDeque::new(),
            active: true,
            epoch,
            signal: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn activate(&mut self, epoch: u64) {
        self.active = true;
        self.epoch = epoch;
        self.wake();
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
        self.wake();
    }

    /// Append one message and wake all waiters.
    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        self.wake();
    }

    /// Swap the queue for an empty one, returning the prior contents in order.
    pub(crate) fn take(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages).into()
    }

    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn signal(&self) -> Arc<Notify> {
        Arc::clone(&self.signal)
    }

    pub(crate) fn wake(&self) {
        self.signal.notify_waiters();
    }
}
