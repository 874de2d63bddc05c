//! Per-thread message processing contract.

use super::queue::MessageQueue;
use super::{Message, MessagePriority};
use log::{debug, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared state between an acceptor and the threads posting to it.
struct MailboxInner<M> {
    /// Name of the owning thread, for logging.
    name: &'static str,
    /// Pending messages.
    queue: MessageQueue<M>,
    /// Whether the owner is blocked waiting for a message, without timeout.
    infinity_waiting: AtomicBool,
    /// Whether the queue was closed, after which nothing can be posted.
    closed: AtomicBool,
}

/// Posting handle to the queue of a [`MessageAcceptor`].
///
/// Cloning the mailbox gives another handle to the same queue, which can be
/// sent to other threads.
pub struct Mailbox<M> {
    inner: Arc<MailboxInner<M>>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Message> Mailbox<M> {
    /// Creates a mailbox with an empty queue, for the given thread name.
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(MailboxInner {
                name,
                queue: MessageQueue::new(),
                infinity_waiting: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Name of the thread owning this mailbox.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Enqueues a message for the owning thread. Returns `false` if the
    /// mailbox is closed, in which case the message is dropped.
    pub fn post_message(&self, message: M, priority: MessagePriority) -> bool {
        if self.is_closed() {
            warn!(
                "Dropping message {} posted to closed mailbox {}",
                message.name(),
                self.inner.name
            );
            return false;
        }
        trace!(
            "Posting {} to {} ({priority:?})",
            message.name(),
            self.inner.name
        );
        self.inner.queue.push_message(message, priority);
        true
    }

    /// Wakes up the owning thread if it is blocked waiting for a message,
    /// without discarding anything.
    pub fn cancel_message_waiting(&self) {
        self.inner.queue.cancel_wait();
    }

    /// Checks whether the owning thread is blocked waiting for a message
    /// without timeout.
    pub fn is_in_infinity_waiting(&self) -> bool {
        self.inner.infinity_waiting.load(Ordering::Acquire)
    }

    /// Installs a filter on incoming messages, see
    /// [`MessageQueue::enable_message_filtering()`].
    pub fn enable_message_filtering(&self, filter: impl Fn(&M) -> bool + Send + 'static) {
        self.inner.queue.enable_message_filtering(filter);
    }

    /// Removes the filter on incoming messages.
    pub fn disable_message_filtering(&self) {
        self.inner.queue.disable_message_filtering();
    }

    /// Removes the queued messages rejected by the given predicate.
    pub fn instant_filter(&self, filter: impl Fn(&M) -> bool) {
        self.inner.queue.instant_filter(filter);
    }

    /// Checks whether no message is pending.
    pub fn is_queue_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    /// Number of pending messages.
    pub fn queue_size(&self) -> usize {
        self.inner.queue.len()
    }

    /// Checks whether [`Self::close()`] was called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Refuses any further message, wakes up the owner and destroys all the
    /// pending messages.
    pub fn close(&self) {
        debug!("Closing mailbox {}", self.inner.name);
        self.inner.closed.store(true, Ordering::Release);
        self.inner.queue.cancel_wait();
        self.inner.queue.clear_query();
    }

    /// Pops the next message, recording whether the caller blocks
    /// indefinitely.
    fn pop(&self, wait_for_message: bool) -> Option<M> {
        self.inner
            .infinity_waiting
            .store(wait_for_message, Ordering::Release);
        let message = self.inner.queue.pop_message(wait_for_message);
        self.inner.infinity_waiting.store(false, Ordering::Release);
        message
    }

    /// Pops the next message, waiting at most `timeout` for one.
    fn pop_timeout(&self, timeout: Duration) -> Option<M> {
        self.inner.queue.pop_message_timeout(timeout)
    }

    /// Pops all the pending messages, for tests without a consuming thread.
    #[cfg(test)]
    pub(crate) fn drain(&self) -> Vec<M> {
        std::iter::from_fn(|| self.pop(false)).collect()
    }
}

/// A worker that owns a message queue and processes its messages one by one.
///
/// Implementors provide [`Self::accept_message()`]; the processing loop lives
/// in the thread owning the acceptor, while other threads post through
/// [`Mailbox`] clones.
pub trait MessageAcceptor {
    /// Closed set of messages accepted by this worker.
    type Message: Message;

    /// Mailbox backing this acceptor.
    fn mailbox(&self) -> &Mailbox<Self::Message>;

    /// Handles a single message.
    fn accept_message(&mut self, message: Self::Message);

    /// Pops and handles one message, blocking until one is available if
    /// `wait_for_message` is true. Returns whether a message was processed.
    fn process_single_message(&mut self, wait_for_message: bool) -> bool {
        match self.mailbox().pop(wait_for_message) {
            Some(message) => {
                trace!("{} accepts {}", self.mailbox().name(), message.name());
                self.accept_message(message);
                true
            }
            None => false,
        }
    }

    /// Pops and handles one message, waiting at most `timeout` for one.
    /// Returns whether a message was processed.
    fn process_single_message_timeout(&mut self, timeout: Duration) -> bool {
        match self.mailbox().pop_timeout(timeout) {
            Some(message) => {
                trace!("{} accepts {}", self.mailbox().name(), message.name());
                self.accept_message(message);
                true
            }
            None => false,
        }
    }

    /// Enqueues a message for this acceptor.
    fn post_message(&self, message: Self::Message, priority: MessagePriority) -> bool {
        self.mailbox().post_message(message, priority)
    }

    /// Cancels any blocked wait and destroys the pending messages. Called once
    /// at shutdown, after all the producers stopped.
    fn close_queue(&self) {
        self.mailbox().close();
    }

    /// Wakes up a blocked processing loop without discarding messages.
    fn cancel_message_waiting(&self) {
        self.mailbox().cancel_message_waiting();
    }

    /// Checks whether the processing loop is blocked without timeout.
    fn is_in_infinity_waiting(&self) -> bool {
        self.mailbox().is_in_infinity_waiting()
    }
}
