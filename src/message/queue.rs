//! Thread-safe priority queue of messages, with optional content filtering.

use super::{Message, MessagePriority};
use log::trace;
use std::collections::VecDeque;
use std::mem::discriminant;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Predicate deciding whether a message is kept (`true`) or dropped (`false`).
pub type MessageFilter<M> = Box<dyn Fn(&M) -> bool + Send>;

/// State protected by the queue's mutex.
struct QueueState<M> {
    /// One FIFO bucket per priority, from highest to lowest.
    buckets: [VecDeque<M>; 4],
    /// Filter applied to incoming messages, if any.
    filter: Option<MessageFilter<M>>,
    /// Whether a consumer is currently blocked waiting for a message.
    is_waiting: bool,
}

impl<M> QueueState<M> {
    fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    fn pop_front(&mut self) -> Option<M> {
        self.buckets.iter_mut().find_map(VecDeque::pop_front)
    }
}

/// Thread-safe queue of messages, popped in priority order and FIFO among
/// equal priorities.
///
/// The internal lock is only held for constant-time bucket manipulation (and
/// while evaluating a filter predicate), never while a message is processed.
pub struct MessageQueue<M> {
    state: Mutex<QueueState<M>>,
    condition: Condvar,
}

impl<M: Message> Default for MessageQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> MessageQueue<M> {
    /// Creates an empty queue without filter.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                buckets: Default::default(),
                filter: None,
                is_waiting: false,
            }),
            condition: Condvar::new(),
        }
    }

    /// Locks the queue state. No code panics while holding the lock, so a
    /// poisoned lock still holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, QueueState<M>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a message at the tail of the bucket for the given priority,
    /// unless the active filter rejects it. Wakes up a blocked consumer.
    ///
    /// At [`MessagePriority::UberHighSingleton`], the message is dropped if a
    /// message of the same kind is already queued at that priority.
    pub fn push_message(&self, message: M, priority: MessagePriority) {
        let mut state = self.lock();
        if let Some(filter) = &state.filter {
            if !filter(&message) {
                trace!("Filtered out message {}", message.name());
                return;
            }
        }

        let bucket = &mut state.buckets[priority.bucket()];
        if priority == MessagePriority::UberHighSingleton
            && bucket
                .iter()
                .any(|queued| discriminant(queued) == discriminant(&message))
        {
            trace!("Singleton message {} is already queued", message.name());
            return;
        }
        bucket.push_back(message);

        Self::cancel_wait_locked(&mut state, &self.condition);
    }

    /// Pops the oldest message of the highest non-empty priority.
    ///
    /// If `wait_if_empty` is true and the queue is empty, blocks until a
    /// message arrives or [`Self::cancel_wait()`] is called. Returns [`None`]
    /// if the queue is still empty after waking up.
    pub fn pop_message(&self, wait_if_empty: bool) -> Option<M> {
        let mut state = self.lock();
        if wait_if_empty && state.is_empty() {
            state.is_waiting = true;
            state = self
                .condition
                .wait_while(state, |s| s.is_waiting)
                .unwrap_or_else(PoisonError::into_inner);
            state.is_waiting = false;
        }
        state.pop_front()
    }

    /// Pops the oldest message of the highest non-empty priority, waiting at
    /// most `timeout` for one to arrive if the queue is empty.
    pub fn pop_message_timeout(&self, timeout: Duration) -> Option<M> {
        let mut state = self.lock();
        if state.is_empty() {
            state.is_waiting = true;
            let (guard, _) = self
                .condition
                .wait_timeout_while(state, timeout, |s| s.is_waiting)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
            state.is_waiting = false;
        }
        state.pop_front()
    }

    /// Wakes up a blocked consumer without pushing any message. Idempotent.
    pub fn cancel_wait(&self) {
        let mut state = self.lock();
        Self::cancel_wait_locked(&mut state, &self.condition);
    }

    fn cancel_wait_locked(state: &mut QueueState<M>, condition: &Condvar) {
        if state.is_waiting {
            state.is_waiting = false;
            condition.notify_all();
        }
    }

    /// Destroys all the queued messages.
    ///
    /// Producers must be stopped beforehand, otherwise new messages can be
    /// pushed right after.
    pub fn clear_query(&self) {
        // Messages are dropped outside of the lock, as dropping one may wake
        // up another thread waiting on it.
        let drained: Vec<M> = {
            let mut state = self.lock();
            state.buckets.iter_mut().flat_map(|b| b.drain(..)).collect()
        };
        if !drained.is_empty() {
            trace!("Clearing {} queued messages", drained.len());
        }
    }

    /// Installs a filter: from now on, incoming messages for which the
    /// predicate returns `false` are dropped.
    pub fn enable_message_filtering(&self, filter: impl Fn(&M) -> bool + Send + 'static) {
        self.lock().filter = Some(Box::new(filter));
    }

    /// Removes the filter installed by [`Self::enable_message_filtering()`].
    pub fn disable_message_filtering(&self) {
        self.lock().filter = None;
    }

    /// Removes the already queued messages for which the predicate returns
    /// `false`.
    pub fn instant_filter(&self, filter: impl Fn(&M) -> bool) {
        let removed: Vec<M> = {
            let mut state = self.lock();
            let mut removed = Vec::new();
            for bucket in state.buckets.iter_mut() {
                let (kept, dropped): (VecDeque<M>, VecDeque<M>) =
                    bucket.drain(..).partition(|m| filter(m));
                *bucket = kept;
                removed.extend(dropped);
            }
            removed
        };
        if !removed.is_empty() {
            trace!("Instant filter removed {} messages", removed.len());
        }
    }

    /// Checks whether no message is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
