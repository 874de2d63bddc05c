//! Typed, prioritized message passing between the engine threads.
//!
//! Each consuming thread owns one [`MessageAcceptor`] backed by a
//! [`MessageQueue`]. Other threads only ever reach it through a cloned
//! [`Mailbox`], usually routed by the [`ThreadsCommutator`].

pub mod acceptor;
pub mod blocker;
pub mod commutator;
pub mod queue;

pub use acceptor::{Mailbox, MessageAcceptor};
pub use blocker::{blocker, Blocker, BlockerSignal};
pub use commutator::{ThreadName, ThreadsCommutator};
pub use queue::MessageQueue;

/// A unit of work sent to a thread.
///
/// Each acceptor defines its own closed set of messages as an enum, so a
/// dispatcher that forgets a variant doesn't compile.
pub trait Message: Send + 'static {
    /// Name of the message kind, for logging.
    fn name(&self) -> &'static str;

    /// Whether processing this message requires an active graphics context.
    fn is_graphics_context_dependent(&self) -> bool {
        false
    }
}

/// Priority class of a message, from lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessagePriority {
    /// Served only when no other message is queued.
    Low,
    /// Default priority.
    Normal,
    /// Served before normal messages.
    High,
    /// Served before everything else. At most one message of each kind is
    /// queued at this priority: pushing a duplicate is a no-op.
    UberHighSingleton,
}

impl MessagePriority {
    /// All priorities, from highest to lowest.
    pub const DESCENDING: [MessagePriority; 4] = [
        MessagePriority::UberHighSingleton,
        MessagePriority::High,
        MessagePriority::Normal,
        MessagePriority::Low,
    ];

    /// Index of the queue bucket for this priority.
    fn bucket(self) -> usize {
        match self {
            MessagePriority::UberHighSingleton => 0,
            MessagePriority::High => 1,
            MessagePriority::Normal => 2,
            MessagePriority::Low => 3,
        }
    }
}
