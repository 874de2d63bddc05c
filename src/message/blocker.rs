//! Blocking messages: the sender waits until the receiving thread is done with
//! a message.

use futures::channel::oneshot;
use futures::executor::block_on;
use log::trace;

/// Waiting side of a blocking message.
pub struct Blocker {
    rx: oneshot::Receiver<()>,
}

/// Signaling side of a blocking message, embedded in the message itself.
///
/// The waiter is released when the signal is dropped, i.e. once the message
/// has been processed or discarded by the receiving queue.
#[derive(Debug)]
pub struct BlockerSignal {
    _tx: oneshot::Sender<()>,
}

/// Creates a connected [`Blocker`] and [`BlockerSignal`].
pub fn blocker() -> (Blocker, BlockerSignal) {
    let (tx, rx) = oneshot::channel();
    (Blocker { rx }, BlockerSignal { _tx: tx })
}

impl Blocker {
    /// Blocks the current thread until the associated signal is dropped.
    pub fn wait(self) {
        // The sender is never used to send a value, so the receiver always
        // resolves to `Canceled` when the signal is dropped.
        let _ = block_on(self.rx);
        trace!("Blocker released");
    }
}
