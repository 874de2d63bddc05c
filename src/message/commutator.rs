//! Routing of messages between the engine threads.

use super::{Mailbox, MessagePriority};
use crate::backend::BackendMessage;
use crate::frontend::FrontendMessage;

/// Threads that accept messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadName {
    /// Thread owning the graphics context and drawing frames.
    RenderThread,
    /// Thread generating geometry and uploading resources.
    ResourceUploadThread,
}

/// Routes messages to the mailbox of the destination thread.
///
/// Acceptors never reference each other directly: each one only holds a
/// commutator, so posting back and forth doesn't create ownership cycles.
#[derive(Clone)]
pub struct ThreadsCommutator {
    render: Mailbox<FrontendMessage>,
    resource_upload: Mailbox<BackendMessage>,
}

impl ThreadsCommutator {
    /// Creates a commutator for the given mailboxes.
    pub fn new(
        render: Mailbox<FrontendMessage>,
        resource_upload: Mailbox<BackendMessage>,
    ) -> Self {
        Self {
            render,
            resource_upload,
        }
    }

    /// Posts a message to the render thread.
    pub fn post_to_render(&self, message: FrontendMessage, priority: MessagePriority) -> bool {
        self.render.post_message(message, priority)
    }

    /// Posts a message to the resource upload thread.
    pub fn post_to_resource_upload(
        &self,
        message: BackendMessage,
        priority: MessagePriority,
    ) -> bool {
        self.resource_upload.post_message(message, priority)
    }

    /// Mailbox of the render thread.
    pub fn render(&self) -> &Mailbox<FrontendMessage> {
        &self.render
    }

    /// Mailbox of the resource upload thread.
    pub fn resource_upload(&self) -> &Mailbox<BackendMessage> {
        &self.resource_upload
    }

    /// Wakes up the given thread if it is blocked waiting for a message.
    pub fn cancel_waiting(&self, thread: ThreadName) {
        match thread {
            ThreadName::RenderThread => self.render.cancel_message_waiting(),
            ThreadName::ResourceUploadThread => self.resource_upload.cancel_message_waiting(),
        }
    }

    /// Closes the mailbox of the given thread, see [`Mailbox::close()`].
    pub fn close(&self, thread: ThreadName) {
        match thread {
            ThreadName::RenderThread => self.render.close(),
            ThreadName::ResourceUploadThread => self.resource_upload.close(),
        }
    }
}
