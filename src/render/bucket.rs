//! Batched geometry sharing one pipeline state.

use super::buffer::VertexArrayBuffer;
use crate::gui::Handle;

/// Batched vertex data and the overlay handles attached to it.
///
/// A bucket is move-only: it goes from the batcher to a message and then to
/// the render thread, which becomes its single owner.
#[derive(Default)]
pub struct RenderBucket {
    buffer: VertexArrayBuffer,
    overlay_handles: Vec<Box<dyn Handle>>,
}

impl RenderBucket {
    /// Creates a bucket around the given buffer, without handles.
    pub fn new(buffer: VertexArrayBuffer) -> Self {
        Self {
            buffer,
            overlay_handles: Vec::new(),
        }
    }

    /// Geometry of the bucket.
    pub fn buffer(&self) -> &VertexArrayBuffer {
        &self.buffer
    }

    /// Mutable geometry of the bucket.
    pub fn buffer_mut(&mut self) -> &mut VertexArrayBuffer {
        &mut self.buffer
    }

    /// Attaches an overlay handle.
    pub fn add_overlay_handle(&mut self, handle: Box<dyn Handle>) {
        self.overlay_handles.push(handle);
    }

    /// Number of overlay handles attached.
    pub fn overlay_handles_count(&self) -> usize {
        self.overlay_handles.len()
    }

    /// Checks whether the bucket holds no index to draw.
    pub fn is_empty(&self) -> bool {
        self.buffer.index_count() == 0
    }

    /// Splits the bucket into its buffer and handles.
    pub fn into_parts(self) -> (VertexArrayBuffer, Vec<Box<dyn Handle>>) {
        (self.buffer, self.overlay_handles)
    }
}

impl std::fmt::Debug for RenderBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBucket")
            .field("vertices", &self.buffer.vertex_count())
            .field("indices", &self.buffer.index_count())
            .field("overlay_handles", &self.overlay_handles.len())
            .finish()
    }
}
