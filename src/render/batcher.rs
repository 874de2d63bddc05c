//! Accumulation of geometry into bounded render buckets.

use super::bucket::RenderBucket;
use super::buffer::Vertex;
use super::RenderState;
use crate::gui::Handle;
use log::{error, trace};
use std::collections::BTreeMap;

/// Groups geometry by render state into buckets of bounded size.
///
/// Geometry is inserted through a [`BatcherSession`], which hands each
/// finished `(state, bucket)` pair to a callback.
pub struct Batcher {
    max_vertices: usize,
    max_indices: usize,
    buckets: BTreeMap<RenderState, RenderBucket>,
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_VERTICES, Self::DEFAULT_MAX_INDICES)
    }
}

impl Batcher {
    /// Default maximal number of vertices per bucket.
    pub const DEFAULT_MAX_VERTICES: usize = 65_000;
    /// Default maximal number of indices per bucket.
    pub const DEFAULT_MAX_INDICES: usize = 65_000;

    /// Creates a batcher with the given bucket bounds.
    pub fn new(max_vertices: usize, max_indices: usize) -> Self {
        Self {
            max_vertices,
            max_indices,
            buckets: BTreeMap::new(),
        }
    }

    /// Starts a session, at the end of which all the pending buckets are
    /// flushed into `flush`.
    pub fn start_session<F>(&mut self, flush: F) -> BatcherSession<'_, F>
    where
        F: FnMut(RenderState, RenderBucket),
    {
        BatcherSession {
            batcher: self,
            flush,
        }
    }
}

/// Scoped insertion of geometry into a [`Batcher`]. Pending buckets are
/// flushed when the session is dropped.
pub struct BatcherSession<'a, F: FnMut(RenderState, RenderBucket)> {
    batcher: &'a mut Batcher,
    flush: F,
}

impl<F: FnMut(RenderState, RenderBucket)> BatcherSession<'_, F> {
    /// Inserts a list of triangles, whose indices are relative to the given
    /// vertices, optionally attaching a handle to the receiving bucket.
    ///
    /// Returns `false` (and drops the geometry) if it can't fit in a single
    /// bucket.
    pub fn insert_triangle_list(
        &mut self,
        state: RenderState,
        vertices: &[Vertex],
        indices: &[u32],
        handle: Option<Box<dyn Handle>>,
    ) -> bool {
        let max_vertices = self.batcher.max_vertices;
        let max_indices = self.batcher.max_indices;
        if vertices.len() > max_vertices || indices.len() > max_indices {
            error!(
                "Geometry of {} vertices and {} indices exceeds the bucket bounds",
                vertices.len(),
                indices.len()
            );
            return false;
        }

        let is_full = self.batcher.buckets.get(&state).is_some_and(|bucket| {
            bucket.buffer().vertex_count() + vertices.len() > max_vertices
                || bucket.buffer().index_count() + indices.len() > max_indices
        });
        if is_full {
            if let Some(bucket) = self.batcher.buckets.remove(&state) {
                trace!("Flushing full bucket {bucket:?} for {state:?}");
                (self.flush)(state, bucket);
            }
        }

        let bucket = self.batcher.buckets.entry(state).or_default();
        bucket.buffer_mut().append(vertices, indices);
        if let Some(handle) = handle {
            bucket.add_overlay_handle(handle);
        }
        true
    }

    /// Inserts a list of quads, each given as 4 vertices in triangle strip
    /// order. Lists too large for a single bucket are split across buckets,
    /// the handle going with the first part.
    pub fn insert_list_of_quads(
        &mut self,
        state: RenderState,
        vertices: &[Vertex],
        mut handle: Option<Box<dyn Handle>>,
    ) -> bool {
        if vertices.len() % 4 != 0 {
            error!("A list of quads can't have {} vertices", vertices.len());
            return false;
        }
        let max_quads = (self.batcher.max_vertices / 4).min(self.batcher.max_indices / 6);
        if max_quads == 0 {
            error!("Buckets are too small to hold a quad");
            return false;
        }

        for chunk in vertices.chunks(4 * max_quads) {
            let indices: Vec<u32> = (0..chunk.len() as u32 / 4)
                .flat_map(|quad| {
                    let base = 4 * quad;
                    [base, base + 1, base + 2, base + 2, base + 1, base + 3]
                })
                .collect();
            if !self.insert_triangle_list(state, chunk, &indices, handle.take()) {
                return false;
            }
        }
        true
    }

    /// Flushes all the pending buckets, in drawing order.
    pub fn flush(&mut self) {
        for (state, bucket) in std::mem::take(&mut self.batcher.buckets) {
            if bucket.is_empty() && bucket.overlay_handles_count() == 0 {
                continue;
            }
            (self.flush)(state, bucket);
        }
    }
}

impl<F: FnMut(RenderState, RenderBucket)> Drop for BatcherSession<'_, F> {
    fn drop(&mut self) {
        self.flush();
    }
}
