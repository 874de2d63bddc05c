//! Vertex and index storage of a render bucket.

use super::context::{GraphicsContext, Program};
use super::ProgramId;
use log::warn;

/// Vertex layout shared by all the engine programs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    /// Position of the pivot, relative to the tile (or screen) origin, and
    /// depth.
    pub position: [f32; 3],
    /// Offset from the pivot in pixels, and animation flag.
    pub normal: [f32; 3],
    /// Texture coordinates (u, v), and color coordinates in the palette
    /// texture.
    pub tex_coord: [f32; 4],
}

/// Per-frame replacement of some vertices of a buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeMutation {
    /// Vertex index and its new value.
    pub updates: Vec<(u32, Vertex)>,
}

/// Vertex and index data, bound to a program once built.
#[derive(Debug, Default)]
pub struct VertexArrayBuffer {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    /// Program this buffer was built for, if it is currently bound.
    program: Option<ProgramId>,
}

impl VertexArrayBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Vertices of the buffer.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Indices of the buffer.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Appends a triangle list, whose indices are relative to the given
    /// vertices.
    pub fn append(&mut self, vertices: &[Vertex], indices: &[u32]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        self.indices.extend(indices.iter().map(|i| base + i));
    }

    /// Binds the buffer to the given program.
    pub fn build(&mut self, program: &Program) {
        self.program = Some(program.id());
    }

    /// Checks whether the buffer is bound to a program.
    pub fn is_built(&self) -> bool {
        self.program.is_some()
    }

    /// Drops the binding, e.g. after the graphics context was lost.
    pub fn reset_binding(&mut self) {
        self.program = None;
    }

    /// Replaces the vertices listed in the mutation. Out of range indices are
    /// ignored.
    pub fn apply_mutation(&mut self, mutation: &AttributeMutation) {
        for &(index, vertex) in &mutation.updates {
            match self.vertices.get_mut(index as usize) {
                Some(v) => *v = vertex,
                None => warn!(
                    "Ignoring mutation of vertex {index} out of {}",
                    self.vertices.len()
                ),
            }
        }
    }

    /// Draws the buffer with the given program. Returns `false` if the buffer
    /// isn't built for this program.
    pub fn render(&self, context: &mut dyn GraphicsContext, program: &Program) -> bool {
        if self.program != Some(program.id()) {
            warn!(
                "Buffer bound to {:?} can't be drawn with {:?}",
                self.program,
                program.id()
            );
            return false;
        }
        if !self.indices.is_empty() {
            context.draw_indexed(program, self);
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::render::context::{ApiVersion, ProgramManager, RecordingContext};

    fn quad() -> ([Vertex; 4], [u32; 6]) {
        ([Vertex::default(); 4], [0, 1, 2, 2, 1, 3])
    }

    #[test]
    fn append_offsets_indices() {
        let mut buffer = VertexArrayBuffer::new();
        let (vertices, indices) = quad();
        buffer.append(&vertices, &indices);
        buffer.append(&vertices, &indices);
        assert_eq!(buffer.vertex_count(), 8);
        assert_eq!(buffer.index_count(), 12);
        assert_eq!(&buffer.indices()[6..], &[4, 5, 6, 6, 5, 7]);
    }

    #[test]
    fn render_requires_build() {
        let programs = ProgramManager::new(ApiVersion::OpenGLES3);
        let program = programs.program(ProgramId::UserMark).unwrap();
        let mut context = RecordingContext::new(ApiVersion::OpenGLES3);

        let mut buffer = VertexArrayBuffer::new();
        let (vertices, indices) = quad();
        buffer.append(&vertices, &indices);

        assert!(!buffer.render(&mut context, program));
        buffer.build(program);
        assert!(buffer.is_built());
        assert!(buffer.render(&mut context, program));
        assert_eq!(context.draw_calls().len(), 1);
        assert_eq!(context.draw_calls()[0].index_count, 6);

        buffer.reset_binding();
        assert!(!buffer.render(&mut context, program));
        assert_eq!(context.draw_calls().len(), 1);
    }

    #[test]
    fn mutation_replaces_vertices() {
        let mut buffer = VertexArrayBuffer::new();
        let (vertices, indices) = quad();
        buffer.append(&vertices, &indices);

        let moved = Vertex {
            normal: [1.0, 2.0, 0.0],
            ..Vertex::default()
        };
        buffer.apply_mutation(&AttributeMutation {
            updates: vec![(2, moved), (10, moved)],
        });
        assert_eq!(buffer.vertices()[2], moved);
        assert_eq!(buffer.vertices()[1], Vertex::default());
    }
}
