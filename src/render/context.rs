//! Graphics context abstraction, compiled programs and uniforms.

use super::buffer::VertexArrayBuffer;
use super::{ProgramId, RenderState};
use clap::ValueEnum;
use log::debug;
use std::collections::HashMap;

/// Graphics API backing a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum ApiVersion {
    /// OpenGL ES 3.
    #[value(name = "opengles3")]
    OpenGLES3,
    /// Metal.
    Metal,
    /// Vulkan.
    Vulkan,
}

impl ApiVersion {
    /// Whether the API expects normalized depth in `[0, 1]` rather than
    /// `[-1, 1]`.
    pub fn uses_unsigned_depth(self) -> bool {
        match self {
            ApiVersion::OpenGLES3 => false,
            ApiVersion::Metal | ApiVersion::Vulkan => true,
        }
    }
}

/// Uniform values of a draw call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformValues {
    /// Column-major projection matrix.
    pub projection: [f32; 16],
    /// Column-major model-view matrix.
    pub model_view: [f32; 16],
    /// Global opacity.
    pub opacity: f32,
}

impl UniformValues {
    /// Column-major identity matrix.
    pub const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    /// Returns a column-major matrix translating by `(x, y)`.
    pub fn translation(x: f32, y: f32) -> [f32; 16] {
        let mut m = Self::IDENTITY;
        m[12] = x;
        m[13] = y;
        m
    }
}

impl Default for UniformValues {
    fn default() -> Self {
        Self {
            projection: Self::IDENTITY,
            model_view: Self::IDENTITY,
            opacity: 1.0,
        }
    }
}

/// A program compiled for a graphics context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    id: ProgramId,
    api: ApiVersion,
}

impl Program {
    /// Identifier of the program.
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// API this program was compiled for.
    pub fn api(&self) -> ApiVersion {
        self.api
    }
}

/// Lookup of compiled programs.
pub struct ProgramManager {
    api: ApiVersion,
    programs: HashMap<ProgramId, Program>,
}

impl ProgramManager {
    /// Compiles all the engine programs for the given API.
    pub fn new(api: ApiVersion) -> Self {
        let programs = ProgramId::ALL
            .iter()
            .map(|&id| (id, Program { id, api }))
            .collect();
        debug!("Compiled {} programs for {api:?}", ProgramId::ALL.len());
        Self { api, programs }
    }

    /// API the programs were compiled for.
    pub fn api(&self) -> ApiVersion {
        self.api
    }

    /// Returns the given program, unless programs were destroyed.
    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(&id)
    }

    /// Destroys all the programs, e.g. when the graphics context is lost.
    pub fn destroy(&mut self) {
        debug!("Destroying {} programs", self.programs.len());
        self.programs.clear();
    }
}

/// Graphics API entry points used by the renderers.
pub trait GraphicsContext {
    /// API of this context.
    fn api(&self) -> ApiVersion;

    /// Starts a new frame.
    fn begin_frame(&mut self);

    /// Applies a pipeline state for the next draw calls.
    fn apply_state(&mut self, state: &RenderState);

    /// Sets the uniforms of the given program for the next draw calls.
    fn apply_uniforms(&mut self, program: &Program, uniforms: &UniformValues);

    /// Draws the indexed triangles of the given buffer.
    fn draw_indexed(&mut self, program: &Program, buffer: &VertexArrayBuffer);
}

/// Draw call recorded by a [`RecordingContext`].
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    /// Program used.
    pub program: ProgramId,
    /// Last state applied before the call.
    pub state: Option<RenderState>,
    /// Last uniforms applied before the call.
    pub uniforms: UniformValues,
    /// Number of vertices in the buffer.
    pub vertex_count: usize,
    /// Number of indices drawn.
    pub index_count: usize,
}

/// Headless context recording the draw calls of the current frame.
pub struct RecordingContext {
    api: ApiVersion,
    frames: usize,
    state: Option<RenderState>,
    uniforms: UniformValues,
    draw_calls: Vec<DrawCall>,
}

impl RecordingContext {
    /// Creates a context for the given API.
    pub fn new(api: ApiVersion) -> Self {
        Self {
            api,
            frames: 0,
            state: None,
            uniforms: UniformValues::default(),
            draw_calls: Vec::new(),
        }
    }

    /// Number of frames started so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Draw calls of the current frame.
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }
}

impl GraphicsContext for RecordingContext {
    fn api(&self) -> ApiVersion {
        self.api
    }

    fn begin_frame(&mut self) {
        self.frames += 1;
        self.state = None;
        self.draw_calls.clear();
    }

    fn apply_state(&mut self, state: &RenderState) {
        self.state = Some(*state);
    }

    fn apply_uniforms(&mut self, _program: &Program, uniforms: &UniformValues) {
        self.uniforms = *uniforms;
    }

    fn draw_indexed(&mut self, program: &Program, buffer: &VertexArrayBuffer) {
        self.draw_calls.push(DrawCall {
            program: program.id(),
            state: self.state,
            uniforms: self.uniforms,
            vertex_count: buffer.vertex_count(),
            index_count: buffer.index_count(),
        });
    }
}
