//! GPU-side data model: pipeline states, vertex buffers, render buckets, and
//! the collaborators the engine draws through.
//!
//! The graphics API itself is behind the [`GraphicsContext`] trait; the crate
//! ships a [`RecordingContext`] that records draw calls instead of issuing
//! them.

pub mod batcher;
pub mod bucket;
pub mod buffer;
pub mod context;
pub mod projection;
pub mod textures;

pub use batcher::{Batcher, BatcherSession};
pub use bucket::RenderBucket;
pub use buffer::{AttributeMutation, Vertex, VertexArrayBuffer};
pub use context::{
    ApiVersion, DrawCall, GraphicsContext, Program, ProgramManager, RecordingContext,
    UniformValues,
};
pub use projection::make_projection;
pub use textures::{StaticTextureManager, TextureId, TextureManager, TextureRegion};

use rand::distr::Open01;
use rand::{rng, Rng};
use serde::Deserialize;

/// RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Color(pub [f32; 4]);

impl Color {
    /// Opaque white.
    pub const WHITE: Color = Color([1.0, 1.0, 1.0, 1.0]);

    /// Creates a new random opaque color.
    pub fn new_random() -> Self {
        let mut rng = rng();
        let r = rng.sample(Open01);
        let g = rng.sample(Open01);
        let b = rng.sample(Open01);
        Self([r, g, b, 1.0])
    }

    /// Packs the color into 8-bit RGBA channels.
    pub fn to_rgba8(self) -> u32 {
        self.0.iter().fold(0, |acc, c| {
            (acc << 8) | (c.clamp(0.0, 1.0) * 255.0).round() as u32
        })
    }
}

/// Compiled GPU programs known to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgramId {
    /// Textured point symbol of a user mark.
    UserMark,
    /// Colored circle, for user marks without symbol.
    ColoredSymbol,
    /// Text glyphs.
    Text,
    /// Polyline of a user line.
    UserLine,
    /// Textured GUI widget.
    TexturingGui,
    /// Current position marker.
    MyPosition,
}

impl ProgramId {
    /// All the programs.
    pub const ALL: [ProgramId; 6] = [
        ProgramId::UserMark,
        ProgramId::ColoredSymbol,
        ProgramId::Text,
        ProgramId::UserLine,
        ProgramId::TexturingGui,
        ProgramId::MyPosition,
    ];
}

/// Depth layers, drawn from first to last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DepthLayer {
    /// User lines, below the marks.
    UserLine,
    /// User marks and their titles.
    UserMark,
    /// GUI widgets, on top of the map.
    Gui,
}

/// Pipeline state shared by all the geometry of a render bucket.
///
/// Ordering follows the drawing order: depth layer first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderState {
    /// Depth layer.
    pub depth_layer: DepthLayer,
    /// Program to draw with.
    pub program: ProgramId,
    /// Texture to bind, if any.
    pub texture: Option<TextureId>,
    /// Whether the depth test is enabled.
    pub depth_test: bool,
}

impl RenderState {
    /// Creates a state with depth test enabled.
    pub fn new(program: ProgramId, depth_layer: DepthLayer, texture: Option<TextureId>) -> Self {
        Self {
            depth_layer,
            program,
            texture,
            depth_test: true,
        }
    }
}
