//! Persistent widgets drawn on top of the map: overlay handles, shapes and
//! their caching.

pub mod handle;
pub mod layer_cacher;
pub mod shape;

pub use handle::{Anchor, Handle, Position, ShapeHandle, Widget};
pub use layer_cacher::{GuiLayout, LayerCacher};
pub use shape::{ShapeControl, ShapeInfo, ShapeRenderer};
