//! Tiles: the unit of spatial indexing and cache invalidation.

pub mod key;
pub mod tile_box;

pub use key::TileKey;
pub use tile_box::TileBox;
