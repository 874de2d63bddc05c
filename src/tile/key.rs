//! Index of a map tile.

use crate::geometry::{Point, Rect};

/// Index of a tile in Mercator coordinates.
///
/// Ordering is defined over the triple, zoom level first, so that iterating
/// over an ordered collection of keys goes from coarse to fine tiles.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TileKey {
    /// Zoom level.
    pub zoom_level: u32,
    /// Index from West to East.
    pub x: u32,
    /// Index from North to South.
    pub y: u32,
}

impl TileKey {
    /// Highest zoom level whose tile indices fit in a `u32`.
    pub const MAX_ZOOM_LEVEL: u32 = 31;

    /// Creates a tile key.
    pub const fn new(x: u32, y: u32, zoom_level: u32) -> Self {
        Self { zoom_level, x, y }
    }

    /// Number of tiles along each axis at the given zoom level, which must not
    /// exceed [`Self::MAX_ZOOM_LEVEL`].
    pub fn tiles_per_axis(zoom_level: u32) -> u32 {
        debug_assert!(zoom_level <= Self::MAX_ZOOM_LEVEL);
        1 << zoom_level
    }

    /// Returns the tile containing the given point at the given zoom level.
    ///
    /// Points outside of the world are clamped to the border tiles, and points
    /// lying on a tile boundary belong to the tile on their right (resp.
    /// bottom).
    pub fn for_point(p: Point<f64>, zoom_level: u32) -> Self {
        let n = Self::tiles_per_axis(zoom_level);
        Self {
            zoom_level,
            x: Self::clamp_coordinate(p.x, n),
            y: Self::clamp_coordinate(p.y, n),
        }
    }

    /// Converts a world coordinate into a tile coordinate among `n` tiles.
    pub(crate) fn clamp_coordinate(v: f64, n: u32) -> u32 {
        let scaled = (v * n as f64).floor();
        if scaled.is_nan() || scaled < 0.0 {
            0
        } else if scaled >= n as f64 {
            n - 1
        } else {
            scaled as u32
        }
    }

    /// Size of a tile at this zoom level w.r.t. a world square of length 1.0.
    pub fn size(&self) -> f64 {
        0.5_f64.powi(self.zoom_level as i32)
    }

    /// Returns the rectangle occupied by this tile w.r.t. a world square of
    /// length 1.0.
    pub fn rect(&self) -> Rect {
        let size = self.size();
        Rect::from_ltwh(self.x as f64 * size, self.y as f64 * size, size, size)
    }

    /// Returns the center of this tile in world coordinates.
    pub fn center(&self) -> Point<f64> {
        self.rect().center()
    }

    /// Returns the parent tile (one zoom level less), or `None` if this is the
    /// root tile.
    pub fn parent(&self) -> Option<TileKey> {
        self.ancestor_at(self.zoom_level.checked_sub(1)?)
    }

    /// Returns the tile at the given (lower or equal) zoom level containing
    /// this tile, or `None` if `zoom_level` is larger than this tile's zoom
    /// level.
    pub fn ancestor_at(&self, zoom_level: u32) -> Option<TileKey> {
        let shift = self.zoom_level.checked_sub(zoom_level)?;
        Some(TileKey {
            zoom_level,
            x: self.x >> shift,
            y: self.y >> shift,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tile_key_for_point() {
        let p = Point::new(0.3, 0.8);
        assert_eq!(TileKey::for_point(p, 0), TileKey::new(0, 0, 0));
        assert_eq!(TileKey::for_point(p, 1), TileKey::new(0, 1, 1));
        assert_eq!(TileKey::for_point(p, 3), TileKey::new(2, 6, 3));

        // Clamped to the world.
        assert_eq!(
            TileKey::for_point(Point::new(-0.5, 1.5), 2),
            TileKey::new(0, 3, 2)
        );
        assert_eq!(
            TileKey::for_point(Point::new(1.0, 1.0), 2),
            TileKey::new(3, 3, 2)
        );
    }

    #[test]
    fn tile_key_rect_contains_its_points() {
        let z = 4;
        let n = TileKey::tiles_per_axis(z);
        for x in 0..n {
            for y in 0..n {
                let key = TileKey::new(x, y, z);
                assert_eq!(TileKey::for_point(key.center(), z), key);
                assert!(key.rect().contains(key.center()));
            }
        }
    }

    #[test]
    fn tile_key_parents() {
        let key = TileKey::new(13, 6, 4);
        assert_eq!(key.parent(), Some(TileKey::new(6, 3, 3)));
        assert_eq!(key.ancestor_at(1), Some(TileKey::new(1, 0, 1)));
        assert_eq!(key.ancestor_at(4), Some(key));
        assert_eq!(key.ancestor_at(5), None);
        assert_eq!(TileKey::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn tile_key_ordering() {
        let mut keys = vec![
            TileKey::new(1, 0, 2),
            TileKey::new(0, 0, 1),
            TileKey::new(0, 1, 2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                TileKey::new(0, 0, 1),
                TileKey::new(0, 1, 2),
                TileKey::new(1, 0, 2)
            ]
        );
    }
}
