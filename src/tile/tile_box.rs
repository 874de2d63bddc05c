//! A rectangular set of a tiles at a given zoom level.

use crate::geometry::{Point, Rect};
use crate::tile::TileKey;
use log::trace;

/// A rectangular set of a tiles at a given zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileBox {
    /// Zoom level.
    z: u32,
    /// Inclusive minimum of the box.
    min: Point<u32>,
    /// Exclusive maximum of the box.
    max: Point<u32>,
}

impl TileBox {
    /// The root tile box, containing the whole world at the lowest zoom level.
    pub fn root() -> Self {
        TileBox {
            z: 0,
            min: Point { x: 0, y: 0 },
            max: Point { x: 1, y: 1 },
        }
    }

    /// Checks that this tile box is valid, i.e. the min and max points are
    /// properly ordered, and within bounds of the zoom level.
    #[cfg(test)]
    fn is_valid(&self) -> bool {
        self.min.x < self.max.x
            && self.min.y < self.max.y
            && self.min.x >> self.z == 0
            && self.min.y >> self.z == 0
            && (self.max.x - 1) >> self.z == 0
            && (self.max.y - 1) >> self.z == 0
    }

    /// Zoom level of the tiles in this box.
    pub fn zoom_level(&self) -> u32 {
        self.z
    }

    /// Counts the number of tiles within the box.
    pub fn len(&self) -> usize {
        (self.max.x - self.min.x) as usize * (self.max.y - self.min.y) as usize
    }

    /// Checks whether the given tile is contained in this tile box.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.z == key.zoom_level
            && self.min.x <= key.x
            && key.x < self.max.x
            && self.min.y <= key.y
            && key.y < self.max.y
    }

    /// Returns all the tiles contained in this box, at the current zoom level.
    pub fn tile_keys(&self) -> Vec<TileKey> {
        let mut result = Vec::with_capacity(self.len());
        for x in self.min.x..self.max.x {
            for y in self.min.y..self.max.y {
                result.push(TileKey {
                    zoom_level: self.z,
                    x,
                    y,
                });
            }
        }

        result
    }

    /// Returns the box of all the tiles at zoom level `z` whose coverage
    /// intersects the given world rectangle.
    ///
    /// The rectangle is clamped to the world, so the result always contains at
    /// least one tile.
    pub fn covering(rect: &Rect, z: u32) -> Self {
        let min = TileKey::for_point(rect.min, z);
        let max = TileKey::for_point(rect.max, z);
        TileBox {
            z,
            min: Point { x: min.x, y: min.y },
            max: Point {
                x: max.x.max(min.x) + 1,
                y: max.y.max(min.y) + 1,
            },
        }
    }

    /// Returns the smallest tile box containing the given visible world
    /// rectangle. The box's zoom level is chosen such that each tile is
    /// displayed with at most `max_pixels_per_tile` pixels based on the
    /// screen's `pixels_per_unit`, clamped to `max_tile_level`.
    pub fn for_viewport(
        visible: &Rect,
        pixels_per_unit: f64,
        max_pixels_per_tile: usize,
        max_tile_level: u32,
    ) -> Self {
        let mut ideal_level = -((max_pixels_per_tile as f64) / pixels_per_unit)
            .log2()
            .floor() as i32;

        if ideal_level < 0 {
            trace!("Clamping negative level {ideal_level} => 0");
            ideal_level = 0;
        } else if ideal_level > max_tile_level as i32 {
            trace!("Clamping too large level {ideal_level} => {max_tile_level}");
            ideal_level = max_tile_level as i32;
        }

        trace!("Ideal tile level = {ideal_level} (pixels per unit = {pixels_per_unit})");
        let result = Self::covering(visible, ideal_level as u32);

        trace!("Ideal tiles: {result:?}");
        trace!("Ideal tile count: {}", result.len());

        result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tile_box_root() {
        let root = TileBox::root();
        assert!(root.is_valid());
        assert_eq!(root.len(), 1);
        assert_eq!(root.tile_keys(), vec![TileKey::new(0, 0, 0)]);
    }

    #[test]
    fn tile_box_len() {
        let z = 3;
        let max = 1 << z;
        for maxx in 1..=max {
            for minx in 0..maxx {
                for maxy in 1..=max {
                    for miny in 0..maxy {
                        let tile_box = TileBox {
                            z,
                            min: Point { x: minx, y: miny },
                            max: Point { x: maxx, y: maxy },
                        };

                        assert!(tile_box.is_valid());
                        assert_eq!(tile_box.len(), tile_box.tile_keys().len());
                        for key in tile_box.tile_keys() {
                            assert!(tile_box.contains(&key));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn tile_box_covering_matches_intersections() {
        let rects = [
            Rect::from_ltwh(0.1, 0.2, 0.3, 0.05),
            Rect::from_ltwh(0.0, 0.0, 1.0, 1.0),
            Rect::from_ltwh(0.5, 0.5, 0.0, 0.0),
            Rect::from_ltwh(0.7, 0.01, 0.29, 0.6),
        ];
        for rect in &rects {
            for z in 0..5 {
                let tile_box = TileBox::covering(rect, z);
                assert!(tile_box.is_valid());
                let n = TileKey::tiles_per_axis(z);
                for x in 0..n {
                    for y in 0..n {
                        let key = TileKey::new(x, y, z);
                        if tile_box.contains(&key) {
                            assert!(key.rect().intersects(rect), "{key:?} vs {rect:?}");
                        }
                    }
                }
                assert!(tile_box.contains(&TileKey::for_point(rect.min, z)));
                assert!(tile_box.contains(&TileKey::for_point(rect.max, z)));
            }
        }
    }

    #[test]
    fn tile_box_for_viewport_levels() {
        let world = Rect::from_ltwh(0.0, 0.0, 1.0, 1.0);
        // 512 pixels for the whole world: one tile.
        assert_eq!(TileBox::for_viewport(&world, 512.0, 512, 15), TileBox::root());

        // 2048 pixels for the whole world: zoom level 2.
        let tile_box = TileBox::for_viewport(&world, 2048.0, 512, 15);
        assert_eq!(tile_box.zoom_level(), 2);
        assert_eq!(tile_box.len(), 16);

        // Clamped to the maximum tile level.
        let small = Rect::from_ltwh(0.5, 0.5, 0.001, 0.001);
        let tile_box = TileBox::for_viewport(&small, 1e9, 256, 10);
        assert_eq!(tile_box.zoom_level(), 10);
    }
}
