//! Texture regions for symbols, colors and glyphs.

use super::Color;
use crate::geometry::Point;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// Identifier of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

/// A rectangular region of a texture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureRegion {
    /// Texture containing the region.
    pub texture: TextureId,
    /// Normalized texture coordinates `(u0, v0, u1, v1)`.
    pub tex_rect: [f32; 4],
    /// Size of the region in pixels.
    pub pixel_size: Point<f32>,
}

impl TextureRegion {
    /// Center of the region in normalized texture coordinates.
    pub fn tex_center(&self) -> [f32; 2] {
        [
            (self.tex_rect[0] + self.tex_rect[2]) / 2.0,
            (self.tex_rect[1] + self.tex_rect[3]) / 2.0,
        ]
    }
}

/// Provider of texture regions.
pub trait TextureManager: Send {
    /// Region of the named symbol, if the atlas contains it.
    fn symbol_region(&self, name: &str) -> Option<TextureRegion>;

    /// Region of the given color in the palette, allocating it if needed.
    /// Returns [`None`] if the palette is full.
    fn color_region(&self, color: Color) -> Option<TextureRegion>;

    /// Region of the given character glyph, if the font contains it.
    fn glyph_region(&self, c: char) -> Option<TextureRegion>;
}

/// Palette texture allocating one cell per distinct color.
struct ColorPalette {
    cells: HashMap<u32, u32>,
}

/// Texture manager with a fixed symbol atlas, a color palette and a
/// monospace ASCII font.
pub struct StaticTextureManager {
    symbols: HashMap<String, TextureRegion>,
    palette: Mutex<ColorPalette>,
}

impl StaticTextureManager {
    /// Texture of the symbol atlas.
    pub const SYMBOLS_TEXTURE: TextureId = TextureId(1);
    /// Texture of the color palette.
    pub const COLORS_TEXTURE: TextureId = TextureId(2);
    /// Texture of the glyphs.
    pub const GLYPHS_TEXTURE: TextureId = TextureId(3);

    /// Width of the symbol atlas, in pixels.
    const ATLAS_WIDTH: f32 = 1024.0;
    /// Number of palette cells along each axis.
    const PALETTE_SIZE: u32 = 32;
    /// Size of a glyph, in pixels.
    const GLYPH_SIZE: Point<f32> = Point::new(8.0, 16.0);
    /// Printable ASCII range covered by the font.
    const GLYPH_RANGE: std::ops::RangeInclusive<char> = ' '..='~';

    /// Packs the given symbols (name to pixel size) into an atlas, row by
    /// row.
    pub fn new(symbols: &BTreeMap<String, [f32; 2]>) -> Self {
        let mut packed = Vec::with_capacity(symbols.len());
        let mut cursor = Point::new(0.0_f32, 0.0_f32);
        let mut row_height = 0.0_f32;
        for (name, &[w, h]) in symbols {
            if cursor.x + w > Self::ATLAS_WIDTH {
                cursor = Point::new(0.0, cursor.y + row_height);
                row_height = 0.0;
            }
            packed.push((name.clone(), cursor, Point::new(w, h)));
            cursor.x += w;
            row_height = row_height.max(h);
        }
        let atlas_height = (cursor.y + row_height).max(1.0);

        let symbols: HashMap<String, TextureRegion> = packed
            .into_iter()
            .map(|(name, origin, size)| {
                let region = TextureRegion {
                    texture: Self::SYMBOLS_TEXTURE,
                    tex_rect: [
                        origin.x / Self::ATLAS_WIDTH,
                        origin.y / atlas_height,
                        (origin.x + size.x) / Self::ATLAS_WIDTH,
                        (origin.y + size.y) / atlas_height,
                    ],
                    pixel_size: size,
                };
                (name, region)
            })
            .collect();
        debug!("Packed {} symbols in a {}x{atlas_height} atlas", symbols.len(), Self::ATLAS_WIDTH);

        Self {
            symbols,
            palette: Mutex::new(ColorPalette {
                cells: HashMap::new(),
            }),
        }
    }

    fn cell_region(texture: TextureId, index: u32, per_axis: u32, pixel_size: Point<f32>) -> TextureRegion {
        let cell = 1.0 / per_axis as f32;
        let u = (index % per_axis) as f32 * cell;
        let v = (index / per_axis) as f32 * cell;
        TextureRegion {
            texture,
            tex_rect: [u, v, u + cell, v + cell],
            pixel_size,
        }
    }
}

impl TextureManager for StaticTextureManager {
    fn symbol_region(&self, name: &str) -> Option<TextureRegion> {
        self.symbols.get(name).copied()
    }

    fn color_region(&self, color: Color) -> Option<TextureRegion> {
        let mut palette = self.palette.lock().unwrap_or_else(PoisonError::into_inner);
        let capacity = (Self::PALETTE_SIZE * Self::PALETTE_SIZE) as usize;
        let next = palette.cells.len() as u32;
        let key = color.to_rgba8();
        let index = match palette.cells.get(&key) {
            Some(&index) => index,
            None if palette.cells.len() < capacity => {
                palette.cells.insert(key, next);
                next
            }
            None => {
                warn!("Color palette is full, can't allocate {color:?}");
                return None;
            }
        };
        Some(Self::cell_region(
            Self::COLORS_TEXTURE,
            index,
            Self::PALETTE_SIZE,
            Point::new(1.0, 1.0),
        ))
    }

    fn glyph_region(&self, c: char) -> Option<TextureRegion> {
        if !Self::GLYPH_RANGE.contains(&c) {
            return None;
        }
        let index = c as u32 - ' ' as u32;
        // 95 glyphs fit in a 10x10 grid.
        Some(Self::cell_region(
            Self::GLYPHS_TEXTURE,
            index,
            10,
            Self::GLYPH_SIZE,
        ))
    }
}
