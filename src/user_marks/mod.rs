//! User marks and lines (bookmarks, tracks): render parameters, the
//! tile-indexed generator, and the geometry builder.

pub mod builder;
pub mod generator;

pub use builder::{cache_user_lines, cache_user_marks};
pub use generator::{UserMarkGenerator, UserMarkRenderData};

use crate::geometry::Point;
use crate::render::Color;
use std::collections::{BTreeMap, HashMap};

/// Identifier of a user mark.
pub type MarkId = u32;
/// Identifier of a user line.
pub type LineId = u32;
/// Identifier of a group of marks and lines.
pub type MarkGroupId = u32;

/// Identifiers of marks and lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdCollections {
    /// Mark identifiers.
    pub mark_ids: Vec<MarkId>,
    /// Line identifiers.
    pub line_ids: Vec<LineId>,
}

impl IdCollections {
    /// Checks whether there is no identifier at all.
    pub fn is_empty(&self) -> bool {
        self.mark_ids.is_empty() && self.line_ids.is_empty()
    }

    /// Removes all the identifiers.
    pub fn clear(&mut self) {
        self.mark_ids.clear();
        self.line_ids.clear();
    }
}

/// Render parameters of a point mark.
#[derive(Clone, Debug, PartialEq)]
pub struct UserMarkRenderParams {
    /// Position, in Mercator coordinates.
    pub pivot: Point<f64>,
    /// Lowest zoom level at which the mark is displayed.
    pub min_zoom: u32,
    /// Symbol to display from each zoom level on. A mark without symbol at
    /// a given zoom level is displayed as a colored circle.
    pub symbol_names: BTreeMap<u32, String>,
    /// Tint of the symbol, or color of the circle.
    pub color: Option<Color>,
    /// Title displayed below the symbol.
    pub title: Option<String>,
    /// Depth within the user mark layer.
    pub depth: f32,
    /// Whether the mark is displayed.
    pub is_visible: bool,
    /// Whether the mark was just created and should be animated on its first
    /// display.
    pub just_created: bool,
}

impl UserMarkRenderParams {
    /// Creates visible parameters for a mark at the given position, without
    /// symbol nor title.
    pub fn new(pivot: Point<f64>) -> Self {
        Self {
            pivot,
            min_zoom: 1,
            symbol_names: BTreeMap::new(),
            color: None,
            title: None,
            depth: 0.0,
            is_visible: true,
            just_created: false,
        }
    }

    /// Symbol to display at the given zoom level, if any.
    pub fn symbol_name(&self, zoom_level: u32) -> Option<&str> {
        self.symbol_names
            .range(..=zoom_level)
            .next_back()
            .map(|(_, name)| name.as_str())
    }
}

/// One stroke of a user line.
#[derive(Clone, Debug, PartialEq)]
pub struct UserLineLayer {
    /// Color of the stroke.
    pub color: Color,
    /// Width of the stroke, in pixels at full zoom.
    pub width: f32,
    /// Depth within the user line layer.
    pub depth: f32,
}

/// Render parameters of a polyline.
#[derive(Clone, Debug, PartialEq)]
pub struct UserLineRenderParams {
    /// Lowest zoom level at which the line is displayed.
    pub min_zoom: u32,
    /// Strokes, drawn in order.
    pub layers: Vec<UserLineLayer>,
    /// Path, in Mercator coordinates.
    pub points: Vec<Point<f64>>,
}

/// Render parameters of marks, by identifier.
pub type UserMarksRenderCollection = HashMap<MarkId, UserMarkRenderParams>;
/// Render parameters of lines, by identifier.
pub type UserLinesRenderCollection = HashMap<LineId, UserLineRenderParams>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn symbol_for_zoom_level() {
        let mut params = UserMarkRenderParams::new(Point::new(0.5, 0.5));
        assert_eq!(params.symbol_name(10), None);

        params.symbol_names.insert(5, "small".to_string());
        params.symbol_names.insert(12, "large".to_string());
        assert_eq!(params.symbol_name(4), None);
        assert_eq!(params.symbol_name(5), Some("small"));
        assert_eq!(params.symbol_name(11), Some("small"));
        assert_eq!(params.symbol_name(17), Some("large"));
    }
}
