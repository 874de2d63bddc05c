//! Viewport of the map on the screen.

use crate::geometry::{Point, Rect};
use crate::tile::TileBox;

/// Viewport of the map: window size in pixels, zoom and position of the
/// world.
#[derive(Clone, Debug, PartialEq)]
pub struct Screen {
    /// Window width, in pixels.
    width: f64,
    /// Window height, in pixels.
    height: f64,
    /// Minimal zoom level that is acceptable, based on the window size.
    min_zoom: f64,
    /// Current zoom level, measured in pixels per Mercator unit.
    ///
    /// Under Mercator coordinates, the whole world is a unit square (i.e. of
    /// size 1.0 x 1.0).
    zoom: f64,
    /// Offset of the top-left corner of the world w.r.t the center of the
    /// window, in Mercator coordinates.
    offset: Point<f64>,
}

impl Screen {
    /// Maximum zoom level that is acceptable, in pixels per Mercator unit.
    const MAX_ZOOM: f64 = /* 2^25 */ 33_554_432.0;

    /// Returns a default view showing the whole world, based on the given
    /// window size.
    pub fn new(width: u32, height: u32) -> Self {
        let min_zoom = std::cmp::min(width, height).max(1) as f64;

        Self {
            width: width as f64,
            height: height as f64,
            min_zoom,
            zoom: min_zoom,
            offset: Point { x: -0.5, y: -0.5 },
        }
    }

    /// Returns the window width, in pixels.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Returns the window height, in pixels.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Returns the zoom level, in pixels per Mercator unit.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Adjusts the view to the given new window size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width as f64;
        self.height = height as f64;
        self.min_zoom = self.width.min(self.height).max(1.0);
        self.zoom = self.zoom.max(self.min_zoom);
        self.clamp();
    }

    /// Adjusts the zoom level based on the given mouse scroll, keeping the
    /// center of the window in place.
    pub fn scroll(&mut self, scroll: f64) {
        self.zoom *= (scroll / 10.0).exp2();
        self.zoom = self.zoom.clamp(self.min_zoom, Self::MAX_ZOOM);
        self.clamp();
    }

    /// Moves the view by the given mouse drag, in pixels.
    pub fn drag_relative(&mut self, dx: f64, dy: f64) {
        self.offset.x += dx / self.zoom;
        self.offset.y += dy / self.zoom;
        self.clamp();
    }

    /// Centers the view on the given world point.
    pub fn set_center(&mut self, center: Point<f64>) {
        self.offset = Point::new(-center.x, -center.y);
        self.clamp();
    }

    /// Returns the world point at the center of the window.
    pub fn center(&self) -> Point<f64> {
        Point::new(-self.offset.x, -self.offset.y)
    }

    /// Adjusts the position based on the constraints (the world shouldn't go
    /// out of the window).
    fn clamp(&mut self) {
        // Offset such that the top-left corner of the world `(0.0, 0.0)`
        // coincides with the top-left corner of the window.
        let offset00 = Point {
            x: -self.width / (2.0 * self.zoom),
            y: -self.height / (2.0 * self.zoom),
        };

        // Offset such that the bottom-right corner of the world `(1.0, 1.0)`
        // coincides with the bottom-right corner of the window.
        let offset11 = Point {
            x: self.width / (2.0 * self.zoom) - 1.0,
            y: self.height / (2.0 * self.zoom) - 1.0,
        };

        // For the x axis, allow the map border to be in the middle of the window.
        self.offset.x = self.offset.x.max(offset00.x.min(-1.0));
        self.offset.x = self.offset.x.min(offset11.x.max(0.0));
        // For the y axis, clamp to the window.
        self.offset.y = self.offset.y.max(offset00.y.min(offset11.y));
        self.offset.y = self.offset.y.min(offset00.y.max(offset11.y));
    }

    /// Converts a world point into pixel coordinates.
    pub fn g_to_p(&self, g: Point<f64>) -> Point<f64> {
        Point::new(
            (g.x + self.offset.x) * self.zoom + self.width / 2.0,
            (g.y + self.offset.y) * self.zoom + self.height / 2.0,
        )
    }

    /// Converts pixel coordinates into a world point.
    pub fn p_to_g(&self, p: Point<f64>) -> Point<f64> {
        Point::new(
            (p.x - self.width / 2.0) / self.zoom - self.offset.x,
            (p.y - self.height / 2.0) / self.zoom - self.offset.y,
        )
    }

    /// Returns the world rectangle visible in the window.
    pub fn clip_rect(&self) -> Rect {
        Rect::new(
            self.p_to_g(Point::new(0.0, 0.0)),
            self.p_to_g(Point::new(self.width, self.height)),
        )
    }

    /// Returns the box of visible tiles, see [`TileBox::for_viewport()`].
    pub fn tile_box(&self, max_pixels_per_tile: usize, max_tile_level: u32) -> TileBox {
        TileBox::for_viewport(
            &self.clip_rect(),
            self.zoom,
            max_pixels_per_tile,
            max_tile_level,
        )
    }
}
