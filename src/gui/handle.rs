//! Overlay handles: screen-space anchoring, visibility and hit-testing of a
//! widget, decoupled from its vertex buffer.

use crate::geometry::{Point, Rect};
use crate::render::{AttributeMutation, UniformValues, Vertex};
use crate::screen::Screen;
use serde::Deserialize;

/// Persistent widgets drawn on top of the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    /// Compass, tappable.
    Compass,
    /// Marker of the current position.
    MyPosition,
}

/// Corner of the window a widget is laid out against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Top-left corner.
    TopLeft,
    /// Top-right corner.
    TopRight,
    /// Bottom-left corner.
    BottomLeft,
    /// Bottom-right corner.
    BottomRight,
    /// Center of the window.
    Center,
}

/// Position of a widget relative to a corner of the window.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Position {
    /// Reference corner.
    pub anchor: Anchor,
    /// Offset from the corner towards the inside of the window, in pixels.
    pub offset: Point<f32>,
}

impl Position {
    /// Resolves this position into pixel coordinates on the given screen.
    pub fn resolve(&self, screen: &Screen) -> Point<f32> {
        let w = screen.width() as f32;
        let h = screen.height() as f32;
        let Point { x: dx, y: dy } = self.offset;
        match self.anchor {
            Anchor::TopLeft => Point::new(dx, dy),
            Anchor::TopRight => Point::new(w - dx, dy),
            Anchor::BottomLeft => Point::new(dx, h - dy),
            Anchor::BottomRight => Point::new(w - dx, h - dy),
            Anchor::Center => Point::new(w / 2.0 + dx, h / 2.0 + dy),
        }
    }
}

/// Screen-space logic attached to a render bucket.
pub trait Handle: Send {
    /// Updates the handle for the current view. Returns whether the pivot
    /// moved.
    fn update(&mut self, screen: &Screen) -> bool;

    /// Whether the backing buffers are still alive.
    fn is_valid(&self) -> bool;

    /// Marks the backing buffers as gone, e.g. after losing the graphics
    /// context.
    fn invalidate(&mut self);

    /// Whether the widget is currently shown.
    fn is_visible(&self) -> bool;

    /// Shows or hides the widget.
    fn set_visible(&mut self, visible: bool);

    /// Anchor of the widget, in pixels.
    fn pivot(&self) -> Point<f32>;

    /// Moves the anchor of the widget, in pixels.
    fn set_pivot(&mut self, pivot: Point<f32>);

    /// Whether the given touch rectangle (in pixels) hits this widget.
    fn is_tapped(&self, touch: &Rect) -> bool;

    /// Reacts to a tap on this widget.
    fn on_tap(&mut self);

    /// Widget this handle belongs to.
    fn widget(&self) -> Widget;

    /// Handle-local uniforms of the next draw call.
    fn uniforms(&self) -> UniformValues;

    /// Vertices to replace before the next draw call, if any.
    fn attribute_mutation(&mut self) -> Option<AttributeMutation>;
}

/// Handle of a rectangular widget centered on its pivot.
pub struct ShapeHandle {
    widget: Widget,
    /// Layout against the window, recomputed on each update. Widgets without
    /// layout are moved explicitly with [`Handle::set_pivot()`].
    position: Option<Position>,
    pivot: Point<f32>,
    /// Size in pixels, used for hit-testing.
    size: Point<f32>,
    tappable: bool,
    visible: bool,
    valid: bool,
    /// Number of taps received so far.
    taps: usize,
    /// Vertices of the widget, scaled by a pulsing factor on each frame if
    /// set.
    pulse: Option<Pulse>,
}

/// Per-frame scaling of the vertex normals of a widget.
struct Pulse {
    base: Vec<Vertex>,
    frame: u32,
}

impl Pulse {
    /// Number of frames in a period.
    const PERIOD: u32 = 60;
    /// Maximal relative growth.
    const AMPLITUDE: f32 = 0.15;

    fn next(&mut self) -> AttributeMutation {
        self.frame = (self.frame + 1) % Self::PERIOD;
        let phase = self.frame as f32 / Self::PERIOD as f32 * std::f32::consts::TAU;
        let scale = 1.0 + Self::AMPLITUDE * phase.sin();
        let updates = self
            .base
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut v = *v;
                v.normal[0] *= scale;
                v.normal[1] *= scale;
                (i as u32, v)
            })
            .collect();
        AttributeMutation { updates }
    }
}

impl ShapeHandle {
    /// Creates a visible handle of the given size in pixels.
    pub fn new(widget: Widget, pivot: Point<f32>, size: Point<f32>) -> Self {
        Self {
            widget,
            position: None,
            pivot,
            size,
            tappable: false,
            visible: true,
            valid: true,
            taps: 0,
            pulse: None,
        }
    }

    /// Lays out the widget against the window.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Makes the widget react to taps.
    pub fn tappable(mut self) -> Self {
        self.tappable = true;
        self
    }

    /// Makes the widget pulse, given its vertices as laid out in its buffer.
    pub fn pulsing(mut self, vertices: &[Vertex]) -> Self {
        self.pulse = Some(Pulse {
            base: vertices.to_vec(),
            frame: 0,
        });
        self
    }

    /// Number of taps received so far.
    pub fn taps(&self) -> usize {
        self.taps
    }

    fn rect(&self) -> Rect {
        let half = Point::new(self.size.x as f64 / 2.0, self.size.y as f64 / 2.0);
        Rect::from_ltwh(
            self.pivot.x as f64 - half.x,
            self.pivot.y as f64 - half.y,
            self.size.x as f64,
            self.size.y as f64,
        )
    }
}

impl Handle for ShapeHandle {
    fn update(&mut self, screen: &Screen) -> bool {
        match self.position {
            Some(position) => {
                let pivot = position.resolve(screen);
                let moved = pivot != self.pivot;
                self.pivot = pivot;
                moved
            }
            None => false,
        }
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn pivot(&self) -> Point<f32> {
        self.pivot
    }

    fn set_pivot(&mut self, pivot: Point<f32>) {
        self.pivot = pivot;
    }

    fn is_tapped(&self, touch: &Rect) -> bool {
        self.tappable && self.visible && self.rect().intersects(touch)
    }

    fn on_tap(&mut self) {
        self.taps += 1;
    }

    fn widget(&self) -> Widget {
        self.widget
    }

    fn uniforms(&self) -> UniformValues {
        UniformValues {
            model_view: UniformValues::translation(self.pivot.x, self.pivot.y),
            ..UniformValues::default()
        }
    }

    fn attribute_mutation(&mut self) -> Option<AttributeMutation> {
        self.pulse.as_mut().map(Pulse::next)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn position_follows_window() {
        let position = Position {
            anchor: Anchor::BottomRight,
            offset: Point::new(40.0, 30.0),
        };
        let mut handle = ShapeHandle::new(Widget::Compass, Point::default(), Point::new(20.0, 20.0))
            .with_position(position);

        let mut screen = Screen::new(800, 600);
        assert!(handle.update(&screen));
        assert_eq!(handle.pivot(), Point::new(760.0, 570.0));
        assert!(!handle.update(&screen));

        screen.resize(1024, 768);
        assert!(handle.update(&screen));
        assert_eq!(handle.pivot(), Point::new(984.0, 738.0));
    }

    #[test]
    fn tap_requires_tappable_and_visible() {
        let touch = Rect::from_ltwh(95.0, 95.0, 10.0, 10.0);
        let plain = ShapeHandle::new(Widget::MyPosition, Point::new(100.0, 100.0), Point::new(20.0, 20.0));
        assert!(!plain.is_tapped(&touch));

        let mut compass = ShapeHandle::new(Widget::Compass, Point::new(100.0, 100.0), Point::new(20.0, 20.0))
            .tappable();
        assert!(compass.is_tapped(&touch));
        assert!(!compass.is_tapped(&Rect::from_ltwh(200.0, 200.0, 10.0, 10.0)));
        compass.on_tap();
        assert_eq!(compass.taps(), 1);
        compass.set_visible(false);
        assert!(!compass.is_tapped(&touch));
    }

    #[test]
    fn pulse_scales_normals() {
        let vertex = Vertex {
            normal: [10.0, -10.0, 0.0],
            ..Vertex::default()
        };
        let mut handle = ShapeHandle::new(Widget::MyPosition, Point::default(), Point::new(20.0, 20.0))
            .pulsing(&[vertex; 4]);
        let mutation = handle.attribute_mutation().unwrap();
        assert_eq!(mutation.updates.len(), 4);
        let (index, moved) = mutation.updates[3];
        assert_eq!(index, 3);
        assert!(moved.normal[0] > 10.0);
        assert_eq!(moved.normal[0], -moved.normal[1]);

        let still = ShapeHandle::new(Widget::Compass, Point::default(), Point::new(1.0, 1.0));
        let mut still: Box<dyn Handle> = Box::new(still);
        assert!(still.attribute_mutation().is_none());
    }
}
