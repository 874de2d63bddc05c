//! Basic 2D geometry: points, rectangles, and conversion of latitude-longitude
//! coordinates into Mercator's projection.
//!
//! Under Mercator coordinates, the whole world is a unit square (i.e. of size
//! 1.0 x 1.0), with `(0.0, 0.0)` at the North-West corner.

use serde::Deserialize;

/// Data structure representing a point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Point<T> {
    /// X coordinate.
    pub x: T,
    /// Y coordinate.
    pub y: T,
}

impl<T> Point<T> {
    /// Creates a new point.
    pub const fn new(x: T, y: T) -> Self {
        Point { x, y }
    }
}

impl Point<f64> {
    /// Converts the point to single precision, e.g. to store it in a vertex.
    pub fn to_f32(self) -> Point<f32> {
        Point {
            x: self.x as f32,
            y: self.y as f32,
        }
    }
}

/// Data structure representing a latitude-longitude coordinate.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct LatLon {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl LatLon {
    /// Converts the coordinates into Mercator's projection.
    pub fn as_mercator(&self) -> Point<f64> {
        let x = 0.5 + self.lon / 360.0;
        let s = (self.lat * std::f64::consts::PI / 180.0).tan().asinh();
        let y = 0.5 - s / (2.0 * std::f64::consts::PI);

        Point { x, y }
    }
}

/// An axis-aligned rectangle. An empty rectangle has `min > max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    /// Inclusive minimum corner.
    pub min: Point<f64>,
    /// Inclusive maximum corner.
    pub max: Point<f64>,
}

impl Rect {
    /// Creates a rectangle from its corners.
    pub fn new(min: Point<f64>, max: Point<f64>) -> Self {
        Self { min, max }
    }

    /// Creates a rectangle from `(left, top, width, height)`.
    pub fn from_ltwh(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            min: Point::new(left, top),
            max: Point::new(left + width, top + height),
        }
    }

    /// Returns an empty rectangle, which becomes a valid rectangle once a
    /// point is added to it.
    pub fn empty() -> Self {
        Self {
            min: Point::new(f64::INFINITY, f64::INFINITY),
            max: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Returns the smallest rectangle enclosing all the given points, or
    /// [`None`] if there are no points.
    pub fn bounding<'a>(points: impl IntoIterator<Item = &'a Point<f64>>) -> Option<Self> {
        let mut rect = Self::empty();
        for p in points {
            rect.add(*p);
        }
        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }

    /// Checks whether this rectangle encloses no point.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Extends the rectangle to enclose the given point.
    pub fn add(&mut self, p: Point<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Center of the rectangle.
    pub fn center(&self) -> Point<f64> {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Checks whether the given point lies within the rectangle (borders
    /// included).
    pub fn contains(&self, p: Point<f64>) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    /// Checks whether the two rectangles share at least one point.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Returns a copy of this rectangle grown by `dx` and `dy` on each side.
    pub fn inflated(&self, dx: f64, dy: f64) -> Self {
        Self {
            min: Point::new(self.min.x - dx, self.min.y - dy),
            max: Point::new(self.max.x + dx, self.max.y + dy),
        }
    }
}

/// Clips the segment `[a, b]` to the given rectangle (Liang-Barsky), returning
/// the visible part if any.
pub fn clip_segment(rect: &Rect, a: Point<f64>, b: Point<f64>) -> Option<(Point<f64>, Point<f64>)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    let checks = [
        (-dx, a.x - rect.min.x),
        (dx, rect.max.x - a.x),
        (-dy, a.y - rect.min.y),
        (dy, rect.max.y - a.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
    }

    Some((
        Point::new(a.x + t0 * dx, a.y + t0 * dy),
        Point::new(a.x + t1 * dx, a.y + t1 * dy),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mercator_origin_is_center() {
        let p = LatLon { lat: 0.0, lon: 0.0 }.as_mercator();
        assert!((p.x - 0.5).abs() < 1e-12);
        assert!((p.y - 0.5).abs() < 1e-12);

        let east = LatLon { lat: 0.0, lon: 90.0 }.as_mercator();
        assert!((east.x - 0.75).abs() < 1e-12);
        let north = LatLon { lat: 45.0, lon: 0.0 }.as_mercator();
        assert!(north.y < 0.5);
    }

    #[test]
    fn rect_bounding() {
        assert_eq!(Rect::bounding(&Vec::<Point<f64>>::new()), None);
        let points = [Point::new(0.25, 0.5), Point::new(0.1, 0.75)];
        let rect = Rect::bounding(&points).unwrap();
        assert_eq!(rect.min, Point::new(0.1, 0.5));
        assert_eq!(rect.max, Point::new(0.25, 0.75));
        assert!(rect.contains(Point::new(0.2, 0.6)));
        assert!(!rect.contains(Point::new(0.3, 0.6)));
    }

    #[test]
    fn rect_intersects() {
        let a = Rect::from_ltwh(0.0, 0.0, 1.0, 1.0);
        let b = Rect::from_ltwh(0.5, 0.5, 1.0, 1.0);
        let c = Rect::from_ltwh(2.0, 2.0, 1.0, 1.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&Rect::empty()));
    }

    #[test]
    fn clip_segment_inside_and_outside() {
        let rect = Rect::from_ltwh(0.0, 0.0, 1.0, 1.0);
        let inside = clip_segment(&rect, Point::new(0.2, 0.2), Point::new(0.8, 0.4));
        assert_eq!(inside, Some((Point::new(0.2, 0.2), Point::new(0.8, 0.4))));

        let outside = clip_segment(&rect, Point::new(2.0, 0.0), Point::new(3.0, 1.0));
        assert_eq!(outside, None);

        let (a, b) = clip_segment(&rect, Point::new(-1.0, 0.5), Point::new(2.0, 0.5)).unwrap();
        assert!((a.x - 0.0).abs() < 1e-12 && (a.y - 0.5).abs() < 1e-12);
        assert!((b.x - 1.0).abs() < 1e-12 && (b.y - 0.5).abs() < 1e-12);
    }
}
