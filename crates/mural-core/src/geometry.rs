#![forbid(unsafe_code)]

//! Geometric primitives in display coordinates.
//!
//! Touch positions, view frames, and gesture payloads all live in the same
//! floating-point plane: origin at the top-left of a screen segment, `x`
//! growing right and `y` growing down.

use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// A point in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// The origin.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).magnitude()
    }

    /// Mean of a set of points, or `None` when the set is empty.
    #[must_use]
    pub fn centroid<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut count = 0usize;
        let mut sum = Vector::ZERO;
        for point in points {
            sum += Vector::new(point.x, point.y);
            count += 1;
        }
        (count > 0).then(|| {
            let mean = sum / count as f64;
            Self::new(mean.dx, mean.dy)
        })
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Vector;

    fn sub(self, rhs: Self) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<Vector> for Point {
    type Output = Point;

    fn add(self, rhs: Vector) -> Point {
        Point::new(self.x + rhs.dx, self.y + rhs.dy)
    }
}

/// A displacement between two points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector {
    pub dx: f64,
    pub dy: f64,
}

impl Vector {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a new vector.
    #[inline]
    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Euclidean length.
    #[inline]
    #[must_use]
    pub fn magnitude(self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// True when both components are exactly zero.
    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Self) -> Vector {
        Vector::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Self) {
        self.dx += rhs.dx;
        self.dy += rhs.dy;
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        Vector::new(self.dx * rhs, self.dy * rhs)
    }
}

impl Div<f64> for Vector {
    type Output = Vector;

    fn div(self, rhs: f64) -> Vector {
        Vector::new(self.dx / rhs, self.dy / rhs)
    }
}

/// An axis-aligned rectangle used for window frames and view hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: f64,
    /// Top edge (inclusive).
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check if the rectangle has zero area.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Check if a point is inside the rectangle.
    ///
    /// Left and top edges are inclusive, right and bottom exclusive, so two
    /// frames sharing an edge never both claim a point on it.
    #[inline]
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Center of the rectangle.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        assert_eq!(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
        assert_eq!(Point::new(2.0, 2.0).distance(Point::new(2.0, 2.0)), 0.0);
    }

    #[test]
    fn centroid_of_empty_is_none() {
        assert_eq!(Point::centroid(std::iter::empty()), None);
    }

    #[test]
    fn centroid_is_mean() {
        let c = Point::centroid([Point::new(0.0, 0.0), Point::new(10.0, 20.0)]);
        assert_eq!(c, Some(Point::new(5.0, 10.0)));
    }

    #[test]
    fn point_minus_point_is_vector() {
        let v = Point::new(5.0, 7.0) - Point::new(2.0, 3.0);
        assert_eq!(v, Vector::new(3.0, 4.0));
        assert_eq!(v.magnitude(), 5.0);
    }

    #[test]
    fn vector_arithmetic() {
        let mut v = Vector::new(1.0, 2.0);
        v += Vector::new(1.0, 2.0);
        assert_eq!(v, Vector::new(2.0, 4.0));
        assert_eq!(v / 2.0, Vector::new(1.0, 2.0));
        assert_eq!(v * 0.5, Vector::new(1.0, 2.0));
        assert!(Vector::ZERO.is_zero());
    }

    #[test]
    fn rect_contains_edges() {
        let r = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(r.contains(Point::new(99.9, 49.9)));
        assert!(!r.contains(Point::new(100.0, 10.0)));
        assert!(!r.contains(Point::new(10.0, 50.0)));
        assert!(!r.contains(Point::new(-0.1, 10.0)));
    }

    #[test]
    fn adjacent_rects_do_not_share_edge() {
        let left = Rect::new(0.0, 0.0, 100.0, 100.0);
        let right = Rect::new(100.0, 0.0, 100.0, 100.0);
        let edge = Point::new(100.0, 50.0);
        assert!(!left.contains(edge));
        assert!(right.contains(edge));
    }

    #[test]
    fn rect_center_and_empty() {
        assert_eq!(Rect::new(10.0, 10.0, 20.0, 40.0).center(), Point::new(20.0, 30.0));
        assert!(Rect::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(!Rect::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }
}
