#![forbid(unsafe_code)]

//! Normalized touch samples.
//!
//! A [`Touch`] is one sample of one physical finger: created on
//! [`TouchPhase::Down`], repositioned on [`TouchPhase::Moved`], destroyed on
//! [`TouchPhase::Up`]. Touches are plain values; each consumer keeps its own
//! cache of last-known positions.

use crate::geometry::Point;

/// Identifier of a physical finger, stable for the lifetime of one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TouchId(pub u32);

impl std::fmt::Display for TouchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "touch#{}", self.0)
    }
}

/// Lifecycle phase of a touch sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TouchPhase {
    Down,
    Moved,
    Up,
}

/// One normalized touch sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub id: TouchId,
    pub position: Point,
    pub phase: TouchPhase,
}

impl Touch {
    /// Create a touch sample.
    #[must_use]
    pub const fn new(id: TouchId, position: Point, phase: TouchPhase) -> Self {
        Self {
            id,
            position,
            phase,
        }
    }

    #[must_use]
    pub const fn down(id: u32, x: f64, y: f64) -> Self {
        Self::new(TouchId(id), Point::new(x, y), TouchPhase::Down)
    }

    #[must_use]
    pub const fn moved(id: u32, x: f64, y: f64) -> Self {
        Self::new(TouchId(id), Point::new(x, y), TouchPhase::Moved)
    }

    #[must_use]
    pub const fn up(id: u32, x: f64, y: f64) -> Self {
        Self::new(TouchId(id), Point::new(x, y), TouchPhase::Up)
    }
}

/// Aggregate of the touches currently held on a view.
///
/// Recomputed for every sample and never stored. For an `Up` sample the
/// lifted touch is already excluded, so `touch_count == 0` means the last
/// finger just left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchProperties {
    /// Mean position of the held touches (the sample position when none are held).
    pub center_of_gravity: Point,
    pub touch_count: usize,
}

impl TouchProperties {
    /// Compute properties over the held positions.
    ///
    /// `fallback` is used as the center when no touch is held.
    #[must_use]
    pub fn from_positions<I>(positions: I, fallback: Point) -> Self
    where
        I: IntoIterator<Item = Point>,
        I::IntoIter: Clone,
    {
        let iter = positions.into_iter();
        let touch_count = iter.clone().count();
        let center_of_gravity = Point::centroid(iter).unwrap_or(fallback);
        Self {
            center_of_gravity,
            touch_count,
        }
    }

    /// Properties for a lone touch at `position`.
    #[must_use]
    pub const fn single(position: Point) -> Self {
        Self {
            center_of_gravity: position,
            touch_count: 1,
        }
    }

    /// Properties after the last touch lifted at `position`.
    #[must_use]
    pub const fn released(position: Point) -> Self {
        Self {
            center_of_gravity: position,
            touch_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_constructors_set_phase() {
        assert_eq!(Touch::down(1, 0.0, 0.0).phase, TouchPhase::Down);
        assert_eq!(Touch::moved(1, 0.0, 0.0).phase, TouchPhase::Moved);
        assert_eq!(Touch::up(1, 0.0, 0.0).phase, TouchPhase::Up);
    }

    #[test]
    fn properties_center_is_mean() {
        let props = TouchProperties::from_positions(
            [Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
            Point::ORIGIN,
        );
        assert_eq!(props.touch_count, 2);
        assert_eq!(props.center_of_gravity, Point::new(50.0, 0.0));
    }

    #[test]
    fn properties_empty_uses_fallback() {
        let fallback = Point::new(7.0, 9.0);
        let props = TouchProperties::from_positions(Vec::<Point>::new(), fallback);
        assert_eq!(props.touch_count, 0);
        assert_eq!(props.center_of_gravity, fallback);
    }

    #[test]
    fn touch_id_display() {
        assert_eq!(TouchId(42).to_string(), "touch#42");
    }
}
