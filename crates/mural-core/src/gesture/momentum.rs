#![forbid(unsafe_code)]

//! Friction-based momentum shared by the pan and pinch recognizers.
//!
//! After release a gesture keeps emitting a decaying copy of its last value.
//! Every tick divides the value by a friction factor and then raises the
//! factor by a fixed increment, so the decay accelerates. Once the value's
//! magnitude falls below the threshold the momentum settles.
//!
//! # Invariants
//!
//! 1. While active, each emitted value has a strictly smaller magnitude than
//!    the previous one (friction is always above one).
//! 2. For any finite start value the momentum settles within a bounded
//!    number of ticks.
//! 3. A settled momentum emits nothing until restarted.

use crate::geometry::Vector;

/// A value that can decay under friction.
pub trait Decay: Copy {
    /// Size compared against the settle threshold.
    fn magnitude(&self) -> f64;

    /// Divide by the friction factor.
    fn damp(self, friction: f64) -> Self;
}

impl Decay for f64 {
    fn magnitude(&self) -> f64 {
        self.abs()
    }

    fn damp(self, friction: f64) -> Self {
        self / friction
    }
}

impl Decay for Vector {
    fn magnitude(&self) -> f64 {
        Vector::magnitude(*self)
    }

    fn damp(self, friction: f64) -> Self {
        self / friction
    }
}

/// Friction parameters of one momentum channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrictionParams {
    /// Friction factor applied on the first tick. Must be greater than one.
    pub initial: f64,
    /// Added to the friction factor after every tick.
    pub increment: f64,
    /// Magnitude below which the momentum settles. Must be positive.
    pub threshold: f64,
}

impl FrictionParams {
    #[must_use]
    pub const fn new(initial: f64, increment: f64, threshold: f64) -> Self {
        Self {
            initial,
            increment,
            threshold,
        }
    }

    /// Whether these parameters guarantee a strictly decaying momentum that settles.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.initial > 1.0
            && self.initial.is_finite()
            && self.increment >= 0.0
            && self.increment.is_finite()
            && self.threshold > 0.0
    }
}

/// Decaying momentum over a value of shape `T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum<T: Decay> {
    params: FrictionParams,
    value: Option<T>,
    friction: f64,
}

impl<T: Decay> Momentum<T> {
    #[must_use]
    pub fn new(params: FrictionParams) -> Self {
        Self {
            params,
            value: None,
            friction: params.initial,
        }
    }

    /// Start (or restart) decaying from `value`.
    pub fn start(&mut self, value: T) {
        self.value = Some(value);
        self.friction = self.params.initial;
    }

    /// Stop without emitting.
    pub fn stop(&mut self) {
        self.value = None;
        self.friction = self.params.initial;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.value.is_some()
    }

    /// Current value, if active.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.value
    }

    /// Advance one tick.
    ///
    /// Returns the decayed value, or `None` once the momentum has settled.
    pub fn tick(&mut self) -> Option<T> {
        let value = self.value?;
        let magnitude = value.magnitude();
        if !magnitude.is_finite() || magnitude < self.params.threshold {
            self.stop();
            return None;
        }
        let next = value.damp(self.friction);
        self.friction += self.params.increment;
        self.value = Some(next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAN: FrictionParams = FrictionParams::new(1.04, 0.003, 2.0);

    #[test]
    fn inactive_until_started() {
        let mut m: Momentum<f64> = Momentum::new(PAN);
        assert!(!m.is_active());
        assert_eq!(m.tick(), None);
    }

    #[test]
    fn first_tick_divides_by_initial_friction() {
        let mut m = Momentum::new(PAN);
        m.start(104.0);
        let v = m.tick().unwrap();
        assert!((v - 100.0).abs() < 1e-9);
    }

    #[test]
    fn friction_grows_each_tick() {
        let mut m = Momentum::new(PAN);
        m.start(1000.0);
        let a = m.tick().unwrap();
        let b = m.tick().unwrap();
        assert!((a - 1000.0 / 1.04).abs() < 1e-9);
        assert!((b - a / 1.043).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_settles_immediately() {
        let mut m = Momentum::new(PAN);
        m.start(Vector::new(1.0, 1.0));
        assert_eq!(m.tick(), None);
        assert!(!m.is_active());
        assert_eq!(m.tick(), None);
    }

    #[test]
    fn vector_decays_to_settled() {
        let mut m = Momentum::new(PAN);
        m.start(Vector::new(300.0, -400.0));
        let mut last = 500.0;
        let mut ticks = 0;
        while let Some(v) = m.tick() {
            assert!(v.magnitude() < last);
            last = v.magnitude();
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert!(ticks > 0);
    }

    #[test]
    fn non_finite_values_settle() {
        let mut m = Momentum::new(PAN);
        m.start(f64::INFINITY);
        assert_eq!(m.tick(), None);
    }

    #[test]
    fn params_validation() {
        assert!(PAN.is_valid());
        assert!(!FrictionParams::new(1.0, 0.003, 2.0).is_valid());
        assert!(!FrictionParams::new(1.04, 0.003, 0.0).is_valid());
        assert!(!FrictionParams::new(1.04, -0.1, 2.0).is_valid());
    }
}
