#![forbid(unsafe_code)]

//! Gesture recognition: per-touch-stream state machines for tap, pan, and pinch.
//!
//! Every recognizer implements [`GestureRecognizer`]: it is fed the touches of
//! its view through [`start`](GestureRecognizer::start),
//! [`moved`](GestureRecognizer::moved) and [`end`](GestureRecognizer::end),
//! and driven at the refresh cadence through
//! [`tick`](GestureRecognizer::tick) while it carries momentum. Each call may
//! produce one [`GestureEvent`].
//!
//! # State Machine
//!
//! ```text
//! possible --start--> began --move past threshold--> recognized
//! recognized --end within pause window--> momentum --decays--> possible
//! recognized --end after pause window--> ended --> possible
//! any --invalidate--> failed --start/reset--> possible
//! ```
//!
//! Tap only walks `possible → began → ended` and cancels itself when the
//! finger travels too far.
//!
//! # Invariants
//!
//! 1. `failed` is reachable only through `invalidate()`, which emits exactly
//!    one event; a second `invalidate()` emits nothing.
//! 2. `moved`/`end` on a failed recognizer are no-ops.
//! 3. `reset()` is idempotent.
//! 4. Time is passed in explicitly; recognizers never read the clock.

mod momentum;
mod pan;
mod pinch;
mod tap;

use std::time::{Duration, Instant};

pub use momentum::{Decay, FrictionParams, Momentum};
pub use pan::PanRecognizer;
pub use pinch::PinchRecognizer;
pub use tap::TapRecognizer;

use crate::geometry::{Point, Vector};
use crate::touch::{Touch, TouchProperties};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Lifecycle state of a recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GestureState {
    #[default]
    Possible,
    Began,
    Recognized,
    Momentum,
    Ended,
    Failed,
}

impl GestureState {
    /// True for states that belong to a live or decaying interaction.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Began | Self::Recognized | Self::Momentum)
    }
}

/// Kind of recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GestureKind {
    Tap,
    Pan,
    Pinch,
}

/// Data carried by a gesture update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GesturePayload {
    /// Release position of a tap.
    Tap { position: Point },
    /// Averaged displacement since the previous emission.
    Pan { delta: Vector },
    /// Spread ratio since the previous emission, plus the pan component.
    Pinch {
        scale: f64,
        delta: Vector,
        center: Point,
    },
}

impl GesturePayload {
    #[must_use]
    pub fn kind(&self) -> GestureKind {
        match self {
            Self::Tap { .. } => GestureKind::Tap,
            Self::Pan { .. } => GestureKind::Pan,
            Self::Pinch { .. } => GestureKind::Pinch,
        }
    }
}

/// One update emitted by a recognizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub state: GestureState,
    pub payload: GesturePayload,
}

impl GestureEvent {
    #[must_use]
    pub const fn new(state: GestureState, payload: GesturePayload) -> Self {
        Self { state, payload }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Thresholds, timings, and friction used by the recognizers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Minimum spacing between two `recognized` emissions (default: 1/60 s).
    pub refresh_interval: Duration,
    /// Release within this long after the last emission starts momentum (default: 100ms).
    pub pause_window: Duration,
    /// Maximum travel before a tap cancels itself (default: 20).
    pub tap_radius: f64,
    /// Travel before a pan or pinch becomes recognized (default: 20).
    pub pan_threshold: f64,
    /// Spreads at or below this never change the pinch scale (default: 60).
    pub pinch_min_spread: f64,
    /// Spread change needed to flip between growing and shrinking (default: 20).
    pub pinch_behavior_threshold: f64,
    /// Two-finger contact shorter than this carries no scale momentum (default: 100ms).
    pub pinch_min_duration: Duration,
    /// Pinch momentum scale is clamped to `1 ± this` (default: 0.2).
    pub pinch_max_momentum_scale: f64,
    /// Pan momentum (default: 1.04, +0.003, settles below 2.0).
    pub pan_momentum: FrictionParams,
    /// Pan component of pinch momentum (default: 1.05, +0.002, settles below 2.0).
    pub pinch_pan_momentum: FrictionParams,
    /// The pinch pan component only carries momentum above this magnitude (default: 5).
    pub pinch_pan_momentum_min: f64,
    /// Scale component of pinch momentum, decaying `scale - 1`
    /// (default: 1.15, +0.003, settles below 0.0001).
    pub pinch_scale_momentum: FrictionParams,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs_f64(1.0 / 60.0),
            pause_window: Duration::from_millis(100),
            tap_radius: 20.0,
            pan_threshold: 20.0,
            pinch_min_spread: 60.0,
            pinch_behavior_threshold: 20.0,
            pinch_min_duration: Duration::from_millis(100),
            pinch_max_momentum_scale: 0.2,
            pan_momentum: FrictionParams::new(1.04, 0.003, 2.0),
            pinch_pan_momentum: FrictionParams::new(1.05, 0.002, 2.0),
            pinch_pan_momentum_min: 5.0,
            pinch_scale_momentum: FrictionParams::new(1.15, 0.003, 0.0001),
        }
    }
}

impl GestureConfig {
    /// Describe every invalid field. Empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.refresh_interval.is_zero() {
            errors.push("refresh interval must be positive".to_string());
        }
        for (name, value) in [
            ("tap_radius", self.tap_radius),
            ("pan_threshold", self.pan_threshold),
            ("pinch_min_spread", self.pinch_min_spread),
            ("pinch_behavior_threshold", self.pinch_behavior_threshold),
            ("pinch_max_momentum_scale", self.pinch_max_momentum_scale),
            ("pinch_pan_momentum_min", self.pinch_pan_momentum_min),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        if self.pinch_max_momentum_scale >= 1.0 {
            errors.push("pinch_max_momentum_scale must be below 1".to_string());
        }
        for (name, params) in [
            ("pan_momentum", self.pan_momentum),
            ("pinch_pan_momentum", self.pinch_pan_momentum),
            ("pinch_scale_momentum", self.pinch_scale_momentum),
        ] {
            if !params.is_valid() {
                errors.push(format!(
                    "{name} needs initial friction > 1, increment >= 0 and threshold > 0"
                ));
            }
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Recognizer trait
// ---------------------------------------------------------------------------

/// The operations shared by every recognizer.
pub trait GestureRecognizer {
    fn kind(&self) -> GestureKind;

    fn state(&self) -> GestureState;

    /// A touch went down on the recognizer's view.
    fn start(&mut self, touch: &Touch, props: &TouchProperties, now: Instant)
    -> Option<GestureEvent>;

    /// A touch already started on this recognizer moved.
    fn moved(&mut self, touch: &Touch, props: &TouchProperties, now: Instant)
    -> Option<GestureEvent>;

    /// A touch lifted. `props` already excludes it.
    fn end(&mut self, touch: &Touch, props: &TouchProperties, now: Instant)
    -> Option<GestureEvent>;

    /// Advance momentum by one refresh interval.
    fn tick(&mut self, now: Instant) -> Option<GestureEvent>;

    /// Return to `possible`, forgetting every touch. Emits nothing.
    fn reset(&mut self);

    /// Abort the gesture. Emits one `failed` update unless already failed.
    fn invalidate(&mut self) -> Option<GestureEvent>;

    fn in_momentum(&self) -> bool {
        self.state() == GestureState::Momentum
    }
}

/// A recognizer of any kind.
#[derive(Debug, Clone)]
pub enum Recognizer {
    Tap(TapRecognizer),
    Pan(PanRecognizer),
    Pinch(PinchRecognizer),
}

impl Recognizer {
    #[must_use]
    pub fn tap(config: GestureConfig) -> Self {
        Self::Tap(TapRecognizer::new(config))
    }

    #[must_use]
    pub fn pan(config: GestureConfig) -> Self {
        Self::Pan(PanRecognizer::new(config))
    }

    #[must_use]
    pub fn pinch(config: GestureConfig) -> Self {
        Self::Pinch(PinchRecognizer::new(config))
    }

    fn inner(&self) -> &dyn GestureRecognizer {
        match self {
            Self::Tap(r) => r,
            Self::Pan(r) => r,
            Self::Pinch(r) => r,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn GestureRecognizer {
        match self {
            Self::Tap(r) => r,
            Self::Pan(r) => r,
            Self::Pinch(r) => r,
        }
    }
}

impl GestureRecognizer for Recognizer {
    fn kind(&self) -> GestureKind {
        self.inner().kind()
    }

    fn state(&self) -> GestureState {
        self.inner().state()
    }

    fn start(
        &mut self,
        touch: &Touch,
        props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        self.inner_mut().start(touch, props, now)
    }

    fn moved(
        &mut self,
        touch: &Touch,
        props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        self.inner_mut().moved(touch, props, now)
    }

    fn end(
        &mut self,
        touch: &Touch,
        props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        self.inner_mut().end(touch, props, now)
    }

    fn tick(&mut self, now: Instant) -> Option<GestureEvent> {
        self.inner_mut().tick(now)
    }

    fn reset(&mut self) {
        self.inner_mut().reset();
    }

    fn invalidate(&mut self) -> Option<GestureEvent> {
        self.inner_mut().invalidate()
    }
}
