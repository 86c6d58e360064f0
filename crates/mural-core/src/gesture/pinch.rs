#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::momentum::Momentum;
use super::{
    GestureConfig, GestureEvent, GestureKind, GesturePayload, GestureRecognizer, GestureState,
};
use crate::geometry::{Point, Vector};
use crate::touch::{Touch, TouchId, TouchProperties};

/// Direction the two-finger spread is currently heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Growing,
    Shrinking,
    Idle,
}

/// Recognizes a two-finger pinch with a pan component.
///
/// Exactly two live touches form the spread pair, ordered by touch id. The
/// emitted scale is the current spread over the spread at the previous
/// emission. A growing/shrinking tag filters jitter: a move against the
/// current direction only counts once it exceeds the behavior threshold, and
/// reports a scale of exactly 1 when it does. With any other number of
/// touches the scale stays at 1 until a new pair forms.
#[derive(Debug, Clone)]
pub struct PinchRecognizer {
    config: GestureConfig,
    state: GestureState,
    positions: BTreeMap<TouchId, Point>,
    center: Point,
    last_emission: Option<Instant>,

    // Spread tracking
    pair: Option<(TouchId, TouchId)>,
    scale: f64,
    last_spread: Option<f64>,
    spread_at_emission: f64,
    behavior: Behavior,
    pinch_started: Option<Instant>,

    // Pan component
    cumulative: Vector,

    // Momentum
    seed_scale: f64,
    seed_delta: Vector,
    scale_momentum: Momentum<f64>,
    pan_momentum: Momentum<Vector>,
}

impl PinchRecognizer {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Possible,
            positions: BTreeMap::new(),
            center: Point::ORIGIN,
            last_emission: None,
            pair: None,
            scale: 1.0,
            last_spread: None,
            spread_at_emission: 0.0,
            behavior: Behavior::Idle,
            pinch_started: None,
            cumulative: Vector::ZERO,
            seed_scale: 1.0,
            seed_delta: Vector::ZERO,
            scale_momentum: Momentum::new(config.pinch_scale_momentum),
            pan_momentum: Momentum::new(config.pinch_pan_momentum),
        }
    }

    /// Scale accumulated since the last emission.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    fn event(&self, state: GestureState, scale: f64, delta: Vector) -> GestureEvent {
        GestureEvent::new(
            state,
            GesturePayload::Pinch {
                scale,
                delta,
                center: self.center,
            },
        )
    }

    fn since_emission(&self, now: Instant) -> Duration {
        self.last_emission
            .map_or(Duration::MAX, |at| now.saturating_duration_since(at))
    }

    // -----------------------------------------------------------------------
    // Spread helpers
    // -----------------------------------------------------------------------

    fn current_spread(&self) -> Option<f64> {
        let (a, b) = self.pair?;
        Some(self.positions.get(&a)?.distance(*self.positions.get(&b)?))
    }

    /// Rebuild the spread pair after the touch set changed.
    fn set_touches_for_pinch(&mut self, now: Instant) {
        if self.positions.len() != 2 {
            self.pair = None;
            self.scale = 1.0;
            self.pinch_started = None;
            return;
        }
        let mut ids = self.positions.keys().copied();
        if let (Some(first), Some(second)) = (ids.next(), ids.next()) {
            self.pair = Some((first, second));
            self.pinch_started = Some(now);
            self.spread_at_emission = self.current_spread().unwrap_or(0.0);
        }
    }

    fn behavior_of(&self, spread: f64) -> Behavior {
        match self.last_spread {
            None => Behavior::Idle,
            Some(last) if spread - last > 0.0 => Behavior::Growing,
            Some(_) => Behavior::Shrinking,
        }
    }

    fn should_recognize(&self, spread: f64) -> bool {
        self.behavior == Behavior::Idle || self.behavior == self.behavior_of(spread)
    }

    fn changed_behavior(&self, old_spread: f64, new_spread: f64) -> bool {
        self.behavior != self.behavior_of(new_spread)
            && (old_spread - new_spread).abs() > self.config.pinch_behavior_threshold
    }

    fn recognize_pinch_move(&mut self) {
        let Some(spread) = self.current_spread() else {
            return;
        };
        let last = self.last_spread.unwrap_or(spread);
        let wide = spread > self.config.pinch_min_spread;
        if wide && self.should_recognize(spread) {
            self.scale = if self.spread_at_emission > 0.0 {
                spread / self.spread_at_emission
            } else {
                1.0
            };
            self.behavior = self.behavior_of(spread);
            self.last_spread = Some(spread);
        } else if wide && self.changed_behavior(last, spread) {
            self.scale = 1.0;
            self.behavior = self.behavior_of(spread);
            self.last_spread = Some(spread);
        } else {
            self.scale = 1.0;
        }
    }

    fn recognize(
        &mut self,
        touch: &Touch,
        last: Point,
        props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        self.recognize_pinch_move();
        let count = self.positions.len() as f64;
        self.cumulative += (touch.position - last) / count;
        if self.since_emission(now) <= self.config.refresh_interval {
            return None;
        }
        self.center = props.center_of_gravity;
        self.seed_scale = self.scale;
        let delta = self.cumulative;
        self.seed_delta = delta;
        self.cumulative = Vector::ZERO;
        self.last_emission = Some(now);
        if let Some(spread) = self.current_spread() {
            self.spread_at_emission = spread;
        }
        Some(self.event(GestureState::Recognized, self.scale, delta))
    }

    // -----------------------------------------------------------------------
    // Momentum
    // -----------------------------------------------------------------------

    fn begin_momentum(&mut self, now: Instant) -> GestureEvent {
        let held_long_enough = self
            .pinch_started
            .is_some_and(|at| now.saturating_duration_since(at) > self.config.pinch_min_duration);
        let max = self.config.pinch_max_momentum_scale;
        let scale = if held_long_enough {
            self.seed_scale.max(1.0 - max).min(1.0 + max)
        } else {
            1.0
        };
        let delta = if self.seed_delta.magnitude() > self.config.pinch_pan_momentum_min {
            self.seed_delta
        } else {
            Vector::ZERO
        };
        self.scale_momentum.start(scale - 1.0);
        self.pan_momentum.start(delta);
        self.scale = scale;
        self.state = GestureState::Momentum;
        self.event(GestureState::Momentum, scale, delta)
    }
}

impl GestureRecognizer for PinchRecognizer {
    fn kind(&self) -> GestureKind {
        GestureKind::Pinch
    }

    fn state(&self) -> GestureState {
        self.state
    }

    fn start(
        &mut self,
        touch: &Touch,
        props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        if matches!(self.state, GestureState::Momentum | GestureState::Failed) {
            self.reset();
        }
        self.center = props.center_of_gravity;
        let mut event = None;
        if self.state == GestureState::Possible {
            self.cumulative = Vector::ZERO;
            self.state = GestureState::Began;
            self.last_emission = Some(now);
            event = Some(self.event(GestureState::Began, 1.0, Vector::ZERO));
        }
        self.scale_momentum.stop();
        self.pan_momentum.stop();
        self.positions.insert(touch.id, touch.position);
        self.set_touches_for_pinch(now);
        event
    }

    fn moved(
        &mut self,
        touch: &Touch,
        props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        if self.state == GestureState::Failed {
            return None;
        }
        let last = *self.positions.get(&touch.id)?;
        match self.state {
            GestureState::Began => {
                if last.distance(touch.position) <= self.config.pan_threshold {
                    return None;
                }
                self.positions.insert(touch.id, touch.position);
                if let Some(spread) = self.current_spread() {
                    self.behavior = self.behavior_of(spread);
                }
                self.state = GestureState::Recognized;
                self.recognize(touch, last, props, now)
            }
            GestureState::Recognized => {
                self.positions.insert(touch.id, touch.position);
                self.recognize(touch, last, props, now)
            }
            _ => None,
        }
    }

    fn end(
        &mut self,
        touch: &Touch,
        props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        self.positions.remove(&touch.id);
        let started = self.pinch_started;
        self.set_touches_for_pinch(now);
        if self.pinch_started.is_none() {
            self.pinch_started = started;
        }

        if self.state == GestureState::Failed || props.touch_count > 0 {
            return None;
        }
        match self.state {
            GestureState::Began | GestureState::Recognized => {}
            _ => return None,
        }
        if self.state == GestureState::Recognized
            && self.since_emission(now) < self.config.pause_window
        {
            return Some(self.begin_momentum(now));
        }
        self.reset();
        Some(self.event(GestureState::Ended, 1.0, Vector::ZERO))
    }

    fn tick(&mut self, _now: Instant) -> Option<GestureEvent> {
        if self.state != GestureState::Momentum {
            return None;
        }
        let scale = self.scale_momentum.tick();
        let delta = self.pan_momentum.tick();
        if scale.is_none() && delta.is_none() {
            let settled = self.event(GestureState::Possible, 1.0, Vector::ZERO);
            self.reset();
            return Some(settled);
        }
        self.scale = 1.0 + scale.unwrap_or(0.0);
        Some(self.event(GestureState::Momentum, self.scale, delta.unwrap_or(Vector::ZERO)))
    }

    fn reset(&mut self) {
        self.state = GestureState::Possible;
        self.positions.clear();
        self.center = Point::ORIGIN;
        self.last_emission = None;
        self.pair = None;
        self.scale = 1.0;
        self.last_spread = None;
        self.spread_at_emission = 0.0;
        self.behavior = Behavior::Idle;
        self.pinch_started = None;
        self.cumulative = Vector::ZERO;
        self.seed_scale = 1.0;
        self.seed_delta = Vector::ZERO;
        self.scale_momentum.stop();
        self.pan_momentum.stop();
    }

    fn invalidate(&mut self) -> Option<GestureEvent> {
        if self.state == GestureState::Failed {
            return None;
        }
        let center = self.center;
        self.reset();
        self.center = center;
        self.state = GestureState::Failed;
        Some(self.event(GestureState::Failed, 1.0, Vector::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::test_support::Feeder;
    use crate::touch::TouchPhase;

    struct Harness {
        r: PinchRecognizer,
        f: Feeder,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                r: PinchRecognizer::new(GestureConfig::default()),
                f: Feeder::new(),
            }
        }

        fn feed(&mut self, touch: Touch, ms: u64) -> Option<GestureEvent> {
            let props = self.f.props(&touch);
            let now = self.f.at(ms);
            match touch.phase {
                TouchPhase::Down => self.r.start(&touch, &props, now),
                TouchPhase::Moved => self.r.moved(&touch, &props, now),
                TouchPhase::Up => self.r.end(&touch, &props, now),
            }
        }

        /// Two fingers 100 apart, then finger 2 spreads to 160 and emits.
        fn spread_out(&mut self) -> GestureEvent {
            self.feed(Touch::down(1, 100.0, 100.0), 0);
            self.feed(Touch::down(2, 200.0, 100.0), 0);
            assert_eq!(self.feed(Touch::moved(2, 230.0, 100.0), 5), None);
            self.feed(Touch::moved(2, 260.0, 100.0), 20).unwrap()
        }
    }

    fn parts(event: GestureEvent) -> (f64, Vector, Point) {
        match event.payload {
            GesturePayload::Pinch {
                scale,
                delta,
                center,
            } => (scale, delta, center),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn spreading_fingers_scale_up() {
        let mut h = Harness::new();
        let ev = h.spread_out();
        assert_eq!(ev.state, GestureState::Recognized);
        let (scale, delta, center) = parts(ev);
        assert!((scale - 1.6).abs() < 1e-9);
        assert_eq!(delta, Vector::new(30.0, 0.0));
        assert_eq!(center, Point::new(180.0, 100.0));
    }

    #[test]
    fn scale_is_relative_to_previous_emission() {
        let mut h = Harness::new();
        h.spread_out();
        let ev = h.feed(Touch::moved(2, 420.0, 100.0), 40).unwrap();
        let (scale, _, _) = parts(ev);
        assert!((scale - 2.0).abs() < 1e-9);
    }

    #[test]
    fn behavior_change_reports_unit_scale() {
        let mut h = Harness::new();
        h.spread_out();
        assert_eq!(h.feed(Touch::moved(1, 80.0, 100.0), 25), None);
        let ev = h.feed(Touch::moved(1, 150.0, 100.0), 50).unwrap();
        let (scale, delta, _) = parts(ev);
        assert_eq!(scale, 1.0);
        assert_eq!(delta, Vector::new(25.0, 0.0));
    }

    #[test]
    fn small_reversal_is_filtered() {
        let mut h = Harness::new();
        h.spread_out();
        // Shrinks by 10: below the behavior threshold.
        let ev = h.feed(Touch::moved(2, 250.0, 100.0), 40).unwrap();
        assert_eq!(parts(ev).0, 1.0);
    }

    #[test]
    fn single_finger_reports_unit_scale() {
        let mut h = Harness::new();
        h.feed(Touch::down(1, 0.0, 0.0), 0);
        h.feed(Touch::moved(1, 50.0, 0.0), 5);
        let ev = h.feed(Touch::moved(1, 90.0, 0.0), 30).unwrap();
        let (scale, delta, _) = parts(ev);
        assert_eq!(scale, 1.0);
        assert_eq!(delta, Vector::new(90.0, 0.0));
    }

    #[test]
    fn lifting_one_finger_resets_scale() {
        let mut h = Harness::new();
        h.spread_out();
        h.feed(Touch::moved(2, 300.0, 100.0), 25);
        assert!(h.r.scale() > 1.0);
        assert_eq!(h.feed(Touch::up(2, 300.0, 100.0), 30), None);
        assert_eq!(h.r.scale(), 1.0);
        let ev = h.feed(Touch::moved(1, 60.0, 100.0), 60).unwrap();
        assert_eq!(parts(ev).0, 1.0);
    }

    #[test]
    fn sub_threshold_sequence_never_recognizes() {
        let mut h = Harness::new();
        assert_eq!(h.feed(Touch::down(1, 0.0, 0.0), 0).map(|e| e.state), Some(GestureState::Began));
        assert_eq!(h.feed(Touch::moved(1, 5.0, 5.0), 30), None);
        let ev = h.feed(Touch::up(1, 5.0, 5.0), 40).unwrap();
        assert_eq!(ev.state, GestureState::Ended);
        assert_eq!(h.r.state(), GestureState::Possible);
    }

    #[test]
    fn long_pinch_carries_clamped_scale_momentum() {
        let mut h = Harness::new();
        h.spread_out();
        // Doubling the spread is clamped to 1.2 for momentum.
        h.feed(Touch::moved(2, 420.0, 100.0), 150);
        assert_eq!(h.feed(Touch::up(2, 420.0, 100.0), 160), None);
        let ev = h.feed(Touch::up(1, 100.0, 100.0), 170).unwrap();
        assert_eq!(ev.state, GestureState::Momentum);
        let (scale, delta, _) = parts(ev);
        assert!((scale - 1.2).abs() < 1e-9);
        assert_eq!(delta, Vector::new(80.0, 0.0));

        let mut last = 0.2;
        let mut ticks = 0u64;
        loop {
            let ev = h.r.tick(h.f.at(170 + ticks * 16)).unwrap();
            if ev.state == GestureState::Possible {
                assert_eq!(parts(ev).0, 1.0);
                break;
            }
            let offset = parts(ev).0 - 1.0;
            assert!(offset.abs() < last || offset == 0.0);
            last = offset.abs();
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert_eq!(h.r.state(), GestureState::Possible);
    }

    #[test]
    fn short_pinch_has_no_scale_momentum() {
        let mut h = Harness::new();
        h.spread_out();
        h.feed(Touch::moved(2, 420.0, 100.0), 40);
        h.feed(Touch::up(2, 420.0, 100.0), 50);
        let ev = h.feed(Touch::up(1, 100.0, 100.0), 60).unwrap();
        assert_eq!(ev.state, GestureState::Momentum);
        assert_eq!(parts(ev).0, 1.0);
    }

    #[test]
    fn small_pan_component_is_dropped_from_momentum() {
        let mut h = Harness::new();
        h.feed(Touch::down(1, 0.0, 0.0), 0);
        h.feed(Touch::moved(1, 30.0, 0.0), 20).unwrap();
        h.feed(Touch::moved(1, 33.0, 0.0), 40).unwrap();
        let ev = h.feed(Touch::up(1, 33.0, 0.0), 50).unwrap();
        assert_eq!(ev.state, GestureState::Momentum);
        assert_eq!(parts(ev).1, Vector::ZERO);
        let settled = h.r.tick(h.f.at(66)).unwrap();
        assert_eq!(settled.state, GestureState::Possible);
    }

    #[test]
    fn invalidate_and_reset() {
        let mut h = Harness::new();
        h.spread_out();
        assert_eq!(h.r.invalidate().map(|e| e.state), Some(GestureState::Failed));
        assert_eq!(h.r.invalidate(), None);
        assert_eq!(h.feed(Touch::moved(2, 400.0, 100.0), 60), None);
        h.r.reset();
        h.r.reset();
        assert_eq!(h.r.state(), GestureState::Possible);
        assert_eq!(h.r.scale(), 1.0);
    }
}
