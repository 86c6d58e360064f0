#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::momentum::Momentum;
use super::{
    GestureConfig, GestureEvent, GestureKind, GesturePayload, GestureRecognizer, GestureState,
};
use crate::geometry::{Point, Vector};
use crate::touch::{Touch, TouchId, TouchProperties};

/// Recognizes one or more fingers dragging together.
///
/// Each finger's displacement is divided by the number of live fingers, so
/// N fingers moving by the same vector report that vector once. Updates are
/// throttled to the refresh interval; displacement between emissions
/// accumulates.
#[derive(Debug, Clone)]
pub struct PanRecognizer {
    config: GestureConfig,
    state: GestureState,
    positions: BTreeMap<TouchId, Point>,
    cumulative: Vector,
    last_emission: Option<Instant>,
    momentum_seed: Vector,
    momentum: Momentum<Vector>,
}

impl PanRecognizer {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Possible,
            positions: BTreeMap::new(),
            cumulative: Vector::ZERO,
            last_emission: None,
            momentum_seed: Vector::ZERO,
            momentum: Momentum::new(config.pan_momentum),
        }
    }

    fn event(state: GestureState, delta: Vector) -> GestureEvent {
        GestureEvent::new(state, GesturePayload::Pan { delta })
    }

    fn since_emission(&self, now: Instant) -> Duration {
        self.last_emission
            .map_or(Duration::MAX, |at| now.saturating_duration_since(at))
    }
}

impl GestureRecognizer for PanRecognizer {
    fn kind(&self) -> GestureKind {
        GestureKind::Pan
    }

    fn state(&self) -> GestureState {
        self.state
    }

    fn start(
        &mut self,
        touch: &Touch,
        _props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        if matches!(self.state, GestureState::Momentum | GestureState::Failed) {
            self.reset();
        }
        let mut event = None;
        if self.state == GestureState::Possible {
            self.cumulative = Vector::ZERO;
            self.state = GestureState::Began;
            self.last_emission = Some(now);
            event = Some(Self::event(GestureState::Began, Vector::ZERO));
        }
        self.momentum.stop();
        self.positions.insert(touch.id, touch.position);
        event
    }

    fn moved(
        &mut self,
        touch: &Touch,
        _props: &TouchProperties,
        now: Instant,
    ) -> Option<GestureEvent> {
        if self.state == GestureState::Failed {
            return None;
        }
        let last = *self.positions.get(&touch.id)?;
        match self.state {
            GestureState::Began => {
                if last.distance(touch.position) > self.config.pan_threshold {
                    self.state = GestureState::Recognized;
                    self.positions.insert(touch.id, touch.position);
                }
                None
            }
            GestureState::Recognized => {
                self.positions.insert(touch.id, touch.position);
                let count = self.positions.len() as f64;
                self.cumulative += (touch.position - last) / count;
                if self.since_emission(now) > self.config.refresh_interval {
                    let delta = self.cumulative;
                    self.momentum_seed = delta;
                    self.cumulative = Vector::ZERO;
                    self.last_emission = Some(now);
                    Some(Self::event(GestureState::Recognized, delta))
                } else {
                    None
                }
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
        if self.state == GestureState::Failed || props.touch_count > 0 {
            return None;
        }
        match self.state {
            GestureState::Began | GestureState::Recognized => {}
            _ => return None,
        }
        let recognized = self.state == GestureState::Recognized;
        if recognized && self.since_emission(now) < self.config.pause_window {
            self.state = GestureState::Momentum;
            self.momentum.start(self.momentum_seed);
            return Some(Self::event(GestureState::Momentum, self.momentum_seed));
        }
        self.reset();
        Some(Self::event(GestureState::Ended, Vector::ZERO))
    }

    fn tick(&mut self, _now: Instant) -> Option<GestureEvent> {
        if self.state != GestureState::Momentum {
            return None;
        }
        match self.momentum.tick() {
            Some(delta) => Some(Self::event(GestureState::Momentum, delta)),
            None => {
                self.reset();
                Some(Self::event(GestureState::Possible, Vector::ZERO))
            }
        }
    }

    fn reset(&mut self) {
        self.state = GestureState::Possible;
        self.positions.clear();
        self.cumulative = Vector::ZERO;
        self.momentum_seed = Vector::ZERO;
        self.last_emission = None;
        self.momentum.stop();
    }

    fn invalidate(&mut self) -> Option<GestureEvent> {
        if self.state == GestureState::Failed {
            return None;
        }
        self.reset();
        self.state = GestureState::Failed;
        Some(Self::event(GestureState::Failed, Vector::ZERO))
    }
}
