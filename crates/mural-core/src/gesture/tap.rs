#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::time::Instant;

use super::{
    GestureConfig, GestureEvent, GestureKind, GesturePayload, GestureRecognizer, GestureState,
};
use crate::geometry::Point;
use crate::touch::{Touch, TouchId, TouchProperties};

/// Recognizes a touch that lifts close to where it went down.
///
/// A touch travelling further than the tap radius is dropped silently; the
/// tap fires on release only for touches still tracked.
#[derive(Debug, Clone)]
pub struct TapRecognizer {
    radius: f64,
    state: GestureState,
    origins: BTreeMap<TouchId, Point>,
}

impl TapRecognizer {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            radius: config.tap_radius,
            state: GestureState::Possible,
            origins: BTreeMap::new(),
        }
    }

    fn settle(&mut self) {
        self.state = if self.origins.is_empty() {
            GestureState::Possible
        } else {
            GestureState::Began
        };
    }
}

impl GestureRecognizer for TapRecognizer {
    fn kind(&self) -> GestureKind {
        GestureKind::Tap
    }

    fn state(&self) -> GestureState {
        self.state
    }

    fn start(
        &mut self,
        touch: &Touch,
        _props: &TouchProperties,
        _now: Instant,
    ) -> Option<GestureEvent> {
        if self.state == GestureState::Failed {
            self.reset();
        }
        self.origins.entry(touch.id).or_insert(touch.position);
        self.state = GestureState::Began;
        None
    }

    fn moved(
        &mut self,
        touch: &Touch,
        _props: &TouchProperties,
        _now: Instant,
    ) -> Option<GestureEvent> {
        let origin = *self.origins.get(&touch.id)?;
        if origin.distance(touch.position) > self.radius {
            self.origins.remove(&touch.id);
            self.settle();
        }
        None
    }

    fn end(
        &mut self,
        touch: &Touch,
        props: &TouchProperties,
        _now: Instant,
    ) -> Option<GestureEvent> {
        if self.state == GestureState::Failed {
            return None;
        }
        let tracked = self.origins.remove(&touch.id).is_some();
        if props.touch_count == 0 {
            self.reset();
        } else {
            self.settle();
        }
        tracked.then(|| {
            GestureEvent::new(
                GestureState::Ended,
                GesturePayload::Tap {
                    position: touch.position,
                },
            )
        })
    }

    fn tick(&mut self, _now: Instant) -> Option<GestureEvent> {
        None
    }

    fn reset(&mut self) {
        self.state = GestureState::Possible;
        self.origins.clear();
    }

    fn invalidate(&mut self) -> Option<GestureEvent> {
        if self.state == GestureState::Failed {
            return None;
        }
        self.origins.clear();
        self.state = GestureState::Failed;
        Some(GestureEvent::new(
            GestureState::Failed,
            GesturePayload::Tap {
                position: Point::ORIGIN,
            },
        ))
    }
}
