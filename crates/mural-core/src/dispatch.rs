#![forbid(unsafe_code)]

//! Per-window gesture dispatch.
//!
//! A [`GestureDispatch`] owns the touches claimed by one window. Views are
//! registered with a frame and a set of recognizers; later registrations sit
//! on top. A touch is claimed by the topmost view under its down position and
//! stays with that view until it lifts or the view is invalidated, even if it
//! wanders outside the frame. Every sample of a claimed touch is fanned out
//! to every recognizer of the claiming view.

use std::collections::BTreeMap;
use std::time::Instant;

use ahash::AHashMap;

use crate::gesture::{GestureEvent, GestureKind, GestureRecognizer, Recognizer};
use crate::geometry::{Point, Rect};
use crate::touch::{Touch, TouchId, TouchPhase, TouchProperties};

/// Handle of a registered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(pub usize);

/// Handle of a recognizer inside a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecognizerId {
    pub view: ViewId,
    pub index: usize,
}

/// A recognizer update, tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchedGesture {
    pub recognizer: RecognizerId,
    pub kind: GestureKind,
    pub event: GestureEvent,
}

#[derive(Debug, Clone)]
struct View {
    frame: Rect,
    recognizers: Vec<Recognizer>,
    touches: BTreeMap<TouchId, Point>,
}

impl View {
    fn properties(&self, fallback: Point) -> TouchProperties {
        TouchProperties::from_positions(self.touches.values().copied(), fallback)
    }
}

/// Routes touches to the recognizers of the view that claimed them.
#[derive(Debug, Clone, Default)]
pub struct GestureDispatch {
    views: Vec<View>,
    owners: AHashMap<TouchId, ViewId>,
}

impl GestureDispatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view on top of every existing one.
    pub fn register_view(&mut self, frame: Rect) -> ViewId {
        self.views.push(View {
            frame,
            recognizers: Vec::new(),
            touches: BTreeMap::new(),
        });
        ViewId(self.views.len() - 1)
    }

    /// Attach a recognizer to a view. Returns `None` for an unknown view.
    pub fn add_recognizer(&mut self, view: ViewId, recognizer: Recognizer) -> Option<RecognizerId> {
        let target = self.views.get_mut(view.0)?;
        target.recognizers.push(recognizer);
        Some(RecognizerId {
            view,
            index: target.recognizers.len() - 1,
        })
    }

    /// Move or resize a view. Touches already claimed stay claimed.
    pub fn set_frame(&mut self, view: ViewId, frame: Rect) {
        if let Some(target) = self.views.get_mut(view.0) {
            target.frame = frame;
        }
    }

    #[must_use]
    pub fn frame(&self, view: ViewId) -> Option<Rect> {
        self.views.get(view.0).map(|v| v.frame)
    }

    #[must_use]
    pub fn recognizer(&self, id: RecognizerId) -> Option<&Recognizer> {
        self.views.get(id.view.0)?.recognizers.get(id.index)
    }

    /// Whether this dispatch has claimed the touch.
    #[must_use]
    pub fn owns(&self, id: TouchId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Topmost view containing `position`.
    #[must_use]
    pub fn hit_test(&self, position: Point) -> Option<ViewId> {
        self.views
            .iter()
            .rposition(|view| view.frame.contains(position))
            .map(ViewId)
    }

    /// Feed one touch sample.
    ///
    /// Downs outside every view, repeated downs, and moves or ups of touches
    /// this dispatch never claimed produce nothing.
    pub fn handle(&mut self, touch: &Touch, now: Instant) -> Vec<DispatchedGesture> {
        match touch.phase {
            TouchPhase::Down => {
                if self.owns(touch.id) {
                    return Vec::new();
                }
                let Some(view_id) = self.hit_test(touch.position) else {
                    return Vec::new();
                };
                #[cfg(feature = "tracing")]
                tracing::trace!(touch = touch.id.0, view = view_id.0, "claimed touch");
                self.owners.insert(touch.id, view_id);
                let view = &mut self.views[view_id.0];
                view.touches.insert(touch.id, touch.position);
                let props = view.properties(touch.position);
                fan_out(view_id, view, |r| r.start(touch, &props, now))
            }
            TouchPhase::Moved => {
                let Some(&view_id) = self.owners.get(&touch.id) else {
                    return Vec::new();
                };
                let view = &mut self.views[view_id.0];
                view.touches.insert(touch.id, touch.position);
                let props = view.properties(touch.position);
                fan_out(view_id, view, |r| r.moved(touch, &props, now))
            }
            TouchPhase::Up => {
                let Some(view_id) = self.owners.remove(&touch.id) else {
                    return Vec::new();
                };
                let view = &mut self.views[view_id.0];
                view.touches.remove(&touch.id);
                let props = view.properties(touch.position);
                fan_out(view_id, view, |r| r.end(touch, &props, now))
            }
        }
    }

    /// Drive momentum on every recognizer.
    pub fn tick(&mut self, now: Instant) -> Vec<DispatchedGesture> {
        let mut out = Vec::new();
        for (index, view) in self.views.iter_mut().enumerate() {
            out.extend(fan_out(ViewId(index), view, |r| r.tick(now)));
        }
        out
    }

    /// True while any recognizer is decaying momentum.
    #[must_use]
    pub fn in_momentum(&self) -> bool {
        self.views
            .iter()
            .flat_map(|v| v.recognizers.iter())
            .any(GestureRecognizer::in_momentum)
    }

    /// Number of touches currently claimed.
    #[must_use]
    pub fn claimed(&self) -> usize {
        self.owners.len()
    }

    /// Abort every gesture of a view and release its touches.
    pub fn invalidate_view(&mut self, view_id: ViewId) -> Vec<DispatchedGesture> {
        let Some(view) = self.views.get_mut(view_id.0) else {
            return Vec::new();
        };
        for id in std::mem::take(&mut view.touches).into_keys() {
            self.owners.remove(&id);
        }
        fan_out(view_id, view, |r| r.invalidate())
    }

    /// Reset every recognizer and release every touch.
    pub fn reset(&mut self) {
        self.owners.clear();
        for view in &mut self.views {
            view.touches.clear();
            view.recognizers.iter_mut().for_each(GestureRecognizer::reset);
        }
    }
}

fn fan_out(
    view_id: ViewId,
    view: &mut View,
    mut op: impl FnMut(&mut Recognizer) -> Option<GestureEvent>,
) -> Vec<DispatchedGesture> {
    view.recognizers
        .iter_mut()
        .enumerate()
        .filter_map(|(index, recognizer)| {
            op(recognizer).map(|event| DispatchedGesture {
                recognizer: RecognizerId {
                    view: view_id,
                    index,
                },
                kind: recognizer.kind(),
                event,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{GestureConfig, GestureState};

    fn two_views() -> (GestureDispatch, ViewId, ViewId) {
        let config = GestureConfig::default();
        let mut d = GestureDispatch::new();
        let back = d.register_view(Rect::new(0.0, 0.0, 1000.0, 1000.0));
        d.add_recognizer(back, Recognizer::tap(config));
        d.add_recognizer(back, Recognizer::pan(config));
        let front = d.register_view(Rect::new(100.0, 100.0, 100.0, 100.0));
        d.add_recognizer(front, Recognizer::tap(config));
        (d, back, front)
    }

    #[test]
    fn topmost_view_claims_the_touch() {
        let (mut d, back, front) = two_views();
        let now = Instant::now();
        d.handle(&Touch::down(1, 150.0, 150.0), now);
        d.handle(&Touch::down(2, 500.0, 500.0), now);
        assert_eq!(d.hit_test(Point::new(150.0, 150.0)), Some(front));
        let ups = d.handle(&Touch::up(1, 150.0, 150.0), now);
        assert_eq!(ups.len(), 1);
        assert_eq!(ups[0].recognizer.view, front);
        assert_eq!(ups[0].kind, GestureKind::Tap);
        let ups = d.handle(&Touch::up(2, 500.0, 500.0), now);
        assert!(ups.iter().all(|g| g.recognizer.view == back));
    }

    #[test]
    fn down_outside_every_view_is_unclaimed() {
        let (mut d, _, _) = two_views();
        assert!(d.handle(&Touch::down(1, -5.0, 5.0), Instant::now()).is_empty());
        assert!(!d.owns(TouchId(1)));
        assert!(d.handle(&Touch::up(1, -5.0, 5.0), Instant::now()).is_empty());
    }

    #[test]
    fn ownership_sticks_until_up() {
        let (mut d, _, front) = two_views();
        let now = Instant::now();
        d.handle(&Touch::down(1, 150.0, 150.0), now);
        // Leaves the front view but still belongs to it.
        d.handle(&Touch::moved(1, 800.0, 800.0), now);
        assert!(d.owns(TouchId(1)));
        let ups = d.handle(&Touch::up(1, 800.0, 800.0), now);
        assert!(ups.iter().all(|g| g.recognizer.view == front));
        assert!(!d.owns(TouchId(1)));
        assert_eq!(d.claimed(), 0);
    }

    #[test]
    fn every_recognizer_of_the_view_sees_the_touch() {
        let (mut d, back, _) = two_views();
        let now = Instant::now();
        let began = d.handle(&Touch::down(1, 500.0, 500.0), now);
        assert_eq!(began.len(), 1);
        assert_eq!(began[0].kind, GestureKind::Pan);
        let pan = d
            .recognizer(RecognizerId { view: back, index: 1 })
            .map(GestureRecognizer::state);
        assert_eq!(pan, Some(GestureState::Began));
        let tap = d
            .recognizer(RecognizerId { view: back, index: 0 })
            .map(GestureRecognizer::state);
        assert_eq!(tap, Some(GestureState::Began));
    }

    #[test]
    fn repeated_down_is_ignored() {
        let (mut d, _, _) = two_views();
        let now = Instant::now();
        assert!(!d.handle(&Touch::down(1, 500.0, 500.0), now).is_empty());
        assert!(d.handle(&Touch::down(1, 510.0, 500.0), now).is_empty());
    }

    #[test]
    fn invalidate_view_releases_touches() {
        let (mut d, back, _) = two_views();
        let now = Instant::now();
        d.handle(&Touch::down(1, 500.0, 500.0), now);
        let failed = d.invalidate_view(back);
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|g| g.event.state == GestureState::Failed));
        assert!(!d.owns(TouchId(1)));
        assert!(d.handle(&Touch::moved(1, 600.0, 500.0), now).is_empty());
    }

    #[test]
    fn reset_releases_everything() {
        let (mut d, _, _) = two_views();
        let now = Instant::now();
        d.handle(&Touch::down(1, 500.0, 500.0), now);
        d.handle(&Touch::down(2, 150.0, 150.0), now);
        d.reset();
        assert_eq!(d.claimed(), 0);
        assert!(!d.in_momentum());
    }
}
