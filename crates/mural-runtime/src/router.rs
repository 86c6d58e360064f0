#![forbid(unsafe_code)]

//! Touch ownership between the windows of a process and its peers.
//!
//! A touch belongs to whatever the down landed on for its whole lifetime:
//! a local window whose frame contains the down position, or else the peer
//! window whose slot covers the horizontal position on this screen.

use ahash::AHashMap;
use mural_core::{Rect, ScreenLayout, Touch, TouchId, TouchPhase, WindowId};
use tracing::{debug, trace};

/// Where a touch goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Delivered to a window hosted by this process.
    Local(WindowId),
    /// Forwarded over the network to the process hosting the window.
    Remote(WindowId),
}

impl Route {
    #[must_use]
    pub fn window(self) -> WindowId {
        match self {
            Self::Local(w) | Self::Remote(w) => w,
        }
    }
}

/// Routes sensor touches of one screen.
#[derive(Debug, Clone)]
pub struct TouchRouter {
    layout: ScreenLayout,
    screen: u32,
    screen_width: f64,
    frames: Vec<(WindowId, Rect)>,
    owners: AHashMap<TouchId, Route>,
    forwarded: AHashMap<TouchId, WindowId>,
}

impl TouchRouter {
    #[must_use]
    pub fn new(layout: ScreenLayout, screen: u32, screen_width: f64) -> Self {
        Self {
            layout,
            screen,
            screen_width,
            frames: Vec::new(),
            owners: AHashMap::new(),
            forwarded: AHashMap::new(),
        }
    }

    /// Register a local window. On overlap the first registered frame wins.
    pub fn register_window(&mut self, window: WindowId, frame: Rect) {
        if let Some(slot) = self.frames.iter_mut().find(|(id, _)| *id == window) {
            slot.1 = frame;
        } else {
            self.frames.push((window, frame));
        }
    }

    #[must_use]
    pub fn is_local(&self, window: WindowId) -> bool {
        self.frames.iter().any(|(id, _)| *id == window)
    }

    /// Current owner of a sensor touch.
    #[must_use]
    pub fn owner(&self, id: TouchId) -> Option<Route> {
        self.owners.get(&id).copied()
    }

    /// Number of sensor touches currently owned.
    #[must_use]
    pub fn live(&self) -> usize {
        self.owners.len()
    }

    /// Route a touch from this screen's sensor.
    ///
    /// Moves and ups of touches never routed at down are dropped. The up
    /// releases ownership after being routed.
    pub fn route(&mut self, touch: &Touch) -> Option<Route> {
        match touch.phase {
            TouchPhase::Down => {
                if let Some(existing) = self.owners.get(&touch.id) {
                    return Some(*existing);
                }
                let route = self.resolve(touch)?;
                debug!(touch = touch.id.0, ?route, x = touch.position.x, "routed touch");
                self.owners.insert(touch.id, route);
                Some(route)
            }
            TouchPhase::Moved => self.owners.get(&touch.id).copied(),
            TouchPhase::Up => self.owners.remove(&touch.id),
        }
    }

    /// Accept a touch a peer forwarded to `target`.
    ///
    /// Forwarded touches are never forwarded again: a target this process
    /// does not host, or a move/up without a claimed down, yields `None`.
    pub fn claim_forwarded(&mut self, touch: &Touch, target: WindowId) -> Option<WindowId> {
        match touch.phase {
            TouchPhase::Down => {
                if !self.is_local(target) {
                    trace!(touch = touch.id.0, target = target.0, "forwarded touch is not ours");
                    return None;
                }
                Some(*self.forwarded.entry(touch.id).or_insert(target))
            }
            TouchPhase::Moved => self.forwarded.get(&touch.id).copied(),
            TouchPhase::Up => self.forwarded.remove(&touch.id),
        }
    }

    /// Drop a sensor or forwarded touch whose release never arrived.
    pub fn release(&mut self, id: TouchId) -> bool {
        let owned = self.owners.remove(&id).is_some();
        self.forwarded.remove(&id).is_some() || owned
    }

    /// Forget every owned touch.
    pub fn clear(&mut self) {
        self.owners.clear();
        self.forwarded.clear();
    }

    fn resolve(&self, touch: &Touch) -> Option<Route> {
        if let Some((window, _)) = self
            .frames
            .iter()
            .find(|(_, frame)| frame.contains(touch.position))
        {
            return Some(Route::Local(*window));
        }
        let slot = self
            .layout
            .window_at(self.screen, touch.position.x, self.screen_width)?;
        Some(if self.is_local(slot) {
            Route::Local(slot)
        } else {
            Route::Remote(slot)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> TouchRouter {
        // Screen 1 of a 2x2 layout hosts windows 2 and 3, 1000 wide.
        let layout = ScreenLayout::new(2, 2);
        let mut r = TouchRouter::new(layout, 1, 1000.0);
        r.register_window(WindowId(2), layout.frame_of(WindowId(2), 1000.0, 500.0));
        r
    }

    #[test]
    fn down_inside_a_local_frame_stays_local() {
        let mut r = router();
        assert_eq!(
            r.route(&Touch::down(1, 100.0, 100.0)),
            Some(Route::Local(WindowId(2)))
        );
    }

    #[test]
    fn down_outside_local_frames_goes_to_the_slot_owner() {
        let mut r = router();
        assert_eq!(
            r.route(&Touch::down(1, 700.0, 100.0)),
            Some(Route::Remote(WindowId(3)))
        );
        assert_eq!(r.owner(TouchId(1)), Some(Route::Remote(WindowId(3))));
    }

    #[test]
    fn ownership_sticks_to_the_down_location() {
        let mut r = router();
        r.route(&Touch::down(1, 100.0, 100.0));
        assert_eq!(
            r.route(&Touch::moved(1, 900.0, 100.0)),
            Some(Route::Local(WindowId(2)))
        );
        assert_eq!(
            r.route(&Touch::up(1, 900.0, 100.0)),
            Some(Route::Local(WindowId(2)))
        );
        assert_eq!(r.live(), 0);
        assert_eq!(r.route(&Touch::moved(1, 100.0, 100.0)), None);
    }

    #[test]
    fn overlapping_frames_resolve_to_first_registered() {
        let layout = ScreenLayout::new(1, 2);
        let mut r = TouchRouter::new(layout, 0, 1000.0);
        r.register_window(WindowId(1), Rect::new(0.0, 0.0, 1000.0, 500.0));
        r.register_window(WindowId(0), Rect::new(0.0, 0.0, 500.0, 500.0));
        assert_eq!(
            r.route(&Touch::down(1, 10.0, 10.0)),
            Some(Route::Local(WindowId(1)))
        );
    }

    #[test]
    fn unknown_moves_and_ups_are_ignored() {
        let mut r = router();
        assert_eq!(r.route(&Touch::moved(5, 1.0, 1.0)), None);
        assert_eq!(r.route(&Touch::up(5, 1.0, 1.0)), None);
    }

    #[test]
    fn forwarded_touches_are_claimed_only_for_local_targets() {
        let mut r = router();
        assert_eq!(r.claim_forwarded(&Touch::down(1, 1.0, 1.0), WindowId(3)), None);
        assert_eq!(
            r.claim_forwarded(&Touch::down(1, 1.0, 1.0), WindowId(2)),
            Some(WindowId(2))
        );
        assert_eq!(
            r.claim_forwarded(&Touch::moved(1, 2.0, 1.0), WindowId(3)),
            Some(WindowId(2))
        );
        assert_eq!(
            r.claim_forwarded(&Touch::up(1, 2.0, 1.0), WindowId(2)),
            Some(WindowId(2))
        );
        assert_eq!(r.claim_forwarded(&Touch::moved(1, 2.0, 1.0), WindowId(2)), None);
    }

    #[test]
    fn released_and_cleared_touches_stop_routing() {
        let mut r = router();
        r.route(&Touch::down(1, 700.0, 100.0));
        r.claim_forwarded(&Touch::down(9, 1.0, 1.0), WindowId(2));
        assert!(r.release(TouchId(1)));
        assert!(!r.release(TouchId(1)));
        assert_eq!(r.route(&Touch::moved(1, 710.0, 100.0)), None);
        assert_eq!(
            r.claim_forwarded(&Touch::moved(9, 2.0, 1.0), WindowId(2)),
            Some(WindowId(2))
        );

        r.route(&Touch::down(2, 100.0, 100.0));
        r.clear();
        assert_eq!(r.live(), 0);
        assert_eq!(r.claim_forwarded(&Touch::moved(9, 2.0, 1.0), WindowId(2)), None);
    }
}
