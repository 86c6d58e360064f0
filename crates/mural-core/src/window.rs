#![forbid(unsafe_code)]

//! Window identity and the physical screen layout of an installation.
//!
//! Windows are numbered left to right across all screens:
//! `id = screen_index * windows_per_screen + window_index`. Closeness between
//! windows is measured either by raw id distance or by screen distance.

use crate::geometry::Rect;

/// Stable identifier of one screen-bound application window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct WindowId(pub u32);

impl WindowId {
    /// Absolute index distance to another window.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> u32 {
        self.0.abs_diff(other.0)
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// What a window is currently showing. Pairs never cross application types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ApplicationType {
    #[default]
    MapExplorer,
    Timeline,
    NodeNetwork,
}

/// Largest installation a layout describes. Every node keeps one table entry
/// per window.
pub const MAX_WINDOWS: u32 = 1 << 16;

/// Screens and windows of the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    pub screens: u32,
    pub windows_per_screen: u32,
}

impl ScreenLayout {
    /// Create a layout. Both counts are clamped to at least one, and the
    /// screen count so the total stays within [`MAX_WINDOWS`].
    #[must_use]
    pub fn new(screens: u32, windows_per_screen: u32) -> Self {
        let windows_per_screen = windows_per_screen.clamp(1, MAX_WINDOWS);
        Self {
            screens: screens.clamp(1, MAX_WINDOWS / windows_per_screen),
            windows_per_screen,
        }
    }

    /// Exact layout, or `None` when a count is zero or the total exceeds
    /// [`MAX_WINDOWS`].
    #[must_use]
    pub fn try_new(screens: u32, windows_per_screen: u32) -> Option<Self> {
        let total = screens.checked_mul(windows_per_screen)?;
        (total > 0 && total <= MAX_WINDOWS).then_some(Self {
            screens,
            windows_per_screen,
        })
    }

    /// Total number of windows, saturating for hand-built layouts past
    /// [`MAX_WINDOWS`].
    #[must_use]
    pub fn window_count(&self) -> u32 {
        self.screens
            .checked_mul(self.windows_per_screen)
            .unwrap_or(u32::MAX)
    }

    /// All window ids in index order.
    pub fn windows(&self) -> impl Iterator<Item = WindowId> + use<> {
        (0..self.window_count()).map(WindowId)
    }

    /// Whether `id` names a window of this layout.
    #[must_use]
    pub fn contains(&self, id: WindowId) -> bool {
        id.0 < self.window_count()
    }

    /// Derive a window id from launch parameters.
    #[must_use]
    pub fn window_id(&self, screen_index: u32, window_index: u32) -> Option<WindowId> {
        if screen_index >= self.screens || window_index >= self.windows_per_screen {
            return None;
        }
        let id = screen_index
            .checked_mul(self.windows_per_screen)?
            .checked_add(window_index)?;
        Some(WindowId(id))
    }

    /// Physical screen hosting `id`.
    #[must_use]
    pub fn screen_of(&self, id: WindowId) -> u32 {
        id.0 / self.windows_per_screen
    }

    /// Position of `id` within its screen.
    #[must_use]
    pub fn index_within_screen(&self, id: WindowId) -> u32 {
        id.0 % self.windows_per_screen
    }

    #[must_use]
    pub fn same_screen(&self, a: WindowId, b: WindowId) -> bool {
        self.screen_of(a) == self.screen_of(b)
    }

    /// Distance between the screens hosting `a` and `b`.
    #[must_use]
    pub fn screen_distance(&self, a: WindowId, b: WindowId) -> u32 {
        self.screen_of(a).abs_diff(self.screen_of(b))
    }

    /// The window sharing a screen half with `id`: even slots pair with the
    /// next slot, odd slots with the previous one. `None` when the screen
    /// hosts a single window or the partner slot does not exist.
    #[must_use]
    pub fn screen_neighbor(&self, id: WindowId) -> Option<WindowId> {
        let index = self.index_within_screen(id);
        let partner = if index % 2 == 0 {
            index + 1
        } else {
            index - 1
        };
        self.window_id(self.screen_of(id), partner)
    }

    /// Frame of a window slot inside a screen of `screen_width × screen_height`.
    #[must_use]
    pub fn frame_of(&self, id: WindowId, screen_width: f64, screen_height: f64) -> Rect {
        let slot_width = screen_width / f64::from(self.windows_per_screen);
        let index = f64::from(self.index_within_screen(id));
        Rect::new(slot_width * index, 0.0, slot_width, screen_height)
    }

    /// Window slot under horizontal position `x` on `screen`.
    ///
    /// Positions outside the screen clamp to the first or last slot.
    #[must_use]
    pub fn window_at(&self, screen: u32, x: f64, screen_width: f64) -> Option<WindowId> {
        let slot_width = screen_width / f64::from(self.windows_per_screen);
        if !(slot_width > 0.0) {
            return None;
        }
        let last = self.windows_per_screen - 1;
        let index = (x / slot_width).floor();
        let index = if index.is_nan() || index < 0.0 {
            0
        } else {
            (index as u32).min(last)
        };
        self.window_id(screen, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ScreenLayout {
        ScreenLayout::new(2, 2)
    }

    #[test]
    fn window_ids_from_launch_parameters() {
        let l = layout();
        assert_eq!(l.window_id(0, 0), Some(WindowId(0)));
        assert_eq!(l.window_id(1, 1), Some(WindowId(3)));
        assert_eq!(l.window_id(2, 0), None);
        assert_eq!(l.window_id(0, 2), None);
    }

    #[test]
    fn screens_and_distances() {
        let l = layout();
        assert_eq!(l.screen_of(WindowId(1)), 0);
        assert_eq!(l.screen_of(WindowId(2)), 1);
        assert!(l.same_screen(WindowId(2), WindowId(3)));
        assert_eq!(l.screen_distance(WindowId(0), WindowId(3)), 1);
        assert_eq!(WindowId(0).distance(WindowId(3)), 3);
    }

    #[test]
    fn screen_neighbor_pairs_slots() {
        let l = ScreenLayout::new(2, 3);
        assert_eq!(l.screen_neighbor(WindowId(0)), Some(WindowId(1)));
        assert_eq!(l.screen_neighbor(WindowId(1)), Some(WindowId(0)));
        // Slot 2 of a 3-wide screen has no partner.
        assert_eq!(l.screen_neighbor(WindowId(2)), None);
        assert_eq!(l.screen_neighbor(WindowId(3)), Some(WindowId(4)));
        assert_eq!(ScreenLayout::new(4, 1).screen_neighbor(WindowId(2)), None);
    }

    #[test]
    fn frames_tile_the_screen() {
        let l = layout();
        assert_eq!(l.frame_of(WindowId(0), 200.0, 100.0), Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(l.frame_of(WindowId(3), 200.0, 100.0), Rect::new(100.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn window_at_indexes_by_x() {
        let l = layout();
        assert_eq!(l.window_at(1, 10.0, 200.0), Some(WindowId(2)));
        assert_eq!(l.window_at(1, 150.0, 200.0), Some(WindowId(3)));
        assert_eq!(l.window_at(1, 500.0, 200.0), Some(WindowId(3)));
        assert_eq!(l.window_at(0, -5.0, 200.0), Some(WindowId(0)));
        assert_eq!(l.window_at(0, 5.0, 0.0), None);
    }

    #[test]
    fn counts_clamp_to_one() {
        let l = ScreenLayout::new(0, 0);
        assert_eq!(l.window_count(), 1);
        assert_eq!(l.windows().collect::<Vec<_>>(), vec![WindowId(0)]);
    }

    #[test]
    fn oversized_layouts_are_bounded() {
        assert_eq!(ScreenLayout::try_new(70_000, 70_000), None);
        assert_eq!(ScreenLayout::try_new(0, 2), None);
        assert_eq!(ScreenLayout::try_new(MAX_WINDOWS / 2, 3), None);
        assert_eq!(ScreenLayout::try_new(4, 2), Some(ScreenLayout::new(4, 2)));

        let clamped = ScreenLayout::new(70_000, 70_000);
        assert_eq!(clamped.windows_per_screen, MAX_WINDOWS);
        assert_eq!(clamped.window_count(), MAX_WINDOWS);

        let wide = ScreenLayout {
            screens: u32::MAX,
            windows_per_screen: u32::MAX,
        };
        assert_eq!(wide.window_count(), u32::MAX);
        assert_eq!(wide.window_id(u32::MAX - 1, 1), None);
    }
}
