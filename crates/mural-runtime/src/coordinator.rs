#![forbid(unsafe_code)]

//! Installation-wide pairing and grouping table.
//!
//! Every process keeps a full copy of the table and mutates it only from
//! serialized messages (local gestures and inbound datagrams alike), so all
//! copies converge once every process has seen the same messages.
//!
//! Each window moves through
//! `ungrouped → grouped (unpaired) → paired → grouped (unpaired) → ungrouped`:
//!
//! - **group**: the window whose content every member shows.
//! - **pair**: the window whose live gesture this window mirrors. A paired
//!   window is always grouped, and never paired across application types.
//!
//! Split, merge, and ungroup each keep their own closeness rule; they reuse
//! index distance between windows and screen affinity between a window, the
//! acting window, and the group anchor.

use std::collections::BTreeMap;

use mural_core::{ApplicationType, GestureState, ScreenLayout, WindowId};
use mural_wire::ControlMessage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Table entry of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppState {
    pub pair: Option<WindowId>,
    pub group: Option<WindowId>,
    pub application: ApplicationType,
}

impl AppState {
    #[must_use]
    pub const fn new(
        pair: Option<WindowId>,
        group: Option<WindowId>,
        application: ApplicationType,
    ) -> Self {
        Self {
            pair,
            group,
            application,
        }
    }

    fn with(self, pair: Option<WindowId>, group: Option<WindowId>) -> Self {
        Self {
            pair,
            group,
            ..self
        }
    }
}

/// One table mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub window: WindowId,
    pub before: AppState,
    pub after: AppState,
}

/// Result of applying one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Entries that changed, in window order.
    pub changes: Vec<Change>,
    /// Group representatives that should broadcast their position so the
    /// rest of their group converges on it.
    pub resync: Vec<WindowId>,
}

impl Outcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.resync.is_empty()
    }
}

/// The pairing table.
#[derive(Debug, Clone)]
pub struct Coordinator {
    layout: ScreenLayout,
    table: BTreeMap<WindowId, AppState>,
}

impl Coordinator {
    /// A table with every window of `layout` ungrouped.
    #[must_use]
    pub fn new(layout: ScreenLayout) -> Self {
        Self {
            layout,
            table: layout.windows().map(|id| (id, AppState::default())).collect(),
        }
    }

    #[must_use]
    pub fn layout(&self) -> ScreenLayout {
        self.layout
    }

    #[must_use]
    pub fn state(&self, window: WindowId) -> Option<AppState> {
        self.table.get(&window).copied()
    }

    #[must_use]
    pub fn pair_of(&self, window: WindowId) -> Option<WindowId> {
        self.table.get(&window).and_then(|s| s.pair)
    }

    #[must_use]
    pub fn group_of(&self, window: WindowId) -> Option<WindowId> {
        self.table.get(&window).and_then(|s| s.group)
    }

    /// Every entry in window order.
    pub fn iter(&self) -> impl Iterator<Item = (WindowId, AppState)> + '_ {
        self.table.iter().map(|(id, state)| (*id, *state))
    }

    /// Windows whose pair is `source`.
    pub fn paired_to(&self, source: WindowId) -> impl Iterator<Item = WindowId> + '_ {
        self.table
            .iter()
            .filter(move |(_, s)| s.pair == Some(source))
            .map(|(id, _)| *id)
    }

    /// Describe every broken table invariant. Empty for a consistent table.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (id, state) in &self.table {
            if state.pair.is_some() && state.group.is_none() {
                out.push(format!("{id} is paired but ungrouped"));
            }
            if let Some(pair) = state.pair {
                match self.table.get(&pair) {
                    Some(other) if other.application != state.application => out.push(format!(
                        "{id} ({:?}) is paired across types with {pair} ({:?})",
                        state.application, other.application
                    )),
                    Some(_) => {}
                    None => out.push(format!("{id} is paired with unknown {pair}")),
                }
            }
            if let Some(group) = state.group
                && !self.layout.contains(group)
            {
                out.push(format!("{id} belongs to unknown group {group}"));
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Interaction
    // -----------------------------------------------------------------------

    /// Apply gesture activity of `active`.
    ///
    /// `group` is the group `active` reported with the gesture; `None` means
    /// it represented itself. Windows of another application type are never
    /// touched, and `possible`/`failed` leave the table alone.
    pub fn interact(
        &mut self,
        active: WindowId,
        group: Option<WindowId>,
        phase: GestureState,
    ) -> Outcome {
        let mut outcome = Outcome::default();
        if !matches!(
            phase,
            GestureState::Began
                | GestureState::Recognized
                | GestureState::Momentum
                | GestureState::Ended
        ) {
            return outcome;
        }
        let Some(active_state) = self.state(active) else {
            return outcome;
        };
        let current = group.unwrap_or(active);
        let momentum = phase == GestureState::Momentum;
        let layout = self.layout;

        for window in self.ids() {
            let state = self.table[&window];
            if state.application != active_state.application {
                continue;
            }
            let next = if window == active {
                state.with(None, Some(active))
            } else if state.group == Some(current) {
                match state.pair {
                    // Paired within its own screen: ignore other screens.
                    Some(pair)
                        if layout.same_screen(pair, window)
                            && !layout.same_screen(window, active) =>
                    {
                        continue;
                    }
                    Some(pair) => {
                        if active.distance(window) < pair.distance(window) || pair == active {
                            state.with(Some(active), Some(active))
                        } else {
                            continue;
                        }
                    }
                    None if momentum => continue,
                    None => state.with(Some(active), Some(active)),
                }
            } else if state.group.is_none() {
                if momentum || !layout.same_screen(window, active) {
                    continue;
                }
                state.with(Some(active), Some(active))
            } else {
                continue;
            };
            self.set(window, next, &mut outcome);
        }
        if !outcome.changes.is_empty() {
            debug!(
                active = active.0,
                group = current.0,
                ?phase,
                changed = outcome.changes.len(),
                "interaction updated pairing"
            );
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Control operations
    // -----------------------------------------------------------------------

    /// Clear `pair` on every window paired to `window`.
    pub fn unpair(&mut self, window: WindowId) -> Outcome {
        let mut outcome = Outcome::default();
        for id in self.ids() {
            let state = self.table[&id];
            if state.pair == Some(window) {
                self.set(id, state.with(None, state.group), &mut outcome);
            }
        }
        debug!(window = window.0, changed = outcome.changes.len(), "unpair");
        outcome
    }

    /// Dissolve `group`, then let every ungrouped window of the group's
    /// application type join the group of its closest grouped window.
    pub fn ungroup(&mut self, group: WindowId) -> Outcome {
        let mut outcome = Outcome::default();
        let Some(application) = self.state(group).map(|s| s.application) else {
            return outcome;
        };
        for id in self.ids() {
            let state = self.table[&id];
            if state.application == application && state.group == Some(group) {
                self.set(id, state.with(None, None), &mut outcome);
            }
        }
        for id in self.ids() {
            let state = self.table[&id];
            if state.application != application || state.group.is_some() {
                continue;
            }
            let joined = self.closest_group(id, application);
            if let Some(joined) = joined {
                self.set(id, state.with(None, Some(joined)), &mut outcome);
                if !outcome.resync.contains(&joined) {
                    outcome.resync.push(joined);
                }
            }
        }
        debug!(group = group.0, changed = outcome.changes.len(), "ungroup");
        outcome
    }

    /// Split the screen half around `window` away from `group`.
    ///
    /// Windows of `group` closer to `window` than to the group anchor, and
    /// ungrouped windows, regroup under whichever of `window` and its screen
    /// neighbor is closer to them.
    pub fn split(&mut self, window: WindowId, group: Option<WindowId>) -> Outcome {
        let mut outcome = Outcome::default();
        let Some(application) = self.state(window).map(|s| s.application) else {
            return outcome;
        };
        let layout = self.layout;
        let neighbor = layout.screen_neighbor(window).unwrap_or(window);

        for id in self.ids() {
            let state = self.table[&id];
            if state.application != application {
                continue;
            }
            let closest = if id.distance(window) < id.distance(neighbor) {
                window
            } else {
                neighbor
            };
            match state.group {
                Some(anchor) if Some(anchor) == group => {
                    if layout.same_screen(anchor, id) && !layout.same_screen(id, window) {
                        continue;
                    }
                    if layout.screen_distance(id, window) >= layout.screen_distance(id, anchor)
                        && !layout.same_screen(window, anchor)
                    {
                        continue;
                    }
                    if anchor.distance(id) >= anchor.distance(window) {
                        self.set(id, state.with(None, Some(closest)), &mut outcome);
                    }
                }
                None => self.set(id, state.with(None, Some(closest)), &mut outcome),
                Some(_) => {}
            }
        }
        debug!(window = window.0, neighbor = neighbor.0, changed = outcome.changes.len(), "split");
        outcome
    }

    /// Pull `window`, its screen neighbor, and the reachable members of
    /// `group` into a group anchored at `window`.
    pub fn merge(&mut self, window: WindowId, group: Option<WindowId>) -> Outcome {
        let mut outcome = Outcome::default();
        let Some(application) = self.state(window).map(|s| s.application) else {
            return outcome;
        };
        let layout = self.layout;
        let neighbor = layout.screen_neighbor(window).unwrap_or(window);

        for id in self.ids() {
            let state = self.table[&id];
            if state.application != application {
                continue;
            }
            let merged = state.with(None, Some(window));
            match state.group {
                Some(anchor) if Some(anchor) == group => {
                    if layout.same_screen(anchor, id) && !layout.same_screen(id, window) {
                        continue;
                    }
                    if layout.screen_distance(id, window) >= layout.screen_distance(id, anchor)
                        && !layout.same_screen(window, anchor)
                    {
                        continue;
                    }
                    match state.pair {
                        Some(pair) if id.distance(window) >= id.distance(pair) => {}
                        _ => self.set(id, merged, &mut outcome),
                    }
                }
                None => self.set(id, merged, &mut outcome),
                Some(anchor) => {
                    if id == window || id == neighbor || anchor == neighbor {
                        self.set(id, merged, &mut outcome);
                    }
                }
            }
        }
        outcome.resync.push(window);
        debug!(window = window.0, neighbor = neighbor.0, changed = outcome.changes.len(), "merge");
        outcome
    }

    /// Clear every entry to ungrouped, unpaired, default application.
    pub fn reset(&mut self) -> Outcome {
        let mut outcome = Outcome::default();
        for id in self.ids() {
            self.set(id, AppState::default(), &mut outcome);
        }
        debug!(changed = outcome.changes.len(), "reset");
        outcome
    }

    /// `window` launches `application`, carrying along the members of
    /// `group` that still follow it.
    ///
    /// Ungrouped windows already showing `application` join the new group,
    /// and pairs that would now cross application types are cleared.
    pub fn set_application(
        &mut self,
        window: WindowId,
        application: ApplicationType,
        group: Option<WindowId>,
    ) -> Outcome {
        let mut outcome = Outcome::default();
        let Some(previous) = self.state(window).map(|s| s.application) else {
            return outcome;
        };
        let launched = AppState::new(None, Some(window), application);

        for id in self.ids() {
            let state = self.table[&id];
            let follows = if id == window {
                true
            } else if state.application == previous && state.group == group {
                match state.pair {
                    Some(pair) => id.distance(window) < id.distance(pair) || pair == window,
                    None => true,
                }
            } else {
                state.application == application && state.group.is_none()
            };
            if follows {
                self.set(id, launched, &mut outcome);
            }
        }

        for id in self.ids() {
            let state = self.table[&id];
            let crosses = state
                .pair
                .and_then(|pair| self.state(pair))
                .is_some_and(|p| p.application != state.application);
            if crosses {
                self.set(id, state.with(None, state.group), &mut outcome);
            }
        }
        debug!(
            window = window.0,
            ?application,
            changed = outcome.changes.len(),
            "launch"
        );
        outcome
    }

    /// Apply a control message.
    pub fn apply(&mut self, control: &ControlMessage) -> Outcome {
        match *control {
            ControlMessage::Unpair { window } => self.unpair(window),
            ControlMessage::Ungroup { group } => self.ungroup(group),
            ControlMessage::Split { window, group } => self.split(window, group),
            ControlMessage::Merge { window, group } => self.merge(window, group),
            ControlMessage::Reset => self.reset(),
            ControlMessage::Launch {
                window,
                application,
                group,
            } => self.set_application(window, application, group),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ids(&self) -> Vec<WindowId> {
        self.table.keys().copied().collect()
    }

    fn set(&mut self, window: WindowId, after: AppState, outcome: &mut Outcome) {
        let Some(slot) = self.table.get_mut(&window) else {
            return;
        };
        if *slot == after {
            return;
        }
        let before = std::mem::replace(slot, after);
        if let Some(existing) = outcome.changes.iter_mut().find(|c| c.window == window) {
            existing.after = after;
        } else {
            outcome.changes.push(Change {
                window,
                before,
                after,
            });
        }
    }

    /// Group of the closest other grouped window of `application`: same-screen
    /// windows first by index distance, then by screen distance.
    fn closest_group(&self, window: WindowId, application: ApplicationType) -> Option<WindowId> {
        let layout = self.layout;
        self.table
            .iter()
            .filter(|(id, s)| **id != window && s.application == application)
            .filter_map(|(id, s)| s.group.map(|g| (*id, g)))
            .min_by_key(|(id, _)| {
                (
                    layout.screen_distance(*id, window),
                    id.distance(window),
                    id.0,
                )
            })
            .map(|(_, group)| group)
    }
}
