#![forbid(unsafe_code)]

//! Property-based invariant tests for the pairing table.
//!
//! 1. Any history of interactions and control operations leaves a
//!    consistent table (`violations()` is empty)
//! 2. Repeating the same interaction changes nothing
//! 3. Interactions never touch windows of another application type
//! 4. `possible` and `failed` never change the table
//! 5. Replicas fed the same history agree
//! 6. Reset always returns every entry to the default

use mural_core::{ApplicationType, GestureState, ScreenLayout, WindowId};
use mural_runtime::{AppState, Coordinator};
use mural_wire::ControlMessage;
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Op {
    Interact(u32, Option<u32>, GestureState),
    Control(ControlMessage),
}

fn layout_strategy() -> impl Strategy<Value = ScreenLayout> {
    (1u32..=4, 1u32..=4).prop_map(|(screens, per)| ScreenLayout::new(screens, per))
}

fn phase_strategy() -> impl Strategy<Value = GestureState> {
    prop_oneof![
        Just(GestureState::Possible),
        Just(GestureState::Began),
        Just(GestureState::Recognized),
        Just(GestureState::Momentum),
        Just(GestureState::Ended),
        Just(GestureState::Failed),
    ]
}

fn app_strategy() -> impl Strategy<Value = ApplicationType> {
    prop_oneof![
        Just(ApplicationType::MapExplorer),
        Just(ApplicationType::Timeline),
        Just(ApplicationType::NodeNetwork),
    ]
}

/// Window ids are drawn wide and folded into the layout by `fit`.
fn op_strategy() -> impl Strategy<Value = Op> {
    let id = 0u32..64;
    let group = proptest::option::of(0u32..64);
    prop_oneof![
        6 => (id.clone(), group.clone(), phase_strategy())
            .prop_map(|(a, g, p)| Op::Interact(a, g, p)),
        1 => id.clone().prop_map(|w| Op::Control(ControlMessage::Unpair { window: WindowId(w) })),
        1 => id.clone().prop_map(|g| Op::Control(ControlMessage::Ungroup { group: WindowId(g) })),
        1 => (id.clone(), group.clone()).prop_map(|(w, g)| Op::Control(ControlMessage::Split {
            window: WindowId(w),
            group: g.map(WindowId),
        })),
        1 => (id.clone(), group.clone()).prop_map(|(w, g)| Op::Control(ControlMessage::Merge {
            window: WindowId(w),
            group: g.map(WindowId),
        })),
        1 => (id, group, app_strategy()).prop_map(|(w, g, application)| {
            Op::Control(ControlMessage::Launch {
                window: WindowId(w),
                application,
                group: g.map(WindowId),
            })
        }),
    ]
}

fn fit(layout: ScreenLayout, id: u32) -> WindowId {
    WindowId(id % layout.window_count())
}

fn apply(coordinator: &mut Coordinator, op: Op) {
    let layout = coordinator.layout();
    let f = |w: WindowId| fit(layout, w.0);
    match op {
        Op::Interact(active, group, phase) => {
            coordinator.interact(fit(layout, active), group.map(|g| fit(layout, g)), phase);
        }
        Op::Control(control) => {
            let control = match control {
                ControlMessage::Unpair { window } => ControlMessage::Unpair { window: f(window) },
                ControlMessage::Ungroup { group } => ControlMessage::Ungroup { group: f(group) },
                ControlMessage::Split { window, group } => ControlMessage::Split {
                    window: f(window),
                    group: group.map(f),
                },
                ControlMessage::Merge { window, group } => ControlMessage::Merge {
                    window: f(window),
                    group: group.map(f),
                },
                ControlMessage::Reset => ControlMessage::Reset,
                ControlMessage::Launch {
                    window,
                    application,
                    group,
                } => ControlMessage::Launch {
                    window: f(window),
                    application,
                    group: group.map(f),
                },
            };
            coordinator.apply(&control);
        }
    }
}

fn table(coordinator: &Coordinator) -> Vec<(WindowId, AppState)> {
    coordinator.iter().collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Consistency under arbitrary histories
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn histories_keep_the_table_consistent(
        layout in layout_strategy(),
        ops in proptest::collection::vec(op_strategy(), 0..40),
    ) {
        let mut coordinator = Coordinator::new(layout);
        for op in ops {
            apply(&mut coordinator, op);
            let violations = coordinator.violations();
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", op, violations);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Interaction is idempotent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn repeating_an_interaction_changes_nothing(
        layout in layout_strategy(),
        ops in proptest::collection::vec(op_strategy(), 0..20),
        active in 0u32..64,
        group in proptest::option::of(0u32..64),
        phase in phase_strategy(),
    ) {
        let mut coordinator = Coordinator::new(layout);
        for op in ops {
            apply(&mut coordinator, op);
        }
        let active = fit(layout, active);
        let group = group.map(|g| fit(layout, g));
        let first = coordinator.interact(active, group, phase);
        prop_assert!(first.changes.len() <= layout.window_count() as usize);
        let second = coordinator.interact(active, group, phase);
        prop_assert!(second.is_empty(), "second pass changed {:?}", second.changes);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Application types are isolated
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn interaction_stays_within_its_application(
        layout in layout_strategy(),
        ops in proptest::collection::vec(op_strategy(), 0..20),
        active in 0u32..64,
        phase in phase_strategy(),
    ) {
        let mut coordinator = Coordinator::new(layout);
        for op in ops {
            apply(&mut coordinator, op);
        }
        let active = fit(layout, active);
        let application = coordinator.state(active).map(|s| s.application);
        let outcome = coordinator.interact(active, coordinator.group_of(active), phase);
        for change in outcome.changes {
            prop_assert_eq!(Some(change.before.application), application);
            prop_assert_eq!(change.before.application, change.after.application);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Idle phases are inert
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn possible_and_failed_are_inert(
        layout in layout_strategy(),
        ops in proptest::collection::vec(op_strategy(), 0..20),
        active in 0u32..64,
        group in proptest::option::of(0u32..64),
        failed in any::<bool>(),
    ) {
        let mut coordinator = Coordinator::new(layout);
        for op in ops {
            apply(&mut coordinator, op);
        }
        let before = table(&coordinator);
        let phase = if failed { GestureState::Failed } else { GestureState::Possible };
        let group = group.map(|g| fit(layout, g));
        let outcome = coordinator.interact(fit(layout, active), group, phase);
        prop_assert!(outcome.is_empty());
        prop_assert_eq!(table(&coordinator), before);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Replicas converge
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn replicas_fed_the_same_history_agree(
        layout in layout_strategy(),
        ops in proptest::collection::vec(op_strategy(), 0..40),
    ) {
        let mut a = Coordinator::new(layout);
        let mut b = Coordinator::new(layout);
        for op in &ops {
            apply(&mut a, *op);
        }
        for op in &ops {
            apply(&mut b, *op);
        }
        prop_assert_eq!(table(&a), table(&b));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Reset
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reset_restores_defaults(
        layout in layout_strategy(),
        ops in proptest::collection::vec(op_strategy(), 0..40),
    ) {
        let mut coordinator = Coordinator::new(layout);
        for op in ops {
            apply(&mut coordinator, op);
        }
        coordinator.reset();
        prop_assert!(coordinator.iter().all(|(_, s)| s == AppState::default()));
        prop_assert!(coordinator.reset().is_empty());
    }
}
