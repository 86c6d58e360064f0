#![forbid(unsafe_code)]

//! Pairing walkthroughs on two screens with two windows each:
//! windows 0 and 1 on screen A, windows 2 and 3 on screen B.

use mural_core::{ApplicationType, GestureState, ScreenLayout, WindowId};
use mural_runtime::{AppState, Coordinator};
use mural_wire::ControlMessage;
use pretty_assertions::assert_eq;

fn w(id: u32) -> WindowId {
    WindowId(id)
}

fn table(c: &Coordinator) -> Vec<AppState> {
    c.iter().map(|(_, s)| s).collect()
}

fn two_by_two() -> Coordinator {
    Coordinator::new(ScreenLayout::new(2, 2))
}

fn map(pair: Option<u32>, group: Option<u32>) -> AppState {
    AppState::new(pair.map(w), group.map(w), ApplicationType::MapExplorer)
}

#[test]
fn each_screen_groups_around_its_active_window() {
    let mut c = two_by_two();
    c.interact(w(1), None, GestureState::Began);
    assert_eq!(
        table(&c),
        vec![
            map(Some(1), Some(1)),
            map(None, Some(1)),
            AppState::default(),
            AppState::default(),
        ]
    );

    c.interact(w(2), None, GestureState::Began);
    assert_eq!(
        table(&c),
        vec![
            map(Some(1), Some(1)),
            map(None, Some(1)),
            map(None, Some(2)),
            map(Some(2), Some(2)),
        ]
    );
}

#[test]
fn a_screen_local_pair_ignores_the_other_screen() {
    let mut c = two_by_two();
    c.interact(w(0), None, GestureState::Began);
    assert_eq!(c.state(w(1)), Some(map(Some(0), Some(0))));

    let outcome = c.interact(w(2), Some(w(0)), GestureState::Recognized);
    assert_eq!(c.state(w(1)), Some(map(Some(0), Some(0))));
    assert!(outcome.changes.iter().all(|change| change.window != w(1)));
    assert!(c.violations().is_empty());
}

#[test]
fn unpair_keeps_groups() {
    let mut c = two_by_two();
    c.interact(w(0), None, GestureState::Began);
    c.interact(w(2), Some(w(0)), GestureState::Recognized);
    let before = table(&c);

    c.apply(&ControlMessage::Unpair { window: w(0) });
    for (i, (old, new)) in before.iter().zip(table(&c)).enumerate() {
        assert_eq!(new.group, old.group, "window {i} group");
        if old.pair == Some(w(0)) {
            assert_eq!(new.pair, None, "window {i} pair");
        } else {
            assert_eq!(new.pair, old.pair, "window {i} pair");
        }
    }
    assert!(c.paired_to(w(0)).next().is_none());
}

#[test]
fn first_interaction_converges_in_one_pass() {
    for (screens, per) in [(1, 1), (1, 4), (3, 2), (4, 4)] {
        let layout = ScreenLayout::new(screens, per);
        for active in layout.windows() {
            let mut c = Coordinator::new(layout);
            let first = c.interact(active, None, GestureState::Began);
            assert_eq!(first.changes.len(), per as usize, "{screens}x{per} from {active}");
            assert!(c.interact(active, None, GestureState::Began).is_empty());
        }
    }
}
