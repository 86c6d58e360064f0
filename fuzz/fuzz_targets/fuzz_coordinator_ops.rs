#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mural_core::{ApplicationType, GestureState, ScreenLayout, WindowId};
use mural_runtime::Coordinator;
use mural_wire::ControlMessage;

#[derive(Debug, Arbitrary)]
enum Op {
    Interact { active: u8, group: Option<u8>, phase: u8 },
    Unpair(u8),
    Ungroup(u8),
    Split(u8, Option<u8>),
    Merge(u8, Option<u8>),
    Launch(u8, u8, Option<u8>),
    Reset,
}

#[derive(Debug, Arbitrary)]
struct Input {
    screens: u8,
    per_screen: u8,
    ops: Vec<Op>,
}

const PHASES: [GestureState; 6] = [
    GestureState::Possible,
    GestureState::Began,
    GestureState::Recognized,
    GestureState::Momentum,
    GestureState::Ended,
    GestureState::Failed,
];

const APPS: [ApplicationType; 3] = [
    ApplicationType::MapExplorer,
    ApplicationType::Timeline,
    ApplicationType::NodeNetwork,
];

fuzz_target!(|input: Input| {
    let layout = ScreenLayout::new(
        u32::from(input.screens % 6) + 1,
        u32::from(input.per_screen % 4) + 1,
    );
    // Ids may fall outside the layout on purpose.
    let id = |raw: u8| WindowId(u32::from(raw) % (layout.window_count() + 2));
    let mut coordinator = Coordinator::new(layout);
    for op in input.ops.iter().take(256) {
        match *op {
            Op::Interact { active, group, phase } => {
                let phase = PHASES[usize::from(phase) % PHASES.len()];
                coordinator.interact(id(active), group.map(id), phase);
            }
            Op::Unpair(w) => {
                coordinator.apply(&ControlMessage::Unpair { window: id(w) });
            }
            Op::Ungroup(g) => {
                coordinator.apply(&ControlMessage::Ungroup { group: id(g) });
            }
            Op::Split(w, g) => {
                coordinator.apply(&ControlMessage::Split { window: id(w), group: g.map(id) });
            }
            Op::Merge(w, g) => {
                coordinator.apply(&ControlMessage::Merge { window: id(w), group: g.map(id) });
            }
            Op::Launch(w, app, g) => {
                coordinator.apply(&ControlMessage::Launch {
                    window: id(w),
                    application: APPS[usize::from(app) % APPS.len()],
                    group: g.map(id),
                });
            }
            Op::Reset => {
                coordinator.apply(&ControlMessage::Reset);
            }
        }
        let violations = coordinator.violations();
        assert!(violations.is_empty(), "{op:?}: {violations:?}");
    }
});
