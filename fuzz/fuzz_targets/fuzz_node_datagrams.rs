#![no_main]

use std::time::{Duration, Instant};

use libfuzzer_sys::fuzz_target;
use mural_runtime::{InstallationConfig, Node, NodeMsg, RecordingOutbound};

fuzz_target!(|data: &[u8]| {
    // First byte picks the socket of every chunk, the rest is the datagram.
    let mut config = InstallationConfig::default();
    config.layout.screens = 2;
    let Ok(mut node) = Node::new(config, 0, &[0], RecordingOutbound::default()) else {
        return;
    };
    let t0 = Instant::now();
    for (i, chunk) in data.split(|b| *b == 0xff).enumerate() {
        let Some((&selector, body)) = chunk.split_first() else {
            continue;
        };
        let msg = match selector % 4 {
            0 => NodeMsg::Sensor(body.to_vec()),
            1 => NodeMsg::Inbound(body.to_vec()),
            2 => NodeMsg::MomentumTick,
            _ => NodeMsg::Housekeeping,
        };
        let now = t0 + Duration::from_millis(16 * i as u64);
        let _ = node.update(msg, now);
        node.outbound_mut().take();
        assert!(node.coordinator().violations().is_empty());
    }
});
