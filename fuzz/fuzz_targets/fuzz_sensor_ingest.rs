#![no_main]

use libfuzzer_sys::fuzz_target;
use mural_core::transport::{Resolution, TouchTransport};

fuzz_target!(|data: &[u8]| {
    let mut transport = TouchTransport::new(Resolution::new((4095.0, 4095.0), (3840.0, 2160.0)));
    // Whole buffer, then 13-byte frames one at a time.
    for touch in transport.ingest(data) {
        assert!(touch.position.x.is_finite() && touch.position.y.is_finite());
    }
    for frame in data.chunks(13) {
        for touch in transport.ingest(frame) {
            assert!(touch.position.x.is_finite() && touch.position.y.is_finite());
        }
    }
});
