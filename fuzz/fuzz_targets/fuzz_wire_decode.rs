#![no_main]

use libfuzzer_sys::fuzz_target;
use mural_wire::{decode, encode};

fuzz_target!(|data: &[u8]| {
    // Arbitrary datagrams must never panic the decoder, and anything it
    // accepts must decode again after a re-encode. Re-encoding may grow
    // past the datagram limit, which is not a failure.
    if let Ok(envelope) = decode(data)
        && let Ok(bytes) = encode(&envelope)
    {
        let again = decode(&bytes).expect("re-encoded envelope decodes");
        assert_eq!(again.sender, envelope.sender);
        assert_eq!(again.message.kind(), envelope.message.kind());
    }
});
