//! Fuzz target for event payload decoding.
//!
//! Arbitrary payloads must decode to an event or an error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tfw_harness::link::Event;

fuzz_target!(|data: &[u8]| {
    if let Ok(event) = Event::decode(data) {
        // Whatever decodes must re-encode to something that decodes the same way.
        let again = Event::decode(&event.encode());
        assert_eq!(again.map(|e| e.code()), Ok(event.code()));
    }
});
