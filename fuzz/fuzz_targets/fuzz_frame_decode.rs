//! Fuzz target for frame decoding.
//!
//! Feeds arbitrary bytes through the frame reader with a read watchdog so
//! short input ends in a timeout instead of an endless poll.

#![no_main]

use std::io::Cursor;
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use tfw_harness::link::{FrameCodec, LinkSource, ReadPolicy};

fuzz_target!(|data: &[u8]| {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
    {
        Ok(rt) => rt,
        Err(_) => return,
    };
    let policy = ReadPolicy {
        poll_interval: Duration::from_millis(1),
        read_timeout: Some(Duration::from_millis(5)),
    };
    let mut source = LinkSource::new(Cursor::new(data.to_vec()), policy);
    let codec = FrameCodec::new(Duration::ZERO);
    let _ = rt.block_on(codec.read_packet(&mut source));
});
