//! Shared helpers: a scripted target that speaks the link protocol.

#![allow(dead_code)]

use std::io::Cursor;
use std::time::Duration;

use tfw_harness::link::{
    encode_frame, state_response, Channel, Event, Outcome, ReadPolicy, StateBlob, TestName,
};
use tfw_harness::{DispatchConfig, EventDispatcher, FrameCodec, Harness, Reporter};

/// `TYPE` byte the target uses for testing-framework packets.
pub const TARGET_PACKET_TYPE: u8 = 0x02;

pub fn started(name: &str, nightly_only: bool, state: &[u8]) -> Event {
    Event::TestStarted {
        name: TestName::new(name.as_bytes()).unwrap(),
        nightly_only,
        state: StateBlob::new(state.to_vec()).unwrap(),
    }
}

pub fn result(outcome: Outcome, is_final: bool, state: &[u8]) -> Event {
    Event::TestResult {
        outcome,
        is_final,
        state: StateBlob::new(state.to_vec()).unwrap(),
    }
}

/// Frames the target would write for `events`, back to back.
pub fn target_stream(events: &[Event]) -> Vec<u8> {
    events
        .iter()
        .flat_map(|event| encode_frame(TARGET_PACKET_TYPE, &event.encode()).unwrap())
        .collect()
}

/// Frame the harness sends for a state response carrying `state`.
pub fn response_frame(state: Option<&[u8]>) -> Vec<u8> {
    let blob = state.map(|s| StateBlob::new(s.to_vec()).unwrap());
    state_response(blob.as_ref()).encode().unwrap()
}

pub fn init_frame(nightly: bool) -> Vec<u8> {
    encode_frame(0x00, &[if nightly { 0x67 } else { 0x66 }]).unwrap()
}

/// Fast polling with a watchdog so a stalled test fails instead of hanging.
pub fn test_policy() -> ReadPolicy {
    ReadPolicy {
        poll_interval: Duration::from_millis(1),
        read_timeout: Some(Duration::from_millis(300)),
    }
}

pub fn in_memory_harness<'a, W>(
    source: Vec<u8>,
    sink: W,
    config: DispatchConfig,
    console: &'a mut Vec<u8>,
) -> Harness<Cursor<Vec<u8>>, W, &'a mut Vec<u8>>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    Harness::new(
        Channel::new(Cursor::new(source), sink, test_policy()),
        FrameCodec::new(Duration::ZERO),
        EventDispatcher::new(config),
        Reporter::new(console, false),
    )
}
