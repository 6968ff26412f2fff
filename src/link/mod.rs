// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! Debug link to the kernel under test.
//!
//! Two unidirectional byte streams with no message boundaries. Frames are
//! delimited by marker bytes; event payloads ride inside frames.

mod channel;
mod codec;
mod event;

pub use channel::{Channel, ChannelError, Endpoint, LinkSource, ReadPolicy};
pub use codec::{
    encode_frame, ByteSource, FrameCodec, FrameError, FrameField, Packet, DEFAULT_SETTLE_DELAY,
    END_OF_DATA, HEADER_LEN, HOST_PACKET_TYPE, MAX_PAYLOAD_LEN, START_OF_DATA, SYNC,
};
pub use event::{
    code, state_response, Event, EventError, Outcome, StateBlob, TestName, MAX_NAME_LEN,
    MAX_STATE_LEN, STATE_OFFSET,
};
