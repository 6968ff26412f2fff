// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed events carried in packet payloads.
//!
//! The first payload byte is the event code. Events that carry saved state
//! place it at offset 8; bytes 1..8 hold the nightly-only flag followed by
//! reserved padding.

use std::fmt;

use thiserror::Error;

use super::codec::{Packet, MAX_PAYLOAD_LEN};

/// Event codes (`payload[0]`).
pub mod code {
    pub const STATE_REQUEST: u8 = 0x11;
    pub const STATE_RESTORE: u8 = 0x22;
    pub const TEST_STARTED: u8 = 0x33;
    pub const TEST_PASSED: u8 = 0x34;
    pub const TEST_FAILED: u8 = 0x35;
    pub const FINAL_PASSED: u8 = 0x44;
    pub const FINAL_FAILED: u8 = 0x45;
    pub const NO_STATE: u8 = 0x55;
    pub const INIT: u8 = 0x66;
    pub const INIT_NIGHTLY: u8 = 0x67;
}

/// Fixed width of the name field in a test-started payload.
pub const MAX_NAME_LEN: usize = 96;

/// Offset of the saved state inside state-carrying payloads.
pub const STATE_OFFSET: usize = 8;

/// Largest state blob that still fits a frame behind its 8-byte prefix.
pub const MAX_STATE_LEN: usize = MAX_PAYLOAD_LEN - STATE_OFFSET;

const NIGHTLY_FLAG_OFFSET: usize = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("empty event payload")]
    Empty,

    #[error("event 0x{code:02X} truncated: {len} bytes (min {min})")]
    Truncated { code: u8, len: usize, min: usize },

    #[error("unknown event code 0x{0:02X}")]
    UnknownCode(u8),

    #[error("test name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("state blob too large: {len} bytes (max {max})")]
    StateTooLarge { len: usize, max: usize },
}

/// Test name, at most [`MAX_NAME_LEN`] bytes, never containing NUL.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TestName {
    bytes: [u8; MAX_NAME_LEN],
    len: usize,
}

impl TestName {
    /// Build a name from raw bytes. NULs are dropped.
    pub fn new(raw: &[u8]) -> Result<Self, EventError> {
        let mut bytes = [0u8; MAX_NAME_LEN];
        let mut len = 0;
        for &b in raw.iter().filter(|&&b| b != 0) {
            if len == MAX_NAME_LEN {
                return Err(EventError::NameTooLong {
                    len: raw.iter().filter(|&&b| b != 0).count(),
                    max: MAX_NAME_LEN,
                });
            }
            bytes[len] = b;
            len += 1;
        }
        Ok(Self { bytes, len })
    }

    /// Recover a name from its NUL-padded wire field.
    pub fn from_wire(field: &[u8; MAX_NAME_LEN]) -> Self {
        let mut bytes = [0u8; MAX_NAME_LEN];
        let mut len = 0;
        for &b in field.iter().filter(|&&b| b != 0) {
            bytes[len] = b;
            len += 1;
        }
        Self { bytes, len }
    }

    /// NUL-padded wire field.
    pub fn to_wire(&self) -> [u8; MAX_NAME_LEN] {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for TestName {
    fn default() -> Self {
        Self {
            bytes: [0u8; MAX_NAME_LEN],
            len: 0,
        }
    }
}

impl fmt::Debug for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TestName")
            .field(&String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Opaque continuation data the target hands over before a reboot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateBlob(Vec<u8>);

impl StateBlob {
    pub fn new(bytes: Vec<u8>) -> Result<Self, EventError> {
        if bytes.len() > MAX_STATE_LEN {
            return Err(EventError::StateTooLarge {
                len: bytes.len(),
                max: MAX_STATE_LEN,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

/// Decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Init {
        nightly: bool,
    },
    StateRequest,
    StateResponse {
        state: Option<StateBlob>,
    },
    TestStarted {
        name: TestName,
        nightly_only: bool,
        state: StateBlob,
    },
    TestResult {
        outcome: Outcome,
        is_final: bool,
        state: StateBlob,
    },
}

fn require_len(code: u8, payload: &[u8], min: usize) -> Result<(), EventError> {
    if payload.len() < min {
        return Err(EventError::Truncated {
            code,
            len: payload.len(),
            min,
        });
    }
    Ok(())
}

/// Prefix of a state-carrying payload: code, flag byte, reserved padding.
fn state_prefix(code: u8, flag: bool) -> Vec<u8> {
    let mut buf = vec![0u8; STATE_OFFSET];
    buf[0] = code;
    buf[NIGHTLY_FLAG_OFFSET] = u8::from(flag);
    buf
}

impl Event {
    pub fn decode(payload: &[u8]) -> Result<Self, EventError> {
        let Some(&event_code) = payload.first() else {
            return Err(EventError::Empty);
        };

        match event_code {
            code::STATE_REQUEST => Ok(Event::StateRequest),
            code::INIT | code::INIT_NIGHTLY => Ok(Event::Init {
                nightly: event_code == code::INIT_NIGHTLY,
            }),
            code::NO_STATE => Ok(Event::StateResponse { state: None }),
            code::STATE_RESTORE => {
                require_len(event_code, payload, STATE_OFFSET)?;
                let state = StateBlob::new(payload[STATE_OFFSET..].to_vec())?;
                Ok(Event::StateResponse { state: Some(state) })
            }
            code::TEST_STARTED => {
                require_len(event_code, payload, STATE_OFFSET + MAX_NAME_LEN)?;
                let name_at = payload.len() - MAX_NAME_LEN;
                let mut field = [0u8; MAX_NAME_LEN];
                field.copy_from_slice(&payload[name_at..]);
                Ok(Event::TestStarted {
                    name: TestName::from_wire(&field),
                    nightly_only: payload[NIGHTLY_FLAG_OFFSET] != 0,
                    state: StateBlob::new(payload[STATE_OFFSET..name_at].to_vec())?,
                })
            }
            code::TEST_PASSED | code::TEST_FAILED | code::FINAL_PASSED | code::FINAL_FAILED => {
                require_len(event_code, payload, STATE_OFFSET)?;
                let outcome = if event_code & 0x0F == 0x04 {
                    Outcome::Pass
                } else {
                    Outcome::Fail
                };
                Ok(Event::TestResult {
                    outcome,
                    is_final: event_code >> 4 == 0x4,
                    state: StateBlob::new(payload[STATE_OFFSET..].to_vec())?,
                })
            }
            other => Err(EventError::UnknownCode(other)),
        }
    }

    /// Event code this event is sent under.
    pub fn code(&self) -> u8 {
        match self {
            Event::Init { nightly: false } => code::INIT,
            Event::Init { nightly: true } => code::INIT_NIGHTLY,
            Event::StateRequest => code::STATE_REQUEST,
            Event::StateResponse { state: None } => code::NO_STATE,
            Event::StateResponse { state: Some(_) } => code::STATE_RESTORE,
            Event::TestStarted { .. } => code::TEST_STARTED,
            Event::TestResult { outcome, is_final, .. } => match (outcome, is_final) {
                (Outcome::Pass, false) => code::TEST_PASSED,
                (Outcome::Fail, false) => code::TEST_FAILED,
                (Outcome::Pass, true) => code::FINAL_PASSED,
                (Outcome::Fail, true) => code::FINAL_FAILED,
            },
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Event::Init { .. } | Event::StateRequest | Event::StateResponse { state: None } => {
                vec![self.code()]
            }
            Event::StateResponse { state: Some(state) } => {
                let mut buf = state_prefix(self.code(), false);
                buf.extend_from_slice(state.as_bytes());
                buf
            }
            Event::TestStarted {
                name,
                nightly_only,
                state,
            } => {
                let mut buf = state_prefix(self.code(), *nightly_only);
                buf.extend_from_slice(state.as_bytes());
                buf.extend_from_slice(&name.to_wire());
                buf
            }
            Event::TestResult { state, .. } => {
                let mut buf = state_prefix(self.code(), false);
                buf.extend_from_slice(state.as_bytes());
                buf
            }
        }
    }

    /// Wrap the encoded event in a harness-originated packet.
    pub fn into_packet(self) -> Packet {
        Packet::host(self.encode())
    }
}

/// Reply to a state request: `0x55` with nothing held, otherwise `0x22`,
/// seven zero bytes, then the held state.
pub fn state_response(state: Option<&StateBlob>) -> Packet {
    Event::StateResponse {
        state: state.cloned(),
    }
    .into_packet()
}
