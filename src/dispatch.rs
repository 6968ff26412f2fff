// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! Event interpretation and the harness state machine.
//!
//! ```text
//! AwaitingFirstContact --first packet--> Running
//! Running --final result--> Draining
//! Draining --state request--> Done
//! ```
//!
//! The dispatcher is reactive: apart from the initial `Init` packet it only
//! ever answers what the target sends. It owns the [`SessionState`] and is
//! its only writer.

use std::io::Write;
use std::time::Duration;

use tokio::time::Instant;

use crate::link::{code, state_response, Event, EventError, Outcome, Packet, StateBlob};
use crate::report::Reporter;
use crate::session::{SessionState, Verdict};

/// Subtracted from every measured test duration.
pub const DEFAULT_ELAPSED_COMPENSATION: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    AwaitingFirstContact,
    Running,
    Draining,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Run nightly-only tests; selects the `0x67` init payload.
    pub nightly: bool,
    /// Abort the run after the first failure that was not skipped.
    pub stop_on_error: bool,
    pub elapsed_compensation: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            nightly: false,
            stop_on_error: false,
            elapsed_compensation: DEFAULT_ELAPSED_COMPENSATION,
        }
    }
}

/// What the harness must do after an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Packets to send, in order.
    pub replies: Vec<Packet>,
    /// Stop the run once the replies are out.
    pub abort: bool,
}

impl Reaction {
    fn none() -> Self {
        Self::default()
    }

    fn reply(packet: Packet) -> Self {
        Self {
            replies: vec![packet],
            abort: false,
        }
    }
}

pub struct EventDispatcher {
    config: DispatchConfig,
    state: HarnessState,
    session: SessionState,
}

impl EventDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            state: HarnessState::AwaitingFirstContact,
            session: SessionState::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Init packet that provokes the target's first message.
    pub fn start(&self) -> Packet {
        Event::Init {
            nightly: self.config.nightly,
        }
        .into_packet()
    }

    /// Decode a packet payload and react to it.
    ///
    /// Unknown event codes are logged and ignored; malformed payloads of
    /// known events are fatal.
    pub fn dispatch<W: Write>(
        &mut self,
        packet: &Packet,
        now: Instant,
        reporter: &mut Reporter<W>,
    ) -> Result<Reaction, EventError> {
        if self.state == HarnessState::AwaitingFirstContact {
            tracing::debug!("first contact from target");
            self.state = HarnessState::Running;
        }

        let event = match Event::decode(&packet.payload) {
            Ok(event) => event,
            Err(EventError::UnknownCode(unknown)) => {
                tracing::warn!(code = unknown, kind = packet.kind, "ignoring unknown event code");
                return Ok(Reaction::none());
            }
            Err(e) => return Err(e),
        };

        Ok(self.handle(event, now, reporter))
    }

    /// React to an already decoded event.
    pub fn handle<W: Write>(
        &mut self,
        event: Event,
        now: Instant,
        reporter: &mut Reporter<W>,
    ) -> Reaction {
        match event {
            Event::StateRequest => self.on_state_request(),
            Event::TestStarted {
                name,
                nightly_only,
                state,
            } => {
                tracing::debug!(
                    test = %name,
                    nightly_only,
                    state_len = state.len(),
                    "test started"
                );
                self.session.begin_test(name, nightly_only, now);
                self.session.replace_saved_state(state);
                reporter.test_started(self.session.current_test());
                Reaction {
                    replies: self.acknowledgment(),
                    abort: false,
                }
            }
            Event::TestResult {
                outcome,
                is_final,
                state,
            } => self.on_test_result(outcome, is_final, state, now, reporter),
            other @ (Event::Init { .. } | Event::StateResponse { .. }) => {
                tracing::warn!(code = other.code(), "ignoring host-only event sent by target");
                Reaction::none()
            }
        }
    }

    fn on_state_request(&mut self) -> Reaction {
        let reply = state_response(self.session.saved_state());
        tracing::debug!(
            restoring = reply.payload[0] == code::STATE_RESTORE,
            "answering state request"
        );
        if self.state == HarnessState::Draining {
            self.session.mark_drained();
            self.state = HarnessState::Done;
        }
        Reaction::reply(reply)
    }

    fn on_test_result<W: Write>(
        &mut self,
        outcome: Outcome,
        is_final: bool,
        state: StateBlob,
        now: Instant,
        reporter: &mut Reporter<W>,
    ) -> Reaction {
        // Skipped tests still hand over state; it replaces what was held.
        self.session.replace_saved_state(state);
        let elapsed = self.session.elapsed(now, self.config.elapsed_compensation);

        let mut abort = false;
        if self.session.nightly_only() && !self.config.nightly {
            self.session.record(Verdict::Skipped);
            reporter.test_skipped();
        } else {
            match outcome {
                Outcome::Pass => {
                    self.session.record(Verdict::Passed);
                    reporter.test_passed(elapsed);
                }
                Outcome::Fail => {
                    self.session.record(Verdict::Failed);
                    reporter.test_failed(elapsed);
                    abort = self.config.stop_on_error;
                }
            }
        }
        tracing::debug!(
            test = %self.session.current_test(),
            ?outcome,
            is_final,
            ?elapsed,
            "test finished"
        );

        let replies = self.acknowledgment();
        if abort {
            tracing::info!(test = %self.session.current_test(), "stop-on-error: aborting run");
            reporter.suite_aborted(self.session.tally());
        } else if is_final {
            self.state = HarnessState::Draining;
            reporter.suite_completed(self.session.tally());
        }

        Reaction { replies, abort }
    }

    /// Two state responses against the state now held, sent back to back.
    fn acknowledgment(&self) -> Vec<Packet> {
        let pulse = state_response(self.session.saved_state());
        vec![pulse.clone(), pulse]
    }
}
