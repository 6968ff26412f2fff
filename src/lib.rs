// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! tfw-harness
//!
//! Host-side driver for the kernel's testing framework. The kernel under
//! test reboots between tests and talks to the host over a debug serial link
//! made of two one-way byte streams. The harness:
//!
//! - frames and unframes packets on that link ([`link`])
//! - answers the target's save/restore handshake so test progress survives
//!   each reboot ([`dispatch`], [`session`])
//! - reports per-test verdicts and timing on the console ([`report`])
//! - decides when the run is over and with which exit status ([`harness`])
//!
//! Everything runs on one task; there is exactly one test in flight at any
//! time, serialized by the target's reboot handshake.

pub mod config;
pub mod dispatch;
pub mod harness;
pub mod link;
pub mod report;
pub mod session;
pub mod telemetry;

use std::io::Write;

use tokio::io::{AsyncRead, AsyncWrite};

pub use config::HarnessConfig;
pub use dispatch::{DispatchConfig, EventDispatcher, HarnessState, Reaction};
pub use harness::{Harness, HarnessError, RunOutcome};
pub use link::{Channel, FrameCodec, Packet};
pub use report::Reporter;
pub use session::{RunTally, SessionState};

/// Assemble a harness from configuration and an already opened channel.
pub fn build_harness<R, W, O>(
    config: &HarnessConfig,
    channel: Channel<R, W>,
    nightly: bool,
    stop_on_error: bool,
    reporter: Reporter<O>,
) -> Harness<R, W, O>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    O: Write,
{
    Harness::new(
        channel,
        FrameCodec::new(config.settle_delay),
        EventDispatcher::new(config.dispatch_config(nightly, stop_on_error)),
        reporter,
    )
}
