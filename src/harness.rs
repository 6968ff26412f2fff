// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! The decode-dispatch loop.
//!
//! One task, one packet at a time: read a frame, let the dispatcher react,
//! write its replies in order, repeat. The loop ends when the dispatcher
//! reaches `Done`, when stop-on-error fires, or on the first fatal link or
//! protocol error. Both channel endpoints are released on every one of
//! those paths.

use std::io::Write;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::dispatch::{EventDispatcher, HarnessState};
use crate::link::{Channel, ChannelError, EventError, FrameCodec, FrameError, Packet};
use crate::report::Reporter;

/// Exit code for a suite stopped by `--stop-on-error`.
pub const EXIT_ABORTED: u8 = 1;
/// Exit code for framing, encoding or event-format violations.
pub const EXIT_PROTOCOL: u8 = 2;
/// Exit code for endpoint open failures, link I/O errors and read timeouts.
pub const EXIT_LINK: u8 = 3;

/// How a run that did not hit a fatal error ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The suite ran to its final result and the drain handshake finished.
    Completed,
    /// Stop-on-error ended the run after a failure.
    Aborted,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Aborted => EXIT_ABORTED,
        }
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("malformed event: {0}")]
    Event(#[from] EventError),
}

impl HarnessError {
    pub fn exit_code(&self) -> u8 {
        match self {
            HarnessError::Frame(FrameError::Framing { .. } | FrameError::Encode { .. })
            | HarnessError::Event(_) => EXIT_PROTOCOL,
            HarnessError::Frame(FrameError::Io(_) | FrameError::Timeout(_))
            | HarnessError::Channel(_) => EXIT_LINK,
        }
    }
}

/// Owns every piece of one harness run.
pub struct Harness<R, W, O: Write> {
    channel: Channel<R, W>,
    codec: FrameCodec,
    dispatcher: EventDispatcher,
    reporter: Reporter<O>,
}

impl<R, W, O> Harness<R, W, O>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    O: Write,
{
    pub fn new(
        channel: Channel<R, W>,
        codec: FrameCodec,
        dispatcher: EventDispatcher,
        reporter: Reporter<O>,
    ) -> Self {
        Self {
            channel,
            codec,
            dispatcher,
            reporter,
        }
    }

    /// Drive the suite to the end, then release the channel.
    pub async fn run(self) -> Result<RunOutcome, HarnessError> {
        let Harness {
            mut channel,
            codec,
            mut dispatcher,
            mut reporter,
        } = self;

        let result = drive(&mut channel, &codec, &mut dispatcher, &mut reporter).await;
        match &result {
            Ok(outcome) => {
                tracing::info!(?outcome, tally = ?dispatcher.session().tally(), "run finished")
            }
            Err(e) => tracing::error!(error = %e, "run stopped on fatal error"),
        }

        if let Err(e) = channel.close().await {
            tracing::warn!(error = %e, "failed to close link sink");
        }
        result
    }
}

async fn send<R, W>(
    channel: &mut Channel<R, W>,
    codec: &FrameCodec,
    packet: &Packet,
) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let frame = codec.encode(packet)?;
    tracing::trace!(
        code = packet.payload.first().copied(),
        len = packet.payload.len(),
        "sending packet"
    );
    channel.send(&frame).await
}

async fn drive<R, W, O>(
    channel: &mut Channel<R, W>,
    codec: &FrameCodec,
    dispatcher: &mut EventDispatcher,
    reporter: &mut Reporter<O>,
) -> Result<RunOutcome, HarnessError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    O: Write,
{
    send(channel, codec, &dispatcher.start()).await?;

    loop {
        let packet = codec.read_packet(channel.source_mut()).await?;
        let reaction = dispatcher.dispatch(&packet, Instant::now(), reporter)?;

        for reply in &reaction.replies {
            send(channel, codec, reply).await?;
        }

        if reaction.abort {
            return Ok(RunOutcome::Aborted);
        }
        if dispatcher.state() == HarnessState::Done {
            return Ok(RunOutcome::Completed);
        }
    }
}
