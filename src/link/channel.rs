// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! The two one-way byte streams between harness and target.
//!
//! The read side behaves like a serial line: an empty read means nothing has
//! arrived yet, not end of stream. The channel waits `poll_interval` and
//! tries again. Without a watchdog this can block forever; the process has
//! to be killed from outside in that case.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use super::codec::{ByteSource, FrameError};

/// Which end of the link an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Sink,
    Source,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Sink => f.write_str("write sink"),
            Endpoint::Source => f.write_str("read source"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("failed to open {endpoint} {path}: {source}")]
    Open {
        endpoint: Endpoint,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read pacing for the source end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    /// Wait between reads that returned nothing.
    pub poll_interval: Duration,
    /// Give up when no byte arrives for this long. `None` blocks forever.
    pub read_timeout: Option<Duration>,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            read_timeout: None,
        }
    }
}

/// Source end of the link.
pub struct LinkSource<R> {
    reader: R,
    policy: ReadPolicy,
}

impl<R> LinkSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, policy: ReadPolicy) -> Self {
        Self { reader, policy }
    }

    async fn read_some(
        &mut self,
        buf: &mut [u8],
        deadline: Option<Instant>,
    ) -> Result<usize, FrameError> {
        match (deadline, self.policy.read_timeout) {
            (Some(deadline), Some(limit)) => {
                tokio::time::timeout_at(deadline, self.reader.read(buf))
                    .await
                    .map_err(|_| FrameError::Timeout(limit))?
                    .map_err(FrameError::from)
            }
            _ => Ok(self.reader.read(buf).await?),
        }
    }
}

#[async_trait]
impl<R> ByteSource for LinkSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn fill(&mut self, buf: &mut [u8]) -> Result<(), FrameError> {
        let mut filled = 0;
        let mut deadline = self.policy.read_timeout.map(|t| Instant::now() + t);

        while filled < buf.len() {
            let n = self.read_some(&mut buf[filled..], deadline).await?;
            if n > 0 {
                filled += n;
                deadline = self.policy.read_timeout.map(|t| Instant::now() + t);
                continue;
            }

            if let (Some(at), Some(limit)) = (deadline, self.policy.read_timeout) {
                if Instant::now() >= at {
                    return Err(FrameError::Timeout(limit));
                }
            }
            tokio::time::sleep(self.policy.poll_interval).await;
        }
        Ok(())
    }
}

/// Both ends of the link, held for the whole run.
pub struct Channel<R, W> {
    source: LinkSource<R>,
    sink: W,
}

impl<R, W> Channel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, sink: W, policy: ReadPolicy) -> Self {
        Self {
            source: LinkSource::new(reader, policy),
            sink,
        }
    }

    pub fn source_mut(&mut self) -> &mut LinkSource<R> {
        &mut self.source
    }

    /// Write one encoded frame and flush it.
    pub async fn send(&mut self, frame: &[u8]) -> Result<(), FrameError> {
        self.sink.write_all(frame).await?;
        self.sink.flush().await?;
        Ok(())
    }

    /// Flush and shut down the sink, then drop both endpoints.
    pub async fn close(mut self) -> std::io::Result<()> {
        self.sink.flush().await?;
        self.sink.shutdown().await
    }
}

impl Channel<File, File> {
    /// Open the pre-provisioned endpoints. Neither is created.
    ///
    /// A regular file on the source side is truncated first so output left
    /// over from an earlier run is not replayed.
    pub async fn open(
        sink_path: &Path,
        source_path: &Path,
        policy: ReadPolicy,
    ) -> Result<Self, ChannelError> {
        let sink = OpenOptions::new()
            .write(true)
            .open(sink_path)
            .await
            .map_err(|source| ChannelError::Open {
                endpoint: Endpoint::Sink,
                path: sink_path.to_path_buf(),
                source,
            })?;

        let open_err = |source| ChannelError::Open {
            endpoint: Endpoint::Source,
            path: source_path.to_path_buf(),
            source,
        };

        let meta = tokio::fs::metadata(source_path).await.map_err(open_err)?;
        if meta.is_file() {
            OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(source_path)
                .await
                .map_err(open_err)?;
        }
        let reader = File::open(source_path).await.map_err(open_err)?;

        tracing::debug!(
            sink = %sink_path.display(),
            source = %source_path.display(),
            "link endpoints open"
        );
        Ok(Self::new(reader, sink, policy))
    }
}
