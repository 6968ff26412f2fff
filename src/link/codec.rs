// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! Packet framing for the debug serial link.
//!
//! ```text
//! Packet := SYNC(0xAA) TYPE(u8) SIZE_HI SIZE_MID SIZE_LO SOD(0xBB) PAYLOAD(SIZE bytes) EOD(0xCC)
//! ```
//!
//! All multi-byte integers are big-endian. The link carries no message
//! boundaries of its own, so a misplaced marker byte means the stream is
//! misaligned; there is no resynchronization and the error is fatal.
//!
//! # Known limitation
//!
//! After the sync byte the decoder sleeps for a fixed settle delay before
//! reading the rest of the header. The target writes a packet as one burst,
//! and the pause gives the burst time to land. It is a flow-control
//! compromise, not a correctness guarantee: a slow transport can still
//! deliver the header late, in which case the read simply waits longer.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Start-of-packet byte.
pub const SYNC: u8 = 0xAA;

/// Marker between header and payload.
pub const START_OF_DATA: u8 = 0xBB;

/// Marker after the payload.
pub const END_OF_DATA: u8 = 0xCC;

/// `TYPE` byte of every harness-originated packet.
pub const HOST_PACKET_TYPE: u8 = 0x00;

/// Largest payload the 24-bit size field can describe.
pub const MAX_PAYLOAD_LEN: usize = 0x00FF_FFFF;

/// Sync, type, three size bytes and the start-of-data marker.
pub const HEADER_LEN: usize = 6;

/// Default pause between the sync byte and the rest of the header.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Marker position inside a frame, used for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
    Sync,
    StartOfData,
    EndOfData,
}

impl fmt::Display for FrameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameField::Sync => f.write_str("sync byte"),
            FrameField::StartOfData => f.write_str("start-of-data marker"),
            FrameField::EndOfData => f.write_str("end-of-data marker"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("framing error: {field} was 0x{found:02X}, expected 0x{expected:02X}")]
    Framing {
        field: FrameField,
        expected: u8,
        found: u8,
    },

    #[error("payload too large: {size} bytes (max {max})")]
    Encode { size: usize, max: usize },

    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no data from target within {0:?}")]
    Timeout(Duration),
}

/// One frame off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(kind: u8, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Packet sent by the harness (`TYPE` is always zero).
    pub fn host(payload: Vec<u8>) -> Self {
        Self::new(HOST_PACKET_TYPE, payload)
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode_frame(self.kind, &self.payload)
    }
}

/// Serialize one frame.
pub fn encode_frame(kind: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::Encode {
            size: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let size = (payload.len() as u32).to_be_bytes();
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
    buf.push(SYNC);
    buf.push(kind);
    buf.extend_from_slice(&size[1..]);
    buf.push(START_OF_DATA);
    buf.extend_from_slice(payload);
    buf.push(END_OF_DATA);
    Ok(buf)
}

/// Readable end of the link.
///
/// `fill` must not return until `buf` is completely filled or the link has
/// failed; partial arrival is the implementor's problem, not the decoder's.
#[async_trait]
pub trait ByteSource: Send {
    async fn fill(&mut self, buf: &mut [u8]) -> Result<(), FrameError>;

    async fn read_byte(&mut self) -> Result<u8, FrameError> {
        let mut byte = [0u8; 1];
        self.fill(&mut byte).await?;
        Ok(byte[0])
    }
}

fn expect_marker(field: FrameField, expected: u8, found: u8) -> Result<(), FrameError> {
    if found == expected {
        Ok(())
    } else {
        Err(FrameError::Framing {
            field,
            expected,
            found,
        })
    }
}

/// Frame decoder holding the settle delay.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    settle_delay: Duration,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl FrameCodec {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn encode(&self, packet: &Packet) -> Result<Vec<u8>, FrameError> {
        packet.encode()
    }

    /// Read exactly one packet from `source`.
    pub async fn read_packet<S>(&self, source: &mut S) -> Result<Packet, FrameError>
    where
        S: ByteSource,
    {
        let sync = source.read_byte().await?;
        expect_marker(FrameField::Sync, SYNC, sync)?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        // type, size hi/mid/lo, start-of-data
        let mut header = [0u8; HEADER_LEN - 1];
        source.fill(&mut header).await?;
        let kind = header[0];
        let size = (usize::from(header[1]) << 16)
            | (usize::from(header[2]) << 8)
            | usize::from(header[3]);
        expect_marker(FrameField::StartOfData, START_OF_DATA, header[4])?;

        let mut payload = vec![0u8; size];
        source.fill(&mut payload).await?;

        let eod = source.read_byte().await?;
        expect_marker(FrameField::EndOfData, END_OF_DATA, eod)?;

        tracing::trace!(
            kind,
            size,
            preview = %hex::encode(&payload[..payload.len().min(16)]),
            "packet decoded"
        );
        Ok(Packet { kind, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `chunk` bytes per call to mimic a trickling link.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    #[async_trait]
    impl ByteSource for Trickle {
        async fn fill(&mut self, buf: &mut [u8]) -> Result<(), FrameError> {
            let mut filled = 0;
            while filled < buf.len() {
                if self.pos >= self.data.len() {
                    return Err(FrameError::Timeout(Duration::ZERO));
                }
                let n = self
                    .chunk
                    .min(buf.len() - filled)
                    .min(self.data.len() - self.pos);
                buf[filled..filled + n].copy_from_slice(&self.data[self.pos..self.pos + n]);
                self.pos += n;
                filled += n;
            }
            Ok(())
        }
    }

    fn trickle(data: Vec<u8>, chunk: usize) -> Trickle {
        Trickle { data, pos: 0, chunk }
    }

    #[test]
    fn test_encode_single_byte_init() {
        let frame = encode_frame(HOST_PACKET_TYPE, &[0x66]).unwrap();
        assert_eq!(frame, vec![0xAA, 0x00, 0x00, 0x00, 0x01, 0xBB, 0x66, 0xCC]);
    }

    #[test]
    fn test_encode_size_is_big_endian() {
        let payload = vec![0u8; 0x01_02_03];
        let frame = encode_frame(0x07, &payload).unwrap();
        assert_eq!(&frame[..HEADER_LEN], &[0xAA, 0x07, 0x01, 0x02, 0x03, 0xBB]);
        assert_eq!(frame.len(), HEADER_LEN + payload.len() + 1);
        assert_eq!(*frame.last().unwrap(), END_OF_DATA);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        match encode_frame(HOST_PACKET_TYPE, &payload) {
            Err(FrameError::Encode { size, max }) => {
                assert_eq!(size, MAX_PAYLOAD_LEN + 1);
                assert_eq!(max, MAX_PAYLOAD_LEN);
            }
            other => panic!("expected encode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_byte_at_a_time() {
        let frame = encode_frame(0x01, b"hello").unwrap();
        let codec = FrameCodec::new(Duration::ZERO);
        let packet = codec.read_packet(&mut trickle(frame, 1)).await.unwrap();
        assert_eq!(packet.kind, 0x01);
        assert_eq!(packet.payload, b"hello");
    }

    #[tokio::test]
    async fn test_decode_returns_encoded_payload_across_size_boundaries() {
        let codec = FrameCodec::new(Duration::ZERO);
        for len in [0usize, 1, 255, 256, 65_535, 65_536, 0x01_02_03] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
            let frame = encode_frame(0x02, &payload).unwrap();
            assert_eq!(frame.len(), HEADER_LEN + len + 1);

            let packet = codec.read_packet(&mut trickle(frame, 4096)).await.unwrap();
            assert_eq!(packet.kind, 0x02);
            assert_eq!(packet.payload.len(), len);
            assert!(packet.payload == payload, "payload mismatch at len {}", len);
        }
    }

    #[tokio::test]
    async fn test_decode_largest_payload() {
        let payload = vec![0x7Eu8; MAX_PAYLOAD_LEN];
        let frame = encode_frame(0x00, &payload).unwrap();
        assert_eq!(&frame[2..5], &[0xFF, 0xFF, 0xFF]);
        let codec = FrameCodec::new(Duration::ZERO);
        let packet = codec.read_packet(&mut trickle(frame, 1 << 20)).await.unwrap();
        assert_eq!(packet.payload.len(), MAX_PAYLOAD_LEN);
    }

    #[tokio::test]
    async fn test_decode_empty_payload() {
        let frame = encode_frame(0x00, &[]).unwrap();
        let codec = FrameCodec::new(Duration::ZERO);
        let packet = codec.read_packet(&mut trickle(frame, 64)).await.unwrap();
        assert!(packet.payload.is_empty());
    }

    #[tokio::test]
    async fn test_decode_bad_sync_is_fatal() {
        let codec = FrameCodec::new(Duration::ZERO);
        let err = codec
            .read_packet(&mut trickle(vec![0x42, 0x00], 8))
            .await
            .unwrap_err();
        match err {
            FrameError::Framing { field, expected, found } => {
                assert_eq!(field, FrameField::Sync);
                assert_eq!(expected, 0xAA);
                assert_eq!(found, 0x42);
            }
            other => panic!("expected framing error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decode_bad_end_marker() {
        let mut frame = encode_frame(0x00, &[1, 2, 3]).unwrap();
        let last = frame.len() - 1;
        frame[last] = 0x00;
        let codec = FrameCodec::new(Duration::ZERO);
        let err = codec.read_packet(&mut trickle(frame, 4)).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::Framing { field: FrameField::EndOfData, expected: 0xCC, found: 0x00 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_waits_settle_delay() {
        let frame = encode_frame(0x00, &[9]).unwrap();
        let codec = FrameCodec::default();
        let start = tokio::time::Instant::now();
        codec.read_packet(&mut trickle(frame, 3)).await.unwrap();
        assert!(start.elapsed() >= DEFAULT_SETTLE_DELAY);
    }

    #[test]
    fn test_framing_error_names_both_bytes() {
        let err = FrameError::Framing {
            field: FrameField::StartOfData,
            expected: START_OF_DATA,
            found: 0x12,
        };
        assert_eq!(
            err.to_string(),
            "framing error: start-of-data marker was 0x12, expected 0xBB"
        );
    }
}
