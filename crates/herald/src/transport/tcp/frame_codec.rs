// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-part framing codec for messages over TCP.
//!
//! TCP is a stream protocol without message boundaries. Each frame of a
//! multi-part message is written with a flags byte and a length prefix:
//!
//! ```text
//! +-----------+----------------+-------------------+
//! | Flags (1B)| Length (4B BE) | Frame bytes       |
//! +-----------+----------------+-------------------+
//! ```
//!
//! Flag bit 0 (`FLAG_MORE`) is set on every frame except the last one of a
//! message. A published event is therefore encoded as:
//!
//! ```text
//! [01][00 00 00 08][type tag, 8 bytes LE] [00][len][payload]
//! ```
//!
//! # Example
//!
//! ```
//! use herald::transport::tcp::FrameCodec;
//!
//! let wire = FrameCodec::encode_message(&[&42u64.to_le_bytes(), b"\x01\x02\x03"]);
//! let frames = FrameCodec::read_message(&mut wire.as_slice(), 1024).unwrap();
//! assert_eq!(frames[1], vec![1, 2, 3]);
//! ```

use std::io::{self, Read};

/// Frame header size (flags + 4 bytes length).
pub const FRAME_HEADER_SIZE: usize = 5;

/// More frames of the same message follow.
pub const FLAG_MORE: u8 = 0x01;

/// Default maximum message size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Multi-part frame codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Encoded size of a frame carrying `len` bytes.
    pub fn encoded_len(len: usize) -> usize {
        FRAME_HEADER_SIZE + len
    }

    /// Append one frame to `buf`.
    pub fn encode_frame_into(frame: &[u8], more: bool, buf: &mut Vec<u8>) {
        let flags = if more { FLAG_MORE } else { 0 };
        buf.reserve(Self::encoded_len(frame.len()));
        buf.push(flags);
        buf.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        buf.extend_from_slice(frame);
    }

    /// Encode a complete message; the last frame closes it.
    pub fn encode_message(frames: &[&[u8]]) -> Vec<u8> {
        let total: usize = frames.iter().map(|f| Self::encoded_len(f.len())).sum();
        let mut buf = Vec::with_capacity(total);
        for (i, frame) in frames.iter().enumerate() {
            Self::encode_frame_into(frame, i + 1 < frames.len(), &mut buf);
        }
        buf
    }

    /// Read one frame (blocking). Returns the bytes and the MORE flag.
    pub fn read_frame<R: Read + ?Sized>(
        reader: &mut R,
        max_size: usize,
    ) -> io::Result<(Vec<u8>, bool)> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        reader.read_exact(&mut header)?;

        let flags = header[0];
        if flags & !FLAG_MORE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown frame flags 0x{:02x}", flags),
            ));
        }

        let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        if len > max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds limit of {} bytes", len, max_size),
            ));
        }

        let mut frame = vec![0u8; len];
        reader.read_exact(&mut frame)?;
        Ok((frame, flags & FLAG_MORE != 0))
    }

    /// Read frames until the one without MORE (blocking).
    pub fn read_message<R: Read + ?Sized>(
        reader: &mut R,
        max_size: usize,
    ) -> io::Result<Vec<Vec<u8>>> {
        let mut frames = Vec::with_capacity(2);
        let mut total = 0usize;
        loop {
            let (frame, more) = Self::read_frame(reader, max_size - total.min(max_size))?;
            total += Self::encoded_len(frame.len());
            frames.push(frame);
            if !more {
                return Ok(frames);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_event_layout() {
        let wire = FrameCodec::encode_message(&[&42u64.to_le_bytes(), &[1, 2, 3]]);
        assert_eq!(wire.len(), 2 * FRAME_HEADER_SIZE + 8 + 3);
        assert_eq!(wire[0], FLAG_MORE);
        assert_eq!(&wire[1..5], &8u32.to_be_bytes());
        assert_eq!(&wire[5..13], &[42, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(wire[13], 0);
        assert_eq!(&wire[14..18], &3u32.to_be_bytes());
        assert_eq!(&wire[18..], &[1, 2, 3]);
    }

    #[test]
    fn test_read_consecutive_messages() {
        let mut wire = FrameCodec::encode_message(&[b"a", b"bc"]);
        wire.extend(FrameCodec::encode_message(&[b"d", b""]));
        let mut cursor = Cursor::new(wire);

        let first = FrameCodec::read_message(&mut cursor, 1024).unwrap();
        assert_eq!(first, vec![b"a".to_vec(), b"bc".to_vec()]);
        let second = FrameCodec::read_message(&mut cursor, 1024).unwrap();
        assert_eq!(second, vec![b"d".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let wire = FrameCodec::encode_message(&[&[0u8; 64]]);
        let err = FrameCodec::read_message(&mut wire.as_slice(), 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_unknown_flags_rejected() {
        let mut wire = FrameCodec::encode_message(&[b"x"]);
        wire[0] = 0x80;
        let err = FrameCodec::read_frame(&mut wire.as_slice(), 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_frame_is_eof() {
        let wire = FrameCodec::encode_message(&[b"hello"]);
        let err = FrameCodec::read_message(&mut &wire[..7], 1024).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
