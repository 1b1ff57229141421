// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed event frames.

/// Size of the encoded type tag.
pub const TAG_SIZE: usize = 8;

/// An event: a numeric type tag plus an opaque payload.
///
/// On the wire an event is two frames of one message: the tag as 8
/// little-endian bytes, then the payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    pub event_type: u64,
    pub payload: Vec<u8>,
}

impl Event {
    pub fn new(event_type: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            event_type,
            payload: payload.into(),
        }
    }

    /// Encoded tag frame.
    pub fn tag(&self) -> [u8; TAG_SIZE] {
        encode_tag(self.event_type)
    }

    /// Rebuild an event from a received (tag, payload) frame pair.
    pub fn from_frames(tag: &[u8], payload: &[u8]) -> Option<Self> {
        Some(Self {
            event_type: decode_tag(tag)?,
            payload: payload.to_vec(),
        })
    }
}

pub fn encode_tag(event_type: u64) -> [u8; TAG_SIZE] {
    event_type.to_le_bytes()
}

/// Decode a tag frame. `None` unless exactly 8 bytes.
pub fn decode_tag(frame: &[u8]) -> Option<u64> {
    let bytes: [u8; TAG_SIZE] = frame.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_is_little_endian() {
        assert_eq!(encode_tag(42), [42, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(encode_tag(0x0102), [2, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_tag_length() {
        assert_eq!(decode_tag(&encode_tag(u64::MAX)), Some(u64::MAX));
        assert_eq!(decode_tag(&[1, 2, 3]), None);
        assert_eq!(decode_tag(&[0; 9]), None);
    }

    #[test]
    fn test_from_frames() {
        let event = Event::new(7, b"hi".to_vec());
        let back = Event::from_frames(&event.tag(), &event.payload).unwrap();
        assert_eq!(back, event);
    }
}
