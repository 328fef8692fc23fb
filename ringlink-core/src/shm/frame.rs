// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Wire format of a ring frame.
//!
//! Every frame starts with two native-endian `u32`s: the total frame length
//! (header included) and the message type, whose bit 31 is the pad flag.

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// A frame that leaves this many bytes or fewer before the end of the ring
/// gets the pad flag instead of a separate pad frame.
pub const MIN_PAD: usize = 16;

/// Size of the multi-part header payload in bytes.
pub const MULTI_PART_HEADER_SIZE: usize = 8;

const PAD_FLAG: u32 = 0x8000_0000;
const TYPE_MASK: u32 = 0x7FFF_FFFF;

const TYPE_INVALID: u32 = 0;
const TYPE_PAD: u32 = 1;
const TYPE_MULTI_PART_HEADER: u32 = 2;
const TYPE_MULTI_PART_BODY: u32 = 3;

/// Decoded type of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Invalid,
    Pad,
    MultiPartHeader,
    MultiPartBody,
    /// Values 4..=99, never written by this transport.
    Reserved(u32),
    Application(u32),
}

impl FrameKind {
    pub(crate) fn from_raw(value: u32) -> Self {
        match value {
            TYPE_INVALID => Self::Invalid,
            TYPE_PAD => Self::Pad,
            TYPE_MULTI_PART_HEADER => Self::MultiPartHeader,
            TYPE_MULTI_PART_BODY => Self::MultiPartBody,
            v if v < crate::types::MessageType::MIN_APPLICATION => Self::Reserved(v),
            v => Self::Application(v),
        }
    }

    pub(crate) fn raw(&self) -> u32 {
        match self {
            Self::Invalid => TYPE_INVALID,
            Self::Pad => TYPE_PAD,
            Self::MultiPartHeader => TYPE_MULTI_PART_HEADER,
            Self::MultiPartBody => TYPE_MULTI_PART_BODY,
            Self::Reserved(v) | Self::Application(v) => *v,
        }
    }
}

/// Header preceding every frame in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    total_length: u32,
    type_and_pad: u32,
}

impl FrameHeader {
    pub(crate) fn new(total_length: u32, kind: FrameKind, padded: bool) -> Self {
        let mut type_and_pad = kind.raw() & TYPE_MASK;
        if padded {
            type_and_pad |= PAD_FLAG;
        }
        Self {
            total_length,
            type_and_pad,
        }
    }

    /// Total frame length, header included.
    pub fn total_length(&self) -> u32 {
        self.total_length
    }

    /// Payload length following the header.
    pub fn payload_len(&self) -> usize {
        (self.total_length as usize).saturating_sub(FRAME_HEADER_SIZE)
    }

    /// Raw message type with the pad flag stripped.
    pub fn message_type(&self) -> u32 {
        self.type_and_pad & TYPE_MASK
    }

    pub(crate) fn kind(&self) -> FrameKind {
        FrameKind::from_raw(self.message_type())
    }

    /// Whether the reader wraps to offset 0 after this frame.
    pub fn is_padded(&self) -> bool {
        self.type_and_pad & PAD_FLAG != 0
    }

    pub(crate) fn to_bytes(self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        out[..4].copy_from_slice(&self.total_length.to_ne_bytes());
        out[4..].copy_from_slice(&self.type_and_pad.to_ne_bytes());
        out
    }

    pub(crate) fn from_bytes(bytes: [u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            total_length: u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            type_and_pad: u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Payload of a multi-part header frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MultiPartHeader {
    pub final_type: u32,
    pub total_size: u32,
}

impl MultiPartHeader {
    pub(crate) fn to_bytes(self) -> [u8; MULTI_PART_HEADER_SIZE] {
        let mut out = [0u8; MULTI_PART_HEADER_SIZE];
        out[..4].copy_from_slice(&self.final_type.to_ne_bytes());
        out[4..].copy_from_slice(&self.total_size.to_ne_bytes());
        out
    }

    /// Decode from a frame payload; `None` if the payload is the wrong size.
    pub(crate) fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() != MULTI_PART_HEADER_SIZE {
            return None;
        }
        Some(Self {
            final_type: u32::from_ne_bytes([payload[0], payload[1], payload[2], payload[3]]),
            total_size: u32::from_ne_bytes([payload[4], payload[5], payload[6], payload[7]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_flag_is_bit_31() {
        let header = FrameHeader::new(508, FrameKind::Application(100), true);
        let bytes = header.to_bytes();
        let raw_type = u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(raw_type, 0x8000_0000 | 100);
        assert!(header.is_padded());
        assert_eq!(header.message_type(), 100);
        assert_eq!(header.payload_len(), 500);
    }

    #[test]
    fn test_frame_kind_classification() {
        assert_eq!(FrameKind::from_raw(0), FrameKind::Invalid);
        assert_eq!(FrameKind::from_raw(1), FrameKind::Pad);
        assert_eq!(FrameKind::from_raw(2), FrameKind::MultiPartHeader);
        assert_eq!(FrameKind::from_raw(3), FrameKind::MultiPartBody);
        assert_eq!(FrameKind::from_raw(42), FrameKind::Reserved(42));
        assert_eq!(FrameKind::from_raw(100), FrameKind::Application(100));
    }

    #[test]
    fn test_multi_part_header_rejects_wrong_length() {
        assert!(MultiPartHeader::parse(&[0u8; 7]).is_none());
        let header = MultiPartHeader {
            final_type: 120,
            total_size: 70_000,
        };
        assert_eq!(MultiPartHeader::parse(&header.to_bytes()), Some(header));
    }
}
