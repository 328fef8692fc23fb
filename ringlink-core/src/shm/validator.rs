// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Frame validation for everything read back out of a ring.
//!
//! The peer process writes the ring, so every header is checked against the
//! ring geometry before a payload slice is formed. Fails immediately - a
//! corrupt length is never clamped or guessed around.

use crate::error::ProtocolViolation;
use crate::shm::frame::{FrameHeader, MultiPartHeader, FRAME_HEADER_SIZE};
use crate::types::MessageType;

/// Validator for frames read from a ring.
pub struct FrameValidator;

impl FrameValidator {
    /// Check that a frame header at `offset` describes bytes inside the ring.
    pub fn validate_header(
        header: &FrameHeader,
        offset: u32,
        capacity: u32,
    ) -> Result<(), ProtocolViolation> {
        let length = header.total_length();
        let end = u64::from(offset) + u64::from(length);

        if (length as usize) < FRAME_HEADER_SIZE || end > u64::from(capacity) {
            return Err(ProtocolViolation::CorruptFrame {
                offset,
                length,
                capacity,
            });
        }

        Ok(())
    }

    /// Decode and check the payload of a multi-part header frame.
    pub(crate) fn validate_multi_part(
        payload: &[u8],
        offset: u32,
    ) -> Result<MultiPartHeader, ProtocolViolation> {
        let header = MultiPartHeader::parse(payload).ok_or_else(|| {
            ProtocolViolation::MalformedMultiPartHeader {
                offset,
                reason: format!("payload is {} bytes", payload.len()),
            }
        })?;

        if MessageType::new(header.final_type).is_err() {
            return Err(ProtocolViolation::MalformedMultiPartHeader {
                offset,
                reason: format!("final type {} is not an application type", header.final_type),
            });
        }

        Ok(header)
    }
}
