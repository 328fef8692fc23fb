// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Splitting oversized messages into frames and putting them back together.
//!
//! A fragmented message travels as one multi-part header frame announcing
//! the final type and size, followed by body frames of at most
//! `max_payload` bytes each. Fragments of different messages never
//! interleave within a direction.

use crate::error::ProtocolViolation;
use crate::shm::frame::{FrameKind, MultiPartHeader, MULTI_PART_HEADER_SIZE};
use crate::shm::frame_ring::FrameRing;
use crate::types::MessageType;

/// Most a reassembly reserves up front before any body bytes arrive.
const PREALLOCATE_LIMIT: usize = 1024 * 1024;

/// Outcome of one [`Fragmenter::pump`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FragmentProgress {
    /// No room in the ring; nothing was written.
    Blocked,
    /// One frame was written and more remain.
    Advanced,
    /// The last frame was written.
    Complete,
}

/// Sender side of a queued message.
pub(crate) struct Fragmenter {
    kind: MessageType,
    data: Vec<u8>,
    cursor: usize,
    chunk_size: usize,
    header_sent: bool,
}

impl Fragmenter {
    pub(crate) fn new(kind: MessageType, payload: &[u8], chunk_size: usize) -> Self {
        Self {
            kind,
            data: payload.to_vec(),
            cursor: 0,
            chunk_size: chunk_size.max(1),
            header_sent: false,
        }
    }

    /// Payload size of the message being sent.
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the whole message fits in one plain frame.
    fn fits_one_frame(&self) -> bool {
        self.data.len() <= self.chunk_size
    }

    /// Frames this message occupies on the wire.
    pub(crate) fn frame_count(&self) -> usize {
        if self.fits_one_frame() {
            1
        } else {
            1 + self.data.len().div_ceil(self.chunk_size)
        }
    }

    /// Write at most one frame.
    pub(crate) fn pump(&mut self, ring: &mut FrameRing) -> FragmentProgress {
        // Buffered messages small enough for one frame go out unsplit.
        if self.fits_one_frame() {
            if ring.can_send(self.data.len()).is_err() {
                return FragmentProgress::Blocked;
            }
            ring.write_frame(FrameKind::Application(self.kind.value()), &self.data);
            self.cursor = self.data.len();
            return FragmentProgress::Complete;
        }

        if !self.header_sent {
            if ring.can_send(MULTI_PART_HEADER_SIZE).is_err() {
                return FragmentProgress::Blocked;
            }
            let header = MultiPartHeader {
                final_type: self.kind.value(),
                total_size: self.data.len() as u32,
            };
            ring.write_frame(FrameKind::MultiPartHeader, &header.to_bytes());
            self.header_sent = true;
            return FragmentProgress::Advanced;
        }

        let end = (self.cursor + self.chunk_size).min(self.data.len());
        if ring.can_send(end - self.cursor).is_err() {
            return FragmentProgress::Blocked;
        }
        ring.write_frame(FrameKind::MultiPartBody, &self.data[self.cursor..end]);
        self.cursor = end;

        if self.cursor == self.data.len() {
            FragmentProgress::Complete
        } else {
            FragmentProgress::Advanced
        }
    }
}

/// Receiver side of a multi-part message.
pub(crate) struct Reassembler {
    kind: MessageType,
    declared: usize,
    buffer: Vec<u8>,
}

impl Reassembler {
    pub(crate) fn new(kind: MessageType, declared: usize) -> Self {
        Self {
            kind,
            declared,
            // The size comes from the peer; grow as body frames arrive.
            buffer: Vec::with_capacity(declared.min(PREALLOCATE_LIMIT)),
        }
    }

    /// Append one body frame; returns whether the message is now complete.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Result<bool, ProtocolViolation> {
        let received = self.buffer.len() + chunk.len();
        if received > self.declared {
            return Err(ProtocolViolation::FragmentOverflow {
                declared: self.declared,
                received,
            });
        }
        self.buffer.extend_from_slice(chunk);
        Ok(self.is_finished())
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.buffer.len() == self.declared
    }

    pub(crate) fn kind(&self) -> MessageType {
        self.kind
    }

    pub(crate) fn received(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn declared(&self) -> usize {
        self.declared
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_frame_count() {
        let kind = MessageType::APP;
        assert_eq!(Fragmenter::new(kind, &pattern(100), 503).frame_count(), 1);
        assert_eq!(Fragmenter::new(kind, &pattern(504), 503).frame_count(), 3);
        assert_eq!(Fragmenter::new(kind, &pattern(1006), 503).frame_count(), 3);
        assert_eq!(Fragmenter::new(kind, &pattern(1007), 503).frame_count(), 4);
    }

    #[test]
    fn test_pump_writes_one_frame_per_call() {
        let mut ring = FrameRing::local(4096);
        let payload = pattern(3000);
        let mut fragmenter = Fragmenter::new(MessageType::APP, &payload, ring.max_payload());
        let mut reassembler: Option<Reassembler> = None;
        let mut frames = 0;

        loop {
            let progress = fragmenter.pump(&mut ring);
            assert_ne!(progress, FragmentProgress::Blocked);
            frames += 1;

            // Drain like a receiver so the ring never fills up.
            while let Some((offset, header)) = ring.peek().unwrap() {
                let body = ring.payload(offset, &header).to_vec();
                match header.kind() {
                    FrameKind::MultiPartHeader => {
                        let mp = MultiPartHeader::parse(&body).unwrap();
                        reassembler = Some(Reassembler::new(
                            MessageType::new(mp.final_type).unwrap(),
                            mp.total_size as usize,
                        ));
                    }
                    FrameKind::MultiPartBody => {
                        reassembler.as_mut().unwrap().feed(&body).unwrap();
                    }
                    other => panic!("unexpected frame {:?}", other),
                }
                ring.consume(&header);
            }

            if progress == FragmentProgress::Complete {
                break;
            }
        }

        assert_eq!(frames, fragmenter.frame_count());
        let done = reassembler.unwrap();
        assert!(done.is_finished());
        assert_eq!(done.data(), &payload[..]);
    }

    #[test]
    fn test_pump_blocks_when_ring_full() {
        let mut ring = FrameRing::local(1024);
        ring.write_frame(FrameKind::Application(100), &pattern(500));
        let mut fragmenter = Fragmenter::new(MessageType::APP, &pattern(2000), ring.max_payload());
        assert_eq!(fragmenter.pump(&mut ring), FragmentProgress::Advanced);
        assert_eq!(fragmenter.pump(&mut ring), FragmentProgress::Blocked);
    }

    #[test]
    fn test_reassembler_rejects_overflow() {
        let mut reassembler = Reassembler::new(MessageType::APP, 10);
        assert_eq!(reassembler.feed(&[0u8; 6]), Ok(false));
        assert_eq!(
            reassembler.feed(&[0u8; 6]),
            Err(ProtocolViolation::FragmentOverflow {
                declared: 10,
                received: 12
            })
        );
        assert_eq!(reassembler.feed(&[0u8; 4]), Ok(true));
    }

    #[test]
    fn test_empty_declared_message_is_finished() {
        let reassembler = Reassembler::new(MessageType::APP, 0);
        assert!(reassembler.is_finished());
        assert!(reassembler.data().is_empty());
    }
}
