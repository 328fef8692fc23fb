// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Lock-free framed ring buffer for IPC.
//!
//! One `RingBuffer` drives one direction of a channel under a single-writer,
//! single-reader discipline. Messages that fit go straight into the ring;
//! oversized ones are queued and trickled out as multi-part frames by
//! [`RingBuffer::pump_pending_sends`], then reassembled on the other side.

use std::collections::VecDeque;
use std::ptr::NonNull;

use crate::error::{ProtocolViolation, RingError};
use crate::shm::fragment::{FragmentProgress, Fragmenter, Reassembler};
use crate::shm::frame::{FrameHeader, FrameKind, FRAME_HEADER_SIZE};
use crate::shm::frame_ring::FrameRing;
use crate::shm::header::RingMeta;
use crate::shm::validator::FrameValidator;
use crate::types::{MessageType, RingCapacity};

/// Default cap on bytes waiting in the send queue (512 KiB).
pub const DEFAULT_MAX_BUFFERED_SEND: usize = 512 * 1024;

/// Send-side behaviour of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingOptions {
    /// Allow messages larger than half the ring, sent as multi-part frames.
    pub long_messages: bool,
    /// Queue sends that do not fit right now instead of failing them.
    pub buffer_sends: bool,
    /// Upper bound on queued bytes, and on the size of any multi-part message
    /// this side sends. Receivers accept whatever size a header declares.
    pub max_buffered_send_bytes: usize,
}

impl Default for RingOptions {
    fn default() -> Self {
        Self {
            long_messages: true,
            buffer_sends: false,
            max_buffered_send_bytes: DEFAULT_MAX_BUFFERED_SEND,
        }
    }
}

/// How a successful send was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Written to the ring before returning.
    Sent,
    /// Queued; call [`RingBuffer::pump_pending_sends`] until it drains.
    Queued,
}

/// A received message. Single-frame payloads borrow the ring directly and
/// stay valid until the message is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub kind: MessageType,
    pub payload: &'a [u8],
}

/// What the last receive handed out.
#[derive(Debug, Clone, Copy)]
enum Delivery {
    Frame { offset: u32, header: FrameHeader },
    Reassembled,
}

/// Framed ring buffer over one direction.
pub struct RingBuffer {
    frames: FrameRing,
    options: RingOptions,
    outbound: VecDeque<Fragmenter>,
    pending_send_bytes: usize,
    inbound: Option<Reassembler>,
    unacknowledged: Option<Delivery>,
}

impl RingBuffer {
    /// Create a heap-backed loopback ring with local cursors.
    ///
    /// Sends and receives on the same instance; useful inside one process and
    /// for exercising the framing without shared memory.
    pub fn local(capacity: RingCapacity, options: RingOptions) -> Self {
        Self::with_frames(FrameRing::local(capacity.bytes()), options)
    }

    /// Create a ring over externally owned memory, with cursors kept in a
    /// shared [`RingMeta`] and published with release/acquire ordering.
    ///
    /// # Safety
    /// `base` must be valid for reads and writes of `capacity` bytes and
    /// `meta` must point to a valid `RingMeta`, both for the whole lifetime of
    /// the returned ring. At most one ring may write and one may read them.
    pub unsafe fn from_raw_parts(
        base: NonNull<u8>,
        meta: NonNull<RingMeta>,
        capacity: RingCapacity,
        options: RingOptions,
    ) -> Self {
        Self::with_frames(FrameRing::shared(base, capacity.bytes(), meta), options)
    }

    fn with_frames(frames: FrameRing, options: RingOptions) -> Self {
        Self {
            frames,
            options,
            outbound: VecDeque::new(),
            pending_send_bytes: 0,
            inbound: None,
            unacknowledged: None,
        }
    }

    /// Ring size in bytes.
    pub fn capacity(&self) -> u32 {
        self.frames.capacity()
    }

    /// Largest payload that fits in a single frame.
    pub fn max_frame_payload(&self) -> usize {
        self.frames.max_payload()
    }

    pub fn write_offset(&self) -> u32 {
        self.frames.write_offset()
    }

    pub fn read_offset(&self) -> u32 {
        self.frames.read_offset()
    }

    /// Whether the reader has consumed everything written.
    pub fn is_send_buffer_empty(&self) -> bool {
        self.frames.write_offset() == self.frames.read_offset()
    }

    /// Payload bytes still waiting in the send queue.
    pub fn pending_send_bytes(&self) -> usize {
        self.pending_send_bytes
    }

    pub fn has_sends_pending(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Check whether a `payload_len` byte message can be written right now.
    pub fn can_send(&self, payload_len: usize) -> Result<(), RingError> {
        if !self.outbound.is_empty() {
            return Err(RingError::SendPending);
        }
        self.frames.can_send(payload_len)
    }

    /// Send one message.
    ///
    /// Writes synchronously when the frame fits and nothing is queued ahead
    /// of it. Oversized messages are queued for fragmentation when long
    /// messages are enabled. Anything else is queued only when send buffering
    /// is on and `allow_buffering` is set.
    pub fn send_data(
        &mut self,
        kind: MessageType,
        payload: &[u8],
        allow_buffering: bool,
    ) -> Result<SendStatus, RingError> {
        let max_frame = self.frames.max_payload();
        let oversized = payload.len() > max_frame;

        if oversized && !self.options.long_messages {
            return Err(RingError::TooLargeForRing {
                size: payload.len(),
                max: max_frame,
            });
        }

        if self.outbound.is_empty() {
            match self.frames.can_send(payload.len()) {
                Ok(()) => {
                    self.frames
                        .write_frame(FrameKind::Application(kind.value()), payload);
                    return Ok(SendStatus::Sent);
                }
                Err(RingError::TooLargeForRing { .. }) => {
                    if payload.len() > self.options.max_buffered_send_bytes {
                        return Err(RingError::SendBufferFull {
                            pending: self.pending_send_bytes,
                            requested: payload.len(),
                            max: self.options.max_buffered_send_bytes,
                        });
                    }
                    self.enqueue(kind, payload);
                    return Ok(SendStatus::Queued);
                }
                Err(err) if !(self.options.buffer_sends && allow_buffering) => return Err(err),
                Err(_) => {}
            }
        }

        if self.options.buffer_sends && allow_buffering {
            let requested = payload.len() + FRAME_HEADER_SIZE;
            if self.pending_send_bytes + requested < self.options.max_buffered_send_bytes {
                self.enqueue(kind, payload);
                return Ok(SendStatus::Queued);
            }
            return Err(RingError::SendBufferFull {
                pending: self.pending_send_bytes,
                requested,
                max: self.options.max_buffered_send_bytes,
            });
        }

        Err(RingError::SendPending)
    }

    fn enqueue(&mut self, kind: MessageType, payload: &[u8]) {
        let fragmenter = Fragmenter::new(kind, payload, self.frames.max_payload());
        tracing::debug!(
            message_type = kind.value(),
            size = payload.len(),
            frames = fragmenter.frame_count(),
            queued = self.outbound.len(),
            "Queued send"
        );
        self.pending_send_bytes += payload.len();
        self.outbound.push_back(fragmenter);
    }

    /// Write at most one queued frame. Returns whether sends remain queued.
    pub fn pump_pending_sends(&mut self) -> bool {
        if let Some(front) = self.outbound.front_mut() {
            if front.pump(&mut self.frames) == FragmentProgress::Complete {
                if let Some(done) = self.outbound.pop_front() {
                    self.pending_send_bytes -= done.len();
                    tracing::debug!(
                        size = done.len(),
                        remaining = self.outbound.len(),
                        "Queued send completed"
                    );
                }
            }
        }
        !self.outbound.is_empty()
    }

    /// Receive the next message, if any.
    ///
    /// Pad frames are skipped and multi-part frames are folded into their
    /// message. Until [`RingBuffer::receive_acknowledge`] is called, repeated
    /// calls return the same message.
    pub fn receive_data(&mut self) -> Result<Option<Message<'_>>, RingError> {
        if let Some(delivery) = self.unacknowledged {
            return Ok(self.message_for(delivery));
        }

        if self.inbound.as_ref().is_some_and(Reassembler::is_finished) {
            self.unacknowledged = Some(Delivery::Reassembled);
            return Ok(self.message_for(Delivery::Reassembled));
        }

        let delivery = loop {
            let Some((offset, header)) = self.frames.peek()? else {
                return Ok(None);
            };

            match header.kind() {
                FrameKind::Application(_) => break Delivery::Frame { offset, header },
                FrameKind::Pad => self.frames.consume(&header),
                FrameKind::MultiPartHeader => {
                    if self.begin_reassembly(offset, &header)? {
                        break Delivery::Reassembled;
                    }
                }
                FrameKind::MultiPartBody => {
                    if self.continue_reassembly(offset, &header)? {
                        break Delivery::Reassembled;
                    }
                }
                FrameKind::Invalid | FrameKind::Reserved(_) => {
                    self.frames.consume(&header);
                    let violation = ProtocolViolation::UnknownFrameType {
                        offset,
                        value: header.message_type(),
                    };
                    tracing::warn!(error = %violation, "Skipped frame");
                    return Err(violation.into());
                }
            }
        };

        self.unacknowledged = Some(delivery);
        Ok(self.message_for(delivery))
    }

    /// Open a reassembly from a multi-part header frame. Returns whether the
    /// announced message is already complete (zero bytes).
    fn begin_reassembly(&mut self, offset: u32, header: &FrameHeader) -> Result<bool, RingError> {
        let parsed = FrameValidator::validate_multi_part(self.frames.payload(offset, header), offset);
        self.frames.consume(header);
        let parsed = parsed.inspect_err(|violation| {
            tracing::warn!(error = %violation, "Skipped multi-part header");
        })?;

        let declared = parsed.total_size as usize;

        if let Some(stale) = self.inbound.take() {
            tracing::warn!(
                discarded = stale.received(),
                declared = stale.declared(),
                "Multi-part header arrived mid-reassembly; restarting"
            );
        }

        let kind = MessageType::from_wire(parsed.final_type);
        tracing::trace!(message_type = kind.value(), size = declared, "Reassembly started");
        let reassembler = Reassembler::new(kind, declared);
        let finished = reassembler.is_finished();
        self.inbound = Some(reassembler);
        Ok(finished)
    }

    /// Feed one body frame. Returns whether the message is now complete.
    fn continue_reassembly(&mut self, offset: u32, header: &FrameHeader) -> Result<bool, RingError> {
        let Some(reassembler) = self.inbound.as_mut() else {
            self.frames.consume(header);
            let violation = ProtocolViolation::OrphanFragment { offset };
            tracing::warn!(error = %violation, "Skipped frame");
            return Err(violation.into());
        };

        let fed = reassembler.feed(self.frames.payload(offset, header));
        self.frames.consume(header);

        match fed {
            Ok(finished) => Ok(finished),
            Err(violation) => {
                tracing::warn!(error = %violation, "Dropped multi-part message");
                self.inbound = None;
                Err(violation.into())
            }
        }
    }

    fn message_for(&self, delivery: Delivery) -> Option<Message<'_>> {
        match delivery {
            Delivery::Frame { offset, header } => Some(Message {
                kind: MessageType::from_wire(header.message_type()),
                payload: self.frames.payload(offset, &header),
            }),
            Delivery::Reassembled => self.inbound.as_ref().map(|r| Message {
                kind: r.kind(),
                payload: r.data(),
            }),
        }
    }

    /// Release the message returned by the last receive.
    pub fn receive_acknowledge(&mut self) -> Result<(), RingError> {
        match self.unacknowledged.take() {
            None => Err(RingError::NothingPending),
            Some(Delivery::Frame { header, .. }) => {
                self.frames.consume(&header);
                Ok(())
            }
            Some(Delivery::Reassembled) => {
                self.inbound = None;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(capacity: u64, options: RingOptions) -> RingBuffer {
        RingBuffer::local(RingCapacity::new(capacity).unwrap(), options)
    }

    fn no_long() -> RingOptions {
        RingOptions {
            long_messages: false,
            ..RingOptions::default()
        }
    }

    fn kind(value: u32) -> MessageType {
        MessageType::new(value).unwrap()
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn recv(ring: &mut RingBuffer) -> Option<(u32, Vec<u8>)> {
        let out = ring
            .receive_data()
            .unwrap()
            .map(|m| (m.kind.value(), m.payload.to_vec()));
        if out.is_some() {
            ring.receive_acknowledge().unwrap();
        }
        out
    }

    #[test]
    fn test_round_trip_in_order() {
        let mut ring = ring(4096, RingOptions::default());
        let sent: Vec<(u32, Vec<u8>)> = (0..10)
            .map(|i| (100 + i as u32, pattern(10 + i * 37, i as u8)))
            .collect();

        for (t, payload) in &sent {
            assert_eq!(ring.send_data(kind(*t), payload, false), Ok(SendStatus::Sent));
        }

        let mut received = Vec::new();
        while let Some(msg) = recv(&mut ring) {
            received.push(msg);
        }
        assert_eq!(received, sent);
        assert!(ring.is_send_buffer_empty());
    }

    #[test]
    fn test_scenario_two_500_byte_messages_in_1024_ring() {
        let mut ring = ring(1024, no_long());
        let a = pattern(500, 1);
        let b = pattern(500, 2);

        assert_eq!(ring.send_data(kind(100), &a, false), Ok(SendStatus::Sent));
        assert_eq!(ring.write_offset(), 508);

        // Only 8 bytes would remain at the tail while the reader sits at 0.
        assert_eq!(ring.can_send(500), Err(RingError::NoSpaceNow { size: 500 }));
        assert_eq!(
            ring.send_data(kind(101), &b, false),
            Err(RingError::NoSpaceNow { size: 500 })
        );

        assert_eq!(recv(&mut ring), Some((100, a)));
        assert_eq!(ring.read_offset(), 508);

        assert_eq!(ring.send_data(kind(101), &b, false), Ok(SendStatus::Sent));
        let frame = ring.frames.header_at(508);
        assert_eq!(frame.total_length(), 508);
        assert_eq!(frame.message_type(), 101);
        assert!(frame.is_padded());
        assert_eq!(ring.write_offset(), 0);

        assert_eq!(recv(&mut ring), Some((101, b)));
        assert_eq!(ring.read_offset(), 0);
        assert!(ring.is_send_buffer_empty());
    }

    #[test]
    fn test_wraparound_many_times() {
        let mut ring = ring(1024, RingOptions::default());
        let mut wrote = 0usize;
        let mut wraps = 0;
        let mut last_write = 0;

        for i in 0..200usize {
            let payload = pattern(20 + (i * 53) % 300, i as u8);
            ring.send_data(kind(100 + (i % 7) as u32), &payload, false)
                .unwrap();
            if ring.write_offset() < last_write {
                wraps += 1;
            }
            last_write = ring.write_offset();
            wrote += payload.len() + FRAME_HEADER_SIZE;

            let (t, got) = recv(&mut ring).unwrap();
            assert_eq!(t, 100 + (i % 7) as u32);
            assert_eq!(got, payload);
        }

        assert!(wrote > 2 * 1024);
        assert!(wraps >= 2);
    }

    #[test]
    fn test_fragmented_round_trip() {
        let mut ring = ring(1024, RingOptions::default());
        let payload = pattern(5000, 9);
        let max = ring.max_frame_payload();

        assert_eq!(ring.send_data(kind(120), &payload, false), Ok(SendStatus::Queued));
        assert_eq!(ring.pending_send_bytes(), 5000);

        let mut pumps = 0;
        let mut received = None;
        while received.is_none() {
            ring.pump_pending_sends();
            pumps += 1;
            received = recv(&mut ring);
            assert!(pumps < 100);
        }

        assert_eq!(received, Some((120, payload)));
        assert_eq!(pumps, 5000usize.div_ceil(max) + 1);
        assert!(!ring.has_sends_pending());
        assert_eq!(ring.pending_send_bytes(), 0);
    }

    #[test]
    fn test_oversized_without_long_messages_fails() {
        let mut ring = ring(1024, no_long());
        assert_eq!(
            ring.send_data(kind(100), &pattern(600, 0), false),
            Err(RingError::TooLargeForRing { size: 600, max: 503 })
        );
    }

    #[test]
    fn test_oversized_beyond_buffer_limit_fails() {
        let options = RingOptions {
            max_buffered_send_bytes: 2000,
            ..RingOptions::default()
        };
        let mut ring = ring(1024, options);
        assert!(matches!(
            ring.send_data(kind(100), &pattern(2001, 0), false),
            Err(RingError::SendBufferFull { requested: 2001, .. })
        ));
    }

    #[test]
    fn test_sends_wait_behind_fragmented_message() {
        let mut ring = ring(1024, RingOptions::default());
        ring.send_data(kind(100), &pattern(900, 0), false).unwrap();
        assert_eq!(ring.can_send(10), Err(RingError::SendPending));
        assert_eq!(
            ring.send_data(kind(101), &pattern(10, 0), false),
            Err(RingError::SendPending)
        );
    }

    #[test]
    fn test_buffered_sends_keep_order() {
        let options = RingOptions {
            buffer_sends: true,
            ..RingOptions::default()
        };
        let mut ring = ring(1024, options);
        let big = pattern(1500, 3);
        let small = pattern(40, 4);

        assert_eq!(ring.send_data(kind(100), &big, true), Ok(SendStatus::Queued));
        assert_eq!(ring.send_data(kind(101), &small, true), Ok(SendStatus::Queued));
        assert_eq!(ring.pending_send_bytes(), 1540);

        let mut received = Vec::new();
        for _ in 0..50 {
            ring.pump_pending_sends();
            while let Some(msg) = recv(&mut ring) {
                received.push(msg);
            }
        }
        assert_eq!(received, vec![(100, big), (101, small)]);
        assert_eq!(ring.pending_send_bytes(), 0);
    }

    #[test]
    fn test_buffer_limit_applies_to_queued_bytes() {
        let options = RingOptions {
            buffer_sends: true,
            max_buffered_send_bytes: 1000,
            ..RingOptions::default()
        };
        let mut ring = ring(1024, options);
        ring.send_data(kind(100), &pattern(900, 0), true).unwrap();
        assert!(matches!(
            ring.send_data(kind(101), &pattern(200, 0), true),
            Err(RingError::SendBufferFull { pending: 900, .. })
        ));
        // Without buffering the caller is told to wait for the queue.
        assert_eq!(
            ring.send_data(kind(101), &pattern(20, 0), false),
            Err(RingError::SendPending)
        );
    }

    #[test]
    fn test_can_send_is_truthful() {
        let mut ring = ring(2048, no_long());
        for i in 0..400usize {
            let len = (i * 97) % 1100;
            let checked = ring.can_send(len);
            let sent = ring.send_data(kind(100), &pattern(len, 0), false);
            if checked.is_ok() {
                assert_eq!(sent, Ok(SendStatus::Sent), "len {}", len);
            }
            if i % 3 == 0 {
                while recv(&mut ring).is_some() {}
            }
        }
    }

    #[test]
    fn test_acknowledge_twice_reports_nothing_pending() {
        let mut ring = ring(1024, RingOptions::default());
        ring.send_data(kind(100), b"first", false).unwrap();
        ring.send_data(kind(100), b"second", false).unwrap();

        assert_eq!(ring.receive_data().unwrap().unwrap().payload, b"first");
        ring.receive_acknowledge().unwrap();
        let read = ring.read_offset();
        assert_eq!(ring.receive_acknowledge(), Err(RingError::NothingPending));
        assert_eq!(ring.read_offset(), read);

        assert_eq!(ring.receive_data().unwrap().unwrap().payload, b"second");
    }

    #[test]
    fn test_receive_without_ack_returns_same_message() {
        let mut ring = ring(1024, RingOptions::default());
        ring.send_data(kind(100), b"one", false).unwrap();
        ring.send_data(kind(100), b"two", false).unwrap();

        assert_eq!(ring.receive_data().unwrap().unwrap().payload, b"one");
        assert_eq!(ring.receive_data().unwrap().unwrap().payload, b"one");
        ring.receive_acknowledge().unwrap();
        assert_eq!(ring.receive_data().unwrap().unwrap().payload, b"two");
    }

    #[test]
    fn test_orphan_body_is_reported_and_skipped() {
        let mut ring = ring(1024, RingOptions::default());
        ring.frames.write_frame(FrameKind::MultiPartBody, &[1, 2, 3]);
        ring.send_data(kind(100), b"after", false).unwrap();

        assert_eq!(
            ring.receive_data(),
            Err(RingError::Protocol(ProtocolViolation::OrphanFragment { offset: 0 }))
        );
        assert_eq!(ring.receive_data().unwrap().unwrap().payload, b"after");
    }

    #[test]
    fn test_second_header_restarts_reassembly() {
        use crate::shm::frame::MultiPartHeader;

        let mut ring = ring(1024, RingOptions::default());
        let first = MultiPartHeader {
            final_type: 100,
            total_size: 10,
        };
        let second = MultiPartHeader {
            final_type: 101,
            total_size: 4,
        };
        ring.frames
            .write_frame(FrameKind::MultiPartHeader, &first.to_bytes());
        ring.frames.write_frame(FrameKind::MultiPartBody, &[9; 5]);
        ring.frames
            .write_frame(FrameKind::MultiPartHeader, &second.to_bytes());
        ring.frames.write_frame(FrameKind::MultiPartBody, &[7; 4]);

        assert_eq!(recv(&mut ring), Some((101, vec![7; 4])));
        assert_eq!(recv(&mut ring), None);
    }

    #[test]
    fn test_reserved_frame_type_is_reported() {
        let mut ring = ring(1024, RingOptions::default());
        ring.frames.write_frame(FrameKind::Reserved(42), &[0; 4]);
        assert_eq!(
            ring.receive_data(),
            Err(RingError::Protocol(ProtocolViolation::UnknownFrameType {
                offset: 0,
                value: 42
            }))
        );
        assert!(ring.receive_data().unwrap().is_none());
    }

    #[test]
    fn test_short_multi_part_header_is_skipped() {
        let mut ring = ring(1024, RingOptions::default());
        ring.frames.write_frame(FrameKind::MultiPartHeader, &[0; 4]);
        ring.send_data(kind(100), b"after", false).unwrap();

        assert!(matches!(
            ring.receive_data(),
            Err(RingError::Protocol(
                ProtocolViolation::MalformedMultiPartHeader { offset: 0, .. }
            ))
        ));
        assert_eq!(recv(&mut ring), Some((100, b"after".to_vec())));
    }

    #[test]
    fn test_fragment_overflow_drops_reassembly() {
        use crate::shm::frame::MultiPartHeader;

        let mut ring = ring(1024, RingOptions::default());
        let header = MultiPartHeader {
            final_type: 120,
            total_size: 10,
        };
        ring.frames
            .write_frame(FrameKind::MultiPartHeader, &header.to_bytes());
        ring.frames.write_frame(FrameKind::MultiPartBody, &[5; 16]);
        ring.frames.write_frame(FrameKind::MultiPartBody, &[6; 3]);
        ring.send_data(kind(100), b"still here", false).unwrap();

        assert_eq!(
            ring.receive_data(),
            Err(RingError::Protocol(ProtocolViolation::FragmentOverflow {
                declared: 10,
                received: 16
            }))
        );
        // The overflowing frame took the reassembly with it.
        assert_eq!(
            ring.receive_data(),
            Err(RingError::Protocol(ProtocolViolation::OrphanFragment { offset: 40 }))
        );
        assert_eq!(recv(&mut ring), Some((100, b"still here".to_vec())));
        assert_eq!(recv(&mut ring), None);
    }

    #[test]
    fn test_reassembly_accepts_sizes_above_own_send_limit() {
        use crate::shm::frame::MultiPartHeader;

        // This side would never send more than 1024 bytes in one message,
        // but the peer's limit may be larger.
        let options = RingOptions {
            max_buffered_send_bytes: 1024,
            ..RingOptions::default()
        };
        let mut ring = ring(1024, options);
        let payload = pattern(1500, 3);
        let header = MultiPartHeader {
            final_type: 130,
            total_size: 1500,
        };

        ring.frames
            .write_frame(FrameKind::MultiPartHeader, &header.to_bytes());
        assert_eq!(recv(&mut ring), None);

        let mut delivered = None;
        for chunk in payload.chunks(500) {
            assert!(delivered.is_none());
            ring.frames.write_frame(FrameKind::MultiPartBody, chunk);
            delivered = recv(&mut ring);
        }
        assert_eq!(delivered, Some((130, payload)));
    }
}
