// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Raw frame storage for one ring direction.
//!
//! Knows where frames go and how the cursors move, nothing about
//! fragmentation. Cursors either live in a [`RingMeta`] inside shared memory
//! (atomic, release/acquire) or in plain local fields for loopback use.

use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use crate::error::{ProtocolViolation, RingError};
use crate::shm::frame::{FrameHeader, FrameKind, FRAME_HEADER_SIZE, MIN_PAD};
use crate::shm::header::RingMeta;
use crate::shm::validator::FrameValidator;

/// Where the write/read offsets are kept.
enum Cursors {
    Local { write: u32, read: u32 },
    Shared(NonNull<RingMeta>),
}

impl Cursors {
    fn meta(meta: &NonNull<RingMeta>) -> &RingMeta {
        // SAFETY: the constructor of a shared FrameRing guarantees the
        // metadata outlives the ring.
        unsafe { meta.as_ref() }
    }

    fn write(&self) -> u32 {
        match self {
            Self::Local { write, .. } => *write,
            Self::Shared(meta) => Self::meta(meta).write_offset.load(Ordering::Acquire),
        }
    }

    fn read(&self) -> u32 {
        match self {
            Self::Local { read, .. } => *read,
            Self::Shared(meta) => Self::meta(meta).read_offset.load(Ordering::Acquire),
        }
    }

    fn set_write(&mut self, offset: u32) {
        match self {
            Self::Local { write, .. } => *write = offset,
            Self::Shared(meta) => Self::meta(meta)
                .write_offset
                .store(offset, Ordering::Release),
        }
    }

    fn set_read(&mut self, offset: u32) {
        match self {
            Self::Local { read, .. } => *read = offset,
            Self::Shared(meta) => Self::meta(meta)
                .read_offset
                .store(offset, Ordering::Release),
        }
    }
}

/// Fixed-capacity circular byte region holding framed messages.
pub(crate) struct FrameRing {
    base: NonNull<u8>,
    capacity: u32,
    cursors: Cursors,
    /// Backing bytes in local mode; `base` points into it.
    _storage: Option<Vec<u8>>,
}

// SAFETY: a FrameRing is the only handle to its side of the direction (writer
// or reader); the peer only ever touches the other cursor. It is not Sync.
unsafe impl Send for FrameRing {}

impl FrameRing {
    /// Heap-backed ring with local cursors.
    pub(crate) fn local(capacity: u32) -> Self {
        let mut storage = vec![0u8; capacity as usize];
        let base = NonNull::new(storage.as_mut_ptr()).unwrap_or(NonNull::dangling());
        Self {
            base,
            capacity,
            cursors: Cursors::Local { write: 0, read: 0 },
            _storage: Some(storage),
        }
    }

    /// Ring over externally owned bytes with cursors in shared metadata.
    ///
    /// # Safety
    /// `base` must be valid for reads and writes of `capacity` bytes and
    /// `meta` must be valid, both for the whole lifetime of the ring.
    pub(crate) unsafe fn shared(base: NonNull<u8>, capacity: u32, meta: NonNull<RingMeta>) -> Self {
        Self {
            base,
            capacity,
            cursors: Cursors::Shared(meta),
            _storage: None,
        }
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn write_offset(&self) -> u32 {
        self.cursors.write()
    }

    pub(crate) fn read_offset(&self) -> u32 {
        self.cursors.read()
    }

    /// Largest payload a single frame may carry: half the ring minus a header
    /// and one byte, so both ends always have room for in-flight traffic.
    pub(crate) fn max_payload(&self) -> usize {
        (self.capacity as usize / 2).saturating_sub(FRAME_HEADER_SIZE + 1)
    }

    /// Check whether a frame with `payload_len` bytes fits right now.
    pub(crate) fn can_send(&self, payload_len: usize) -> Result<(), RingError> {
        let max = self.max_payload();
        if payload_len > max {
            return Err(RingError::TooLargeForRing {
                size: payload_len,
                max,
            });
        }

        let frame_len = payload_len + FRAME_HEADER_SIZE;
        let capacity = self.capacity as usize;
        let write = self.write_offset() as usize;
        let read = self.read_offset() as usize;

        let avail = if write >= read {
            (capacity - write).max(read)
        } else {
            read - write
        };
        if frame_len >= avail {
            return Err(RingError::NoSpaceNow { size: payload_len });
        }

        // A frame ending within MIN_PAD of the end wraps the writer to 0,
        // which would look like an empty ring while the reader sits at 0.
        if write + frame_len <= capacity && capacity - (write + frame_len) <= MIN_PAD && read == 0
        {
            return Err(RingError::NoSpaceNow { size: payload_len });
        }

        Ok(())
    }

    /// Write one frame. The caller must have checked [`FrameRing::can_send`].
    pub(crate) fn write_frame(&mut self, kind: FrameKind, payload: &[u8]) {
        debug_assert!(self.can_send(payload.len()).is_ok());

        let capacity = self.capacity as usize;
        let frame_len = FRAME_HEADER_SIZE + payload.len();
        let mut write = self.write_offset() as usize;

        if write + frame_len > capacity {
            let pad = FrameHeader::new((capacity - write) as u32, FrameKind::Pad, true);
            self.put(write, &pad.to_bytes());
            tracing::trace!(offset = write, length = capacity - write, "Wrote pad frame");
            write = 0;
        }

        let padded = capacity - (write + frame_len) <= MIN_PAD;
        let header = FrameHeader::new(frame_len as u32, kind, padded);
        self.put(write, &header.to_bytes());
        self.put(write + FRAME_HEADER_SIZE, payload);

        let next = if padded { 0 } else { write + frame_len };
        tracing::trace!(
            offset = write,
            length = frame_len,
            frame_type = kind.raw(),
            padded,
            "Wrote frame"
        );

        // Publishes the bytes above to the reader.
        self.cursors.set_write(next as u32);
    }

    /// Header of the frame at the read offset, or `None` if the ring is empty.
    pub(crate) fn peek(&self) -> Result<Option<(u32, FrameHeader)>, ProtocolViolation> {
        let read = self.read_offset();
        if read == self.write_offset() {
            return Ok(None);
        }

        if read as usize + FRAME_HEADER_SIZE > self.capacity as usize {
            return Err(ProtocolViolation::CorruptFrame {
                offset: read,
                length: 0,
                capacity: self.capacity,
            });
        }

        let header = self.header_at(read);
        FrameValidator::validate_header(&header, read, self.capacity)?;
        Ok(Some((read, header)))
    }

    /// Decode the header stored at `offset`.
    pub(crate) fn header_at(&self, offset: u32) -> FrameHeader {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        debug_assert!(offset as usize + FRAME_HEADER_SIZE <= self.capacity as usize);
        // SAFETY: offset + header size is within the ring.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.base.as_ptr().add(offset as usize),
                bytes.as_mut_ptr(),
                FRAME_HEADER_SIZE,
            );
        }
        FrameHeader::from_bytes(bytes)
    }

    /// Payload bytes of a validated frame, borrowed straight from the ring.
    pub(crate) fn payload(&self, offset: u32, header: &FrameHeader) -> &[u8] {
        let start = offset as usize + FRAME_HEADER_SIZE;
        let len = header.payload_len();
        debug_assert!(start + len <= self.capacity as usize);
        // SAFETY: the header was validated against the ring bounds, and the
        // writer never touches bytes between the read and write offsets.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(start), len) }
    }

    /// Move the read offset past the frame at the read offset.
    pub(crate) fn consume(&mut self, header: &FrameHeader) {
        let read = self.read_offset() as usize;
        let next = read + header.total_length() as usize;
        let next = if header.is_padded() || next >= self.capacity as usize {
            0
        } else {
            next
        };
        self.cursors.set_read(next as u32);
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= self.capacity as usize);
        // SAFETY: can_send guarantees the frame lies inside the ring and in
        // the region the reader has already released.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.base.as_ptr().add(offset),
                bytes.len(),
            );
        }
    }
}
