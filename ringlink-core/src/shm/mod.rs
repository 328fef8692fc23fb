// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory IPC module.
//!
//! Zero-copy inter-process communication using POSIX shared memory.
//! Provides the framed ring buffer that carries one direction of a channel,
//! plus the fixed header both ends negotiate over.

mod fragment;
mod frame;
mod frame_ring;
mod header;
mod region;
mod ring_buffer;
mod validator;

pub use frame::{FrameHeader, FRAME_HEADER_SIZE, MIN_PAD, MULTI_PART_HEADER_SIZE};
pub use header::{HeaderSnapshot, RingMeta, RingSnapshot, SharedHeader};
pub use region::SharedMemoryRegion;
pub use ring_buffer::{Message, RingBuffer, RingOptions, SendStatus, DEFAULT_MAX_BUFFERED_SEND};
pub use validator::FrameValidator;
