// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ringlink Core Library
//!
//! Message channel between two processes over POSIX shared memory.
//! Provides the framed ring buffer, fragmentation of oversized messages,
//! role negotiation, configuration parsing and the channel state machine.

pub mod channel;
pub mod config;
pub mod error;
pub mod shm;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use channel::{ChannelReceiver, ChannelSender, IpcChannel};
pub use config::{ChannelConfig, ConfigLoader};
pub use error::{
    HandshakeError, HardValidationError, IpcError, IpcResult, ProtocolViolation, RingError,
    SharedMemoryError,
};
pub use shm::{HeaderSnapshot, Message, RingBuffer, RingOptions, SendStatus};
pub use state::{ChannelState, ChannelStateMachine};
pub use types::{ChannelName, MessageType, RingCapacity, Role, RoleRequest};
