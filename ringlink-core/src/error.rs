// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for ringlink.
//!
//! Every failure is an explicit enum variant. No `Box<dyn Error>`, no
//! `anyhow::Result` - callers match on what went wrong and decide whether to
//! retry, reconnect or give up.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Role;

/// Top-level error type for a ringlink channel.
#[derive(Debug, Error)]
pub enum IpcError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Channel Lifecycle Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("No connection - channel is {state}")]
    NoConnection { state: &'static str },

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Ring buffer error: {0}")]
    Ring(#[from] RingError),

    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl IpcError {
    /// Whether the same call may succeed later without any change by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Ring(err) if err.is_transient())
    }
}

/// Validation errors raised while building configuration or newtypes.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Ring capacity out of bounds: {capacity} bytes (min: {min}, max: {max})")]
    CapacityOutOfBounds { capacity: u64, min: u32, max: u32 },

    #[error("Message type {value} is reserved (application types start at {min})")]
    ReservedMessageType { value: u32, min: u32 },
}

/// Channel state transition errors.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition channel {channel} from {from} to {to}")]
    InvalidTransition {
        channel: String,
        from: &'static str,
        to: &'static str,
    },
}

/// Role negotiation failures. Fatal to the channel instance that hit them.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("The {role} role is already claimed on channel {channel}")]
    RoleTaken { channel: String, role: Role },

    #[error("Both roles are already claimed on channel {channel}")]
    BothRolesTaken { channel: String },

    #[error("No server is attached to channel {channel}")]
    PeerAbsent { channel: String },

    #[error(
        "Ring size mismatch on channel {channel}: peer uses {peer_server}/{peer_client} bytes, \
         configured {local_server}/{local_client} bytes"
    )]
    SizeMismatch {
        channel: String,
        peer_server: u32,
        peer_client: u32,
        local_server: u32,
        local_client: u32,
    },
}

/// Shared memory errors - critical failures with no fallback.
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    #[error("Failed to create shared memory region: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Shared memory region already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Shared memory region {name} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Errors reported by a single ring buffer direction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    // =========================================================================
    // Capacity - caller-retryable
    // =========================================================================
    #[error("Payload of {size} bytes exceeds the single-frame limit of {max} bytes")]
    TooLargeForRing { size: usize, max: usize },

    #[error("Not enough contiguous ring space for a {size} byte payload")]
    NoSpaceNow { size: usize },

    #[error("A fragmented send is still in flight")]
    SendPending,

    #[error("Pending send buffer full: {pending} bytes queued, {requested} requested, limit {max}")]
    SendBufferFull {
        pending: usize,
        requested: usize,
        max: usize,
    },

    // =========================================================================
    // Discipline - caller bugs
    // =========================================================================
    #[error("No received message is pending acknowledgement")]
    NothingPending,

    // =========================================================================
    // Protocol - the peer broke the framing rules
    // =========================================================================
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
}

impl RingError {
    /// Whether the same call may succeed later without any change by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NoSpaceNow { .. } | Self::SendPending | Self::SendBufferFull { .. }
        )
    }
}

/// Framing rules broken by whoever wrote the ring.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("Corrupt frame at offset {offset}: length {length} in a {capacity} byte ring")]
    CorruptFrame {
        offset: u32,
        length: u32,
        capacity: u32,
    },

    #[error("Unknown frame type {value} at offset {offset}")]
    UnknownFrameType { offset: u32, value: u32 },

    #[error("Multi-part body frame at offset {offset} with no message being reassembled")]
    OrphanFragment { offset: u32 },

    #[error("Multi-part body overflows the declared size: {received} of {declared} bytes")]
    FragmentOverflow { declared: usize, received: usize },

    #[error("Malformed multi-part header at offset {offset}: {reason}")]
    MalformedMultiPartHeader { offset: u32, reason: String },
}

/// Result type alias using IpcError.
pub type IpcResult<T> = Result<T, IpcError>;
