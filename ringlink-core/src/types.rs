// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Smallest ring a direction may use: 1 KiB.
const MIN_RING_CAPACITY: u32 = 1024;
/// Largest ring a direction may use: 256 MiB.
const MAX_RING_CAPACITY: u32 = 256 * 1024 * 1024;
/// Longest channel name accepted (POSIX leaves room for the leading slash).
const MAX_CHANNEL_NAME_LEN: usize = 200;

/// Validated channel name, used as the shared memory object name.
/// Must be non-empty, max 200 chars, alphanumeric with `.`, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    /// Create a new ChannelName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Channel name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_CHANNEL_NAME_LEN {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name.clone(),
                reason: format!(
                    "Channel name too long: {} chars (max {})",
                    name.len(),
                    MAX_CHANNEL_NAME_LEN
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Channel name must contain only ASCII alphanumerics, '.', '-' and '_'"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ChannelName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelName> for String {
    fn from(name: ChannelName) -> Self {
        name.0
    }
}

/// Validated capacity of one ring direction in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct RingCapacity(u32);

impl RingCapacity {
    pub const MIN: u32 = MIN_RING_CAPACITY;
    pub const MAX: u32 = MAX_RING_CAPACITY;

    /// 256 KiB per direction.
    pub const DEFAULT: RingCapacity = RingCapacity(256 * 1024);

    /// Create a new RingCapacity with validation.
    pub fn new(bytes: u64) -> Result<Self, HardValidationError> {
        if bytes < u64::from(MIN_RING_CAPACITY) || bytes > u64::from(MAX_RING_CAPACITY) {
            return Err(HardValidationError::CapacityOutOfBounds {
                capacity: bytes,
                min: MIN_RING_CAPACITY,
                max: MAX_RING_CAPACITY,
            });
        }
        Ok(Self(bytes as u32))
    }

    /// Get the capacity in bytes.
    pub fn bytes(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RingCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % (1024 * 1024) == 0 {
            write!(f, "{}MiB", self.0 / (1024 * 1024))
        } else if self.0 % 1024 == 0 {
            write!(f, "{}KiB", self.0 / 1024)
        } else {
            write!(f, "{}B", self.0)
        }
    }
}

impl TryFrom<u64> for RingCapacity {
    type Error = HardValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RingCapacity> for u64 {
    fn from(capacity: RingCapacity) -> Self {
        u64::from(capacity.0)
    }
}

/// Application message type carried in a frame header.
///
/// Values below [`MessageType::MIN_APPLICATION`] belong to the transport
/// (padding and multi-part framing) and can never be sent by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MessageType(u32);

impl MessageType {
    /// First value available to applications.
    pub const MIN_APPLICATION: u32 = 100;
    /// Largest value that fits beside the pad flag.
    pub const MAX: u32 = 0x7FFF_FFFF;

    /// The lowest application type, handy as a default.
    pub const APP: MessageType = MessageType(Self::MIN_APPLICATION);

    /// Create a new MessageType with validation.
    pub fn new(value: u32) -> Result<Self, HardValidationError> {
        if value < Self::MIN_APPLICATION {
            return Err(HardValidationError::ReservedMessageType {
                value,
                min: Self::MIN_APPLICATION,
            });
        }
        if value > Self::MAX {
            return Err(HardValidationError::InvalidFieldValue {
                field: "message_type",
                value: value.to_string(),
                reason: "Bit 31 is reserved for the pad flag".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Wrap a value already known to be an application type.
    pub(crate) fn from_wire(value: u32) -> Self {
        debug_assert!((Self::MIN_APPLICATION..=Self::MAX).contains(&value));
        Self(value)
    }

    /// Get the raw wire value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for MessageType {
    type Error = HardValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageType> for u32 {
    fn from(kind: MessageType) -> Self {
        kind.0
    }
}

/// Role held by one side of a bound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// The role on the other end of the channel.
    pub const fn peer(&self) -> Role {
        match self {
            Self::Server => Self::Client,
            Self::Client => Self::Server,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Role asked for when opening a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleRequest {
    /// Become the client; fails if a client is already attached.
    Client,
    /// Become the client, but only if a server is already attached.
    ClientRequireServer,
    /// Become the server; fails if a server is already attached.
    Server,
    /// Take whichever role is free, preferring server.
    ClientOrServer,
}

impl fmt::Display for RoleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Client => "client",
            Self::ClientRequireServer => "client_require_server",
            Self::Server => "server",
            Self::ClientOrServer => "client_or_server",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_validation() {
        assert!(ChannelName::new("render-link.v2").is_ok());
        assert!(ChannelName::new("with_underscore").is_ok());
        assert!(ChannelName::new("").is_err());
        assert!(ChannelName::new("has/slash").is_err());
        assert!(ChannelName::new("has space").is_err());
        assert!(ChannelName::new("a".repeat(201)).is_err());
    }

    #[test]
    fn test_ring_capacity_bounds() {
        assert!(RingCapacity::new(1024).is_ok());
        assert!(RingCapacity::new(1023).is_err());
        assert!(RingCapacity::new(u64::from(RingCapacity::MAX) + 1).is_err());
        assert_eq!(RingCapacity::new(256 * 1024).unwrap().to_string(), "256KiB");
        assert_eq!(RingCapacity::new(2 * 1024 * 1024).unwrap().to_string(), "2MiB");
    }

    #[test]
    fn test_message_type_reserved_range() {
        assert!(MessageType::new(0).is_err());
        assert!(MessageType::new(99).is_err());
        assert!(MessageType::new(0x8000_0000).is_err());
        let kind = MessageType::new(105).unwrap();
        assert_eq!(kind.value(), 105);
    }

    #[test]
    fn test_role_peer() {
        assert_eq!(Role::Server.peer(), Role::Client);
        assert_eq!(Role::Client.peer(), Role::Server);
    }
}
