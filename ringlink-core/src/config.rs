// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Both ends of a channel must agree on ring capacities, so the usual setup
//! is one YAML file read by both processes. Any invalid field results in a
//! HardValidationError before a single byte of shared memory is mapped.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HardValidationError, IpcError, IpcResult};
use crate::shm::{RingOptions, SharedHeader, DEFAULT_MAX_BUFFERED_SEND};
use crate::types::{ChannelName, RingCapacity};

/// Raw channel configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChannelConfig {
    name: String,
    #[serde(default = "default_capacity")]
    server_capacity: u64,
    #[serde(default = "default_capacity")]
    client_capacity: u64,
    #[serde(default = "default_long_messages")]
    long_messages: bool,
    #[serde(default)]
    buffer_sends: bool,
    #[serde(default = "default_max_buffered_send_bytes")]
    max_buffered_send_bytes: u64,
}

fn default_capacity() -> u64 {
    u64::from(RingCapacity::DEFAULT.bytes())
}

fn default_long_messages() -> bool {
    true
}

fn default_max_buffered_send_bytes() -> u64 {
    DEFAULT_MAX_BUFFERED_SEND as u64
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    channel: RawChannelConfig,
}

/// Validated channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelConfig {
    pub name: ChannelName,
    /// Bytes in the server → client ring.
    pub server_capacity: RingCapacity,
    /// Bytes in the client → server ring.
    pub client_capacity: RingCapacity,
    pub long_messages: bool,
    pub buffer_sends: bool,
    pub max_buffered_send_bytes: usize,
}

impl ChannelConfig {
    /// Configuration with default sizes for the given channel.
    pub fn new(name: ChannelName) -> Self {
        Self {
            name,
            server_capacity: RingCapacity::DEFAULT,
            client_capacity: RingCapacity::DEFAULT,
            long_messages: default_long_messages(),
            buffer_sends: false,
            max_buffered_send_bytes: DEFAULT_MAX_BUFFERED_SEND,
        }
    }

    pub fn with_capacities(mut self, server: RingCapacity, client: RingCapacity) -> Self {
        self.server_capacity = server;
        self.client_capacity = client;
        self
    }

    pub fn with_long_messages(mut self, enabled: bool) -> Self {
        self.long_messages = enabled;
        self
    }

    /// Set send buffering and the queue limit.
    ///
    /// The limit is checked against the current capacities, so set those
    /// first.
    pub fn with_buffered_sends(
        mut self,
        enabled: bool,
        max_bytes: usize,
    ) -> Result<Self, HardValidationError> {
        check_buffer_limit(self.server_capacity, self.client_capacity, max_bytes as u64)?;
        self.buffer_sends = enabled;
        self.max_buffered_send_bytes = max_bytes;
        Ok(self)
    }

    /// Send/receive options applied to both rings.
    pub fn ring_options(&self) -> RingOptions {
        RingOptions {
            long_messages: self.long_messages,
            buffer_sends: self.buffer_sends,
            max_buffered_send_bytes: self.max_buffered_send_bytes,
        }
    }

    /// Total bytes of the shared mapping: header plus both rings.
    pub fn region_size(&self) -> usize {
        SharedHeader::SIZE
            + self.server_capacity.bytes() as usize
            + self.client_capacity.bytes() as usize
    }
}

/// The send queue must hold at least one full frame and its size must fit
/// the `u32` of a multi-part header.
fn check_buffer_limit(
    server_capacity: RingCapacity,
    client_capacity: RingCapacity,
    max_bytes: u64,
) -> Result<(), HardValidationError> {
    let smallest_frame = server_capacity.bytes().min(client_capacity.bytes()) / 2;
    if max_bytes < u64::from(smallest_frame) || max_bytes > u64::from(u32::MAX) {
        return Err(HardValidationError::InvalidFieldValue {
            field: "max_buffered_send_bytes",
            value: max_bytes.to_string(),
            reason: format!("Must be between {} and {} bytes", smallest_frame, u32::MAX),
        });
    }
    Ok(())
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> IpcResult<ChannelConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(IpcError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| IpcError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> IpcResult<ChannelConfig> {
        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| IpcError::ConfigParse {
            message: format!("YAML parse error: {}", e),
        })?;

        Ok(Self::validate(raw.channel)?)
    }

    fn validate(raw: RawChannelConfig) -> Result<ChannelConfig, HardValidationError> {
        let name = ChannelName::new(raw.name)?;
        let server_capacity = RingCapacity::new(raw.server_capacity)?;
        let client_capacity = RingCapacity::new(raw.client_capacity)?;

        check_buffer_limit(server_capacity, client_capacity, raw.max_buffered_send_bytes)?;

        if raw.buffer_sends && !raw.long_messages {
            tracing::warn!(
                channel = %name,
                "buffer_sends is on but long_messages is off; oversized sends will still fail"
            );
        }

        Ok(ChannelConfig {
            name,
            server_capacity,
            client_capacity,
            long_messages: raw.long_messages,
            buffer_sends: raw.buffer_sends,
            max_buffered_send_bytes: raw.max_buffered_send_bytes as usize,
        })
    }
}
