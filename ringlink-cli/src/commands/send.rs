// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ringlink send` command - Send one payload, possibly many times.

use std::time::{Duration, Instant};

use ringlink_core::{ChannelConfig, IpcChannel, MessageType, RoleRequest};

/// Give up if the peer stops draining for this long.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before retrying a send that found the ring full.
const RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// What to put in each message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    /// Deterministic byte pattern of the given length.
    Generated(usize),
}

impl Payload {
    pub fn from_args(message: Option<String>, size: Option<usize>) -> Self {
        match message {
            Some(text) => Self::Text(text),
            None => Self::Generated(size.unwrap_or(0)),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Generated(len) => (0..*len).map(|i| (i % 251) as u8).collect(),
        }
    }
}

pub async fn execute(
    config: ChannelConfig,
    request: RoleRequest,
    message_type: u32,
    payload: Payload,
    repeat: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind = MessageType::new(message_type)?;
    let body = payload.to_bytes();
    let checksum = crc32fast::hash(&body);

    let mut channel = IpcChannel::connect(config, request)?;
    tracing::info!(
        channel = %channel.config().name,
        kind = %kind,
        len = body.len(),
        repeat,
        "Sending"
    );

    let mut deadline = Instant::now() + SEND_TIMEOUT;
    for _ in 0..repeat {
        loop {
            match channel.send_data(kind, &body, false) {
                Ok(_) => {
                    deadline = Instant::now() + SEND_TIMEOUT;
                    break;
                }
                Err(e) if e.is_transient() => {
                    channel.pump_pending_sends()?;
                    if Instant::now() >= deadline {
                        return Err(format!("Timed out waiting for ring space: {}", e).into());
                    }
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    while channel.pump_pending_sends()? {
        if Instant::now() >= deadline {
            return Err("Timed out draining queued fragments".into());
        }
        tokio::time::sleep(RETRY_INTERVAL).await;
    }

    channel.close()?;
    println!(
        "✓ Sent {} x {} bytes (type {}, crc32 {:08x})",
        repeat,
        body.len(),
        kind,
        checksum
    );
    Ok(())
}
