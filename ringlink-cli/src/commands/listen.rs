// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ringlink listen` command - Print messages as they arrive.
//!
//! Polls the channel on a short interval until Ctrl-C or until the requested
//! number of messages has been received.

use std::time::Duration;

use ringlink_core::{
    ChannelConfig, IpcChannel, IpcError, IpcResult, ProtocolViolation, RingError, RoleRequest,
};

/// Delay between polls when the ring is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub async fn execute(
    config: ChannelConfig,
    request: RoleRequest,
    count: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(channel = %config.name, request = %request, "Opening channel");

    let mut channel = IpcChannel::connect(config, request)?;
    let role = channel.role().map_or("unknown", |r| r.name());
    println!("▶ Listening on {} as {}", channel.config().name, role);
    println!("  Press Ctrl+C to stop");
    println!();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut received = 0u64;
    let mut connected = channel.have_connection();
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                println!();
                println!("Shutting down...");
                break;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                let peer = channel.have_connection();
                if peer != connected {
                    tracing::info!(peer_active = peer, "Peer connection changed");
                    connected = peer;
                }

                let remaining = count.map(|c| c.saturating_sub(received));
                received += drain(&mut channel, remaining)?;
                if count.is_some_and(|c| received >= c) {
                    break;
                }
            }
        }
    }

    channel.close()?;
    println!("Received {} messages", received);
    Ok(())
}

/// Print and acknowledge everything currently readable, up to `limit`.
fn drain(channel: &mut IpcChannel, limit: Option<u64>) -> IpcResult<u64> {
    let mut printed = 0u64;
    while limit.map_or(true, |limit| printed < limit) {
        let line = match channel.receive_data() {
            Ok(Some(message)) => format!(
                "type={} len={} crc32={:08x}",
                message.kind,
                message.payload.len(),
                crc32fast::hash(message.payload)
            ),
            Ok(None) => break,
            // Consumed by the ring; a corrupt frame is not, so that one is fatal.
            Err(IpcError::Ring(RingError::Protocol(violation)))
                if !matches!(violation, ProtocolViolation::CorruptFrame { .. }) =>
            {
                tracing::warn!(error = %violation, "Skipped malformed frame");
                continue;
            }
            Err(e) => return Err(e),
        };

        channel.receive_acknowledge()?;
        println!("{}", line);
        printed += 1;
    }
    Ok(printed)
}
