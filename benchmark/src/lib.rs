// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ringlink Benchmarking Helpers
//!
//! Shared fixtures for the criterion benches:
//!
//! - **Ring Buffer**: loopback send/receive at various payload sizes,
//!   including multi-part messages
//! - **Channel**: server/client pairs over real shared memory

use ringlink_core::{
    ChannelConfig, ChannelName, IpcChannel, IpcResult, RingCapacity, RoleRequest,
};

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Channel configuration with a name unique to this process and tag.
pub fn bench_config(tag: &str, capacity: u32) -> IpcResult<ChannelConfig> {
    let name = ChannelName::new(format!("ringlink-bench-{}-{}", tag, std::process::id()))?;
    let capacity = RingCapacity::new(u64::from(capacity))?;
    Ok(ChannelConfig::new(name).with_capacities(capacity, capacity))
}

/// Connected `(server, client)` pair in this process.
pub fn channel_pair(config: ChannelConfig) -> IpcResult<(IpcChannel, IpcChannel)> {
    let server = IpcChannel::connect(config.clone(), RoleRequest::Server)?;
    let client = IpcChannel::connect(config, RoleRequest::Client)?;
    Ok((server, client))
}
