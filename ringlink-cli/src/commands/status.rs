// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ringlink status` command - Show the shared header of a channel.

use ringlink_core::shm::RingSnapshot;
use ringlink_core::{ChannelConfig, IpcChannel};

pub async fn execute(config: &ChannelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = match IpcChannel::probe(config) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("✗ Channel {} is not available: {}", config.name, e);
            std::process::exit(1);
        }
    };

    println!("Channel: {}", config.name);
    println!();
    println!("{:<8} {:<8}", "ROLE", "ACTIVE");
    println!("{}", "-".repeat(16));
    println!("{:<8} {:<8}", "server", yes_no(snapshot.server_active));
    println!("{:<8} {:<8}", "client", yes_no(snapshot.client_active));
    println!();
    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>10}",
        "RING", "CAPACITY", "WRITE", "READ", "IN FLIGHT"
    );
    println!("{}", "-".repeat(60));
    print_ring("server->client", &snapshot.server_ring);
    print_ring("client->server", &snapshot.client_ring);

    Ok(())
}

fn print_ring(label: &str, ring: &RingSnapshot) {
    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>10}",
        label,
        ring.capacity,
        ring.write_offset,
        ring.read_offset,
        ring.in_flight()
    );
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
