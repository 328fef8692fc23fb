// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ringlink validate` command - Validate configuration file.

use ringlink_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Channel: {}", config.name);
            println!("  Server Ring:        {}", config.server_capacity);
            println!("  Client Ring:        {}", config.client_capacity);
            println!("  Mapping Size:       {} bytes", config.region_size());
            println!("  Long Messages:      {}", config.long_messages);
            println!("  Buffered Sends:     {}", config.buffer_sends);
            println!(
                "  Max Buffered Bytes: {}",
                config.max_buffered_send_bytes
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
