// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

use std::path::Path;

use ringlink_core::{ChannelConfig, ChannelName, ConfigLoader};

pub mod listen;
pub mod send;
pub mod status;
pub mod validate;

/// Build the channel configuration for a command.
///
/// The config file is used when it exists; `--name` overrides its channel
/// name, or stands alone with default ring sizes when there is no file.
pub fn resolve_config(
    config_path: &str,
    name: Option<&str>,
) -> Result<ChannelConfig, Box<dyn std::error::Error>> {
    let from_file = if Path::new(config_path).exists() {
        Some(ConfigLoader::load_file(config_path)?)
    } else {
        None
    };

    let config = match (from_file, name) {
        (Some(mut config), Some(name)) => {
            config.name = ChannelName::new(name)?;
            config
        }
        (Some(config), None) => config,
        (None, Some(name)) => ChannelConfig::new(ChannelName::new(name)?),
        (None, None) => {
            return Err(format!(
                "No channel given: pass --name or provide {}",
                config_path
            )
            .into())
        }
    };

    tracing::debug!(
        channel = %config.name,
        server_capacity = %config.server_capacity,
        client_capacity = %config.client_capacity,
        "Resolved channel configuration"
    );
    Ok(config)
}
