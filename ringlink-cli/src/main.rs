// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ringlink CLI
//!
//! Command-line interface for listening on, sending to and inspecting
//! ringlink shared memory channels.

use clap::{Parser, Subcommand, ValueEnum};
use ringlink_core::RoleRequest;
use tracing_subscriber::EnvFilter;

mod commands;

/// Ringlink - shared memory message channel
#[derive(Parser)]
#[command(name = "ringlink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (used when present)
    #[arg(short, long, default_value = "ringlink.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Role to ask for when opening a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Server,
    Client,
    /// Client, but only if a server is already attached
    ClientRequireServer,
    /// Whichever role is free, server first
    Any,
}

impl From<RoleArg> for RoleRequest {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Server => RoleRequest::Server,
            RoleArg::Client => RoleRequest::Client,
            RoleArg::ClientRequireServer => RoleRequest::ClientRequireServer,
            RoleArg::Any => RoleRequest::ClientOrServer,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a channel and print every message received
    Listen {
        /// Channel name (overrides the config file)
        #[arg(short, long)]
        name: Option<String>,

        /// Role to negotiate
        #[arg(short, long, value_enum, default_value = "server")]
        role: RoleArg,

        /// Exit after this many messages
        #[arg(long)]
        count: Option<u64>,
    },

    /// Send messages to a channel
    Send {
        /// Channel name (overrides the config file)
        #[arg(short, long)]
        name: Option<String>,

        /// Role to negotiate
        #[arg(short, long, value_enum, default_value = "client-require-server")]
        role: RoleArg,

        /// Application message type (100 and up)
        #[arg(short = 't', long = "type", default_value_t = 100)]
        message_type: u32,

        /// Text payload
        #[arg(short, long, conflicts_with = "size", required_unless_present = "size")]
        message: Option<String>,

        /// Generated payload of this many bytes
        #[arg(short, long)]
        size: Option<usize>,

        /// Number of times to send the payload
        #[arg(long, default_value_t = 1)]
        repeat: u64,
    },

    /// Show role flags and ring cursors of a channel
    Status {
        /// Channel name (overrides the config file)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Listen { name, role, count } => {
            let config = commands::resolve_config(&cli.config, name.as_deref())?;
            commands::listen::execute(config, role.into(), count).await
        }
        Commands::Send {
            name,
            role,
            message_type,
            message,
            size,
            repeat,
        } => {
            let config = commands::resolve_config(&cli.config, name.as_deref())?;
            let payload = commands::send::Payload::from_args(message, size);
            commands::send::execute(config, role.into(), message_type, payload, repeat).await
        }
        Commands::Status { name } => {
            let config = commands::resolve_config(&cli.config, name.as_deref())?;
            commands::status::execute(&config).await
        }
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
