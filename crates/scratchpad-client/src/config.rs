use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use scratchpad_core::ResourceKey;

/// Configuration for the scratchpad-client.
#[derive(Parser, Debug, Clone)]
#[command(name = "scratchpad-client")]
#[command(about = "Command-line client for the shared scratchpad service")]
pub struct Config {
    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "SCRATCHPAD_SERVER")]
    pub server: String,

    /// Access token
    #[arg(long, env = "SCRATCHPAD_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Heartbeat period in seconds
    #[arg(long, default_value = "15", env = "SCRATCHPAD_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the current content of a resource
    Show { key: ResourceKey },

    /// Poll resources and print lock changes until interrupted
    Watch {
        #[arg(required = true, value_delimiter = ',')]
        keys: Vec<ResourceKey>,
    },

    /// Take the lock on a resource and save new content
    Save {
        key: ResourceKey,

        /// Read content from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
