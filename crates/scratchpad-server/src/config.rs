use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use scratchpad_core::{ResourceKey, DEFAULT_MAX_CONTENT_BYTES};

/// Configuration for the scratchpad-server.
#[derive(Parser, Debug, Clone)]
#[command(name = "scratchpad-server")]
#[command(about = "Shared scratchpad lock service (heartbeat + save endpoints)")]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "SCRATCHPAD_HOST")]
    pub host: String,

    /// Port to bind to
    #[arg(long, default_value = "8080", env = "SCRATCHPAD_PORT")]
    pub port: u16,

    /// Content storage backend
    #[arg(long, default_value = "file", env = "SCRATCHPAD_STORAGE_BACKEND")]
    pub storage_backend: StorageBackend,

    /// Base directory for file storage
    #[arg(long, env = "SCRATCHPAD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// JSON users file (id, display_name, token_sha256)
    #[arg(long, env = "SCRATCHPAD_USERS_FILE")]
    pub users_file: Option<PathBuf>,

    /// Secret for save nonces. A random one is generated when unset, which
    /// invalidates outstanding nonces on restart.
    #[arg(long, env = "SCRATCHPAD_NONCE_SECRET", hide_env_values = true)]
    pub nonce_secret: Option<String>,

    /// Nonce lifetime in seconds
    #[arg(long, default_value = "86400", env = "SCRATCHPAD_NONCE_LIFETIME_SECS")]
    pub nonce_lifetime_secs: u64,

    /// Guarded resources (comma separated)
    #[arg(
        long,
        default_value = "scratchpad,agenda",
        value_delimiter = ',',
        env = "SCRATCHPAD_RESOURCES"
    )]
    pub resources: Vec<ResourceKey>,

    /// Lock time-to-live in seconds (at least 1)
    #[arg(
        long,
        default_value = "30",
        env = "SCRATCHPAD_LOCK_TTL_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub lock_ttl_secs: u64,

    /// Largest accepted document, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_CONTENT_BYTES, env = "SCRATCHPAD_MAX_CONTENT_BYTES")]
    pub max_content_bytes: usize,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the users-file hash of an access token and exit
    HashToken {
        token: String,
    },
}

impl Config {
    /// Get the effective data directory.
    pub fn effective_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("scratchpad")
        })
    }

    /// Get the effective users file path.
    pub fn effective_users_file(&self) -> PathBuf {
        self.users_file
            .clone()
            .unwrap_or_else(|| self.effective_data_dir().join("users.json"))
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn nonce_lifetime(&self) -> Duration {
        Duration::from_secs(self.nonce_lifetime_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageBackend {
    File,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}
