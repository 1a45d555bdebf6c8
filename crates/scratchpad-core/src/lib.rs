//! Core types and traits for the shared scratchpad lock service.
//!
//! This crate holds everything that does not depend on a transport:
//! - `LockStore` / `ContentStore`: storage abstractions for lock records and document text
//! - `LockManager`: per-poll lock verdicts
//! - `SaveService`: lock-gated content commits
//! - `heartbeat`: the flat key/value wire format carried by each poll

mod clock;
mod content;
mod error;
pub mod heartbeat;
mod lock;
mod manager;
mod memory;
mod resource;
mod sanitize;
mod save;

pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{ContentStore, SharedResource};
pub use error::StorageError;
pub use lock::{LockRecord, LockStore, LockVerdict, DEFAULT_LOCK_TTL};
pub use manager::{DirectoryLookup, LockManager};
pub use memory::{MemoryContentStore, MemoryLockStore};
pub use resource::ResourceKey;
pub use sanitize::ContentSanitizer;
pub use save::{SaveAck, SaveError, SaveService, DEFAULT_MAX_CONTENT_BYTES};
