//! Client side of the shared scratchpad lock protocol.
//!
//! A `LockController` tracks whether the local user is editing one resource,
//! reports that on every poll, and enables or disables the local editor from
//! the server's verdict. Several controllers can share one heartbeat through a
//! `PollGroup`.

pub mod config;
mod controller;
mod error;
mod idle;
mod poller;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{
    ControllerState, EditorView, LockController, Notice, SaveOutcome, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
pub use error::ClientError;
pub use idle::IdleTimer;
pub use poller::PollGroup;
pub use transport::{HttpTransport, Transport};
