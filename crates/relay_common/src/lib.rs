//! Shared types for the relay routing daemon and its client.

pub mod error;
pub mod rpc;
pub mod trace;
pub mod types;

pub use error::RelayError;

/// Daemon socket path
pub const SOCKET_PATH: &str = "/run/relay/relay.sock";

/// Crate version, shared by daemon and client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
