//! # warden-ipc
//!
//! The signed IPC channel between Core and Gateway. The client
//! turns typed actions into signed, length-framed requests and
//! correlates responses by id — never by order — with per-request
//! timeouts and a pending table that settles each request exactly
//! once. The dispatcher is the receiving half: verify, decide,
//! execute, audit.

pub mod client;
pub mod dispatch;
pub mod pending;

pub use client::IpcClient;
pub use dispatch::{ActionExecutor, GatewayDispatcher};
pub use pending::PendingTable;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
