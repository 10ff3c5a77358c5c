//! Node transport subsystem.
//!
//! # Data Flow
//! ```text
//! caller request(command, params)
//!     → client.rs (tag, command channel)
//!     → state.rs (pending map, outbox, heartbeat rules) → Action
//!     → client.rs driver (WebSocket write)
//!
//! WebSocket read
//!     → frame.rs (decode)
//!     → state.rs (correlate by tag, answer node requests)
//!     → pending reply | notification subscribers
//! ```
//!
//! # Design Decisions
//! - Correlation and liveness live in a sans-IO machine driven by one task
//! - Reconnect uses a fixed delay, no backoff growth
//! - Requests pending across a close stay pending unless
//!   `reject_pending_on_close` is set

pub mod client;
pub mod frame;
pub mod state;
pub mod types;

pub use client::TransportClient;
pub use frame::Frame;
pub use types::{ConnectionState, TransportError, TransportResult};
