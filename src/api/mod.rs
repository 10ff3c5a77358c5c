//! Node API facade.
//!
//! # Data Flow
//! ```text
//! Client
//!     → methods.rs (Method: wire name, params flag)
//!     → NodeRpc → TransportClient
//! Client::compose
//!     → UnitComposer<NodeRpc, NodeRpc>
//! Client::symbol_by_asset / asset_by_symbol
//!     → registry.rs (registry state vars)
//! ```

pub mod client;
pub mod methods;
pub mod registry;

pub use client::{Client, NodeRpc, NOT_ENOUGH_FUNDS};
pub use methods::Method;
pub use registry::BYTES_SYMBOL;
