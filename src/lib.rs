//! DAG ledger light client library.

pub mod address;
pub mod api;
pub mod compose;
pub mod config;
pub mod hashing;
pub mod observability;
pub mod signing;
pub mod transport;

pub use address::{Address, Definition};
pub use api::{Client, Method};
pub use compose::{Auth, ComposeError, Output, Unit};
pub use config::ClientConfig;
pub use signing::Signer;
pub use transport::{ConnectionState, TransportClient, TransportError};
