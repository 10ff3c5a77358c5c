//! Address codec subsystem.
//!
//! # Data Flow
//! ```text
//! Definition (JSON)
//!     → hashing::source_string (tokenized form)
//!     → RIPEMD-160, first 4 bytes dropped
//!     → chash.rs (checksum bits interleaved at offsets.rs positions)
//!     → base32 → Address
//! ```
//!
//! # Design Decisions
//! - Offset tables are computed at compile time; they depend only on length
//! - Wrong-length input is an error, a bad checksum is `Ok(false)`

pub mod chash;
pub mod definition;
pub mod offsets;
pub mod types;

pub use chash::{chash160, chash288, encode, is_valid, is_valid_address};
pub use definition::{address_of, Definition};
pub use types::{Address, ChashError, ChashLength, ChashResult};
