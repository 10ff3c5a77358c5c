//! Canonical serialization and hashing subsystem.
//!
//! # Data Flow
//! ```text
//! serde_json::Value
//!     → canonical.rs (tokenized or JSON source string, fails on null/empty)
//!     → SHA-256 → base64 digest
//!
//! Unit (as a JSON object)
//!     → unit.rs (naked and stripped forms → content hash, unit id, signable hash)
//!     → length.rs (headers and payload commissions)
//! ```
//!
//! # Design Decisions
//! - Every function takes an explicit `ProtocolVersion`; there are no
//!   version-string comparisons outside `version.rs`
//! - Object keys are order-normalized, array elements are not
//! - The hashing layer works on `serde_json::Value` so it is independent of
//!   the typed unit model in `compose`

pub mod canonical;
pub mod length;
pub mod types;
pub mod unit;
pub mod version;

pub use canonical::{hash, json_source_string, serialize, sha256, source_string, Serialization};
pub use length::{get_length, headers_size, total_payload_size};
pub use types::{HashError, HashResult};
pub use unit::{naked_unit, unit_content_hash, unit_id, unit_signable_hash};
pub use version::{LengthRule, ProtocolVersion};
