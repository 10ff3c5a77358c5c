//! Key handling and unit signing.
//!
//! # Data Flow
//! ```text
//! Private key (32 bytes, base64)
//!     → signer.rs (secp256k1 key, compressed public key)
//!     → address::Definition::single_sig → Address
//!     → sign_hash(unit signable hash) → base64 r‖s
//! ```
//!
//! # Security Constraints
//! - Private keys are never logged or serialized
//! - `Debug` output redacts key material

pub mod signer;
pub mod types;

pub use signer::{verify, Signer, PRIVATE_KEY_ENV_VAR};
pub use types::{SigningError, SigningResult};
