//! Signing error definitions.

use thiserror::Error;

use crate::address::ChashError;

/// Errors that can occur while handling keys or signing.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Private key bytes are not a valid secp256k1 scalar.
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// Public key bytes could not be parsed.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Base64 input could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The signing primitive failed.
    #[error("Signing failed: {0}")]
    Signature(String),

    /// The signer's address could not be derived.
    #[error(transparent)]
    Address(#[from] ChashError),
}

/// Result type for signing operations.
pub type SigningResult<T> = Result<T, SigningError>;
