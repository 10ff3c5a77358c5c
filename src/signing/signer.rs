//! Single-key signer.
//!
//! # Security
//! - Keys are loaded from bytes, base64 or an environment variable
//! - Keys are never logged or serialized

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use std::fmt;

use crate::address::{Address, Definition};
use crate::signing::types::{SigningError, SigningResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "DAG_LIGHT_PRIVATE_KEY";

/// Signer over one secp256k1 key with its single-sig definition and address.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
    pubkey: String,
    definition: Definition,
    address: Address,
}

impl Signer {
    /// Create a signer from raw 32-byte private key material.
    pub fn from_bytes(private_key: &[u8]) -> SigningResult<Self> {
        let key = SigningKey::from_slice(private_key)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let pubkey = encode_public_key(key.verifying_key());
        let definition = Definition::single_sig(&pubkey);
        let address = definition.address()?;

        tracing::debug!(address = %address, "Signer initialized");

        Ok(Self {
            key,
            pubkey,
            definition,
            address,
        })
    }

    /// Create a signer from a base64-encoded private key.
    pub fn from_base64(private_key_b64: &str) -> SigningResult<Self> {
        let bytes = STANDARD
            .decode(private_key_b64.trim())
            .map_err(|e| SigningError::Encoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Load the private key from `DAG_LIGHT_PRIVATE_KEY`.
    pub fn from_env() -> SigningResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            SigningError::InvalidKey(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;
        Self::from_base64(&private_key)
    }

    /// Compressed public key, base64.
    pub fn public_key(&self) -> &str {
        &self.pubkey
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sign a 32-byte digest. Returns base64 of the 64-byte `r‖s` signature.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> SigningResult<String> {
        let signature: Signature = self
            .key
            .sign_prehash(hash)
            .map_err(|e| SigningError::Signature(e.to_string()))?;
        let signature = signature.normalize_s().unwrap_or(signature);
        Ok(STANDARD.encode(signature.to_bytes()))
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .field("pubkey", &self.pubkey)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Check a base64 signature over `hash` against a base64 compressed public key.
pub fn verify(hash: &[u8; 32], signature_b64: &str, pubkey_b64: &str) -> SigningResult<bool> {
    let pubkey = STANDARD
        .decode(pubkey_b64)
        .map_err(|e| SigningError::Encoding(e.to_string()))?;
    let key = VerifyingKey::from_sec1_bytes(&pubkey)
        .map_err(|e| SigningError::InvalidPublicKey(e.to_string()))?;
    let signature = STANDARD
        .decode(signature_b64)
        .map_err(|e| SigningError::Encoding(e.to_string()))?;
    let Ok(signature) = Signature::from_slice(&signature) else {
        return Ok(false);
    };
    Ok(key.verify_prehash(hash, &signature).is_ok())
}

fn encode_public_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.to_encoded_point(true).as_bytes())
}
