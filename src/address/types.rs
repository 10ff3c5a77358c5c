//! Address types and codec errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::address::chash::is_valid;
use crate::address::offsets::{OFFSETS_160, OFFSETS_288};
use crate::hashing::HashError;

/// Errors that can occur while encoding or validating a chash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChashError {
    /// Raw digest has the wrong size for the requested length.
    #[error("clean data must be {expected} bytes, got {actual}")]
    DataLength { expected: usize, actual: usize },

    /// Encoded text is neither 32 nor 48 characters.
    #[error("wrong encoded length: {0}")]
    EncodedLength(usize),

    /// Addresses are uppercase only.
    #[error("address must be uppercase")]
    Casing,

    /// Embedded checksum does not match the data.
    #[error("checksum mismatch")]
    Checksum,

    /// The definition could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] HashError),
}

/// Result type for codec operations.
pub type ChashResult<T> = Result<T, ChashError>;

/// Supported chash bit lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChashLength {
    /// 160 bits, base32. Used for addresses.
    Bits160,
    /// 288 bits, base64. Used for long identifiers.
    Bits288,
}

impl ChashLength {
    pub fn bits(self) -> usize {
        match self {
            ChashLength::Bits160 => 160,
            ChashLength::Bits288 => 288,
        }
    }

    /// Size of the raw digest before the checksum is mixed in.
    pub fn clean_bytes(self) -> usize {
        (self.bits() - 32) / 8
    }

    pub(crate) fn offsets(self) -> &'static [usize; 32] {
        match self {
            ChashLength::Bits160 => &OFFSETS_160,
            ChashLength::Bits288 => &OFFSETS_288,
        }
    }
}

/// A validated 32-character address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and validate an address string.
    pub fn parse(text: &str) -> ChashResult<Self> {
        let length = text.chars().count();
        if length != 32 {
            return Err(ChashError::EncodedLength(length));
        }
        if text.to_uppercase() != text {
            return Err(ChashError::Casing);
        }
        if !is_valid(text)? {
            return Err(ChashError::Checksum);
        }
        Ok(Self(text.to_string()))
    }

    /// Wrap an encoding produced by this crate's own encoder.
    pub(crate) fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ChashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ChashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_address() {
        let address = Address::parse("KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB").unwrap();
        assert_eq!(address.to_string(), "KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Address::parse("SHORT"), Err(ChashError::EncodedLength(5)));
        assert_eq!(
            Address::parse("ksccyoemomumjxrolk4hwltjbwfxicrb"),
            Err(ChashError::Casing)
        );
        assert_eq!(
            Address::parse("KSCCYOEMOMUMJXROLK4HWLTJBWFXICRA"),
            Err(ChashError::Checksum)
        );
    }

    #[test]
    fn test_serde_validates() {
        let ok: Result<Address, _> = serde_json::from_str("\"ULQA63NGEZACP4N7ZMBUBISH6ZTCUS2Q\"");
        assert!(ok.is_ok());
        let bad: Result<Address, _> = serde_json::from_str("\"ULQA63NGEZACP4N7ZMBUBISH6ZTCUS2R\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_lengths() {
        assert_eq!(ChashLength::Bits160.clean_bytes(), 16);
        assert_eq!(ChashLength::Bits288.clean_bytes(), 32);
    }
}
