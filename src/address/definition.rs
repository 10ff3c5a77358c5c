//! Address definitions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::address::chash::chash160;
use crate::address::types::{Address, ChashResult};
use crate::hashing::source_string;

/// An address definition, e.g. `["sig", {"pubkey": "..."}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Definition(Value);

impl Definition {
    /// Single-signature definition over a compressed base64 public key.
    pub fn single_sig(pubkey: &str) -> Self {
        Self(json!(["sig", { "pubkey": pubkey }]))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Public key of a single-signature definition.
    pub fn pubkey(&self) -> Option<&str> {
        match self.0.as_array()?.as_slice() {
            [op, args] if op == "sig" => args.get("pubkey")?.as_str(),
            _ => None,
        }
    }

    pub fn address(&self) -> ChashResult<Address> {
        address_of(self)
    }
}

/// Address derived from a definition.
pub fn address_of(definition: &Definition) -> ChashResult<Address> {
    let source = source_string(definition.as_value())?;
    Ok(Address::from_encoded(chash160(source.as_bytes())))
}
