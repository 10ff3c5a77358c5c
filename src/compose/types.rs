//! Unit data model and composition errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::address::{Address, ChashError, Definition};
use crate::hashing::{hash, HashError, ProtocolVersion};
use crate::signing::SigningError;
use crate::transport::TransportError;

/// Errors that can occur while composing or submitting a unit.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The request itself is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A value could not be canonically serialized.
    #[error(transparent)]
    Canonical(#[from] HashError),

    /// An address could not be derived or parsed.
    #[error(transparent)]
    Address(#[from] ChashError),

    /// The address definition record is not final yet.
    #[error("Definition of {address} is not stable yet")]
    DefinitionNotStable { address: String },

    /// The signing definition does not hash to the recorded definition.
    #[error("Definition mismatch: ledger has {expected}, signer has {actual}")]
    DefinitionMismatch { expected: String, actual: String },

    /// No input set covers the target amount.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// A node round-trip failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Key handling or signing failed.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The node answered with something we cannot use.
    #[error("Unexpected response to {command}: {reason}")]
    UnexpectedResponse { command: String, reason: String },
}

/// Result type for composition.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// A payment output. Ordered by address, then amount.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Output {
    pub address: String,
    pub amount: u64,
}

impl Output {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// Sort outputs into their canonical order.
pub fn sort_outputs(outputs: &mut [Output]) {
    outputs.sort();
}

/// Payload of a `payment` message. Inputs are carried as the node returns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    pub inputs: Vec<Value>,
    pub outputs: Vec<Output>,
}

/// A message carried inline in a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub app: String,
    pub payload_hash: String,
    pub payload_location: String,
    pub payload: Value,
}

impl Message {
    /// Inline message with its payload hash computed.
    pub fn inline(app: &str, payload: Value, version: ProtocolVersion) -> ComposeResult<Self> {
        let payload_hash = hash(&payload, version.serialization())?;
        Ok(Self {
            app: app.to_string(),
            payload_hash,
            payload_location: "inline".to_string(),
            payload,
        })
    }

    pub fn payment(payload: &PaymentPayload, version: ProtocolVersion) -> ComposeResult<Self> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| ComposeError::Validation(e.to_string()))?;
        Self::inline("payment", payload, version)
    }

    pub fn payment_payload(&self) -> Option<PaymentPayload> {
        if self.app != "payment" {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// A unit author and its signatures by signing path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub address: String,
    pub authentifiers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<Definition>,
}

/// A ledger unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub version: String,
    pub alt: String,
    pub messages: Vec<Message>,
    pub authors: Vec<Author>,
    pub parent_units: Vec<String>,
    pub last_ball: String,
    pub last_ball_unit: String,
    pub witness_list_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers_commission: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_commission: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Unit {
    /// JSON object form, as hashed and submitted.
    pub fn to_map(&self) -> ComposeResult<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ComposeError::Validation("unit is not an object".into())),
            Err(e) => Err(ComposeError::Validation(e.to_string())),
        }
    }
}

/// Signing material for one author.
#[derive(Clone)]
pub struct Auth {
    pub private_key: Vec<u8>,
    pub address: Option<Address>,
    pub definition: Option<Definition>,
    pub path: String,
}

impl Auth {
    pub fn new(private_key: impl Into<Vec<u8>>) -> Self {
        Self {
            private_key: private_key.into(),
            address: None,
            definition: None,
            path: "r".to_string(),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_definition(mut self, definition: Definition) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("private_key", &"<redacted>")
            .field("address", &self.address)
            .field("definition", &self.definition)
            .field("path", &self.path)
            .finish()
    }
}

/// Parents and last stable ball for a new unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightProps {
    pub parent_units: Vec<String>,
    pub last_stable_mc_ball: String,
    pub last_stable_mc_ball_unit: String,
    #[serde(default)]
    pub last_stable_mc_ball_mci: Option<u64>,
    pub witness_list_unit: String,
}

/// Definition status of an address as recorded by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionInfo {
    #[serde(default)]
    pub definition_chash: Option<String>,
    #[serde(default)]
    pub definition: Option<Value>,
    #[serde(default = "stable_by_default")]
    pub is_stable: bool,
}

fn stable_by_default() -> bool {
    true
}

/// Coin selection query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinRequest {
    pub addresses: Vec<String>,
    pub last_ball_mci: u64,
    pub amount: u64,
    pub spend_unconfirmed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

/// Inputs picked by the node and their total value.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinSelection {
    pub inputs: Vec<Value>,
    pub total_amount: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_outputs_by_address_then_amount() {
        let mut outputs = vec![
            Output::new("ULQA63NGEZACP4N7ZMBUBISH6ZTCUS2Q", 6612),
            Output::new("KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB", 21542),
            Output::new("KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB", 100),
            Output::new("NX2BTV43XN6BOTCYZUUFU6TK7DVOC4LU", 1),
        ];
        sort_outputs(&mut outputs);
        let expected = vec![
            Output::new("KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB", 100),
            Output::new("KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB", 21542),
            Output::new("NX2BTV43XN6BOTCYZUUFU6TK7DVOC4LU", 1),
            Output::new("ULQA63NGEZACP4N7ZMBUBISH6ZTCUS2Q", 6612),
        ];
        assert_eq!(outputs, expected);

        sort_outputs(&mut outputs);
        assert_eq!(outputs, expected);
    }

    #[test]
    fn test_message_inline_hashes_payload() {
        let message = Message::inline("data", json!({"hello": "world"}), ProtocolVersion::V3).unwrap();
        assert_eq!(message.payload_hash, "k6I5cakU5erL8KjSUVTNownDwccvu5kU1Hxg88toFYg=");
        assert_eq!(message.payload_location, "inline");

        let tokenized = Message::inline("data", json!({"hello": "world"}), ProtocolVersion::V1).unwrap();
        assert_eq!(tokenized.payload_hash, "Iz/JLJ5Pq0O1uDY2OollFU+YHCc9wIFr8WpszXHEy7Y=");
    }

    #[test]
    fn test_message_rejects_empty_payload() {
        assert!(matches!(
            Message::inline("data", json!({}), ProtocolVersion::V3),
            Err(ComposeError::Canonical(HashError::EmptyObject { .. }))
        ));
    }

    #[test]
    fn test_payment_payload_round_trip_through_message() {
        let payload = PaymentPayload {
            asset: None,
            inputs: vec![json!({"unit": "U", "message_index": 0, "output_index": 1})],
            outputs: vec![Output::new("KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB", 10)],
        };
        let message = Message::payment(&payload, ProtocolVersion::V3).unwrap();
        assert!(message.payload.get("asset").is_none());
        assert_eq!(message.payment_payload(), Some(payload));
    }

    #[test]
    fn test_unit_map_omits_unset_fields() {
        let unit = Unit {
            version: "3.0".into(),
            alt: "1".into(),
            messages: vec![],
            authors: vec![],
            parent_units: vec!["P".into()],
            last_ball: "B".into(),
            last_ball_unit: "BU".into(),
            witness_list_unit: "W".into(),
            headers_commission: None,
            payload_commission: None,
            timestamp: Some(1),
            unit: None,
        };
        let map = unit.to_map().unwrap();
        assert!(!map.contains_key("unit"));
        assert!(!map.contains_key("headers_commission"));
        assert_eq!(map["timestamp"], json!(1));
    }

    #[test]
    fn test_definition_info_defaults() {
        let info: DefinitionInfo = serde_json::from_value(json!({"definition_chash": "X"})).unwrap();
        assert!(info.is_stable);
        assert!(info.definition.is_none());
    }

    #[test]
    fn test_auth_debug_redacts_key() {
        let auth = Auth::new(vec![7u8; 32]);
        assert!(format!("{:?}", auth).contains("<redacted>"));
        assert_eq!(auth.path, "r");
    }
}
