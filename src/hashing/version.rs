//! Protocol version selector.
//!
//! Historical units differ in two ways: how they are serialized for hashing
//! and how their size is measured for commissions. Each version maps to one
//! fixed pair of those strategies.

use serde::{Deserialize, Serialize};

use crate::hashing::canonical::Serialization;

/// How `get_length` treats object keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// Only values count towards the length.
    ValuesOnly,
    /// Object keys count too.
    WithKeys,
}

impl LengthRule {
    pub fn with_keys(self) -> bool {
        matches!(self, LengthRule::WithKeys)
    }
}

/// Unit format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// Tokenized serialization, no timestamp.
    V1,
    /// JSON serialization with timestamp, keys not measured.
    V2,
    /// JSON serialization with timestamp, keys measured.
    #[default]
    V3,
}

impl ProtocolVersion {
    /// Version string carried in the unit's `version` field.
    pub fn version_string(self, testnet: bool) -> String {
        let base = match self {
            ProtocolVersion::V1 => "1.0",
            ProtocolVersion::V2 => "2.0",
            ProtocolVersion::V3 => "3.0",
        };
        if testnet {
            format!("{}t", base)
        } else {
            base.to_string()
        }
    }

    /// Parse a unit `version` field. Testnet suffixes are accepted.
    pub fn parse(version: &str) -> Option<Self> {
        match version.strip_suffix('t').unwrap_or(version) {
            "1.0" => Some(ProtocolVersion::V1),
            "2.0" => Some(ProtocolVersion::V2),
            "3.0" => Some(ProtocolVersion::V3),
            _ => None,
        }
    }

    /// Serialization and length strategy pair for this version.
    pub fn strategy(self) -> (Serialization, LengthRule) {
        match self {
            ProtocolVersion::V1 => (Serialization::Tokenized, LengthRule::ValuesOnly),
            ProtocolVersion::V2 => (Serialization::Json, LengthRule::ValuesOnly),
            ProtocolVersion::V3 => (Serialization::Json, LengthRule::WithKeys),
        }
    }

    pub fn serialization(self) -> Serialization {
        self.strategy().0
    }

    pub fn length_rule(self) -> LengthRule {
        self.strategy().1
    }

    /// Whether units carry a `timestamp` that is hashed and measured.
    pub fn has_timestamp(self) -> bool {
        !matches!(self, ProtocolVersion::V1)
    }
}
