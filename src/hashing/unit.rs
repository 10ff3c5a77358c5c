//! Unit-level hashes: content hash, unit id and the digest that gets signed.
//!
//! # Forms
//! - **naked**: the unit without its id, commissions, chain index and message
//!   payloads (plus the timestamp in versions that do not hash it)
//! - **stripped**: content hash plus the identity-relevant headers only

use serde_json::{json, Map, Value};

use crate::hashing::canonical::{hash, serialize, sha256};
use crate::hashing::types::{HashError, HashResult};
use crate::hashing::version::ProtocolVersion;

/// Fields that change after the content is fixed.
const VOLATILE_FIELDS: [&str; 7] = [
    "unit",
    "headers_commission",
    "payload_commission",
    "oversize_fee",
    "tps_fee",
    "actual_tps_fee",
    "main_chain_index",
];

/// Copy of `unit` without volatile fields and message payloads.
pub fn naked_unit(unit: &Map<String, Value>, version: ProtocolVersion) -> Map<String, Value> {
    let mut naked = unit.clone();
    for field in VOLATILE_FIELDS {
        naked.remove(field);
    }
    if !version.has_timestamp() {
        naked.remove("timestamp");
    }
    if let Some(Value::Array(messages)) = naked.get_mut("messages") {
        for message in messages.iter_mut() {
            if let Value::Object(message) = message {
                message.remove("payload");
                message.remove("payload_uri");
            }
        }
    }
    naked
}

/// Hash of the naked unit.
pub fn unit_content_hash(unit: &Map<String, Value>, version: ProtocolVersion) -> HashResult<String> {
    hash(&Value::Object(naked_unit(unit, version)), version.serialization())
}

/// The unit's own identifier.
///
/// A unit that already carries `content_hash` is treated as stripped and
/// hashed directly.
pub fn unit_id(unit: &Map<String, Value>, version: ProtocolVersion) -> HashResult<String> {
    let serialization = version.serialization();
    if unit.contains_key("content_hash") {
        return hash(&Value::Object(naked_unit(unit, version)), serialization);
    }

    let mut stripped = Map::new();
    stripped.insert("content_hash".into(), Value::String(unit_content_hash(unit, version)?));
    stripped.insert("version".into(), required(unit, "version")?.clone());
    stripped.insert("alt".into(), required(unit, "alt")?.clone());

    let authors = required(unit, "authors")?
        .as_array()
        .ok_or(HashError::MissingField("authors"))?
        .iter()
        .map(|author| {
            author
                .get("address")
                .map(|address| json!({ "address": address }))
                .ok_or(HashError::MissingField("authors.address"))
        })
        .collect::<HashResult<Vec<_>>>()?;
    stripped.insert("authors".into(), Value::Array(authors));

    match unit.get("witness_list_unit") {
        Some(witness_list_unit) => {
            stripped.insert("witness_list_unit".into(), witness_list_unit.clone());
        }
        None => {
            stripped.insert("witnesses".into(), required(unit, "witnesses")?.clone());
        }
    }

    if let Some(parent_units) = unit.get("parent_units") {
        stripped.insert("parent_units".into(), parent_units.clone());
        stripped.insert("last_ball".into(), required(unit, "last_ball")?.clone());
        stripped.insert("last_ball_unit".into(), required(unit, "last_ball_unit")?.clone());
    }

    if version.has_timestamp() {
        if let Some(timestamp) = unit.get("timestamp") {
            stripped.insert("timestamp".into(), timestamp.clone());
        }
    }

    hash(&Value::Object(stripped), serialization)
}

/// Raw SHA-256 digest the authors sign.
pub fn unit_signable_hash(unit: &Map<String, Value>, version: ProtocolVersion) -> HashResult<[u8; 32]> {
    let mut naked = naked_unit(unit, version);
    if let Some(Value::Array(authors)) = naked.get_mut("authors") {
        for author in authors.iter_mut() {
            if let Value::Object(author) = author {
                author.remove("authentifiers");
            }
        }
    }
    let source = serialize(&Value::Object(naked), version.serialization())?;
    Ok(sha256(source.as_bytes()))
}

fn required<'a>(unit: &'a Map<String, Value>, field: &'static str) -> HashResult<&'a Value> {
    unit.get(field).ok_or(HashError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn sample_unit() -> Map<String, Value> {
        object(json!({
            "version": "3.0",
            "alt": "1",
            "messages": [{
                "app": "data",
                "payload_hash": "k6I5cakU5erL8KjSUVTNownDwccvu5kU1Hxg88toFYg=",
                "payload_location": "inline",
                "payload": {"hello": "world"},
            }],
            "authors": [{
                "address": "WPBI4QHZGJ4HFNATOMPM42HDH5QDFJRW",
                "authentifiers": {"r": "-".repeat(88)},
            }],
            "parent_units": ["oj8yEksX9Ubq7lLc+p6F2uyHUuynugeVq4+ikT67X6E="],
            "last_ball": "BFabWsBK5uJmVJvXpXlsnq1yi2DuVjzdt7Kc3hQWRpE=",
            "last_ball_unit": "QUsS+EhZILpetbOPrkILsR4UTEd4IP9vxoTOY4vYUBg=",
            "witness_list_unit": "J8QFgTLI+3EkuAxX+eL6a0q114PJ4h4EOAiHAzxUp24=",
            "headers_commission": 391,
            "payload_commission": 157,
            "timestamp": 1_600_000_000u64,
        }))
    }

    #[test]
    fn test_volatile_fields_do_not_affect_id() {
        let unit = sample_unit();
        let mut changed = unit.clone();
        changed.insert("headers_commission".into(), json!(1));
        changed.insert("unit".into(), json!("whatever"));
        changed.insert("main_chain_index".into(), json!(7));
        changed["messages"][0]["payload"] = json!({"hello": "changed"});

        assert_eq!(
            unit_id(&unit, ProtocolVersion::V3).unwrap(),
            unit_id(&changed, ProtocolVersion::V3).unwrap()
        );
    }

    #[test]
    fn test_signature_changes_id_but_not_signable_hash() {
        let unit = sample_unit();
        let mut signed = unit.clone();
        signed["authors"][0]["authentifiers"]["r"] = json!("S".repeat(88));

        assert_ne!(
            unit_id(&unit, ProtocolVersion::V3).unwrap(),
            unit_id(&signed, ProtocolVersion::V3).unwrap()
        );
        assert_eq!(
            unit_signable_hash(&unit, ProtocolVersion::V3).unwrap(),
            unit_signable_hash(&signed, ProtocolVersion::V3).unwrap()
        );
    }

    #[test]
    fn test_stripped_unit_degenerates_to_same_id() {
        let unit = sample_unit();
        let stripped = object(json!({
            "content_hash": unit_content_hash(&unit, ProtocolVersion::V3).unwrap(),
            "version": unit["version"],
            "alt": unit["alt"],
            "authors": [{"address": unit["authors"][0]["address"]}],
            "witness_list_unit": unit["witness_list_unit"],
            "parent_units": unit["parent_units"],
            "last_ball": unit["last_ball"],
            "last_ball_unit": unit["last_ball_unit"],
            "timestamp": unit["timestamp"],
        }));
        assert_eq!(
            unit_id(&stripped, ProtocolVersion::V3).unwrap(),
            unit_id(&unit, ProtocolVersion::V3).unwrap()
        );
    }

    #[test]
    fn test_timestamp_ignored_without_timestamp_version() {
        let mut unit = sample_unit();
        unit.insert("version".into(), json!("1.0"));
        let mut later = unit.clone();
        later.insert("timestamp".into(), json!(1_700_000_000u64));

        assert_eq!(
            unit_id(&unit, ProtocolVersion::V1).unwrap(),
            unit_id(&later, ProtocolVersion::V1).unwrap()
        );
        assert_eq!(
            unit_signable_hash(&unit, ProtocolVersion::V1).unwrap(),
            unit_signable_hash(&later, ProtocolVersion::V1).unwrap()
        );
        assert_ne!(
            unit_signable_hash(&unit, ProtocolVersion::V2).unwrap(),
            unit_signable_hash(&later, ProtocolVersion::V2).unwrap()
        );
    }

    #[test]
    fn test_missing_authors_rejected() {
        let mut unit = sample_unit();
        unit.remove("authors");
        assert_eq!(
            unit_id(&unit, ProtocolVersion::V3),
            Err(HashError::MissingField("authors"))
        );
    }

    #[test]
    fn test_witnesses_used_without_witness_list_unit() {
        let mut unit = sample_unit();
        unit.remove("witness_list_unit");
        assert_eq!(
            unit_id(&unit, ProtocolVersion::V3),
            Err(HashError::MissingField("witnesses"))
        );
        unit.insert("witnesses".into(), json!(["WPBI4QHZGJ4HFNATOMPM42HDH5QDFJRW"]));
        assert!(unit_id(&unit, ProtocolVersion::V3).is_ok());
    }
}
