//! Size accounting used for commissions.

use serde_json::{Map, Value};

use crate::hashing::types::{HashError, HashResult};
use crate::hashing::version::ProtocolVersion;

/// Allowance for the parent units list (two base64 hashes).
pub const PARENT_UNITS_SIZE: usize = 2 * 44;

/// Allowance for the `parent_units` key in versions that measure keys.
pub const PARENT_UNITS_KEY_SIZE: usize = "parent_units".len();

/// Fixed size of any number.
pub const NUMBER_SIZE: usize = 8;

/// Fields that are never part of the measured headers.
const NON_HEADER_FIELDS: [&str; 9] = [
    "unit",
    "headers_commission",
    "payload_commission",
    "oversize_fee",
    "tps_fee",
    "actual_tps_fee",
    "main_chain_index",
    "messages",
    "parent_units",
];

/// Length of a value: string length in UTF-16 units, 8 per number, 1 per
/// boolean, 0 for null; containers sum their elements (and keys when
/// `with_keys`).
pub fn get_length(value: &Value, with_keys: bool) -> usize {
    match value {
        Value::Null => 0,
        Value::String(s) => utf16_len(s),
        Value::Number(_) => NUMBER_SIZE,
        Value::Bool(_) => 1,
        Value::Array(items) => items.iter().map(|item| get_length(item, with_keys)).sum(),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| {
                let key_len = if with_keys { utf16_len(key) } else { 0 };
                key_len + get_length(item, with_keys)
            })
            .sum(),
    }
}

/// Headers commission of a full unit.
pub fn headers_size(unit: &Map<String, Value>, version: ProtocolVersion) -> HashResult<usize> {
    if unit.contains_key("content_hash") {
        return Err(HashError::StrippedUnit);
    }
    let with_keys = version.length_rule().with_keys();
    let measured: usize = unit
        .iter()
        .filter(|(key, _)| !NON_HEADER_FIELDS.contains(&key.as_str()))
        .filter(|(key, _)| version.has_timestamp() || key.as_str() != "timestamp")
        .map(|(key, value)| {
            let key_len = if with_keys { utf16_len(key) } else { 0 };
            key_len + get_length(value, with_keys)
        })
        .sum();
    let parents_allowance = if with_keys {
        PARENT_UNITS_SIZE + PARENT_UNITS_KEY_SIZE
    } else {
        PARENT_UNITS_SIZE
    };
    Ok(measured + parents_allowance)
}

/// Payload commission of a full unit.
pub fn total_payload_size(unit: &Map<String, Value>, version: ProtocolVersion) -> HashResult<usize> {
    if unit.contains_key("content_hash") {
        return Err(HashError::StrippedUnit);
    }
    let messages = unit.get("messages").ok_or(HashError::MissingField("messages"))?;
    Ok(get_length(messages, version.length_rule().with_keys()))
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}
