//! Deterministic source strings for hashing.
//!
//! # Variants
//! - **Tokenized**: `s`/`n`/`b` type tags, `[`/`]` array markers, sorted
//!   object keys, every token joined with `\0`
//! - **JSON**: strict JSON with sorted object keys and no whitespace
//!
//! Both reject `null`, `[]` and `{}` anywhere in the value.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::hashing::types::{HashError, HashResult};

/// Separator between tokens of the tokenized form. Never legal inside a token.
pub const STRING_JOIN_CHAR: char = '\0';

/// Source string flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serialization {
    Tokenized,
    Json,
}

/// Tokenized source string of `value`.
pub fn source_string(value: &Value) -> HashResult<String> {
    let mut tokens = Tokens::default();
    extract_tokens(value, &mut tokens)?;
    Ok(tokens.buf)
}

/// JSON source string of `value`.
pub fn json_source_string(value: &Value) -> HashResult<String> {
    let mut out = String::new();
    write_json(value, &mut out)?;
    Ok(out)
}

/// Source string in the requested flavour.
pub fn serialize(value: &Value, serialization: Serialization) -> HashResult<String> {
    match serialization {
        Serialization::Tokenized => source_string(value),
        Serialization::Json => json_source_string(value),
    }
}

/// Base64 SHA-256 of the canonical source string.
pub fn hash(value: &Value, serialization: Serialization) -> HashResult<String> {
    let source = serialize(value, serialization)?;
    Ok(STANDARD.encode(sha256(source.as_bytes())))
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[derive(Default)]
struct Tokens {
    buf: String,
    started: bool,
}

impl Tokens {
    fn push(&mut self, token: &str) {
        if self.started {
            self.buf.push(STRING_JOIN_CHAR);
        }
        self.buf.push_str(token);
        self.started = true;
    }
}

fn extract_tokens(value: &Value, tokens: &mut Tokens) -> HashResult<()> {
    match value {
        Value::Null => Err(HashError::Null { path: "$".into() }),
        Value::String(s) => {
            tokens.push("s");
            tokens.push(s);
            Ok(())
        }
        Value::Number(n) => {
            tokens.push("n");
            tokens.push(&format_number(n));
            Ok(())
        }
        Value::Bool(b) => {
            tokens.push("b");
            tokens.push(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::Array(items) => {
            if items.is_empty() {
                return Err(HashError::EmptyArray { path: "$".into() });
            }
            tokens.push("[");
            for (i, item) in items.iter().enumerate() {
                extract_tokens(item, tokens).map_err(|e| e.within(&format!("[{}]", i)))?;
            }
            tokens.push("]");
            Ok(())
        }
        Value::Object(map) => {
            if map.is_empty() {
                return Err(HashError::EmptyObject { path: "$".into() });
            }
            for key in sorted_keys(map) {
                tokens.push(key);
                extract_tokens(&map[key], tokens).map_err(|e| e.within(key))?;
            }
            Ok(())
        }
    }
}

fn write_json(value: &Value, out: &mut String) -> HashResult<()> {
    match value {
        Value::Null => Err(HashError::Null { path: "$".into() }),
        Value::String(s) => write_json_string(s, out),
        Value::Number(n) => {
            out.push_str(&format_number(n));
            Ok(())
        }
        Value::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::Array(items) => {
            if items.is_empty() {
                return Err(HashError::EmptyArray { path: "$".into() });
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json(item, out).map_err(|e| e.within(&format!("[{}]", i)))?;
            }
            out.push(']');
            Ok(())
        }
        Value::Object(map) => {
            if map.is_empty() {
                return Err(HashError::EmptyObject { path: "$".into() });
            }
            out.push('{');
            for (i, key) in sorted_keys(map).into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out)?;
                out.push(':');
                write_json(&map[key], out).map_err(|e| e.within(key))?;
            }
            out.push('}');
            Ok(())
        }
    }
}

fn write_json_string(s: &str, out: &mut String) -> HashResult<()> {
    let quoted = serde_json::to_string(s).map_err(|e| HashError::Serialization(e.to_string()))?;
    out.push_str(&quoted);
    Ok(())
}

/// Keys in UTF-16 code unit order, the order the network sorts by.
fn sorted_keys(map: &Map<String, Value>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
    keys
}

/// Render a number the way the network's reference implementation does:
/// integers without a fraction, shortest round-trip digits otherwise,
/// exponent notation outside `[1e-6, 1e21)`.
pub(crate) fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or_default();
    if f == 0.0 {
        return "0".to_string();
    }
    if f.fract() == 0.0 && f.abs() < 1e21 {
        return format!("{:.0}", f);
    }

    let sign = if f < 0.0 { "-" } else { "" };
    let scientific = format!("{:e}", f.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or_default();
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let exp_sign = if n - 1 < 0 { "-" } else { "+" };
        let fraction = if k > 1 { format!(".{}", &digits[1..]) } else { String::new() };
        format!("{}{}e{}{}", &digits[..1], fraction, exp_sign, (n - 1).abs())
    };
    format!("{}{}", sign, body)
}
