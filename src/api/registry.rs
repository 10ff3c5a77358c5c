//! Token registry lookups.
//!
//! The registry is an autonomous agent whose state vars map assets to
//! symbols (`a2s_<asset>`) and symbols to assets (`s2a_<symbol>`).

use serde_json::{json, Value};

use crate::address::is_valid_address;
use crate::api::client::Client;
use crate::transport::TransportResult;

/// Symbol of the native currency.
pub const BYTES_SYMBOL: &str = "GBYTE";

const BYTE_SYMBOLS: [&str; 4] = ["GBYTE", "MBYTE", "KBYTE", "BYTE"];

impl Client {
    /// Symbol registered for `asset`. `None` and `"base"` are bytes.
    ///
    /// Unregistered assets fall back to a short prefix of the asset id.
    /// Returns `None` when the registry address is invalid.
    pub async fn symbol_by_asset(
        &self,
        registry: &str,
        asset: Option<&str>,
    ) -> TransportResult<Option<String>> {
        let asset = match asset {
            None | Some("base") => return Ok(Some(BYTES_SYMBOL.to_string())),
            Some(asset) => asset,
        };
        if !is_valid_address(registry) {
            return Ok(None);
        }
        let vars = self.registry_vars(registry).await?;
        match vars.get(format!("a2s_{}", asset)) {
            Some(symbol) => Ok(Some(var_text(symbol))),
            None => Ok(Some(fallback_symbol(asset))),
        }
    }

    /// Asset registered under `symbol`. Byte denominations have no asset.
    pub async fn asset_by_symbol(
        &self,
        registry: &str,
        symbol: &str,
    ) -> TransportResult<Option<String>> {
        if BYTE_SYMBOLS.contains(&symbol) || !is_valid_address(registry) {
            return Ok(None);
        }
        let vars = self.registry_vars(registry).await?;
        Ok(vars.get(format!("s2a_{}", symbol)).map(var_text))
    }

    async fn registry_vars(&self, registry: &str) -> TransportResult<Value> {
        self.get_aa_state_vars(json!({ "address": registry })).await
    }
}

fn var_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// First six characters of the asset id after dropping its first `+` or `=`.
fn fallback_symbol(asset: &str) -> String {
    let trimmed = match asset.find(['+', '=']) {
        Some(index) => format!("{}{}", &asset[..index], &asset[index + 1..]),
        None => asset.to_string(),
    };
    trimmed.chars().take(6).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_symbol_drops_first_marker_only() {
        assert_eq!(fallback_symbol("n9y3VomFeWFeZZ2PcSEcmyBb/bI7kzZduBJigNetnkY="), "n9y3Vo");
        assert_eq!(fallback_symbol("ab+cdefgh"), "abcdef");
        assert_eq!(fallback_symbol("a+b+cdefg"), "ab+cde");
        assert_eq!(fallback_symbol("=+abc"), "+abc");
        assert_eq!(fallback_symbol("abc"), "abc");
    }

    #[test]
    fn test_var_text() {
        assert_eq!(var_text(&json!("USDC")), "USDC");
        assert_eq!(var_text(&json!(5)), "5");
    }
}
