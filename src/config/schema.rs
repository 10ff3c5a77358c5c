//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::hashing::ProtocolVersion;

/// Root configuration for the light client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Node connection and heartbeat settings.
    pub transport: TransportConfig,

    /// Unit composition settings.
    pub composer: ComposerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Node WebSocket URL (`ws://` or `wss://`).
    pub url: String,

    /// Reconnect after an unexpected close.
    pub reconnect: bool,

    /// Fixed delay before reconnecting, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// WebSocket handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Skip heartbeats when any frame arrived within this window.
    pub liveness_timeout_ms: u64,

    /// How long an outstanding heartbeat may wait for its response.
    pub response_timeout_ms: u64,

    /// A gap between timer wakes longer than this means the process was suspended.
    pub pause_threshold_ms: u64,

    /// Heartbeat timer period in milliseconds.
    pub tick_interval_ms: u64,

    /// Default per-request timeout. `None` waits indefinitely.
    pub request_timeout_ms: Option<u64>,

    /// Fail requests still pending when the connection closes.
    pub reject_pending_on_close: bool,

    /// Buffered notifications per subscriber.
    pub notification_capacity: usize,
}

impl TransportConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn pause_threshold(&self) -> Duration {
        Duration::from_millis(self.pause_threshold_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "wss://obyte.org/bb".to_string(),
            reconnect: true,
            reconnect_delay_ms: 1_000,
            connect_timeout_ms: 10_000,
            liveness_timeout_ms: 10_000,
            response_timeout_ms: 60_000,
            pause_threshold_ms: 20_000,
            tick_interval_ms: 10_000,
            request_timeout_ms: None,
            reject_pending_on_close: false,
            notification_capacity: 256,
        }
    }
}

/// Unit composition configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Protocol version used for new units.
    pub version: ProtocolVersion,

    /// Testnet units carry a `t` version suffix.
    pub testnet: bool,

    /// Network alt identifier.
    pub alt: String,

    /// Bytes added to the coin selection target to cover commissions.
    pub fee_allowance: u64,

    /// Ledger height ceiling passed to coin selection.
    pub last_ball_mci: u64,

    /// Which unconfirmed outputs coin selection may spend.
    pub spend_unconfirmed: String,
}

impl ComposerConfig {
    /// Version string stamped into units.
    pub fn version_string(&self) -> String {
        self.version.version_string(self.testnet)
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::default(),
            testnet: false,
            alt: "1".to_string(),
            fee_allowance: 1_000,
            last_ball_mci: 1_000_000_000,
            spend_unconfirmed: "own".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.transport.liveness_timeout(), Duration::from_secs(10));
        assert_eq!(config.transport.response_timeout(), Duration::from_secs(60));
        assert_eq!(config.transport.pause_threshold(), Duration::from_secs(20));
        assert_eq!(config.transport.reconnect_delay(), Duration::from_secs(1));
        assert!(!config.transport.reject_pending_on_close);
        assert_eq!(config.transport.request_timeout(), None);
        assert_eq!(config.composer.version_string(), "3.0");
        assert_eq!(config.composer.fee_allowance, 1_000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [transport]
            url = "ws://127.0.0.1:6611"

            [composer]
            version = "v2"
            testnet = true
            "#,
        )
        .unwrap();
        assert_eq!(config.transport.url, "ws://127.0.0.1:6611");
        assert_eq!(config.transport.tick_interval_ms, 10_000);
        assert_eq!(config.composer.version, ProtocolVersion::V2);
        assert_eq!(config.composer.version_string(), "2.0t");
        assert_eq!(config.observability.log_level, "info");
    }
}
