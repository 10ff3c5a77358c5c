//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the node URL scheme
//! - Validate value ranges (timings > 0, heartbeat windows ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let transport = &config.transport;

    match Url::parse(&transport.url) {
        Ok(url) if url.scheme() == "ws" || url.scheme() == "wss" => {}
        Ok(url) => errors.push(ValidationError::new(
            "transport.url",
            format!("unsupported scheme '{}', expected ws or wss", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("transport.url", e.to_string())),
    }

    let timings = [
        ("transport.reconnect_delay_ms", transport.reconnect_delay_ms),
        ("transport.connect_timeout_ms", transport.connect_timeout_ms),
        ("transport.liveness_timeout_ms", transport.liveness_timeout_ms),
        ("transport.response_timeout_ms", transport.response_timeout_ms),
        ("transport.pause_threshold_ms", transport.pause_threshold_ms),
        ("transport.tick_interval_ms", transport.tick_interval_ms),
    ];
    for (field, value) in timings {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }
    if transport.request_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "transport.request_timeout_ms",
            "must be greater than zero",
        ));
    }
    if transport.response_timeout_ms <= transport.liveness_timeout_ms {
        errors.push(ValidationError::new(
            "transport.response_timeout_ms",
            "must exceed liveness_timeout_ms",
        ));
    }
    if transport.notification_capacity == 0 {
        errors.push(ValidationError::new(
            "transport.notification_capacity",
            "must be greater than zero",
        ));
    }

    if config.composer.alt.is_empty() {
        errors.push(ValidationError::new("composer.alt", "must not be empty"));
    }
    if config.composer.spend_unconfirmed.is_empty() {
        errors.push(ValidationError::new(
            "composer.spend_unconfirmed",
            "must not be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
