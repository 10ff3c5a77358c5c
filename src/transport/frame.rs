//! Wire frames.
//!
//! Every frame is a two-element JSON array `[type, body]`:
//! - `["request", {command, params?, tag}]`
//! - `["response", {command, tag, response?}]`
//! - `["justsaying", {subject, body?}]`

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};

use crate::transport::types::{TransportError, TransportResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub command: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub response: Value,
}

impl Response {
    /// Split the response into a result or the node's error.
    pub fn into_result(self) -> TransportResult<Value> {
        let error = self
            .response
            .get("error")
            .filter(|error| is_truthy(error))
            .map(|error| match error {
                Value::String(message) => message.clone(),
                other => other.to_string(),
            });
        match error {
            Some(message) => Err(TransportError::Rpc {
                message,
                code: self
                    .response
                    .get("error_code")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            None => Ok(self.response),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Justsaying {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request(Request),
    Response(Response),
    Justsaying(Justsaying),
}

impl Frame {
    pub fn request(command: &str, params: Option<Value>, tag: &str) -> Self {
        Frame::Request(Request {
            command: command.to_string(),
            params,
            tag: tag.to_string(),
        })
    }

    pub fn response(command: &str, tag: &str, response: Value) -> Self {
        Frame::Response(Response {
            command: command.to_string(),
            tag: tag.to_string(),
            response,
        })
    }

    /// Response carrying `{error: message}`.
    pub fn error(command: &str, tag: &str, message: &str) -> Self {
        Self::response(command, tag, json!({ "error": message }))
    }

    pub fn justsaying(subject: &str, body: Option<Value>) -> Self {
        Frame::Justsaying(Justsaying {
            subject: subject.to_string(),
            body,
        })
    }

    /// Correlation tag, if the frame has one.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Frame::Request(request) => Some(&request.tag),
            Frame::Response(response) => Some(&response.tag),
            Frame::Justsaying(_) => None,
        }
    }

    /// Decode a text frame.
    pub fn parse(text: &str) -> TransportResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))?;
        let Value::Array(mut parts) = value else {
            return Err(TransportError::Protocol("frame is not an array".into()));
        };
        if parts.len() != 2 {
            return Err(TransportError::Protocol(format!(
                "frame has {} elements, expected 2",
                parts.len()
            )));
        }
        let body = parts.pop().unwrap_or_default();
        let kind = parts.pop().unwrap_or_default();

        let decode = |e: serde_json::Error| TransportError::Protocol(e.to_string());
        match kind.as_str() {
            Some("request") => Ok(Frame::Request(serde_json::from_value(body).map_err(decode)?)),
            Some("response") => Ok(Frame::Response(serde_json::from_value(body).map_err(decode)?)),
            Some("justsaying") => {
                Ok(Frame::Justsaying(serde_json::from_value(body).map_err(decode)?))
            }
            _ => Err(TransportError::Protocol(format!("unknown frame type {}", kind))),
        }
    }

    /// Encode as a text frame.
    pub fn to_text(&self) -> TransportResult<String> {
        serde_json::to_string(self).map_err(|e| TransportError::Serialization(e.to_string()))
    }
}

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Frame::Request(body) => ("request", body).serialize(serializer),
            Frame::Response(body) => ("response", body).serialize(serializer),
            Frame::Justsaying(body) => ("justsaying", body).serialize(serializer),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
