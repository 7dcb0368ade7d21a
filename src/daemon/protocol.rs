//! NDJSON wire format: one JSON request per line in, one response per line out.
//!
//! ```text
//! -> {"id":"…","v":1,"method":"match","params":{"name":"Juan Perez"}}
//! <- {"id":"…","ok":true,"result":{…},"error":null,"meta":{"server_ms":0.4,"protocol_v":1}}
//! ```
//!
//! CHANGELOG:
//! - 10/19/2026 - Stable error codes, request builder for the client
//! - 01/10/2026 - Initial implementation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PROTOCOL_VERSION: u8 = 1;

/// Error codes carried in [`ErrorInfo::code`].
pub mod codes {
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";
    pub const ERROR: &str = "ERROR";
}

pub type Params = HashMap<String, serde_json::Value>;

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    /// Client-chosen request id, echoed back.
    pub id: String,
    #[serde(default = "default_version")]
    pub v: u8,
    /// One of `health`, `match`, `metrics`, `group`, `normalize`.
    pub method: String,
    #[serde(default)]
    pub params: Params,
}

fn default_version() -> u8 {
    PROTOCOL_VERSION
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub ok: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<ErrorInfo>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Time spent inside the daemon, in milliseconds.
    pub server_ms: f64,
    pub protocol_v: u8,
}

impl Request {
    /// New request with a random id.
    pub fn new(method: &str, params: Params) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            v: PROTOCOL_VERSION,
            method: method.to_string(),
            params,
        }
    }

    pub fn from_ndjson_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("Failed to parse request JSON")
    }

    pub fn to_ndjson_line(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

impl Response {
    pub fn success(id: String, result: serde_json::Value, server_ms: f64) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
            meta: ResponseMeta {
                server_ms,
                protocol_v: PROTOCOL_VERSION,
            },
        }
    }

    pub fn error(id: String, code: &str, message: String, server_ms: f64) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message,
                details: None,
            }),
            meta: ResponseMeta {
                server_ms,
                protocol_v: PROTOCOL_VERSION,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }

    pub fn from_ndjson_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("Failed to parse response JSON")
    }

    pub fn to_ndjson_line(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults_version_and_params() {
        let req = Request::from_ndjson_line(r#"{"id":"1","method":"health"}"#).unwrap();
        assert_eq!(req.v, PROTOCOL_VERSION);
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_request_roundtrip_keeps_id() {
        let mut params = Params::new();
        params.insert("name".to_string(), json!("Juan Perez"));
        let req = Request::new("match", params);
        assert!(!req.id.is_empty());

        let line = req.to_ndjson_line().unwrap();
        assert!(line.ends_with('\n'));
        let back = Request::from_ndjson_line(line.trim_end()).unwrap();
        assert_eq!(back.id, req.id);
        assert_eq!(back.params["name"], "Juan Perez");
    }

    #[test]
    fn test_error_response_shape() {
        let resp = Response::error("7".to_string(), codes::NOT_FOUND, "no group".to_string(), 0.5)
            .with_details(json!({"rep_id": 9}));
        let value: serde_json::Value =
            serde_json::from_str(resp.to_ndjson_line().unwrap().trim_end()).unwrap();

        assert_eq!(value["ok"], false);
        assert_eq!(value["error"]["code"], "NOT_FOUND");
        assert_eq!(value["error"]["details"]["rep_id"], 9);
        assert_eq!(value["meta"]["protocol_v"], 1);
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        assert!(Request::from_ndjson_line("{not json").is_err());
        assert!(Request::from_ndjson_line(r#"{"id":"1"}"#).is_err());
    }
}
