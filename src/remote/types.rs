//! Wire types for the provisioning backend protocol.
//!
//! The backend speaks a JSON-RPC-shaped protocol over HTTP POST: one
//! request object per call, one response object with either `result` or
//! `error` populated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Protocol version tag carried by every message.
pub const PROTOCOL_VERSION: &str = "2.0";

/// A request to the provisioning backend.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request id, echoed back in the response.
    pub id: String,
    /// Method name, e.g. `aws.create_resource`.
    pub method: String,
    /// Method parameters.
    pub params: serde_json::Value,
}

impl RpcRequest {
    /// Builds a request with a fresh id.
    #[must_use]
    pub fn new(method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION,
            id: Uuid::new_v4().to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// A response from the provisioning backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    /// Protocol version.
    #[serde(default)]
    pub jsonrpc: String,
    /// Echoed request id.
    #[serde(default)]
    pub id: String,
    /// Successful result payload.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error payload; mutually exclusive with `result`.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_shape() {
        let request = RpcRequest::new(
            "aws.get_resource",
            serde_json::json!({ "project_id": "p-1", "resource_id": "i-1" }),
        );
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "aws.get_resource");
        assert_eq!(value["params"]["project_id"], "p-1");
        assert!(value["id"].is_string());
    }

    #[test]
    fn test_response_error_and_result_are_optional() {
        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"1","result":{"ok":true}}"#).unwrap();
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }
}
