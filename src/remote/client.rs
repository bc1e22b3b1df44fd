//! Resilient client for the provisioning backend.
//!
//! Every resource operation runs as circuit breaker around retry around a
//! single HTTP send, so retries burn against one breaker verdict and a
//! long outage fails fast instead of stacking backoff sleeps.
//!
//! All transport, protocol-error, and malformed-payload failures normalize
//! to [`RemoteError::ConnectionFailed`]; callers see one failure mode for
//! "the backend did not give a usable answer".

use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{RemoteError, Result};
use crate::state::{Resource, ResourceConfig, ResourceFilter, ResourceStatus, ResourceUpdate};

use super::breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::retry::{RetryConfig, RetryPolicy};
use super::types::{RpcRequest, RpcResponse};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the provisioning backend.
#[derive(Debug, Clone)]
pub struct ProvisioningClient {
    /// HTTP client.
    client: Client,
    /// Backend endpoint, without trailing slash.
    endpoint: String,
    /// Shared circuit breaker.
    breaker: Arc<CircuitBreaker>,
    /// Retry policy.
    retry: RetryPolicy,
}

impl ProvisioningClient {
    /// Creates a client with default resilience settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_config(
            endpoint,
            DEFAULT_TIMEOUT_SECS,
            CircuitBreakerConfig::default(),
            RetryConfig::default(),
        )
    }

    /// Creates a client with explicit timeout, breaker, and retry settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(
        endpoint: &str,
        timeout_secs: u64,
        breaker_config: CircuitBreakerConfig,
        retry_config: RetryConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RemoteError::connection(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            breaker: Arc::new(CircuitBreaker::new(breaker_config)),
            retry: RetryPolicy::new(retry_config),
        })
    }

    /// Creates a resource.
    pub async fn create_resource(
        &self,
        project_id: &str,
        config: &ResourceConfig,
    ) -> Result<Resource> {
        let params = serde_json::json!({
            "project_id": project_id,
            "resource_type": config.resource_type,
            "resource_name": config.name,
            "properties": config.properties,
            "tags": config.tags,
        });

        let result = self.call_required("aws.create_resource", params).await?;
        Self::parse_resource(&result, project_id)
    }

    /// Fetches a resource. A null result means the resource does not exist.
    pub async fn get_resource(
        &self,
        project_id: &str,
        resource_id: &str,
    ) -> Result<Option<Resource>> {
        let params = serde_json::json!({
            "project_id": project_id,
            "resource_id": resource_id,
        });

        match self.call("aws.get_resource", params).await? {
            None => Ok(None),
            Some(result) => Ok(Some(Self::parse_resource(&result, project_id)?)),
        }
    }

    /// Lists resources, optionally filtered.
    pub async fn list_resources(
        &self,
        project_id: &str,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<Resource>> {
        let mut params = serde_json::json!({ "project_id": project_id });

        if let Some(filter) = filter {
            let map = params
                .as_object_mut()
                .ok_or_else(|| RemoteError::connection("params not an object"))?;
            if let Some(resource_type) = &filter.resource_type {
                map.insert(
                    String::from("resource_type"),
                    serde_json::json!(resource_type),
                );
            }
            if let Some(status) = filter.status {
                map.insert(String::from("status"), serde_json::json!(status));
            }
            if let Some(tags) = &filter.tags {
                map.insert(String::from("tags"), serde_json::json!(tags));
            }
            if let Some(region) = &filter.region {
                map.insert(String::from("region"), serde_json::json!(region));
            }
        }

        let result = self.call("aws.list_resources", params).await?;
        let mut resources = Vec::new();
        if let Some(items) = result
            .as_ref()
            .and_then(|r| r.get("resources"))
            .and_then(serde_json::Value::as_array)
        {
            for item in items {
                resources.push(Self::parse_resource(item, project_id)?);
            }
        }
        Ok(resources)
    }

    /// Applies updates to a resource.
    pub async fn update_resource(
        &self,
        project_id: &str,
        resource_id: &str,
        updates: &ResourceUpdate,
    ) -> Result<Resource> {
        let params = serde_json::json!({
            "project_id": project_id,
            "resource_id": resource_id,
            "updates": updates,
        });

        let result = self.call_required("aws.update_resource", params).await?;
        Self::parse_resource(&result, project_id)
    }

    /// Deletes a resource. Returns whether the backend reported success.
    pub async fn delete_resource(&self, project_id: &str, resource_id: &str) -> Result<bool> {
        let params = serde_json::json!({
            "project_id": project_id,
            "resource_id": resource_id,
        });

        let result = self.call("aws.delete_resource", params).await?;
        Ok(result
            .and_then(|r| r.get("success").and_then(serde_json::Value::as_bool))
            .unwrap_or(false))
    }

    /// Fetches the current status of a resource.
    ///
    /// A missing or unrecognized status reads as [`ResourceStatus::Error`].
    pub async fn get_resource_status(
        &self,
        project_id: &str,
        resource_id: &str,
    ) -> Result<ResourceStatus> {
        let params = serde_json::json!({
            "project_id": project_id,
            "resource_id": resource_id,
        });

        let result = self.call("aws.get_resource_status", params).await?;
        let status = result
            .as_ref()
            .and_then(|r| r.get("status"))
            .and_then(serde_json::Value::as_str)
            .map_or(ResourceStatus::Error, ResourceStatus::from_wire);
        Ok(status)
    }

    /// Probes backend health. Any failure reads as unhealthy rather than
    /// propagating; the probe bypasses the breaker and retry layers.
    pub async fn health_check(&self) -> bool {
        match self.send("health.check", serde_json::json!({})).await {
            Ok(result) => result
                .and_then(|r| {
                    r.get("status")
                        .and_then(serde_json::Value::as_str)
                        .map(|s| s == "healthy")
                })
                .unwrap_or(false),
            Err(e) => {
                warn!("Health check failed: {e}");
                false
            }
        }
    }

    /// Fetches backend build and version information.
    pub async fn server_info(&self) -> Result<serde_json::Value> {
        let result = self.send("server.info", serde_json::json!({})).await?;
        Ok(result.unwrap_or_else(|| serde_json::json!({})))
    }

    /// Current circuit breaker state, for diagnostics.
    pub fn breaker_state(&self) -> Result<super::breaker::CircuitState> {
        self.breaker.current_state()
    }

    /// Runs a method under the full resilience stack.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        self.breaker
            .call(|| self.retry.execute(|| self.send(method, params.clone())))
            .await
    }

    /// As [`Self::call`], but an absent result is a protocol violation.
    async fn call_required(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.call(method, params).await?.ok_or_else(|| {
            RemoteError::connection(format!("Backend returned no result for {method}")).into()
        })
    }

    /// One HTTP round trip. Every failure mode comes back as
    /// [`RemoteError::ConnectionFailed`].
    async fn send(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        let request = RpcRequest::new(method, params);
        debug!("Sending {method} request {}", request.id);

        let response = self
            .client
            .post(format!("{}/rpc", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                RemoteError::connection(format!("HTTP error communicating with backend: {e}"))
            })?;

        let response = response.error_for_status().map_err(|e| {
            RemoteError::connection(format!("Backend returned error status: {e}"))
        })?;

        let rpc: RpcResponse = response.json().await.map_err(|e| {
            RemoteError::connection(format!("Invalid JSON response from backend: {e}"))
        })?;

        if let Some(error) = rpc.error {
            return Err(RemoteError::connection(format!("Backend error: {error}")).into());
        }

        let result = match rpc.result {
            Some(serde_json::Value::Null) | None => None,
            Some(value) => Some(value),
        };
        Ok(result)
    }

    /// Builds a [`Resource`] from a backend payload.
    ///
    /// `id`, `type`, and `name` are required; region defaults, timestamps
    /// fall back to now, and unknown statuses read as errors.
    fn parse_resource(data: &serde_json::Value, project_id: &str) -> Result<Resource> {
        let required = |key: &str| -> Result<String> {
            data.get(key)
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| {
                    RemoteError::connection(format!(
                        "Invalid resource data from backend: missing {key}"
                    ))
                    .into()
                })
        };

        let properties = data
            .get("properties")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                RemoteError::connection(format!("Invalid resource data from backend: {e}"))
            })?
            .unwrap_or_default();
        let tags = data
            .get("tags")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                RemoteError::connection(format!("Invalid resource data from backend: {e}"))
            })?
            .unwrap_or_default();

        let timestamp = |key: &str| -> DateTime<Utc> {
            data.get(key)
                .and_then(serde_json::Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc))
        };

        let resource = Resource {
            id: required("id")?,
            project_id: project_id.to_string(),
            resource_type: required("type")?,
            name: required("name")?,
            region: data
                .get("region")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("us-east-1")
                .to_string(),
            properties,
            tags,
            status: data
                .get("status")
                .and_then(serde_json::Value::as_str)
                .map_or(ResourceStatus::Error, ResourceStatus::from_wire),
            created_at: timestamp("created_at"),
            updated_at: timestamp("updated_at"),
            arn: data
                .get("arn")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
        };

        debug!(
            "Parsed resource {} ({}) from backend",
            resource.id, resource.resource_type
        );
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackweaverError;
    use crate::remote::breaker::CircuitState;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client(endpoint: &str, max_retries: u32, failure_threshold: u32) -> ProvisioningClient {
        ProvisioningClient::with_config(
            endpoint,
            5,
            CircuitBreakerConfig {
                failure_threshold,
                recovery_timeout: Duration::from_secs(60),
                success_threshold: 1,
            },
            RetryConfig {
                max_retries,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                exponential_base: 2.0,
                jitter: false,
            },
        )
        .unwrap()
    }

    fn resource_body(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "type": "EC2::Instance",
            "name": "web",
            "region": "eu-west-1",
            "properties": { "instanceType": "t3.micro" },
            "tags": { "Project": "p-1" },
            "status": "active",
            "created_at": "2026-08-01T12:00:00Z",
            "updated_at": "2026-08-02T12:00:00Z",
            "arn": "arn:aws:ec2:eu-west-1:123456789012:instance/i-1"
        })
    }

    fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": result
        }))
    }

    #[tokio::test]
    async fn test_retries_transient_failures_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(rpc_result(resource_body("i-1")))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server.uri(), 3, 10);
        let resource = client.get_resource("p-1", "i-1").await.unwrap().unwrap();

        assert_eq!(resource.id, "i-1");
        assert_eq!(resource.status, ResourceStatus::Active);
        assert_eq!(resource.region, "eu-west-1");
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast_without_calling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = fast_client(&server.uri(), 0, 1);

        client
            .get_resource("p-1", "i-1")
            .await
            .expect_err("backend down");
        assert_eq!(client.breaker_state().unwrap(), CircuitState::Open);

        let before = server.received_requests().await.unwrap().len();
        client
            .get_resource("p-1", "i-1")
            .await
            .expect_err("breaker open");
        let after = server.received_requests().await.unwrap().len();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_protocol_error_normalizes_to_connection_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": "1",
                "error": { "code": -32000, "message": "resource type unsupported" }
            })))
            .mount(&server)
            .await;

        let client = fast_client(&server.uri(), 0, 10);
        let err = client
            .create_resource(
                "p-1",
                &ResourceConfig {
                    resource_type: String::from("EC2::Instance"),
                    name: String::from("web"),
                    properties: std::collections::HashMap::new(),
                    tags: std::collections::HashMap::new(),
                },
            )
            .await
            .expect_err("protocol error");

        assert!(matches!(
            err,
            StackweaverError::Remote(RemoteError::ConnectionFailed { .. })
        ));
        assert!(err.to_string().contains("resource type unsupported"));
    }

    #[tokio::test]
    async fn test_get_resource_null_result_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(rpc_result(serde_json::Value::Null))
            .mount(&server)
            .await;

        let client = fast_client(&server.uri(), 0, 10);
        let resource = client.get_resource("p-1", "i-missing").await.unwrap();
        assert!(resource.is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_backend_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(rpc_result(serde_json::json!({ "success": true })))
            .mount(&server)
            .await;

        let client = fast_client(&server.uri(), 0, 10);
        assert!(client.delete_resource("p-1", "i-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check_swallows_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = fast_client(&server.uri(), 0, 10);
        assert!(!client.health_check().await);
        // Health probes bypass the breaker.
        assert_eq!(client.breaker_state().unwrap(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_unknown_status_reads_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(rpc_result(serde_json::json!({ "status": "melting" })))
            .mount(&server)
            .await;

        let client = fast_client(&server.uri(), 0, 10);
        let status = client.get_resource_status("p-1", "i-1").await.unwrap();
        assert_eq!(status, ResourceStatus::Error);
    }
}
