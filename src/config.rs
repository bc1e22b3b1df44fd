//! Configuration loading and validation.
//!
//! Two YAML surfaces live here: the settings file describing the backend
//! endpoint, resilience knobs, and approval policy; and desired-state
//! documents describing the resources a project should converge to.
//! Environment variables override the settings file where noted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;

use crate::approval::{ApprovalRule, ApprovalWorkflowConfig};
use crate::error::{ConfigError, Result, StackweaverError};
use crate::remote::{CircuitBreakerConfig, RetryConfig};
use crate::state::{InfrastructureState, Resource, ResourceStatus, StateMetadata};

/// Environment variable overriding the backend endpoint.
pub const ENDPOINT_ENV: &str = "STACKWEAVER_ENDPOINT";

/// Root settings structure, mapped from the settings YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    /// Project identity.
    #[validate(nested)]
    pub project: ProjectSettings,
    /// Provisioning backend connection and resilience settings.
    #[serde(default)]
    #[validate(nested)]
    pub remote: RemoteSettings,
    /// Approval workflow settings.
    #[serde(default)]
    pub approval: ApprovalSettings,
}

/// Project identity settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProjectSettings {
    /// Project id used for state and backend calls.
    #[validate(length(min = 1, message = "project id must not be empty"))]
    pub id: String,
    /// Default user recorded as plan author.
    #[serde(default)]
    pub default_user: Option<String>,
}

/// Backend connection and resilience settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RemoteSettings {
    /// Backend endpoint URL.
    #[validate(url(message = "endpoint must be a valid URL"))]
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, message = "timeout must be at least one second"))]
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base retry delay in seconds.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    /// Retry delay cap in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
    /// Exponential growth factor for retry delays.
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,
    /// Whether retry delays are jittered.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before probing.
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
    /// Half-open successes required to close the circuit.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

/// Approval workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSettings {
    /// Timeout window for new approval requests, in minutes.
    #[serde(default = "default_approval_timeout_minutes")]
    pub default_timeout_minutes: u64,
    /// Master switch for auto-approval.
    #[serde(default)]
    pub auto_approval_enabled: bool,
    /// Auto-approval rules.
    #[serde(default)]
    pub approval_rules: Vec<ApprovalRule>,
}

const fn default_timeout_secs() -> u64 {
    30
}
const fn default_max_retries() -> u32 {
    3
}
const fn default_base_delay_secs() -> f64 {
    1.0
}
const fn default_max_delay_secs() -> f64 {
    60.0
}
const fn default_exponential_base() -> f64 {
    2.0
}
const fn default_jitter() -> bool {
    true
}
const fn default_failure_threshold() -> u32 {
    5
}
const fn default_recovery_timeout_secs() -> u64 {
    60
}
const fn default_success_threshold() -> u32 {
    3
}
const fn default_approval_timeout_minutes() -> u64 {
    60
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: String::from("http://localhost:8080"),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            exponential_base: default_exponential_base(),
            jitter: default_jitter(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            default_timeout_minutes: default_approval_timeout_minutes(),
            auto_approval_enabled: false,
            approval_rules: Vec::new(),
        }
    }
}

impl Settings {
    /// Loads settings from a YAML file, applies environment overrides, and
    /// validates the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading settings from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_yaml::from_str(&content).map_err(|e| {
            StackweaverError::from(ConfigError::ParseError {
                message: format!("YAML parse error in {}: {e}", path.display()),
            })
        })?;

        settings.apply_env_overrides();
        settings.validate().map_err(|e| {
            StackweaverError::from(ConfigError::ValidationError {
                message: e.to_string(),
            })
        })?;

        debug!("Loaded settings for project: {}", settings.project.id);
        Ok(settings)
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            debug!("Overriding backend endpoint from {ENDPOINT_ENV}");
            self.remote.endpoint = endpoint;
        }
    }
}

impl RemoteSettings {
    /// Converts to the retry policy configuration.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs_f64(self.base_delay_secs),
            max_delay: Duration::from_secs_f64(self.max_delay_secs),
            exponential_base: self.exponential_base,
            jitter: self.jitter,
        }
    }

    /// Converts to the circuit breaker configuration.
    #[must_use]
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            success_threshold: self.success_threshold,
        }
    }
}

impl ApprovalSettings {
    /// Converts to the approval workflow configuration.
    #[must_use]
    pub fn workflow_config(&self) -> ApprovalWorkflowConfig {
        ApprovalWorkflowConfig {
            default_timeout_minutes: self.default_timeout_minutes,
            auto_approval_enabled: self.auto_approval_enabled,
            approval_rules: self.approval_rules.clone(),
        }
    }
}

/// A desired-state document as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredStateDoc {
    /// Owning project.
    pub project_id: String,
    /// Resources the project should converge to.
    pub resources: Vec<DesiredResource>,
}

/// One resource entry in a desired-state document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredResource {
    /// Resource id.
    pub id: String,
    /// Namespaced resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name.
    pub name: String,
    /// Region; defaults to `us-east-1`.
    #[serde(default = "default_region")]
    pub region: String,
    /// Resource properties.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    /// Resource tags.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_region() -> String {
    String::from("us-east-1")
}

/// Loads a desired-state YAML document into a state snapshot.
pub fn load_desired_state(path: impl AsRef<Path>, author: &str) -> Result<InfrastructureState> {
    let path = path.as_ref();
    info!("Loading desired state from: {}", path.display());

    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let content = std::fs::read_to_string(path)?;
    let doc: DesiredStateDoc = serde_yaml::from_str(&content).map_err(|e| {
        StackweaverError::from(ConfigError::ParseError {
            message: format!("YAML parse error in {}: {e}", path.display()),
        })
    })?;

    Ok(doc.into_state(author))
}

impl DesiredStateDoc {
    /// Converts the document into a state snapshot authored by `author`.
    #[must_use]
    pub fn into_state(self, author: &str) -> InfrastructureState {
        let now = chrono::Utc::now();
        let project_id = self.project_id;
        let resources = self
            .resources
            .into_iter()
            .map(|r| Resource {
                id: r.id,
                project_id: project_id.clone(),
                resource_type: r.resource_type,
                name: r.name,
                region: r.region,
                properties: r.properties,
                tags: r.tags,
                status: ResourceStatus::Active,
                created_at: now,
                updated_at: now,
                arn: None,
            })
            .collect();

        InfrastructureState::new(
            &project_id,
            resources,
            StateMetadata {
                last_modified_by: author.to_string(),
                change_description: String::from("desired state document"),
                change_plan_id: None,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS_YAML: &str = r"
project:
  id: payments
  default_user: alice
remote:
  endpoint: http://backend.internal:8080
  max_retries: 5
approval:
  default_timeout_minutes: 30
  auto_approval_enabled: true
  approval_rules:
    - max_risk_level: low
      resource_types: []
";

    #[test]
    fn test_settings_defaults_fill_in() {
        let settings: Settings = serde_yaml::from_str(SETTINGS_YAML).unwrap();
        settings.validate().unwrap();

        assert_eq!(settings.project.id, "payments");
        assert_eq!(settings.remote.max_retries, 5);
        assert_eq!(settings.remote.timeout_secs, 30);
        assert_eq!(settings.remote.failure_threshold, 5);
        assert!(settings.remote.jitter);
        assert_eq!(settings.approval.default_timeout_minutes, 30);
        assert_eq!(settings.approval.approval_rules.len(), 1);
    }

    #[test]
    fn test_invalid_endpoint_fails_validation() {
        let mut settings: Settings = serde_yaml::from_str(SETTINGS_YAML).unwrap();
        settings.remote.endpoint = String::from("not a url");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_conversion_to_runtime_configs() {
        let settings: Settings = serde_yaml::from_str(SETTINGS_YAML).unwrap();

        let retry = settings.remote.retry_config();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay, Duration::from_secs(1));

        let breaker = settings.remote.breaker_config();
        assert_eq!(breaker.recovery_timeout, Duration::from_secs(60));

        let workflow = settings.approval.workflow_config();
        assert!(workflow.auto_approval_enabled);
    }

    #[test]
    fn test_desired_state_document_parses() {
        let yaml = r#"
project_id: payments
resources:
  - id: vpc-1
    type: VPC::VPC
    name: main
    properties:
      cidrBlock: "10.0.0.0/16"
  - id: subnet-1
    type: VPC::Subnet
    name: private-a
    region: eu-west-1
    properties:
      vpcId: vpc-1
    tags:
      Tier: private
"#;
        let doc: DesiredStateDoc = serde_yaml::from_str(yaml).unwrap();
        let state = doc.into_state("alice");

        assert_eq!(state.project_id, "payments");
        assert_eq!(state.resource_count(), 2);
        let subnet = state.resource("subnet-1").unwrap();
        assert_eq!(subnet.region, "eu-west-1");
        assert_eq!(subnet.tags.get("Tier").map(String::as_str), Some("private"));
        let vpc = state.resource("vpc-1").unwrap();
        assert_eq!(vpc.region, "us-east-1");
        assert_eq!(state.metadata.last_modified_by, "alice");
    }
}
