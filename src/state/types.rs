//! Infrastructure state types.
//!
//! These types represent provisioned cloud resources and immutable state
//! snapshots for a project, used by the planner to compute diffs and by the
//! orchestrator to record the outcome of executed plans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current version prefix of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Status of a provisioned resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Resource is being created.
    Creating,
    /// Resource is active and usable.
    Active,
    /// Resource is being updated.
    Updating,
    /// Resource is being deleted.
    Deleting,
    /// Resource is in an error state.
    Error,
    /// Resource is stopped.
    Stopped,
}

/// A provisioned cloud resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier within the project.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Namespaced resource type, e.g. `EC2::Instance`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Human-readable name.
    pub name: String,
    /// Region the resource lives in.
    pub region: String,
    /// Opaque resource properties.
    pub properties: HashMap<String, serde_json::Value>,
    /// Resource tags.
    pub tags: HashMap<String, String>,
    /// Current status.
    pub status: ResourceStatus,
    /// When the resource was created.
    pub created_at: DateTime<Utc>,
    /// When the resource was last updated.
    pub updated_at: DateTime<Utc>,
    /// Provider ARN, if assigned.
    #[serde(default)]
    pub arn: Option<String>,
}

/// Configuration for creating or updating a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceConfig {
    /// Namespaced resource type.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name.
    pub name: String,
    /// Resource properties.
    pub properties: HashMap<String, serde_json::Value>,
    /// Resource tags.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Filter criteria for resource listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceFilter {
    /// Restrict to a resource type.
    #[serde(default)]
    pub resource_type: Option<String>,
    /// Restrict to a status.
    #[serde(default)]
    pub status: Option<ResourceStatus>,
    /// Restrict to resources carrying all of these tags.
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    /// Restrict to a region.
    #[serde(default)]
    pub region: Option<String>,
}

/// Updates to apply to an existing resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUpdate {
    /// Property changes.
    #[serde(default)]
    pub properties: Option<HashMap<String, serde_json::Value>>,
    /// Tag changes.
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

/// Metadata attached to a state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMetadata {
    /// Who produced this version of the state.
    pub last_modified_by: String,
    /// Description of the change that produced it.
    pub change_description: String,
    /// Change plan that drove the transition, if any.
    #[serde(default)]
    pub change_plan_id: Option<String>,
}

/// An immutable snapshot of a project's infrastructure.
///
/// A new version is always a new value; snapshots are never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfrastructureState {
    /// Owning project.
    pub project_id: String,
    /// State version string.
    pub version: String,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Resources in the snapshot.
    pub resources: Vec<Resource>,
    /// Snapshot metadata.
    pub metadata: StateMetadata,
}

impl Resource {
    /// Converts this resource into its configuration view.
    #[must_use]
    pub fn to_config(&self) -> ResourceConfig {
        ResourceConfig {
            resource_type: self.resource_type.clone(),
            name: self.name.clone(),
            properties: self.properties.clone(),
            tags: self.tags.clone(),
        }
    }
}

impl InfrastructureState {
    /// Creates a new snapshot for a project.
    #[must_use]
    pub fn new(
        project_id: &str,
        resources: Vec<Resource>,
        metadata: StateMetadata,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            version: format!("{}-{}", STATE_VERSION, Utc::now().timestamp_millis()),
            timestamp: Utc::now(),
            resources,
            metadata,
        }
    }

    /// Looks up a resource by id.
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Returns the number of resources in the snapshot.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
            Self::Error => "error",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

impl ResourceStatus {
    /// Parses a status from its wire representation.
    ///
    /// Unknown values map to [`Self::Error`], matching the backend contract.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "creating" => Self::Creating,
            "active" => Self::Active,
            "updating" => Self::Updating,
            "deleting" => Self::Deleting,
            "stopped" => Self::Stopped,
            _ => Self::Error,
        }
    }
}
