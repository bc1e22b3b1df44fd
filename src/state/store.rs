//! State store trait definition.
//!
//! This module defines the interface the planner and orchestrator use to
//! read and write project state snapshots. The backing store (S3-like blob
//! storage in production) is an external collaborator; the in-memory
//! implementation here backs tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::types::InfrastructureState;
use crate::error::{Result, StateError};

/// Trait for state storage backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the current state for a project.
    ///
    /// Returns `None` if the project has no recorded state yet, which
    /// drives the create-all planning path.
    async fn get_current_state(&self, project_id: &str) -> Result<Option<InfrastructureState>>;

    /// Saves a new state snapshot for a project.
    async fn save_state(&self, state: &InfrastructureState) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    async fn get_current_state(&self, project_id: &str) -> Result<Option<InfrastructureState>> {
        (**self).get_current_state(project_id).await
    }

    async fn save_state(&self, state: &InfrastructureState) -> Result<()> {
        (**self).save_state(state).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

#[async_trait]
impl StateStore for std::sync::Arc<dyn StateStore> {
    async fn get_current_state(&self, project_id: &str) -> Result<Option<InfrastructureState>> {
        (**self).get_current_state(project_id).await
    }

    async fn save_state(&self, state: &InfrastructureState) -> Result<()> {
        (**self).save_state(state).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

/// In-memory state store keyed by project id.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    /// Latest snapshot per project.
    states: Mutex<HashMap<String, InfrastructureState>>,
}

impl MemoryStateStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_current_state(&self, project_id: &str) -> Result<Option<InfrastructureState>> {
        let states = self
            .states
            .lock()
            .map_err(|e| StateError::backend(format!("state store poisoned: {e}")))?;
        Ok(states.get(project_id).cloned())
    }

    async fn save_state(&self, state: &InfrastructureState) -> Result<()> {
        let mut states = self
            .states
            .lock()
            .map_err(|e| StateError::backend(format!("state store poisoned: {e}")))?;
        states.insert(state.project_id.clone(), state.clone());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::StateMetadata;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStateStore::new();
        assert!(store.get_current_state("p-1").await.unwrap().is_none());

        let state = InfrastructureState::new(
            "p-1",
            vec![],
            StateMetadata {
                last_modified_by: String::from("tester"),
                change_description: String::from("initial"),
                change_plan_id: None,
            },
        );
        store.save_state(&state).await.unwrap();

        let loaded = store.get_current_state("p-1").await.unwrap().unwrap();
        assert_eq!(loaded.project_id, "p-1");
        assert_eq!(loaded.version, state.version);
    }
}
