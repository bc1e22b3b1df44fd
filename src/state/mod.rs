//! Infrastructure state management.
//!
//! This module provides the resource and state snapshot types plus the
//! storage trait used to load and persist them.

mod store;
mod types;

pub use store::{MemoryStateStore, StateStore};
pub use types::{
    InfrastructureState, Resource, ResourceConfig, ResourceFilter, ResourceStatus, ResourceUpdate,
    StateMetadata, STATE_VERSION,
};

#[cfg(test)]
pub use store::MockStateStore;
