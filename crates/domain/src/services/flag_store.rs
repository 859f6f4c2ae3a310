//! Flag storage abstraction.
//!
//! The service layer talks to storage only through [`FlagStore`]. Records are
//! replaced whole on save, so a reader never sees a half-applied update.

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Environment, FeatureFlag};

/// Errors raised by flag stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A flag named '{name}' already exists in {environment}")]
    Conflict {
        name: String,
        environment: Environment,
    },

    #[error("Flag {0} not found")]
    NotFound(Uuid),

    /// A stored record no longer satisfies the domain invariants.
    #[error("Stored flag is corrupt: {0}")]
    Corrupt(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Storage for feature flags.
#[async_trait::async_trait]
pub trait FlagStore: Send + Sync {
    /// Stores a new flag. Fails with `Conflict` if its name is taken in its environment.
    async fn insert(&self, flag: &FeatureFlag) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError>;

    async fn find_by_name(
        &self,
        name: &str,
        environment: Environment,
    ) -> Result<Option<FeatureFlag>, StoreError>;

    /// Lists flags ordered by environment then name.
    async fn list(&self, environment: Option<Environment>) -> Result<Vec<FeatureFlag>, StoreError>;

    /// Replaces the stored record with the same id. Fails with `NotFound` if absent.
    async fn save(&self, flag: &FeatureFlag) -> Result<(), StoreError>;

    /// Removes a flag. Returns false if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// In-process flag store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryFlagStore {
    flags: RwLock<HashMap<Uuid, FeatureFlag>>,
}

impl InMemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn name_taken(
        flags: &HashMap<Uuid, FeatureFlag>,
        flag: &FeatureFlag,
    ) -> Option<StoreError> {
        flags
            .values()
            .any(|existing| {
                existing.id() != flag.id()
                    && existing.environment() == flag.environment()
                    && existing.name() == flag.name()
            })
            .then(|| StoreError::Conflict {
                name: flag.name().to_string(),
                environment: flag.environment(),
            })
    }
}

#[async_trait::async_trait]
impl FlagStore for InMemoryFlagStore {
    async fn insert(&self, flag: &FeatureFlag) -> Result<(), StoreError> {
        let mut flags = self.flags.write().await;
        if let Some(conflict) = Self::name_taken(&flags, flag) {
            return Err(conflict);
        }
        flags.insert(flag.id(), flag.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError> {
        Ok(self.flags.read().await.get(&id).cloned())
    }

    async fn find_by_name(
        &self,
        name: &str,
        environment: Environment,
    ) -> Result<Option<FeatureFlag>, StoreError> {
        Ok(self
            .flags
            .read()
            .await
            .values()
            .find(|flag| flag.environment() == environment && flag.name() == name)
            .cloned())
    }

    async fn list(&self, environment: Option<Environment>) -> Result<Vec<FeatureFlag>, StoreError> {
        let mut flags: Vec<FeatureFlag> = self
            .flags
            .read()
            .await
            .values()
            .filter(|flag| environment.map_or(true, |env| flag.environment() == env))
            .cloned()
            .collect();
        flags.sort_by(|a, b| {
            (a.environment(), a.name()).cmp(&(b.environment(), b.name()))
        });
        Ok(flags)
    }

    async fn save(&self, flag: &FeatureFlag) -> Result<(), StoreError> {
        let mut flags = self.flags.write().await;
        if !flags.contains_key(&flag.id()) {
            return Err(StoreError::NotFound(flag.id()));
        }
        if let Some(conflict) = Self::name_taken(&flags, flag) {
            return Err(conflict);
        }
        flags.insert(flag.id(), flag.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.flags.write().await.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
