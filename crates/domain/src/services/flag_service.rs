//! Feature flag service.
//!
//! Coordinates the clock, the store and the evaluator. Every write goes
//! through one async mutex and follows load, mutate a copy, save the whole
//! record, so concurrent writers cannot interleave.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::evaluator::StrategyEvaluator;
use super::flag_store::{FlagStore, StoreError};
use crate::clock::Clock;
use crate::errors::DomainError;
use crate::models::{Environment, Evaluation, EvaluationContext, FeatureFlag, StrategyType};

/// Errors raised by [`FeatureFlagService`].
#[derive(Debug, Error)]
pub enum FlagServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} not found")]
    NotFound(String),
}

impl FlagServiceError {
    fn flag_not_found(id: Uuid) -> Self {
        FlagServiceError::NotFound(format!("Flag {}", id))
    }
}

/// Outcome of evaluating one flag during a bulk evaluation.
pub type FlagOutcome = (FeatureFlag, Result<Evaluation, DomainError>);

/// Flag management and evaluation.
pub struct FeatureFlagService {
    store: Arc<dyn FlagStore>,
    clock: Arc<dyn Clock>,
    evaluator: StrategyEvaluator,
    write_lock: Mutex<()>,
}

impl FeatureFlagService {
    pub fn new(store: Arc<dyn FlagStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            evaluator: StrategyEvaluator::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn FlagStore> {
        &self.store
    }

    /// Creates and stores a new flag.
    pub async fn create(
        &self,
        name: &str,
        environment: Environment,
        is_enabled: bool,
        strategy_type: StrategyType,
        strategy_config: Option<&str>,
    ) -> Result<FeatureFlag, FlagServiceError> {
        let flag = FeatureFlag::new(
            name,
            environment,
            is_enabled,
            strategy_type,
            strategy_config,
            self.clock.as_ref(),
        )?;

        let _guard = self.write_lock.lock().await;
        self.store.insert(&flag).await?;

        tracing::info!(
            flag_id = %flag.id(),
            name = %flag.name(),
            environment = %flag.environment(),
            strategy_type = %flag.strategy_type(),
            "Feature flag created"
        );

        Ok(flag)
    }

    pub async fn get(&self, id: Uuid) -> Result<FeatureFlag, FlagServiceError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| FlagServiceError::flag_not_found(id))
    }

    pub async fn find_by_name(
        &self,
        name: &str,
        environment: Environment,
    ) -> Result<FeatureFlag, FlagServiceError> {
        self.store
            .find_by_name(name, environment)
            .await?
            .ok_or_else(|| {
                FlagServiceError::NotFound(format!("Flag '{}' in {}", name, environment))
            })
    }

    pub async fn list(
        &self,
        environment: Option<Environment>,
    ) -> Result<Vec<FeatureFlag>, FlagServiceError> {
        Ok(self.store.list(environment).await?)
    }

    /// Flips a flag's global switch.
    pub async fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
    ) -> Result<FeatureFlag, FlagServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut flag = self.get(id).await?;
        flag.set_enabled(enabled, self.clock.as_ref());
        self.store.save(&flag).await?;

        tracing::info!(flag_id = %id, enabled, "Feature flag toggled");
        Ok(flag)
    }

    /// Replaces a flag's strategy type and config together.
    pub async fn update_strategy(
        &self,
        id: Uuid,
        strategy_type: StrategyType,
        strategy_config: Option<&str>,
    ) -> Result<FeatureFlag, FlagServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut flag = self.get(id).await?;
        flag.update_strategy(strategy_type, strategy_config, self.clock.as_ref())?;
        self.store.save(&flag).await?;

        tracing::info!(
            flag_id = %id,
            strategy_type = %strategy_type,
            "Feature flag strategy updated"
        );
        Ok(flag)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), FlagServiceError> {
        let _guard = self.write_lock.lock().await;
        if !self.store.delete(id).await? {
            return Err(FlagServiceError::flag_not_found(id));
        }

        tracing::info!(flag_id = %id, "Feature flag deleted");
        Ok(())
    }

    /// Evaluates the flag with `id` for `context`.
    pub async fn evaluate(
        &self,
        id: Uuid,
        context: &EvaluationContext,
    ) -> Result<(FeatureFlag, Evaluation), FlagServiceError> {
        let flag = self.get(id).await?;
        let evaluation = self.evaluator.explain(&flag, context)?;
        Ok((flag, evaluation))
    }

    /// Evaluates the flag named `name` in `environment` for `context`.
    pub async fn evaluate_by_name(
        &self,
        name: &str,
        environment: Environment,
        context: &EvaluationContext,
    ) -> Result<(FeatureFlag, Evaluation), FlagServiceError> {
        let flag = self.find_by_name(name, environment).await?;
        let evaluation = self.evaluator.explain(&flag, context)?;
        Ok((flag, evaluation))
    }

    /// Evaluates every flag of `environment`.
    ///
    /// One flag failing does not fail the others; each outcome is returned.
    pub async fn evaluate_all(
        &self,
        environment: Environment,
        context: &EvaluationContext,
    ) -> Result<Vec<FlagOutcome>, FlagServiceError> {
        let flags = self.store.list(Some(environment)).await?;
        Ok(flags
            .into_iter()
            .map(|flag| {
                let outcome = self.evaluator.explain(&flag, context);
                (flag, outcome)
            })
            .collect())
    }
}
