//! Domain services for feature flags.
//!
//! Services contain business logic that operates on domain models.

pub mod evaluator;
pub mod flag_service;
pub mod flag_store;
pub mod strategy;

pub use evaluator::StrategyEvaluator;
pub use flag_service::{FeatureFlagService, FlagOutcome, FlagServiceError};
pub use flag_store::{FlagStore, InMemoryFlagStore, StoreError};
pub use strategy::{PercentageRollout, RoleRollout, RolloutStrategy};
