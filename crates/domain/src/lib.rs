//! Domain layer for the feature flag service.
//!
//! This crate contains:
//! - Domain models (FeatureFlag, EvaluationContext)
//! - Rollout strategies and the strategy evaluator
//! - The flag store abstraction and the flag service
//! - Domain error types and the clock capability

pub mod clock;
pub mod errors;
pub mod models;
pub mod services;

pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::DomainError;
