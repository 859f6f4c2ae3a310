//! Repository implementations for database operations.

pub mod feature_flag;

pub use feature_flag::FeatureFlagRepository;
