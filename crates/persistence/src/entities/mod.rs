//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod feature_flag;

pub use feature_flag::FeatureFlagEntity;
