//! Shared utilities and common types for the feature flag service.
//!
//! This crate provides common functionality used across all other crates:
//! - Hashing utilities (SHA-256 digests, rollout bucketing)
//! - Common validation logic

pub mod crypto;
pub mod validation;
