//! Hashing utilities for API key comparison and rollout bucketing.

use sha2::{Digest, Sha256};

/// Number of rollout buckets. A bucket maps to a percentage with 0.01 resolution.
pub const BUCKET_COUNT: u32 = 10_000;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Maps a (salt, key) pair to a stable bucket in `0..BUCKET_COUNT`.
///
/// The bucket depends only on the input bytes, so the same pair lands in the
/// same bucket in every process. The salt keeps buckets independent between
/// flags: a user at the bottom of one rollout is not at the bottom of all.
pub fn rollout_bucket(salt: &str, key: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % u64::from(BUCKET_COUNT)) as u32
}

/// Converts a bucket to its position on the 0-100 percentage scale.
pub fn bucket_to_percent(bucket: u32) -> f64 {
    f64::from(bucket) * 100.0 / f64::from(BUCKET_COUNT)
}
