use std::sync::Arc;

use super::scheduler::{Job, JobFrequency};
use crate::middleware::RateLimiterState;

/// Forgets evaluation clients whose quota has fully replenished.
pub struct RateLimiterPruneJob {
    limiter: Arc<RateLimiterState>,
}

impl RateLimiterPruneJob {
    pub fn new(limiter: Arc<RateLimiterState>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait]
impl Job for RateLimiterPruneJob {
    fn name(&self) -> &'static str {
        "rate_limiter_prune"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let before = self.limiter.tracked_clients();
        self.limiter.prune();
        let after = self.limiter.tracked_clients();
        tracing::debug!(before, after, "Pruned rate limiter state");
        metrics::gauge!("rate_limiter_tracked_clients").set(after as f64);
        Ok(())
    }
}
