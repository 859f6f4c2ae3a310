//! Background maintenance jobs.

mod pool_metrics;
mod rate_limiter_prune;
mod scheduler;

pub use pool_metrics::PoolMetricsJob;
pub use rate_limiter_prune::RateLimiterPruneJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
