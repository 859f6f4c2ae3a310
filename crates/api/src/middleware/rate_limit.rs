//! Rate limiting middleware for evaluation routes.
//!
//! A request counts against a configured evaluation key when it presents one
//! whose digest is in `security.evaluation_api_key_hashes`. Otherwise it counts
//! against the peer IP address. Unverified keys never select a quota.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::net::SocketAddr;
use std::num::NonZeroU32;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::auth::{digests_match, presented_api_key};

/// Quota shared by requests with neither a verified key nor a known peer.
const ANONYMOUS_CLIENT: &str = "anonymous";

type KeyedRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-client request quotas.
pub struct RateLimiterState {
    limiter: KeyedRateLimiter,
    rate_limit_per_minute: NonZeroU32,
}

impl RateLimiterState {
    /// Returns `None` when `rate_limit_per_minute` is 0, which disables limiting.
    pub fn new(rate_limit_per_minute: u32) -> Option<Self> {
        let rate_limit_per_minute = NonZeroU32::new(rate_limit_per_minute)?;
        Some(Self {
            limiter: RateLimiter::keyed(Quota::per_minute(rate_limit_per_minute)),
            rate_limit_per_minute,
        })
    }

    pub fn limit(&self) -> u32 {
        self.rate_limit_per_minute.get()
    }

    /// Checks a request from `client`.
    /// Returns Err with retry-after seconds if rate limited.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        self.limiter.check_key(&client.to_string()).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            wait.as_secs().max(1)
        })
    }

    /// Drops state for clients whose quota has fully replenished.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

/// Identifies the client a request is counted against.
fn client_key(req: &Request<Body>, evaluation_key_hashes: &[String]) -> String {
    let verified_key = presented_api_key(req.headers())
        .map(shared::crypto::sha256_hex)
        .filter(|digest| {
            evaluation_key_hashes
                .iter()
                .any(|expected| digests_match(digest, &expected.to_ascii_lowercase()))
        });
    if let Some(digest) = verified_key {
        return format!("key:{}", digest);
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => ANONYMOUS_CLIENT.to_string(),
    }
}

/// Middleware that applies the per-client quota.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(rate_limiter) = &state.rate_limiter {
        let client = client_key(&req, &state.config.security.evaluation_api_key_hashes);
        if let Err(retry_after) = rate_limiter.check(&client) {
            tracing::warn!(retry_after, "Evaluation rate limit exceeded");
            return Err(ApiError::RateLimited {
                limit: rate_limiter.limit(),
                retry_after,
            });
        }
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::API_KEY_HEADER;

    fn request(key: Option<&str>, peer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/v1/evaluate");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn test_zero_limit_disables_limiting() {
        assert!(RateLimiterState::new(0).is_none());
        assert_eq!(RateLimiterState::new(100).unwrap().limit(), 100);
    }

    #[test]
    fn test_rate_limiter_exhaustion() {
        let state = RateLimiterState::new(1).unwrap();

        assert!(state.check("client-a").is_ok());
        let retry_after = state.check("client-a").unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn test_rate_limiter_clients_independent() {
        let state = RateLimiterState::new(1).unwrap();

        assert!(state.check("client-a").is_ok());
        assert!(state.check("client-b").is_ok());
        assert!(state.check(ANONYMOUS_CLIENT).is_ok());

        assert!(state.check("client-a").is_err());
        assert!(state.check("client-b").is_err());
        assert_eq!(state.tracked_clients(), 3);
    }

    #[test]
    fn test_rate_limiter_allows_quota() {
        let state = RateLimiterState::new(5).unwrap();
        for i in 0..5 {
            assert!(state.check("client").is_ok(), "Request {} should be allowed", i);
        }
        assert!(state.check("client").is_err());
    }

    #[test]
    fn test_client_key_uses_verified_evaluation_key() {
        let digest = shared::crypto::sha256_hex("eval-key");
        let configured = vec![digest.to_uppercase()];

        let key = client_key(&request(Some("eval-key"), Some("10.0.0.1:5000")), &configured);
        assert_eq!(key, format!("key:{}", digest));
    }

    #[test]
    fn test_client_key_ignores_unverified_keys() {
        let configured = vec![shared::crypto::sha256_hex("eval-key")];

        for made_up in ["made-up-1", "made-up-2"] {
            let req = request(Some(made_up), Some("10.0.0.1:5000"));
            assert_eq!(client_key(&req, &configured), "ip:10.0.0.1");
        }
        assert_eq!(
            client_key(&request(Some("made-up-3"), None), &configured),
            ANONYMOUS_CLIENT
        );
    }

    #[test]
    fn test_client_key_separates_peers_by_ip() {
        let a = client_key(&request(None, Some("10.0.0.1:5000")), &[]);
        let same_host = client_key(&request(None, Some("10.0.0.1:6000")), &[]);
        let b = client_key(&request(None, Some("10.0.0.2:5000")), &[]);
        assert_eq!(a, same_host);
        assert_ne!(a, b);
    }

    #[test]
    fn test_rotating_keys_share_one_quota() {
        let state = RateLimiterState::new(1).unwrap();
        let allowed = (0..20)
            .map(|i| request(Some(&format!("made-up-{}", i)), Some("192.0.2.7:40000")))
            .filter(|req| state.check(&client_key(req, &[])).is_ok())
            .count();
        assert_eq!(allowed, 1);
        assert_eq!(state.tracked_clients(), 1);
    }

    #[test]
    fn test_debug_output() {
        let state = RateLimiterState::new(100).unwrap();
        state.check("client").unwrap();
        let debug = format!("{:?}", state);
        assert!(debug.contains("RateLimiterState"));
        assert!(debug.contains("tracked_clients"));
    }
}
