//! Rate limiting middleware for the API
//!
//! Every client IP gets a global token bucket plus one bucket per configured
//! route rule. A request must find a token in each bucket that applies to it.
//! Exempt paths and IPs bypass limiting entirely.

use axum::{
    Json,
    extract::{ConnectInfo, Request},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Instant,
};
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;

/// Simple token bucket rate limiter
struct TokenBucket {
    /// Available tokens
    tokens: f64,
    /// Last refill time
    last_refill: Instant,
    /// Tokens per second
    rate: f64,
    /// Maximum burst size
    capacity: f64,
}

impl TokenBucket {
    fn new(rate: f64, capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
            rate,
            capacity: capacity as f64,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Seconds until a token is available (0 when one is available now)
    fn wait_secs(&self) -> u64 {
        if self.tokens >= 1.0 {
            0
        } else if self.rate <= 0.0 {
            u64::MAX
        } else {
            ((1.0 - self.tokens) / self.rate).ceil().max(1.0) as u64
        }
    }
}

/// Which bucket of an IP a rule maps to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum BucketKind {
    Global,
    Route(usize),
}

/// Rate limiter with per-IP, per-rule tracking
pub struct RateLimiter {
    /// Token buckets keyed by client IP and rule
    buckets: Mutex<HashMap<(IpAddr, BucketKind), TokenBucket>>,
    /// Configuration
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Check if a path is exempt from rate limiting
    fn is_path_exempt(&self, path: &str) -> bool {
        self.config.exempt_paths.iter().any(|exempt| {
            // Support both exact matches and prefix matches
            path == exempt || path.starts_with(exempt.as_str())
        })
    }

    /// Check if an IP address is exempt from rate limiting
    fn is_ip_exempt(&self, addr: &SocketAddr) -> bool {
        self.config.exempt_ips.contains(&addr.ip())
    }

    fn new_bucket(&self, kind: BucketKind) -> TokenBucket {
        match kind {
            BucketKind::Global => TokenBucket::new(
                self.config.requests_per_second as f64,
                self.config.burst_size,
            ),
            BucketKind::Route(index) => {
                let rule = &self.config.routes[index];
                let period = rule.period.as_secs_f64().max(f64::EPSILON);
                TokenBucket::new(rule.requests as f64 / period, rule.requests)
            }
        }
    }

    /// Check if request should be rate limited
    ///
    /// Returns `Some(seconds)` to wait when any applicable bucket is empty. A
    /// rejected request consumes nothing.
    pub async fn check(&self, path: &str, addr: SocketAddr) -> Option<u64> {
        if self.is_path_exempt(path) || self.is_ip_exempt(&addr) {
            return None;
        }

        let ip = addr.ip();
        let kinds: Vec<BucketKind> = std::iter::once(BucketKind::Global)
            .chain(
                self.config
                    .routes
                    .iter()
                    .enumerate()
                    .filter(|(_, rule)| rule.path == path)
                    .map(|(index, _)| BucketKind::Route(index)),
            )
            .collect();

        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        let mut wait = 0;
        for kind in &kinds {
            let bucket = buckets
                .entry((ip, *kind))
                .or_insert_with(|| self.new_bucket(*kind));
            bucket.refill(now);
            wait = wait.max(bucket.wait_secs());
        }
        if wait > 0 {
            return Some(wait);
        }

        for kind in &kinds {
            if let Some(bucket) = buckets.get_mut(&(ip, *kind)) {
                bucket.tokens -= 1.0;
            }
        }
        None
    }
}

/// Rate limiting middleware function
pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: axum::middleware::Next,
) -> Response {
    match limiter.check(req.uri().path(), addr).await {
        None => next.run(req).await,
        Some(retry_after) => {
            tracing::debug!(client = %addr, path = req.uri().path(), retry_after, "request rate limited");
            let error = json!({
                "code": "rate_limited",
                "error": "Too many requests",
                "detail": format!("Retry after {retry_after} seconds"),
                "retry_after_seconds": retry_after,
            });
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}
