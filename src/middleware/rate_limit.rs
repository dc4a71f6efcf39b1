//! Per-IP sliding-window rate limiting.
//!
//! One global limiter guards every route; [`EndpointRateLimiter`] adds tighter
//! budgets for uploads, reports and bulk hash checks.

use std::{
    collections::{HashMap, VecDeque},
    net::{IpAddr, SocketAddr},
    sync::{Arc, Once},
    time::{Duration, Instant},
};

use axum::{
    extract::{connect_info::ConnectInfo, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;

use super::ip::extract_ip_from_headers;
use crate::error::{AppError, AppResult};

const GLOBAL_MAX_REQUESTS: usize = 1000;
const GLOBAL_WINDOW_SECS: u64 = 60;
const GLOBAL_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<Mutex<HashMap<IpAddr, VecDeque<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            hits: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Drops timestamps that fell out of the window. Timestamps are pushed in
    /// order, so expired ones are always at the front.
    fn expire(&self, hits: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = hits.front() {
            match now.checked_duration_since(oldest) {
                Some(age) if age >= self.window => {
                    hits.pop_front();
                }
                _ => break,
            }
        }
    }

    /// Counts a request from `ip`, or fails with [`AppError::RateLimited`] once
    /// the window is full. Rejected requests are not counted.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> AppResult<()> {
        let now = Instant::now();
        let mut all = self.hits.lock().await;
        let hits = all.entry(ip).or_default();
        self.expire(hits, now);

        if hits.len() >= self.max_requests {
            let wait = hits
                .front()
                .map(|&oldest| self.window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(self.window);
            // Round up so clients never retry a moment too early
            let retry_after_seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            return Err(AppError::RateLimited { retry_after_seconds });
        }

        hits.push_back(now);
        Ok(())
    }

    /// Forgets IPs with no requests left inside the window.
    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut all = self.hits.lock().await;
        all.retain(|_, hits| {
            self.expire(hits, now);
            !hits.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_ips(&self) -> usize {
        self.hits.lock().await.len()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

lazy_static::lazy_static! {
    static ref GLOBAL_RATE_LIMITER: RateLimiter = RateLimiter::new(
        env_or("SKIN_DATABASE_RATE_LIMIT_MAX_REQUESTS", GLOBAL_MAX_REQUESTS),
        env_or("SKIN_DATABASE_RATE_LIMIT_WINDOW_SECONDS", GLOBAL_WINDOW_SECS),
    );
}

static GLOBAL_CLEANUP: Once = Once::new();

/// Global per-IP limit applied to every request.
///
/// Defaults to 1000 requests per 60 seconds; `SKIN_DATABASE_RATE_LIMIT_MAX_REQUESTS`
/// and `SKIN_DATABASE_RATE_LIMIT_WINDOW_SECONDS` override it.
pub async fn rate_limit_middleware(req: Request, next: Next) -> Response {
    let socket_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());
    let ip = extract_ip_from_headers(req.headers(), socket_ip);

    GLOBAL_CLEANUP.call_once(|| {
        let limiter = GLOBAL_RATE_LIMITER.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(GLOBAL_CLEANUP_INTERVAL);
            loop {
                ticker.tick().await;
                limiter.cleanup_old_entries().await;
            }
        });
    });

    if let Err(e) = GLOBAL_RATE_LIMITER.check_rate_limit(ip).await {
        tracing::warn!(%ip, "Global rate limit exceeded");
        return e.into_response();
    }
    next.run(req).await
}

/// Stricter limits for individual endpoints, looked up by key.
///
/// Keys are route templates such as `/skins/{md5}/report`. Uploads use
/// `/skins:upload` because they share their path with the listing.
#[derive(Clone, Default)]
pub struct EndpointRateLimiter {
    limiters: Arc<HashMap<String, RateLimiter>>,
}

impl EndpointRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces limits given as `(endpoint, max_requests, window_seconds)`.
    pub fn with_limits(self, limits: Vec<(&str, usize, u64)>) -> Self {
        let mut map = Arc::unwrap_or_clone(self.limiters);
        map.extend(
            limits
                .into_iter()
                .map(|(key, max, window)| (key.to_string(), RateLimiter::new(max, window))),
        );
        Self { limiters: Arc::new(map) }
    }

    /// Endpoints without a configured limit always pass.
    pub async fn check_endpoint_limit(&self, endpoint: &str, ip: IpAddr) -> AppResult<()> {
        let Some(limiter) = self.limiters.get(endpoint) else {
            return Ok(());
        };
        limiter.check_rate_limit(ip).await.inspect_err(|_| {
            tracing::info!(%ip, endpoint, "Endpoint rate limit exceeded");
        })
    }

    pub async fn cleanup_all(&self) {
        for limiter in self.limiters.values() {
            limiter.cleanup_old_entries().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_fills_and_recovers() {
        let limiter = RateLimiter::new(2, 1);
        let ip = IpAddr::from([198, 51, 100, 1]);

        limiter.check_rate_limit(ip).await.unwrap();
        limiter.check_rate_limit(ip).await.unwrap();
        match limiter.check_rate_limit(ip).await {
            Err(AppError::RateLimited { retry_after_seconds }) => assert_eq!(retry_after_seconds, 1),
            other => panic!("expected rate limit, got {:?}", other),
        }

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check_rate_limit(ip).await.is_ok());
    }

    #[tokio::test]
    async fn test_ips_have_separate_budgets() {
        let limiter = RateLimiter::new(1, 60);
        let a = IpAddr::from([198, 51, 100, 1]);
        let b = IpAddr::from([198, 51, 100, 2]);

        assert!(limiter.check_rate_limit(a).await.is_ok());
        assert!(limiter.check_rate_limit(a).await.is_err());
        assert!(limiter.check_rate_limit(b).await.is_ok());
    }

    #[tokio::test]
    async fn test_endpoint_limits_are_independent() {
        let limiter = EndpointRateLimiter::new()
            .with_limits(vec![("/skins:upload", 1, 60), ("/skins/{md5}/report", 1, 60)]);
        let ip = IpAddr::from([192, 0, 2, 1]);

        assert!(limiter.check_endpoint_limit("/skins:upload", ip).await.is_ok());
        assert!(matches!(
            limiter.check_endpoint_limit("/skins:upload", ip).await,
            Err(AppError::RateLimited { .. })
        ));
        assert!(limiter.check_endpoint_limit("/skins/{md5}/report", ip).await.is_ok());

        // No configured limit, never throttled
        for _ in 0..10 {
            assert!(limiter.check_endpoint_limit("/skins/missing", ip).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_ips() {
        let limiter = RateLimiter::new(5, 1);
        limiter.check_rate_limit(IpAddr::from([192, 0, 2, 2])).await.unwrap();
        assert_eq!(limiter.tracked_ips().await, 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        limiter.cleanup_old_entries().await;
        assert_eq!(limiter.tracked_ips().await, 0);
    }
}
