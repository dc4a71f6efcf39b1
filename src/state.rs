use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use tokio::sync::RwLock;

use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::EndpointRateLimiter;
use crate::notify::Notifier;
use crate::types::MuseumItem;
use crate::upload::SkinStorage;

/// Cached museum pages, keyed by the original request URL.
pub type PageCache = ResponseCache<Vec<MuseumItem>>;

/// The shared application state.
///
/// Cloned into every handler by Axum; all members are cheap handles to shared data.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// The application metrics.
    pub metrics: Metrics,
    /// The per-endpoint rate limiter.
    pub rate_limiter: EndpointRateLimiter,
    /// Museum pages served recently.
    pub cache: PageCache,
    /// Number of classic skins, computed on first use and cleared when one is added.
    pub skin_count: Arc<RwLock<Option<i64>>>,
    /// Where uploaded archives are written.
    pub storage: SkinStorage,
    /// Chat notifications for moderators.
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Creates a new `AppState` with the default endpoint limits:
    /// - 30 uploads per minute
    /// - 10 reports per minute
    /// - 60 missing-hash checks per minute
    pub fn new(db: sqlx::SqlitePool, config: AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        let rate_limiter = EndpointRateLimiter::new().with_limits(vec![
            ("/skins:upload", 30, 60),
            ("/skins/{md5}/report", 10, 60),
            ("/skins/missing", 60, 60),
        ]);

        let capacity = NonZeroUsize::new(config.cache.max_entries).unwrap_or(NonZeroUsize::MIN);
        let cache = ResponseCache::new(capacity, Duration::from_secs(config.cache.max_age_secs));
        let storage = SkinStorage::new(config.uploads.storage_dir.clone());

        Self {
            db,
            config: Arc::new(config),
            metrics: Metrics::new(),
            rate_limiter,
            cache,
            skin_count: Arc::new(RwLock::new(None)),
            storage,
            notifier,
        }
    }
}
