use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub pages_served: Arc<AtomicU64>,
    pub cache_hits: Arc<AtomicU64>,
    pub cache_misses: Arc<AtomicU64>,
    pub skins_added: Arc<AtomicU64>,
    pub skins_found: Arc<AtomicU64>,
    pub uploads_failed: Arc<AtomicU64>,
    pub reports: Arc<AtomicU64>,
    pub index_updates: Arc<AtomicU64>,
    pub notifications_sent: Arc<AtomicU64>,
    pub notifications_failed: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            pages_served: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            skins_added: Arc::new(AtomicU64::new(0)),
            skins_found: Arc::new(AtomicU64::new(0)),
            uploads_failed: Arc::new(AtomicU64::new(0)),
            reports: Arc::new(AtomicU64::new(0)),
            index_updates: Arc::new(AtomicU64::new(0)),
            notifications_sent: Arc::new(AtomicU64::new(0)),
            notifications_failed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_pages_served(&self) {
        self.pages_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skins_added(&self) {
        self.skins_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skins_found(&self) {
        self.skins_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_uploads_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reports(&self) {
        self.reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_index_updates(&self) {
        self.index_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_served: self.pages_served.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            skins_added: self.skins_added.load(Ordering::Relaxed),
            skins_found: self.skins_found.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            reports: self.reports.load(Ordering::Relaxed),
            index_updates: self.index_updates.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub pages_served: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub skins_added: u64,
    pub skins_found: u64,
    pub uploads_failed: u64,
    pub reports: u64,
    pub index_updates: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition format.
    pub fn to_prometheus(&self) -> String {
        let counters: [(&str, &str, u64); 10] = [
            ("pages_served", "Museum pages served", self.pages_served),
            ("cache_hits", "Museum page cache hits", self.cache_hits),
            ("cache_misses", "Museum page cache misses", self.cache_misses),
            ("skins_added", "Uploads that added a new skin", self.skins_added),
            ("skins_found", "Uploads of an already known skin", self.skins_found),
            ("uploads_failed", "Uploads rejected or failed", self.uploads_failed),
            ("reports", "Skins reported for review", self.reports),
            ("index_updates", "Search index updates", self.index_updates),
            ("notifications_sent", "Chat notifications delivered", self.notifications_sent),
            ("notifications_failed", "Chat notifications that failed", self.notifications_failed),
        ];
        let mut out = String::new();
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP skin_database_{name} {help}\n# TYPE skin_database_{name} counter\nskin_database_{name} {value}\n"
            ));
        }
        out.push_str(&format!(
            "# HELP skin_database_uptime_seconds Uptime seconds\n# TYPE skin_database_uptime_seconds gauge\nskin_database_uptime_seconds {}\n",
            self.uptime_seconds
        ));
        out
    }
}
