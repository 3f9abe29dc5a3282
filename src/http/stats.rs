use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use actix_web::http::StatusCode;
use dashmap::DashMap;

use crate::admin::ServerHttpStats;

// Holds statistics information about
// a given API in the requests.
#[derive(Default)]
pub struct HttpApiStats {
    api_stats: DashMap<String, u64>,
}

impl HttpApiStats {
    pub fn inc(&self, api: &str) {
        let mut e = self.api_stats.entry(api.to_owned()).or_default();
        *e.value_mut() += 1;
    }

    pub fn dec(&self, api: &str) {
        let mut e = self.api_stats.entry(api.to_owned()).or_default();
        let val = e.value_mut();
        if *val > 0 {
            *val -= 1;
        }
    }

    pub fn view(&self) -> HashMap<String, u64> {
        self.api_stats
            .iter()
            .map(|e| (e.key().to_owned(), *e.value()))
            .collect()
    }
}

/// Request counters of the admin and peer routes of this node.
#[derive(Default)]
pub struct HttpStats {
    pub current_requests: HttpApiStats,
    pub total_requests: HttpApiStats,
    pub total_errors: HttpApiStats,
    pub total_canceled: HttpApiStats,
    pub total_bytes_received: AtomicU64,
    pub total_bytes_sent: AtomicU64,
}

impl HttpStats {
    /// Counts `api` as in flight until the guard drops.
    pub fn inc_guard(self: &Arc<Self>, api: &str) -> HttpApiStatsGuard {
        self.current_requests.inc(api);
        HttpApiStatsGuard {
            stats: self.clone(),
            api: api.to_owned(),
        }
    }

    pub fn update_stats(&self, api: &str, status: StatusCode) {
        self.total_requests.inc(api);
        if status.is_success() {
            return;
        }
        match status.as_u16() {
            // Client closed the request.
            499 => self.total_canceled.inc(api),
            _ => self.total_errors.inc(api),
        }
    }

    pub fn add_bytes_received(&self, n: u64) {
        self.total_bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, n: u64) {
        self.total_bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerHttpStats {
        ServerHttpStats {
            current_requests: self.current_requests.view(),
            total_requests: self.total_requests.view(),
            total_errors: self.total_errors.view(),
            total_canceled: self.total_canceled.view(),
            total_bytes_received: self.total_bytes_received.load(Ordering::Relaxed),
            total_bytes_sent: self.total_bytes_sent.load(Ordering::Relaxed),
        }
    }
}

pub struct HttpApiStatsGuard {
    stats: Arc<HttpStats>,
    api: String,
}

impl HttpApiStatsGuard {
    pub fn api(&self) -> &str {
        &self.api
    }
}

impl Drop for HttpApiStatsGuard {
    fn drop(&mut self) {
        self.stats.current_requests.dec(&self.api);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_stats() {
        let stats = Arc::new(HttpStats::default());
        {
            let guard = stats.inc_guard("Heal");
            assert_eq!(guard.api(), "Heal");
            assert_eq!(stats.snapshot().current_requests["Heal"], 1);
            stats.update_stats("Heal", StatusCode::OK);
            stats.update_stats("Heal", StatusCode::SERVICE_UNAVAILABLE);
            stats.update_stats("Heal", StatusCode::from_u16(499).unwrap());
        }
        stats.add_bytes_sent(12);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.current_requests["Heal"], 0);
        assert_eq!(snapshot.total_requests["Heal"], 3);
        assert_eq!(snapshot.total_errors["Heal"], 1);
        assert_eq!(snapshot.total_canceled["Heal"], 1);
        assert_eq!(snapshot.total_bytes_sent, 12);
    }
}
