//! Metrics
//!
//! Token lifecycle metrics interface and implementations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Metric labels.
pub type MetricLabels = HashMap<String, String>;

pub const CACHE_HITS: &str = "spotikit_token_cache_hits_total";
pub const COALESCED_WAITS: &str = "spotikit_token_coalesced_waits_total";
pub const EXCHANGES: &str = "spotikit_token_exchanges_total";
pub const NOTIFICATIONS: &str = "spotikit_token_notifications_total";
pub const PERSISTENCE_FAILURES: &str = "spotikit_persistence_failures_total";
pub const AUTHORIZATION_REQUESTS: &str = "spotikit_authorization_requests_total";

/// Token lifecycle metrics interface.
pub trait TokenMetrics: Send + Sync {
    /// Record a token served from cache.
    fn record_cache_hit(&self);

    /// Record a caller that joined an exchange already in flight.
    fn record_coalesced_wait(&self);

    /// Record a completed token endpoint exchange.
    fn record_exchange(&self, grant_type: &str, outcome: &str);

    /// Record a change notification handed to a subscriber.
    fn record_notification(&self);

    /// Record a failed save or clear.
    fn record_persistence_failure(&self, operation: &str);

    /// Record an authorization URL being issued.
    fn record_authorization_request(&self, response_type: &str);
}

/// No-op metrics implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetrics;

impl TokenMetrics for NoOpMetrics {
    fn record_cache_hit(&self) {}
    fn record_coalesced_wait(&self) {}
    fn record_exchange(&self, _grant_type: &str, _outcome: &str) {}
    fn record_notification(&self) {}
    fn record_persistence_failure(&self, _operation: &str) {}
    fn record_authorization_request(&self, _response_type: &str) {}
}

/// No-op metrics singleton.
pub fn no_op_metrics() -> NoOpMetrics {
    NoOpMetrics
}

/// Metric entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub labels: MetricLabels,
    pub timestamp: i64,
}

/// In-memory metrics for testing.
#[derive(Default)]
pub struct InMemoryMetrics {
    entries: Mutex<Vec<MetricEntry>>,
}

impl InMemoryMetrics {
    /// Create new in-memory metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded entries.
    pub fn get_entries(&self) -> Vec<MetricEntry> {
        self.entries().clone()
    }

    /// Get entries by name.
    pub fn get_entries_by_name(&self, name: &str) -> Vec<MetricEntry> {
        self.entries()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Number of entries recorded under `name`.
    pub fn count(&self, name: &str) -> usize {
        self.entries().iter().filter(|e| e.name == name).count()
    }

    /// Number of exchanges with the given grant type and outcome.
    pub fn exchange_count(&self, grant_type: &str, outcome: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| {
                e.name == EXCHANGES
                    && e.labels.get("grant_type").map(String::as_str) == Some(grant_type)
                    && e.labels.get("outcome").map(String::as_str) == Some(outcome)
            })
            .count()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> MutexGuard<'_, Vec<MetricEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, name: &str, labels: MetricLabels) {
        self.entries().push(MetricEntry {
            name: name.to_string(),
            value: 1.0,
            labels,
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }
}

fn labels(pairs: &[(&str, &str)]) -> MetricLabels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl TokenMetrics for InMemoryMetrics {
    fn record_cache_hit(&self) {
        self.record(CACHE_HITS, MetricLabels::new());
    }

    fn record_coalesced_wait(&self) {
        self.record(COALESCED_WAITS, MetricLabels::new());
    }

    fn record_exchange(&self, grant_type: &str, outcome: &str) {
        self.record(
            EXCHANGES,
            labels(&[("grant_type", grant_type), ("outcome", outcome)]),
        );
    }

    fn record_notification(&self) {
        self.record(NOTIFICATIONS, MetricLabels::new());
    }

    fn record_persistence_failure(&self, operation: &str) {
        self.record(PERSISTENCE_FAILURES, labels(&[("operation", operation)]));
    }

    fn record_authorization_request(&self, response_type: &str) {
        self.record(
            AUTHORIZATION_REQUESTS,
            labels(&[("response_type", response_type)]),
        );
    }
}

/// Create in-memory metrics for testing.
pub fn create_in_memory_metrics() -> InMemoryMetrics {
    InMemoryMetrics::new()
}
