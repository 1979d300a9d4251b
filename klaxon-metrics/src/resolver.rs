//! Token resolver metrics
//!
//! Tracks delivery-token resolution including:
//! - Cache hit/miss rates
//! - Cache evictions (capacity, expiry and invalidation)
//! - Backing store lookup durations and errors

use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::MetricsError;

/// Resolver metrics collector
#[derive(Debug)]
pub struct ResolverMetrics {
    /// Distribution of backing store lookup durations in seconds
    lookup_duration: Histogram<f64>,

    /// Total number of cache hits
    cache_hits: Counter<u64>,

    /// Total number of cache misses
    cache_misses: Counter<u64>,

    /// Total number of cache evictions by reason
    cache_evictions: Counter<u64>,

    /// Total number of store errors
    store_errors: Counter<u64>,

    hits: AtomicU64,
    misses: AtomicU64,
    cache_size: AtomicU64,
}

impl ResolverMetrics {
    /// Create a new resolver metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let lookup_duration = meter
            .f64_histogram("klaxon.resolver.lookup.duration.seconds")
            .with_description("Distribution of recipient store lookup durations")
            .build();

        let cache_hits = meter
            .u64_counter("klaxon.resolver.cache.hits.total")
            .with_description("Total number of token cache hits")
            .build();

        let cache_misses = meter
            .u64_counter("klaxon.resolver.cache.misses.total")
            .with_description("Total number of token cache misses")
            .build();

        let cache_evictions = meter
            .u64_counter("klaxon.resolver.cache.evictions.total")
            .with_description("Total number of token cache evictions by reason")
            .build();

        let store_errors = meter
            .u64_counter("klaxon.resolver.store.errors.total")
            .with_description("Total number of recipient store errors")
            .build();

        Ok(Self {
            lookup_duration,
            cache_hits,
            cache_misses,
            cache_evictions,
            store_errors,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            cache_size: AtomicU64::new(0),
        })
    }

    /// Record a backing store lookup
    pub fn record_lookup(&self, duration_secs: f64) {
        self.lookup_duration.record(duration_secs, &[]);
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.cache_hits.add(1, &[]);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        self.cache_misses.add(1, &[]);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache eviction (`capacity`, `expired`, `invalidated`)
    pub fn record_cache_eviction(&self, reason: &str) {
        self.cache_evictions
            .add(1, &[KeyValue::new("reason", reason.to_string())]);
    }

    /// Record a store error
    pub fn record_store_error(&self, error_type: &str) {
        self.store_errors
            .add(1, &[KeyValue::new("error_type", error_type.to_string())]);
    }

    /// Update the cache size
    pub fn set_cache_size(&self, size: u64) {
        self.cache_size.store(size, Ordering::Relaxed);
    }

    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cache_size(&self) -> u64 {
        self.cache_size.load(Ordering::Relaxed)
    }
}

/// Get the OpenTelemetry meter for resolver metrics
fn meter() -> Meter {
    opentelemetry::global::meter("klaxon.resolver")
}
