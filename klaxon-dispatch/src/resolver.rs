//! Delivery token resolution with a bounded TTL cache.
//!
//! Lookups check a concurrent cache first and fall back to the
//! [`RecipientStore`]. Only usable tokens are cached: a missing recipient or
//! a recipient without a token always goes back to the store, so a user who
//! registers a device is reachable on the next request.
//!
//! # Caching Strategy
//!
//! - **Fixed TTL**: entries expire `cache_ttl_secs` after they were fetched
//! - **Bounded**: at `cache_capacity` entries, expired entries are dropped
//!   first, then the entry closest to expiry
//! - **Lock-free**: `DashMap` shards the map, so lookups for different
//!   recipients do not contend
//! - **Invalidation**: a token the channel rejects is dropped immediately

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use klaxon_common::{DeliveryToken, Recipient, RecipientId};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{AlertError, StoreError, policy::deadline_after, store::RecipientStore};

/// Configuration for the token resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// How long a resolved token is served from cache (default: 300)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached tokens (default: 10000). Zero disables caching.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Tokens last refreshed longer ago than this are treated as unusable.
    /// Unset means tokens never go stale.
    ///
    /// Age is measured from the record's `updated_at`. A record stored
    /// without one is stamped with its load time, so it only ages from when
    /// the store read it.
    #[serde(default)]
    pub token_max_age_secs: Option<u64>,

    /// Upper bound on a single store lookup (default: 2000)
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

const fn default_cache_ttl_secs() -> u64 {
    300 // 5 minutes
}

const fn default_cache_capacity() -> usize {
    10_000
}

const fn default_lookup_timeout_ms() -> u64 {
    2_000
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            token_max_age_secs: None,
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: DeliveryToken,
    updated_at: DateTime<Utc>,
    expires_at: Instant,
}

/// Resolves recipient ids to delivery tokens.
#[derive(Debug)]
pub struct TokenResolver {
    store: Arc<dyn RecipientStore>,
    cache: DashMap<RecipientId, CachedToken>,
    config: ResolverConfig,
}

impl TokenResolver {
    #[must_use]
    pub fn new(store: Arc<dyn RecipientStore>, config: ResolverConfig) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecipientStore> {
        &self.store
    }

    /// Resolve the current delivery token for `id`.
    ///
    /// # Errors
    ///
    /// - [`AlertError::NotFound`] if the recipient does not exist
    /// - [`AlertError::PreconditionFailed`] if the recipient has no usable
    ///   token, or the token is older than `token_max_age_secs`
    /// - [`AlertError::Unavailable`] if the store lookup timed out or the
    ///   store is temporarily unreachable
    /// - [`AlertError::Internal`] for any other store failure
    pub async fn resolve(&self, id: &RecipientId) -> Result<DeliveryToken, AlertError> {
        if let Some(token) = self.cached(id) {
            return Ok(token);
        }

        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics.resolver.record_cache_miss();
        }

        let recipient = self
            .lookup(id)
            .await?
            .ok_or_else(|| AlertError::NotFound(format!("User with ID {id} not found")))?;

        let token = recipient.usable_token().cloned().ok_or_else(|| {
            AlertError::PreconditionFailed(format!("User {id} does not have a delivery token"))
        })?;

        if self.is_stale(recipient.updated_at) {
            return Err(AlertError::PreconditionFailed(format!(
                "Delivery token for user {id} is stale, last refreshed {}",
                recipient.updated_at.to_rfc3339()
            )));
        }

        self.remember(&recipient, token.clone());
        Ok(token)
    }

    /// Drop any cached token for `id`.
    pub fn invalidate(&self, id: &RecipientId) {
        if self.cache.remove(id).is_some() {
            debug!(target_user = %id, "Invalidated cached delivery token");
            self.record_eviction("invalidated");
        }
    }

    /// Number of entries currently cached, including expired ones not yet dropped.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, id: &RecipientId) -> Option<DeliveryToken> {
        // Clone out so the shard guard is released before any removal.
        let entry = self.cache.get(id).map(|e| e.value().clone())?;

        if entry.expires_at <= Instant::now() {
            debug!(target_user = %id, "Cached delivery token expired");
            self.cache.remove(id);
            self.record_eviction("expired");
            return None;
        }

        if self.is_stale(entry.updated_at) {
            debug!(target_user = %id, "Cached delivery token is stale, refreshing from store");
            self.cache.remove(id);
            self.record_eviction("stale");
            return None;
        }

        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics.resolver.record_cache_hit();
        }

        debug!(target_user = %id, "Delivery token cache hit");
        Some(entry.token)
    }

    async fn lookup(&self, id: &RecipientId) -> Result<Option<Recipient>, StoreError> {
        let limit = Duration::from_millis(self.config.lookup_timeout_ms);
        let started = std::time::Instant::now();

        let result = match tokio::time::timeout(limit, self.store.get(id)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(limit)),
        };

        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics
                .resolver
                .record_lookup(started.elapsed().as_secs_f64());
            if let Err(e) = &result {
                metrics.resolver.record_store_error(store_error_type(e));
            }
        }

        if let Err(e) = &result {
            warn!(target_user = %id, error = %e, "Recipient store lookup failed");
        }

        result
    }

    fn is_stale(&self, updated_at: DateTime<Utc>) -> bool {
        self.config.token_max_age_secs.is_some_and(|max_age| {
            let age = Utc::now().signed_duration_since(updated_at);
            age.num_seconds() > i64::try_from(max_age).unwrap_or(i64::MAX)
        })
    }

    fn remember(&self, recipient: &Recipient, token: DeliveryToken) {
        if self.config.cache_capacity == 0 {
            return;
        }

        if !self.cache.contains_key(&recipient.id) && self.cache.len() >= self.config.cache_capacity
        {
            self.make_room();
        }

        let expires_at = deadline_after(Duration::from_secs(self.config.cache_ttl_secs));
        self.cache.insert(
            recipient.id.clone(),
            CachedToken {
                token,
                updated_at: recipient.updated_at,
                expires_at,
            },
        );
        self.update_cache_size();
    }

    /// Drop expired entries, then the entry closest to expiry if still full.
    fn make_room(&self) {
        let now = Instant::now();
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.expires_at > now);
        for _ in self.cache.len()..before {
            self.record_eviction("expired");
        }

        while self.cache.len() >= self.config.cache_capacity {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.expires_at)
                .map(|entry| entry.key().clone());

            let Some(oldest) = oldest else { break };
            self.cache.remove(&oldest);
            self.record_eviction("capacity");
        }
    }

    fn record_eviction(&self, reason: &str) {
        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics.resolver.record_cache_eviction(reason);
        }
        self.update_cache_size();
    }

    fn update_cache_size(&self) {
        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics.resolver.set_cache_size(self.cache.len() as u64);
        }
    }
}

const fn store_error_type(error: &StoreError) -> &'static str {
    match error {
        StoreError::Unavailable(_) => "unavailable",
        StoreError::Timeout(_) => "timeout",
        StoreError::Corrupt(_) => "corrupt",
        StoreError::Io(_) => "io",
    }
}
