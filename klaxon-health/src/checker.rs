//! Readiness tracking for the alarm service

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

/// Health checker that tracks component status
///
/// Every field is an atomic so the API server, the readiness sampler and the
/// probe handlers can share one checker without locking.
#[derive(Debug)]
pub struct HealthChecker {
    /// Whether the alarm API listener is bound
    api_ready: Arc<AtomicBool>,

    /// Whether the recipient store answers lookups
    store_ready: Arc<AtomicBool>,

    /// Whether the delivery channel is configured and usable
    channel_ready: Arc<AtomicBool>,

    /// Alarm requests currently being dispatched
    in_flight: Arc<AtomicU64>,

    /// In-flight threshold above which the service reports not ready
    max_in_flight: u64,
}

impl HealthChecker {
    #[must_use]
    pub fn new(max_in_flight: u64) -> Self {
        Self {
            api_ready: Arc::new(AtomicBool::new(false)),
            store_ready: Arc::new(AtomicBool::new(false)),
            channel_ready: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicU64::new(0)),
            max_in_flight,
        }
    }

    /// Mark the alarm API as ready (listener bound)
    pub fn set_api_ready(&self, ready: bool) {
        self.api_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "API readiness updated");
    }

    pub fn set_store_ready(&self, ready: bool) {
        let previous = self.store_ready.swap(ready, Ordering::Relaxed);
        if previous != ready {
            tracing::debug!(ready, "Store readiness updated");
        }
    }

    pub fn set_channel_ready(&self, ready: bool) {
        let previous = self.channel_ready.swap(ready, Ordering::Relaxed);
        if previous != ready {
            tracing::debug!(ready, "Channel readiness updated");
        }
    }

    /// Update the number of alarms currently in flight
    pub fn set_in_flight(&self, count: u64) {
        self.in_flight.store(count, Ordering::Relaxed);
    }

    /// Check if the application is alive
    ///
    /// If the HTTP server cannot respond at all the probe times out, which
    /// is the signal the orchestrator acts on.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        true
    }

    /// Ready when every component is up and in-flight work is below the threshold
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let api_ok = self.api_ready.load(Ordering::Relaxed);
        let store_ok = self.store_ready.load(Ordering::Relaxed);
        let channel_ok = self.channel_ready.load(Ordering::Relaxed);
        let in_flight = self.in_flight.load(Ordering::Relaxed);
        let load_ok = in_flight < self.max_in_flight;

        let ready = api_ok && store_ok && channel_ok && load_ok;

        if !ready {
            tracing::debug!(
                api_ready = api_ok,
                store_ready = store_ok,
                channel_ready = channel_ok,
                in_flight,
                max_in_flight = self.max_in_flight,
                "Readiness check failed"
            );
        }

        ready
    }

    /// Get detailed readiness status for debugging
    #[must_use]
    pub fn get_status(&self) -> HealthStatus {
        HealthStatus {
            alive: self.is_alive(),
            ready: self.is_ready(),
            api_ready: self.api_ready.load(Ordering::Relaxed),
            store_ready: self.store_ready.load(Ordering::Relaxed),
            channel_ready: self.channel_ready.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            max_in_flight: self.max_in_flight,
        }
    }
}

/// Detailed health status information
#[derive(Debug, Clone, serde::Serialize)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Status struct intentionally has multiple boolean fields for clarity"
)]
pub struct HealthStatus {
    pub alive: bool,
    pub ready: bool,
    pub api_ready: bool,
    pub store_ready: bool,
    pub channel_ready: bool,
    pub in_flight: u64,
    pub max_in_flight: u64,
}
