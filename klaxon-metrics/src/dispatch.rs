//! Dispatch metrics
//!
//! Tracks alarm dispatch including:
//! - Channel attempts by outcome
//! - Alarms sent or failed, by classification
//! - Retries and end-to-end durations
//! - Dispatches currently in flight

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter, UpDownCounter},
};

use crate::MetricsError;

/// Dispatch metrics collector
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Total number of channel calls by outcome
    attempts_total: Counter<u64>,

    /// Total number of alarms by final result and classification
    alarms_total: Counter<u64>,

    /// Total number of backoff-and-retry cycles
    retries_total: Counter<u64>,

    /// Distribution of end-to-end dispatch durations
    duration_seconds: Histogram<f64>,

    /// Number of dispatches currently in flight
    in_flight: UpDownCounter<i64>,

    // Local mirrors, readable without an exporter
    attempts: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    in_flight_count: AtomicI64,
}

impl DispatchMetrics {
    /// Create a new dispatch metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let attempts_total = meter
            .u64_counter("klaxon.dispatch.attempts.total")
            .with_description("Total number of delivery channel calls by outcome")
            .build();

        let alarms_total = meter
            .u64_counter("klaxon.dispatch.alarms.total")
            .with_description("Total number of alarms by result and classification")
            .build();

        let retries_total = meter
            .u64_counter("klaxon.dispatch.retries.total")
            .with_description("Total number of dispatch retries after transient failures")
            .build();

        let duration_seconds = meter
            .f64_histogram("klaxon.dispatch.duration.seconds")
            .with_description("Distribution of end-to-end dispatch durations")
            .build();

        let in_flight = meter
            .i64_up_down_counter("klaxon.dispatch.in_flight")
            .with_description("Number of dispatches currently in flight")
            .build();

        Ok(Self {
            attempts_total,
            alarms_total,
            retries_total,
            duration_seconds,
            in_flight,
            attempts: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            in_flight_count: AtomicI64::new(0),
        })
    }

    /// Record a single channel call and its outcome (`sent`, `transient`, `terminal`)
    pub fn record_attempt(&self, channel: &str, outcome: &str) {
        let attributes = [
            KeyValue::new("channel", channel.to_string()),
            KeyValue::new("outcome", outcome.to_string()),
        ];
        self.attempts_total.add(1, &attributes);
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful alarm
    pub fn record_sent(&self, channel: &str, duration_secs: f64) {
        let attributes = [KeyValue::new("channel", channel.to_string())];
        self.duration_seconds.record(duration_secs, &attributes);
        self.alarms_total
            .add(1, &[KeyValue::new("result", "sent"), KeyValue::new("kind", "")]);
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed alarm with its classification
    pub fn record_failed(&self, kind: &str) {
        self.alarms_total.add(
            1,
            &[
                KeyValue::new("result", "failed"),
                KeyValue::new("kind", kind.to_string()),
            ],
        );
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backoff-and-retry cycle
    pub fn record_retry(&self) {
        self.retries_total.add(1, &[]);
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// A dispatch has started
    pub fn dispatch_started(&self) {
        self.in_flight.add(1, &[]);
        self.in_flight_count.fetch_add(1, Ordering::Relaxed);
    }

    /// A dispatch has finished, successfully or not
    pub fn dispatch_finished(&self) {
        self.in_flight.add(-1, &[]);
        self.in_flight_count.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn in_flight(&self) -> i64 {
        self.in_flight_count.load(Ordering::Relaxed)
    }
}

/// Get the OpenTelemetry meter for dispatch metrics
fn meter() -> Meter {
    opentelemetry::global::meter("klaxon.dispatch")
}
