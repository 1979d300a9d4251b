//! Audit logging for alarm lifecycle events
//!
//! Structured INFO/WARN events, one per lifecycle step, each tagged with an
//! `event` field so they can be filtered out of the general log stream.
//!
//! ## Audit Events
//!
//! - `AlarmRequested`: A caller asked for a recipient's alarm to ring
//! - `DispatchAttempt`: One submission to the delivery channel
//! - `DispatchSuccess`: The channel accepted the alarm
//! - `DispatchFailure`: The alarm was not delivered
//!
//! ## Redaction
//!
//! Caller and target identifiers may be replaced by a short SHA-256 prefix
//! (`hash:1a2b3c4d`) so entries stay correlatable without naming users.
//! Delivery tokens never appear in audit events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging for alarm lifecycle events
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Replace caller identities with a hash prefix
    #[serde(default)]
    pub redact_caller: bool,

    /// Replace target recipient identifiers with a hash prefix
    #[serde(default)]
    pub redact_target: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_caller: false,
            redact_target: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Global audit configuration (thread-safe)
static AUDIT_CONFIG: std::sync::OnceLock<Arc<AuditConfig>> = std::sync::OnceLock::new();

/// Initialize audit logging with configuration
pub fn init(config: AuditConfig) {
    AUDIT_CONFIG.get_or_init(|| Arc::new(config));
}

/// Get the current audit configuration
#[must_use]
pub fn config() -> Arc<AuditConfig> {
    AUDIT_CONFIG
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(AuditConfig::default()))
}

/// Redact an identifier if redaction is enabled
#[must_use]
pub fn redact_id(id: &str, redact: bool) -> String {
    if redact {
        let digest = Sha256::digest(id.as_bytes());
        format!("hash:{}", &hex::encode(digest)[..8])
    } else {
        id.to_string()
    }
}

/// Log alarm requested event
///
/// Logged once per accepted request, before any lookup happens.
pub fn log_alarm_requested(caller: &str, target: &str) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "AlarmRequested",
        caller = %redact_id(caller, config.redact_caller),
        target = %redact_id(target, config.redact_target),
        "Audit: Alarm requested"
    );
}

/// Log dispatch attempt event
///
/// # Fields
/// - `target`: Recipient identifier (redacted if configured)
/// - `channel`: Delivery channel name
/// - `dispatch_attempt`: Attempt number (1-based)
pub fn log_dispatch_attempt(target: &str, channel: &str, attempt: u32) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "DispatchAttempt",
        target = %redact_id(target, config.redact_target),
        channel = %channel,
        dispatch_attempt = attempt,
        "Audit: Dispatch attempt"
    );
}

/// Log dispatch success event
pub fn log_dispatch_success(
    target: &str,
    channel: &str,
    message_id: &str,
    attempt: u32,
    duration_ms: u128,
) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "DispatchSuccess",
        target = %redact_id(target, config.redact_target),
        channel = %channel,
        message_id = %message_id,
        dispatch_attempt = attempt,
        duration_ms = duration_ms,
        "Audit: Alarm dispatched"
    );
}

/// Log dispatch failure event
///
/// `classification` is the wire name of the failure kind.
pub fn log_dispatch_failure(target: &str, classification: &str, error: &str, attempt: u32) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "DispatchFailure",
        target = %redact_id(target, config.redact_target),
        classification = %classification,
        error = %error,
        dispatch_attempt = attempt,
        "Audit: Alarm dispatch failed"
    );
}
