//! Submits payloads to a delivery channel with bounded retries.
//!
//! Per dispatch: `Pending → {Sent | Retrying → Pending | Failed}`.
//!
//! - A non-empty message id from the channel ends in `Sent`. An empty one
//!   is a malformed answer and fails with `Internal`.
//! - A token problem (unregistered, invalid) fails immediately with
//!   `PreconditionFailed`; retrying cannot help until the device
//!   re-registers.
//! - A transient error backs off and tries again while the retry policy and
//!   the request deadline both allow it, then fails with `Unavailable`.
//! - Anything else fails immediately with `Internal`.
//!
//! Nothing here logs the delivery token.

use std::{fmt, sync::Arc, time::Duration};

use klaxon_common::{DispatchResult, audit};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    AlertError, ChannelError, channel::DeliveryChannel, message::AlertPayload,
    policy::{RetryPolicy, overruns},
};

/// Where a single dispatch currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    Retrying,
    Sent,
    Failed,
}

impl DispatchState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Retrying => "retrying",
            Self::Sent => "sent",
            Self::Failed => "failed",
        })
    }
}

/// Delivers payloads through one channel under one retry policy.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    channel: Arc<dyn DeliveryChannel>,
    policy: RetryPolicy,
}

impl Dispatcher {
    #[must_use]
    pub fn new(channel: Arc<dyn DeliveryChannel>, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<dyn DeliveryChannel> {
        &self.channel
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `payload`, retrying transient failures until `deadline`.
    ///
    /// Never returns an error: every outcome, including a missed deadline, is
    /// folded into the [`DispatchResult`].
    pub async fn dispatch(&self, payload: &AlertPayload, deadline: Instant) -> DispatchResult {
        let target = payload.target().as_str();
        let channel = self.channel.name();
        let started = std::time::Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            transition(target, DispatchState::Pending, attempts);
            audit::log_dispatch_attempt(target, channel, attempts);

            let outcome = match tokio::time::timeout_at(deadline, self.channel.send(payload)).await
            {
                Ok(Ok(message_id)) if message_id.is_empty() => Err(ChannelError::Malformed(
                    "channel returned an empty message id".to_string(),
                )),
                Ok(outcome) => outcome,
                Err(_) => Err(ChannelError::Timeout(
                    "request deadline reached before the channel answered".to_string(),
                )),
            };

            let error = match outcome {
                Ok(message_id) => {
                    transition(target, DispatchState::Sent, attempts);
                    self.record_sent(target, &message_id, attempts, started.elapsed());
                    return DispatchResult::sent(message_id, attempts);
                }
                Err(error) => error,
            };

            if let Some(metrics) = klaxon_metrics::try_metrics() {
                metrics.dispatch.record_attempt(channel, error.outcome());
            }

            if let Some(delay) = self.retry_delay(&error, attempts, deadline) {
                transition(target, DispatchState::Retrying, attempts);
                warn!(
                    target_user = target,
                    channel,
                    attempt = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Transient delivery failure, retrying"
                );
                if let Some(metrics) = klaxon_metrics::try_metrics() {
                    metrics.dispatch.record_retry();
                }
                tokio::time::sleep(delay).await;
                continue;
            }

            transition(target, DispatchState::Failed, attempts);
            return self.fail(target, &error, attempts);
        }
    }

    /// How long to wait before retrying, or `None` if this failure is final.
    fn retry_delay(&self, error: &ChannelError, attempts: u32, deadline: Instant) -> Option<Duration> {
        if !error.is_transient() || !self.policy.should_retry(attempts) {
            return None;
        }

        let delay = self
            .policy
            .delay_for(attempts)
            .max(error.retry_after().unwrap_or_default());

        // Sleeping past the deadline would only end in a timeout.
        if overruns(delay, deadline) {
            debug!(
                attempt = attempts,
                "Backoff would overrun the request deadline, giving up"
            );
            return None;
        }

        Some(delay)
    }

    fn record_sent(&self, target: &str, message_id: &str, attempts: u32, elapsed: Duration) {
        let channel = self.channel.name();

        info!(
            target_user = target,
            channel,
            attempts,
            message_id,
            "Alarm delivered"
        );
        audit::log_dispatch_success(target, channel, message_id, attempts, elapsed.as_millis());

        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics.dispatch.record_attempt(channel, "sent");
            metrics.dispatch.record_sent(channel, elapsed.as_secs_f64());
        }
    }

    fn fail(&self, target: &str, error: &ChannelError, attempts: u32) -> DispatchResult {
        let detail = error.to_string();
        let failure = if error.is_transient() {
            AlertError::Unavailable(format!(
                "Delivery failed after {attempts} attempt(s): {detail}"
            ))
        } else {
            AlertError::from(error.clone())
        };
        let kind = failure.kind();

        warn!(
            target_user = target,
            channel = self.channel.name(),
            attempts,
            classification = kind.as_str(),
            error = %detail,
            "Alarm delivery failed"
        );
        audit::log_dispatch_failure(target, kind.as_str(), &detail, attempts);

        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics.dispatch.record_failed(kind.as_str());
        }

        DispatchResult::failed(kind, failure.detail(), attempts)
    }
}

fn transition(target: &str, state: DispatchState, attempt: u32) {
    debug!(
        target_user = target,
        attempt,
        state = %state,
        terminal = state.is_terminal(),
        "Dispatch state"
    );
}
