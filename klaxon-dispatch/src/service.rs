//! The alarm pipeline: Validate → Resolve → Build → Dispatch.
//!
//! [`AlertService::send_alarm`] is the single operation exposed to callers.
//! Every failure leaves it as an [`AlertError`], already logged with full
//! context; callers only need to render the classification and
//! [`AlertError::public_message`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use klaxon_common::{AlertRequest, CallerIdentity, DispatchResult, ErrorKind, audit};
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{info, warn};

use crate::{
    AlertError,
    channel::DeliveryChannel,
    dispatcher::Dispatcher,
    message::{AlertTemplate, MessageBuilder},
    policy::{RetryPolicy, deadline_after},
    resolver::{ResolverConfig, TokenResolver},
    store::RecipientStore,
    validator::RequestValidator,
};

/// Configuration for the alarm pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Reject requests without a caller identity (default: true)
    #[serde(default = "default_require_authentication")]
    pub require_authentication: bool,

    /// Upper bound on one whole request, retries included (default: 5000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub template: AlertTemplate,
}

const fn default_require_authentication() -> bool {
    true
}

const fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            require_authentication: default_require_authentication(),
            request_timeout_ms: default_request_timeout_ms(),
            resolver: ResolverConfig::default(),
            retry: RetryPolicy::default(),
            template: AlertTemplate::default(),
        }
    }
}

/// Successful outcome returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmReceipt {
    pub success: bool,
    pub message_id: String,
    pub target_user_id: String,
}

/// Runs alarm requests end to end.
#[derive(Debug)]
pub struct AlertService {
    validator: RequestValidator,
    resolver: TokenResolver,
    builder: MessageBuilder,
    dispatcher: Dispatcher,
    request_timeout: Duration,
    in_flight: AtomicUsize,
}

impl AlertService {
    #[must_use]
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn RecipientStore>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            validator: RequestValidator::new(config.require_authentication),
            resolver: TokenResolver::new(store, config.resolver),
            builder: MessageBuilder::new(config.template),
            dispatcher: Dispatcher::new(channel, config.retry),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn resolver(&self) -> &TokenResolver {
        &self.resolver
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Number of requests currently between validation and result.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn store_ready(&self) -> bool {
        self.resolver.store().is_ready()
    }

    #[must_use]
    pub fn channel_ready(&self) -> bool {
        self.dispatcher.channel().is_ready()
    }

    /// Whether both the store and the channel can serve requests.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.store_ready() && self.channel_ready()
    }

    /// Ring `target`'s alarm on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// Returns the classified failure; see [`ErrorKind`] for the taxonomy.
    pub async fn send_alarm(
        &self,
        caller: Option<CallerIdentity>,
        target: Option<&str>,
    ) -> Result<AlarmReceipt, AlertError> {
        let request = match self.validator.validate(caller, target) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    classification = e.kind().as_str(),
                    error = e.detail(),
                    "Rejected alarm request"
                );
                record_failed(e.kind());
                return Err(e);
            }
        };

        audit::log_alarm_requested(request.caller_label(), request.target.as_str());

        let _guard = InFlightGuard::enter(&self.in_flight);
        let deadline = deadline_after(self.request_timeout);

        let result = match tokio::time::timeout_at(deadline, self.execute(&request, deadline)).await
        {
            Ok(result) => result,
            Err(_) => {
                let e = AlertError::Unavailable(format!(
                    "Alarm for {} did not complete within {}ms",
                    request.target,
                    self.request_timeout.as_millis()
                ));
                record_failed(e.kind());
                Err(e)
            }
        };

        match &result {
            Ok(receipt) => info!(
                target_user = %request.target,
                caller = request.caller_label(),
                message_id = %receipt.message_id,
                "Alarm sent"
            ),
            Err(e) => warn!(
                target_user = %request.target,
                caller = request.caller_label(),
                classification = e.kind().as_str(),
                error = e.detail(),
                "Alarm failed"
            ),
        }

        result
    }

    /// Run [`send_alarm`](Self::send_alarm) on its own task.
    ///
    /// Dropping the returned future does not cancel delivery; the task runs
    /// to completion and its result is discarded.
    ///
    /// # Errors
    ///
    /// As [`send_alarm`](Self::send_alarm), plus [`AlertError::Internal`] if
    /// the task panicked.
    pub async fn send_alarm_detached(
        self: &Arc<Self>,
        caller: Option<CallerIdentity>,
        target: Option<String>,
    ) -> Result<AlarmReceipt, AlertError> {
        self.spawn_alarm(caller, target)
            .await
            .unwrap_or_else(|e| Err(AlertError::Internal(format!("Dispatch task failed: {e}"))))
    }

    /// Start an alarm on its own task and hand back the handle.
    pub fn spawn_alarm(
        self: &Arc<Self>,
        caller: Option<CallerIdentity>,
        target: Option<String>,
    ) -> JoinHandle<Result<AlarmReceipt, AlertError>> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.send_alarm(caller, target.as_deref()).await })
    }

    async fn execute(
        &self,
        request: &AlertRequest,
        deadline: Instant,
    ) -> Result<AlarmReceipt, AlertError> {
        let token = self.resolver.resolve(&request.target).await.inspect_err(|e| {
            record_failed(e.kind());
        })?;

        let payload = self.builder.build(request, token);
        let result = self.dispatcher.dispatch(&payload, deadline).await;

        self.receipt(request, result)
    }

    fn receipt(
        &self,
        request: &AlertRequest,
        result: DispatchResult,
    ) -> Result<AlarmReceipt, AlertError> {
        if let Some(failure) = result.error {
            if failure.kind == ErrorKind::PreconditionFailed {
                // The channel refused the token; make the next request re-read it.
                self.resolver.invalidate(&request.target);
            }
            return Err(AlertError::from_kind(failure.kind, failure.message));
        }

        let message_id = result
            .message_id
            .ok_or_else(|| AlertError::Internal("Dispatch finished without a message id".into()))?;

        Ok(AlarmReceipt {
            success: true,
            message_id,
            target_user_id: request.target.to_string(),
        })
    }
}

fn record_failed(kind: ErrorKind) {
    if let Some(metrics) = klaxon_metrics::try_metrics() {
        metrics.dispatch.record_failed(kind.as_str());
    }
}

/// Tracks one request in the in-flight count for as long as it lives.
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics.dispatch.dispatch_started();
        }
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
        if let Some(metrics) = klaxon_metrics::try_metrics() {
            metrics.dispatch.dispatch_finished();
        }
    }
}
