//! Firebase Cloud Messaging (HTTP v1) channel.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use klaxon_common::outgoing;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::DeliveryChannel;
use crate::{ChannelError, message::AlertPayload};

/// Configuration for the FCM channel.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcmConfig {
    /// Firebase project the messages are sent under.
    pub project_id: String,

    /// API root (default: `https://fcm.googleapis.com`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth2 access token. Prefer `access_token_env` outside of tests.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Environment variable holding the access token when `access_token`
    /// is unset (default: `KLAXON_FCM_ACCESS_TOKEN`)
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Per-request HTTP timeout (default: 4000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_access_token_env() -> String {
    "KLAXON_FCM_ACCESS_TOKEN".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    4_000
}

impl FcmConfig {
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            base_url: default_base_url(),
            access_token: None,
            access_token_env: default_access_token_env(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    fn resolve_access_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .or_else(|| std::env::var(&self.access_token_env).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

impl fmt::Debug for FcmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FcmConfig")
            .field("project_id", &self.project_id)
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token_env", &self.access_token_env)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Sends alarms through `projects.messages.send`.
pub struct FcmChannel {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl fmt::Debug for FcmChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FcmChannel")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl FcmChannel {
    /// # Errors
    ///
    /// Returns [`ChannelError::Auth`] if no access token is configured, or
    /// [`ChannelError::Connection`] if the HTTP client cannot be built.
    pub fn new(config: FcmConfig) -> Result<Self, ChannelError> {
        let access_token = config.resolve_access_token().ok_or_else(|| {
            ChannelError::Auth(format!(
                "no FCM access token configured; set access_token or {}",
                config.access_token_env
            ))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("klaxon"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|e| ChannelError::Connection(format!("failed to create FCM client: {e}")))?;

        let endpoint = format!(
            "{}/v1/projects/{}/messages:send",
            config.base_url.trim_end_matches('/'),
            config.project_id
        );

        Ok(Self {
            http,
            endpoint,
            access_token,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    /// `projects/{project}/messages/{id}`
    name: String,
}

#[async_trait]
impl DeliveryChannel for FcmChannel {
    fn name(&self) -> &'static str {
        "fcm"
    }

    async fn send(&self, payload: &AlertPayload) -> Result<String, ChannelError> {
        outgoing!(level = DEBUG, target_user = %payload.target(), "POST {}", self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: SendResponse = response
                .json()
                .await
                .map_err(|e| ChannelError::Malformed(e.to_string()))?;
            return Ok(body.name);
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        Err(classify_error(status.as_u16(), &body, retry_after))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    field_violations: Vec<FieldViolation>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldViolation {
    #[serde(default)]
    field: String,
}

impl ErrorBody {
    /// The FCM-specific error code if present, otherwise the RPC status.
    fn code(&self) -> &str {
        self.details
            .iter()
            .find_map(|d| d.error_code.as_deref())
            .unwrap_or(&self.status)
    }

    fn concerns_token(&self) -> bool {
        self.details
            .iter()
            .flat_map(|d| &d.field_violations)
            .any(|v| v.field == "message.token")
            || self.message.to_ascii_lowercase().contains("registration token")
    }
}

/// Classify a non-success FCM response.
///
/// The FCM error code in `details` wins over the HTTP status; an
/// unparseable body is classified on the status alone.
#[must_use]
pub fn classify_error(status: u16, body: &str, retry_after: Option<Duration>) -> ChannelError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let error = envelope.error;

    let message = if error.message.is_empty() {
        format!("HTTP {status}")
    } else {
        error.message.clone()
    };

    match error.code() {
        "UNREGISTERED" => ChannelError::Unregistered(message),
        "SENDER_ID_MISMATCH" => ChannelError::InvalidToken(message),
        "INVALID_ARGUMENT" if error.concerns_token() => ChannelError::InvalidToken(message),
        "QUOTA_EXCEEDED" | "RESOURCE_EXHAUSTED" => ChannelError::RateLimited {
            message,
            retry_after,
        },
        "UNAVAILABLE" | "INTERNAL" => ChannelError::ServerError { status, message },
        "THIRD_PARTY_AUTH_ERROR" | "UNAUTHENTICATED" | "PERMISSION_DENIED" => {
            ChannelError::Auth(message)
        }
        _ => match status {
            429 => ChannelError::RateLimited {
                message,
                retry_after,
            },
            401 | 403 => ChannelError::Auth(message),
            500..=599 => ChannelError::ServerError { status, message },
            _ => ChannelError::Rejected(message),
        },
    }
}

/// Parse a `Retry-After` header given either as seconds or an HTTP date.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(header::RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at.signed_duration_since(Utc::now()).num_milliseconds();

    Some(Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0)))
}
