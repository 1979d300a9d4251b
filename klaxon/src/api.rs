//! HTTP alarm API
//!
//! A single route, `POST /v1/alarms`, taking `{"targetUserId": "..."}` and an
//! optional `Authorization: Bearer <token>` header. Successes answer with the
//! [`AlarmReceipt`]; failures with the classification's HTTP status and
//! `{"error": {"status": "NOT_FOUND", "message": "..."}}`.
//!
//! Each alarm runs on its own task, so a client that disconnects mid-request
//! does not cancel delivery.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use klaxon_common::{Signal, incoming};
use klaxon_dispatch::{AlarmReceipt, AlertError, AlertService};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::broadcast};

use crate::{auth::IdentityProvider, config::ApiConfig};

/// Shared state for alarm handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    pub service: Arc<AlertService>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Build the API router
pub fn router(state: ApiState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/alarms", post(send_alarm))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Alarm API server
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    /// Bind the API listener
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the configured address fails.
    pub async fn new(config: &ApiConfig, state: ApiState) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to bind alarm API to {}: {}",
                    config.listen_address,
                    e
                )
            })?;

        tracing::info!(address = %config.listen_address, "Alarm API bound successfully");

        Ok(Self {
            listener,
            router: router(state, config.max_body_bytes),
        })
    }

    /// Address actually bound
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until a shutdown signal arrives, then let in-flight requests finish
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) -> anyhow::Result<()> {
        tracing::info!("Alarm API starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Alarm API received shutdown signal, finishing requests ...");
            })
            .await?;

        tracing::info!("Alarm API stopped");
        Ok(())
    }
}

/// An [`AlertError`] rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub AlertError);

impl From<AlertError> for ApiError {
    fn from(value: AlertError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status =
            StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (
            status,
            Json(json!({
                "error": {
                    "status": kind.as_str(),
                    "message": self.0.public_message(),
                }
            })),
        )
            .into_response()
    }
}

async fn send_alarm(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<AlarmReceipt>, ApiError> {
    let body = body.map_err(|e| {
        AlertError::InvalidArgument(format!("Request body could not be read: {}", e.body_text()))
    })?;
    let target = parse_target(&body).inspect_err(|e| {
        incoming!(level = WARN, error = e.detail(), "Malformed alarm request");
    })?;

    let caller = state.identity.identify(bearer_token(&headers));
    incoming!(
        level = DEBUG,
        authenticated = caller.is_some(),
        "Alarm request received"
    );

    let receipt = state.service.send_alarm_detached(caller, target).await?;
    Ok(Json(receipt))
}

/// Pull `targetUserId` out of the request body.
///
/// An empty body or a missing/null field is an absent target, left for the
/// validator to reject. Anything that is not a JSON object, or a
/// non-string target, is rejected here.
fn parse_target(body: &[u8]) -> Result<Option<String>, AlertError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AlertError::InvalidArgument(format!("Request body is not valid JSON: {e}")))?;

    let Value::Object(mut fields) = value else {
        return Err(AlertError::InvalidArgument(
            "Request body must be a JSON object".to_string(),
        ));
    };

    match fields.remove("targetUserId") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(target)) => Ok(Some(target)),
        Some(_) => Err(AlertError::InvalidArgument(
            "targetUserId must be a string".to_string(),
        )),
    }
}

/// Credential from an `Authorization: Bearer` header, if any
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}
