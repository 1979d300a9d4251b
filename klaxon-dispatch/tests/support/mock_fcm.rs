//! Mock FCM HTTP v1 server for testing the real channel
//!
//! This module provides a configurable mock gateway that can:
//! - Answer `messages:send` with scripted statuses, bodies and headers
//! - Delay responses to exercise client timeouts
//! - Record the authorization header and JSON body of every request
//!
//! # Example
//!
//! ```rust,no_run
//! use support::mock_fcm::{MockFcmServer, MockResponse};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockFcmServer::builder()
//!     .respond(MockResponse::error(503, "UNAVAILABLE", None))
//!     .build()
//!     .await?;
//!
//! // Point an FcmConfig at server.base_url()
//!
//! server.shutdown();
//! # Ok(())
//! # }
//! ```

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::oneshot};

/// A request the mock received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// A scripted response
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    body: Value,
    retry_after: Option<String>,
    delay: Option<Duration>,
}

impl MockResponse {
    /// `200` with `projects/klaxon-test/messages/<id>`
    #[must_use]
    pub fn accepted(id: &str) -> Self {
        Self {
            status: 200,
            body: json!({ "name": format!("projects/klaxon-test/messages/{id}") }),
            retry_after: None,
            delay: None,
        }
    }

    /// FCM-style error body with an optional `errorCode` detail
    #[must_use]
    pub fn error(status: u16, rpc_status: &str, error_code: Option<&str>) -> Self {
        let details: Vec<Value> = error_code
            .map(|code| {
                json!({
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": code
                })
            })
            .into_iter()
            .collect();

        Self {
            status,
            body: json!({
                "error": {
                    "code": status,
                    "message": format!("mock {rpc_status}"),
                    "status": rpc_status,
                    "details": details
                }
            }),
            retry_after: None,
            delay: None,
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, value: &str) -> Self {
        self.retry_after = Some(value.to_string());
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    script: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    served: AtomicUsize,
}

/// Builder for [`MockFcmServer`]
#[derive(Debug, Default)]
pub struct MockFcmServerBuilder {
    script: VecDeque<MockResponse>,
}

impl MockFcmServerBuilder {
    /// Queue a response; once the queue is empty every request is accepted
    #[must_use]
    pub fn respond(mut self, response: MockResponse) -> Self {
        self.script.push_back(response);
        self
    }

    /// Bind to an ephemeral port and start serving
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn build(self) -> std::io::Result<MockFcmServer> {
        let state = Arc::new(MockState {
            script: Mutex::new(self.script),
            ..MockState::default()
        });

        let app = Router::new()
            .route("/v1/projects/{project}/{method}", post(send))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(MockFcmServer {
            addr,
            state,
            shutdown: Mutex::new(Some(shutdown_tx)),
        })
    }
}

/// Mock FCM gateway
pub struct MockFcmServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl MockFcmServer {
    #[must_use]
    pub fn builder() -> MockFcmServerBuilder {
        MockFcmServerBuilder::default()
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Value for `FcmConfig::base_url`
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// All requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.state.served.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        if let Some(tx) = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockFcmServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn send(
    State(state): State<Arc<MockState>>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let served = state.served.fetch_add(1, Ordering::SeqCst) + 1;
    state
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            path: uri.path().to_string(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });

    let next = state
        .script
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
        .unwrap_or_else(|| MockResponse::accepted(&format!("msg-{served}")));

    if let Some(delay) = next.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(next.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(next.body)).into_response();
    if let Some(retry_after) = next.retry_after
        && let Ok(value) = retry_after.parse()
    {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}
