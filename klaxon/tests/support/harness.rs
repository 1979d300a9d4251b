//! End-to-end test harness for Klaxon
//!
//! # Example
//!
//! ```no_run
//! use support::harness::TestHarness;
//!
//! #[tokio::test]
//! async fn test_alarm() {
//!     let harness = TestHarness::builder()
//!         .with_recipient("u1", Some("tok-abc"))
//!         .with_caller("alice", "alice-token")
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let (status, body) = harness
//!         .post_alarm(Some("alice-token"), r#"{"targetUserId":"u1"}"#)
//!         .await
//!         .unwrap();
//!     assert_eq!(status, 200);
//!
//!     harness.shutdown().await;
//! }
//! ```
#![allow(dead_code)] // Not every helper is used by every test binary

use std::{net::SocketAddr, sync::Arc, time::Duration};

use klaxon::{
    auth::token_digest,
    config::{ApiConfig, CallerConfig, KlaxonConfig, StoreConfig},
    controller::Klaxon,
};
use klaxon_common::Signal;
use klaxon_dispatch::{AlertService, DispatchConfig};
use klaxon_health::{HealthChecker, HealthConfig};
use serde_json::Value;
use tempfile::TempDir;
use tokio::{sync::broadcast, task::JoinHandle, time::timeout};

/// A running Klaxon instance with a dry-run delivery channel
pub struct TestHarness {
    api_addr: SocketAddr,
    health_addr: SocketAddr,
    service: Arc<AlertService>,
    checker: Arc<HealthChecker>,
    client: reqwest::Client,
    signals: broadcast::Sender<Signal>,
    handle: JoinHandle<anyhow::Result<()>>,

    /// Holds the recipients file for the lifetime of the harness
    _dir: TempDir,
}

impl TestHarness {
    #[must_use]
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::default()
    }

    #[must_use]
    pub const fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    #[must_use]
    pub const fn service(&self) -> &Arc<AlertService> {
        &self.service
    }

    #[must_use]
    pub const fn health_checker(&self) -> &Arc<HealthChecker> {
        &self.checker
    }

    /// Subscribe to the harness's shutdown broadcast
    #[must_use]
    pub fn signals(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    /// `POST /v1/alarms` with an optional bearer token
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn post_alarm(
        &self,
        token: Option<&str>,
        body: &str,
    ) -> anyhow::Result<(u16, Value)> {
        let mut request = self
            .client
            .post(format!("http://{}/v1/alarms", self.api_addr))
            .header("content-type", "application/json")
            .body(body.to_string());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    /// Status code of `GET path` on the health server
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn probe(&self, path: &str) -> anyhow::Result<u16> {
        let response = self
            .client
            .get(format!("http://{}{path}", self.health_addr))
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    /// Broadcast shutdown and wait for the instance to stop
    ///
    /// # Errors
    ///
    /// Returns an error if the instance does not stop within 5 seconds or
    /// stopped with an error.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.signals.send(Signal::Shutdown);
        timeout(Duration::from_secs(5), self.handle).await???;
        Ok(())
    }
}

/// Builder for a [`TestHarness`]
#[derive(Default)]
pub struct TestHarnessBuilder {
    recipients: Vec<(String, Option<String>)>,
    callers: Vec<CallerConfig>,
    dispatch: DispatchConfig,
}

impl TestHarnessBuilder {
    #[must_use]
    pub fn with_recipient(mut self, id: &str, token: Option<&str>) -> Self {
        self.recipients
            .push((id.to_string(), token.map(str::to_string)));
        self
    }

    #[must_use]
    pub fn with_caller(mut self, id: &str, token: &str) -> Self {
        self.callers.push(CallerConfig {
            id: id.to_string(),
            token_sha256: token_digest(token),
        });
        self
    }

    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Write the recipients file, bind every listener and start serving
    ///
    /// # Errors
    ///
    /// Returns an error if any component fails to start.
    pub async fn build(self) -> anyhow::Result<TestHarness> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("recipients.ron");
        let entries = self
            .recipients
            .iter()
            .map(|(id, token)| match token {
                Some(token) => format!(r#"(id: "{id}", token: Some("{token}"))"#),
                None => format!(r#"(id: "{id}")"#),
            })
            .collect::<Vec<_>>()
            .join(",\n");
        std::fs::write(&path, format!("[\n{entries}\n]"))?;

        let config = KlaxonConfig {
            api: ApiConfig {
                listen_address: "127.0.0.1:0".to_string(),
                callers: self.callers,
                ..ApiConfig::default()
            },
            dispatch: self.dispatch,
            store: StoreConfig { path: Some(path) },
            health: HealthConfig {
                listen_address: "127.0.0.1:0".to_string(),
                sample_interval_ms: 20,
                ..HealthConfig::default()
            },
            ..KlaxonConfig::default()
        };

        let klaxon = Klaxon::build(config).await?;
        let api_addr = klaxon.api_addr()?;
        let health_addr = klaxon
            .health_addr()
            .ok_or_else(|| anyhow::anyhow!("health server not bound"))?;
        let service = Arc::clone(klaxon.service());
        let checker = Arc::clone(klaxon.health_checker());

        let (signals, _) = broadcast::channel(16);
        let serve_signals = signals.clone();
        let handle = tokio::spawn(async move { klaxon.serve(&serve_signals).await });

        Ok(TestHarness {
            api_addr,
            health_addr,
            service,
            checker,
            client: reqwest::Client::new(),
            signals,
            handle,
            _dir: dir,
        })
    }
}
