//! Shared test doubles for dispatch integration tests
#![allow(dead_code)] // Test utility module - not all helpers used in every test

pub mod mock_channel;
pub mod mock_fcm;

use std::sync::Arc;

use klaxon_common::{CallerIdentity, DeliveryToken, Recipient};
use klaxon_dispatch::{AlertService, DeliveryChannel, DispatchConfig, RecipientStore, RetryPolicy};

pub use self::{
    mock_channel::{CountingStore, ScriptedChannel},
    mock_fcm::{MockFcmServer, MockResponse},
};

/// Recipients used across the scenarios:
/// - `u1` has token `tok-abc`
/// - `u3` exists without a token
pub fn seeded_store() -> Arc<CountingStore> {
    Arc::new(CountingStore::with([
        Recipient::new("u1", Some(DeliveryToken::new("tok-abc"))),
        Recipient::new("u3", None),
    ]))
}

pub fn caller() -> Option<CallerIdentity> {
    Some(CallerIdentity::new("alice"))
}

/// Default config with jitter disabled so backoff timing is exact.
pub fn config() -> DispatchConfig {
    DispatchConfig {
        retry: RetryPolicy::default().without_jitter(),
        ..DispatchConfig::default()
    }
}

pub fn service(
    config: DispatchConfig,
    store: &Arc<CountingStore>,
    channel: Arc<dyn DeliveryChannel>,
) -> Arc<AlertService> {
    let store: Arc<dyn RecipientStore> = Arc::clone(store) as Arc<dyn RecipientStore>;
    Arc::new(AlertService::new(config, store, channel))
}
