//! In-process channel and store doubles
//!
//! `ScriptedChannel` replays a queue of outcomes and records every payload it
//! was handed; `CountingStore` wraps the memory store and counts lookups so
//! tests can assert a stage was never reached.

use std::{
    collections::VecDeque,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use klaxon_common::{Recipient, RecipientId};
use klaxon_dispatch::{
    AlertPayload, ChannelError, DeliveryChannel, MemoryRecipientStore, RecipientStore, StoreError,
};

/// One scripted channel outcome
#[derive(Debug, Clone)]
pub enum Outcome {
    Accept(String),
    Fail(ChannelError),
    /// Wait before accepting, to simulate a slow gateway
    Slow(Duration, String),
}

/// Delivery channel that replays a fixed script
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    script: Mutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    sent_to: Mutex<Vec<String>>,
}

impl ScriptedChannel {
    /// Channel that accepts every payload with `msg-123`
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Fail with each error in turn, then accept
    #[must_use]
    pub fn failing_then_accepting(errors: impl IntoIterator<Item = ChannelError>) -> Self {
        Self::with(errors.into_iter().map(Outcome::Fail))
    }

    /// Number of `send` calls made
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `send` calls that ran to completion
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Tokens (exposed) that payloads were addressed to, in call order
    #[must_use]
    pub fn sent_to(&self) -> Vec<String> {
        self.sent_to
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DeliveryChannel for ScriptedChannel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn send(&self, payload: &AlertPayload) -> Result<String, ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent_to
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.token().expose().to_string());

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        let result = match next {
            None => Ok("msg-123".to_string()),
            Some(Outcome::Accept(id)) => Ok(id),
            Some(Outcome::Fail(error)) => Err(error),
            Some(Outcome::Slow(delay, id)) => {
                tokio::time::sleep(delay).await;
                Ok(id)
            }
        };

        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Memory store that counts lookups and can be switched offline
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: MemoryRecipientStore,
    lookups: AtomicUsize,
    offline: AtomicBool,
}

impl CountingStore {
    #[must_use]
    pub fn with(recipients: impl IntoIterator<Item = Recipient>) -> Self {
        Self {
            inner: recipients.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Make every lookup fail with `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecipientStore for CountingStore {
    async fn get(&self, id: &RecipientId) -> Result<Option<Recipient>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        self.inner.get(id).await
    }

    fn is_ready(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}
