//! Recipient storage.
//!
//! The dispatcher only reads recipients; registration and token refresh
//! happen elsewhere and land in whatever backs a [`RecipientStore`].

mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use klaxon_common::{Recipient, RecipientId};
pub use memory::MemoryRecipientStore;

use crate::StoreError;

/// Read access to recipient records.
#[async_trait]
pub trait RecipientStore: Send + Sync + Debug {
    /// Look up a recipient by id.
    ///
    /// Returns `Ok(None)` if no such recipient exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    async fn get(&self, id: &RecipientId) -> Result<Option<Recipient>, StoreError>;

    /// Whether the store can currently serve lookups.
    fn is_ready(&self) -> bool {
        true
    }
}
