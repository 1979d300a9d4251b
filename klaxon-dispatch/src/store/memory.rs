use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use klaxon_common::{Recipient, RecipientId};

use super::RecipientStore;
use crate::StoreError;

/// In-memory recipient store
///
/// Recipients live in a `HashMap` behind an `RwLock`. Suitable for tests,
/// small deployments, and as the target of a RON recipients file loaded at
/// startup.
///
/// # File format
///
/// ```ron
/// [
///     (id: "u1", token: Some("tok-abc")),
///     (id: "u2", token: None, updated_at: "2024-05-01T12:00:00Z"),
/// ]
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecipientStore {
    recipients: Arc<RwLock<HashMap<RecipientId, Recipient>>>,
}

impl MemoryRecipientStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load recipients from a RON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    /// Parse recipients from a RON document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the document is not a list of
    /// recipients.
    pub fn from_ron(contents: &str) -> Result<Self, StoreError> {
        let list: Vec<Recipient> = ron::from_str(contents)?;
        Ok(list.into_iter().collect())
    }

    /// Insert or replace a recipient, returning the previous record.
    pub fn insert(&self, recipient: Recipient) -> Option<Recipient> {
        self.recipients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(recipient.id.clone(), recipient)
    }

    pub fn remove(&self, id: &RecipientId) -> Option<Recipient> {
        self.recipients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recipients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Recipient> for MemoryRecipientStore {
    fn from_iter<T: IntoIterator<Item = Recipient>>(iter: T) -> Self {
        let recipients = iter.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            recipients: Arc::new(RwLock::new(recipients)),
        }
    }
}

#[async_trait]
impl RecipientStore for MemoryRecipientStore {
    async fn get(&self, id: &RecipientId) -> Result<Option<Recipient>, StoreError> {
        Ok(self
            .recipients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use klaxon_common::DeliveryToken;

    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryRecipientStore::new();
        assert!(store.is_empty());

        store.insert(Recipient::new("u1", Some(DeliveryToken::new("tok-abc"))));

        let found = store
            .get(&RecipientId::from("u1"))
            .await
            .expect("lookup succeeds")
            .expect("recipient exists");
        assert_eq!(found.usable_token().map(DeliveryToken::expose), Some("tok-abc"));

        let missing = store.get(&RecipientId::from("u2")).await.expect("lookup succeeds");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces() {
        let store = MemoryRecipientStore::new();
        store.insert(Recipient::new("u1", Some(DeliveryToken::new("old"))));
        let previous = store.insert(Recipient::new("u1", Some(DeliveryToken::new("new"))));

        assert!(previous.is_some());
        assert_eq!(store.len(), 1);

        store.remove(&RecipientId::from("u1"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"[
                (id: "u1", token: Some("tok-abc")),
                (id: "u2", token: None, updated_at: "2024-05-01T12:00:00Z"),
            ]"#
        )
        .expect("write recipients");

        let store = MemoryRecipientStore::from_file(file.path()).expect("load recipients");
        assert_eq!(store.len(), 2);

        let u2 = store
            .get(&RecipientId::from("u2"))
            .await
            .expect("lookup succeeds")
            .expect("recipient exists");
        assert!(u2.usable_token().is_none());
    }

    #[test]
    fn test_from_ron_rejects_garbage() {
        let err = MemoryRecipientStore::from_ron("not a list").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_from_file_missing() {
        let err = MemoryRecipientStore::from_file("/nonexistent/recipients.ron").unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
