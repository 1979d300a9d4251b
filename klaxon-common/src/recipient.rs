use std::{borrow::Borrow, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DeliveryToken;

/// Unique, opaque recipient identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(Arc<str>);

impl RecipientId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecipientId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for RecipientId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl Borrow<str> for RecipientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored record mapping a user identifier to their current delivery token.
///
/// Owned by the backing store. The dispatcher only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,

    /// Absent means the recipient is currently undeliverable.
    #[serde(default)]
    pub token: Option<DeliveryToken>,

    /// When the token was last refreshed. Defaults to load time when the
    /// stored record has none.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Recipient {
    #[must_use]
    pub fn new(id: impl Into<RecipientId>, token: Option<DeliveryToken>) -> Self {
        Self {
            id: id.into(),
            token,
            updated_at: Utc::now(),
        }
    }

    /// The token, if one is present and non-blank.
    #[must_use]
    pub fn usable_token(&self) -> Option<&DeliveryToken> {
        self.token.as_ref().filter(|t| !t.is_empty())
    }
}
