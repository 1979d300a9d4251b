use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RecipientId;

/// Identity of an authenticated caller, as asserted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated request to ring one recipient's alarm.
///
/// Lives only for the duration of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub target: RecipientId,

    /// `None` only when the service is configured to accept anonymous callers.
    pub caller: Option<CallerIdentity>,

    pub created_at: DateTime<Utc>,
}

impl AlertRequest {
    #[must_use]
    pub fn new(target: RecipientId, caller: Option<CallerIdentity>) -> Self {
        Self {
            target,
            caller,
            created_at: Utc::now(),
        }
    }

    /// Caller identity for logging, `anonymous` when absent.
    #[must_use]
    pub fn caller_label(&self) -> &str {
        self.caller.as_ref().map_or("anonymous", CallerIdentity::as_str)
    }
}
