use serde::Serialize;

use crate::ErrorKind;

/// Why a dispatch ended without a channel message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of submitting one payload to the delivery channel.
///
/// `message_id` is present iff `success`; `error` is present iff not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchFailure>,
    /// Number of channel calls made, including the successful one.
    pub attempts: u32,
}

impl DispatchResult {
    #[must_use]
    pub fn sent(message_id: impl Into<String>, attempts: u32) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
            attempts,
        }
    }

    #[must_use]
    pub fn failed(kind: ErrorKind, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(DispatchFailure {
                kind,
                message: message.into(),
            }),
            attempts,
        }
    }

    /// Classification of the failure, if any.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
