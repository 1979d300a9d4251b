//! Failure classification shared by every layer of the dispatcher.
//!
//! Each failure that crosses the operation boundary is reduced to exactly
//! one [`ErrorKind`]. The kind decides the wire status name, the HTTP status
//! returned to callers and whether the failure may be retried.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a failed alarm dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The request was malformed (e.g. missing target identifier).
    InvalidArgument,
    /// No caller identity was supplied while authentication is required.
    Unauthenticated,
    /// The target recipient does not exist.
    NotFound,
    /// The recipient has no usable delivery token.
    #[serde(rename = "FAILED_PRECONDITION")]
    PreconditionFailed,
    /// A transient store or channel failure persisted past the retry bound.
    Unavailable,
    /// Anything unexpected. Never retried.
    Internal,
}

impl ErrorKind {
    /// Wire name of this classification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::NotFound => "NOT_FOUND",
            Self::PreconditionFailed => "FAILED_PRECONDITION",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }

    /// HTTP status code used when this kind is returned over HTTP.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidArgument => 400,
            Self::Unauthenticated => 401,
            Self::NotFound => 404,
            Self::PreconditionFailed => 412,
            Self::Unavailable => 503,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
