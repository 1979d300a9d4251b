//! Typed error handling for alarm dispatch.
//!
//! Two layers of errors exist:
//! - Backend errors ([`StoreError`], [`ChannelError`]) describe what went
//!   wrong talking to an external collaborator and whether it is transient.
//! - [`AlertError`] is the boundary error: exactly one variant per
//!   [`ErrorKind`], carrying a human-readable message.
//!
//! Backend errors convert into `AlertError` with `?`, which is where the
//! retryable/terminal classification happens.

use std::{io, time::Duration};

use klaxon_common::ErrorKind;
use thiserror::Error;

/// Boundary error returned by every dispatch operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed precondition: {0}")]
    PreconditionFailed(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AlertError {
    /// Build the error for a given classification.
    #[must_use]
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidArgument => Self::InvalidArgument(message),
            ErrorKind::Unauthenticated => Self::Unauthenticated(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::PreconditionFailed => Self::PreconditionFailed(message),
            ErrorKind::Unavailable => Self::Unavailable(message),
            ErrorKind::Internal => Self::Internal(message),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The full message, for server-side logs.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::InvalidArgument(m)
            | Self::Unauthenticated(m)
            | Self::NotFound(m)
            | Self::PreconditionFailed(m)
            | Self::Unavailable(m)
            | Self::Internal(m) => m,
        }
    }

    /// The message safe to hand back to a caller.
    ///
    /// Internal and unavailable failures are replaced with fixed text so no
    /// backend detail crosses the boundary. Channel token refusals already
    /// carry fixed text.
    #[must_use]
    pub fn public_message(&self) -> &str {
        match self {
            Self::Internal(_) => "An error occurred while sending the alarm",
            Self::Unavailable(_) => "Alarm delivery is temporarily unavailable, try again later",
            other => other.detail(),
        }
    }
}

/// Errors raised by a recipient store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the request for now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The lookup did not complete in time.
    #[error("Store lookup timed out after {0:?}")]
    Timeout(Duration),

    /// Stored data could not be understood.
    #[error("Corrupt recipient data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Returns `true` if retrying the lookup later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<ron::error::SpannedError> for StoreError {
    fn from(error: ron::error::SpannedError) -> Self {
        Self::Corrupt(error.to_string())
    }
}

impl From<StoreError> for AlertError {
    fn from(error: StoreError) -> Self {
        if error.is_transient() {
            Self::Unavailable(error.to_string())
        } else {
            Self::Internal(error.to_string())
        }
    }
}

/// Errors reported by a delivery channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The token is no longer registered with the gateway.
    #[error("Token unregistered: {0}")]
    Unregistered(String),

    /// The gateway rejected the token as malformed or belonging elsewhere.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Channel request timed out: {0}")]
    Timeout(String),

    #[error("Channel connection failed: {0}")]
    Connection(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// 5xx-equivalent failure on the gateway side.
    #[error("Channel server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Our credentials for the gateway were refused.
    #[error("Channel authentication failed: {0}")]
    Auth(String),

    /// The gateway refused the request for any other reason.
    #[error("Rejected by channel: {0}")]
    Rejected(String),

    /// The gateway answered with something we could not understand.
    #[error("Malformed channel response: {0}")]
    Malformed(String),
}

impl ChannelError {
    /// Returns `true` if the same payload may succeed if sent again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::RateLimited { .. } | Self::ServerError { .. }
        )
    }

    /// Returns `true` if the recipient must re-register before delivery can work.
    #[must_use]
    pub const fn is_token_problem(&self) -> bool {
        matches!(self, Self::Unregistered(_) | Self::InvalidToken(_))
    }

    /// Minimum wait the gateway asked for before the next attempt.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short label used in metrics and logs.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        if self.is_transient() {
            "transient"
        } else {
            "terminal"
        }
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() || error.is_request() || error.is_body() {
            Self::Connection(error.to_string())
        } else if error.is_decode() {
            Self::Malformed(error.to_string())
        } else {
            Self::Rejected(error.to_string())
        }
    }
}

/// Caller-facing text for a token the channel refused. The gateway's own
/// answer stays in the dispatcher's logs.
const TOKEN_REFUSED: &str = "Delivery token was refused; the recipient must re-register";

impl From<ChannelError> for AlertError {
    fn from(error: ChannelError) -> Self {
        if error.is_token_problem() {
            Self::PreconditionFailed(TOKEN_REFUSED.to_string())
        } else if error.is_transient() {
            Self::Unavailable(error.to_string())
        } else {
            Self::Internal(error.to_string())
        }
    }
}
