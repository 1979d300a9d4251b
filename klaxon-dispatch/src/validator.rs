//! Request validation.
//!
//! Turns raw caller input into an [`AlertRequest`]. The target is checked
//! before the caller, so a request that is both anonymous and missing a
//! target reports the missing target.

use klaxon_common::{AlertRequest, CallerIdentity, RecipientId};

use crate::AlertError;

/// Validates incoming alarm requests.
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator {
    require_authentication: bool,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RequestValidator {
    #[must_use]
    pub const fn new(require_authentication: bool) -> Self {
        Self {
            require_authentication,
        }
    }

    /// Check the caller and target, producing a validated request.
    ///
    /// # Errors
    ///
    /// - [`AlertError::InvalidArgument`] if `target` is absent or blank.
    ///   Any other target is passed through as given.
    /// - [`AlertError::Unauthenticated`] if there is no caller and
    ///   authentication is required
    pub fn validate(
        &self,
        caller: Option<CallerIdentity>,
        target: Option<&str>,
    ) -> Result<AlertRequest, AlertError> {
        let target = target
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AlertError::InvalidArgument("targetUserId is required".to_string()))?;

        let caller = caller.filter(|c| !c.as_str().trim().is_empty());

        if caller.is_none() && self.require_authentication {
            return Err(AlertError::Unauthenticated(
                "The function must be called while authenticated".to_string(),
            ));
        }

        Ok(AlertRequest::new(RecipientId::from(target), caller))
    }
}
