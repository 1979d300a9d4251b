//! Caller identification from bearer tokens.
//!
//! Tokens are never stored: the configuration holds the hex SHA-256 digest
//! of each caller's token, and a presented token is hashed before lookup.
//! An absent or unknown token yields no identity; whether that is fatal is
//! decided later by the request validator.

use std::collections::HashMap;

use klaxon_common::CallerIdentity;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CallerConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Caller {id} has an invalid token digest: expected 64 hex characters")]
    InvalidDigest { id: String },

    #[error("Token digest for caller {id} is already assigned to {existing}")]
    DuplicateDigest { id: String, existing: String },
}

/// Maps an optional bearer credential to a caller identity
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    fn identify(&self, bearer: Option<&str>) -> Option<CallerIdentity>;
}

/// Identity provider backed by a static table of token digests
#[derive(Debug, Default)]
pub struct TokenIdentityProvider {
    callers: HashMap<[u8; 32], CallerIdentity>,
}

impl TokenIdentityProvider {
    /// Build the lookup table from configured callers.
    ///
    /// # Errors
    ///
    /// Returns an error if a digest is not 64 hex characters, or if two
    /// callers share a digest.
    pub fn from_config(callers: &[CallerConfig]) -> Result<Self, AuthError> {
        let mut table = HashMap::with_capacity(callers.len());

        for caller in callers {
            let mut digest = [0u8; 32];
            hex::decode_to_slice(caller.token_sha256.trim(), &mut digest).map_err(|_| {
                AuthError::InvalidDigest {
                    id: caller.id.clone(),
                }
            })?;

            if let Some(existing) = table.insert(digest, CallerIdentity::new(caller.id.as_str())) {
                return Err(AuthError::DuplicateDigest {
                    id: caller.id.clone(),
                    existing: existing.as_str().to_string(),
                });
            }
        }

        Ok(Self { callers: table })
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

impl IdentityProvider for TokenIdentityProvider {
    fn identify(&self, bearer: Option<&str>) -> Option<CallerIdentity> {
        let token = bearer.map(str::trim).filter(|t| !t.is_empty())?;
        let digest: [u8; 32] = Sha256::digest(token.as_bytes()).into();

        let caller = self.callers.get(&digest).cloned();
        if caller.is_none() {
            tracing::debug!("Bearer token did not match any configured caller");
        }
        caller
    }
}

/// Hex SHA-256 digest of a token, in the form the configuration expects
#[must_use]
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: &str, token: &str) -> CallerConfig {
        CallerConfig {
            id: id.to_string(),
            token_sha256: token_digest(token),
        }
    }

    #[test]
    fn test_token_digest_is_sha256_hex() {
        assert_eq!(
            token_digest("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[test]
    fn test_identify_known_token() {
        let provider = TokenIdentityProvider::from_config(&[
            caller("alice", "alice-token"),
            caller("bob", "bob-token"),
        ])
        .expect("valid callers");

        assert_eq!(provider.len(), 2);
        assert_eq!(
            provider.identify(Some("alice-token")),
            Some(CallerIdentity::new("alice"))
        );
        assert_eq!(
            provider.identify(Some(" bob-token ")),
            Some(CallerIdentity::new("bob"))
        );
    }

    #[test]
    fn test_unknown_or_missing_token_is_anonymous() {
        let provider =
            TokenIdentityProvider::from_config(&[caller("alice", "alice-token")]).expect("valid");

        assert_eq!(provider.identify(Some("guess")), None);
        assert_eq!(provider.identify(Some("")), None);
        assert_eq!(provider.identify(None), None);
    }

    #[test]
    fn test_rejects_bad_digest() {
        let err = TokenIdentityProvider::from_config(&[CallerConfig {
            id: "alice".to_string(),
            token_sha256: "not-hex".to_string(),
        }])
        .unwrap_err();

        assert_eq!(
            err,
            AuthError::InvalidDigest {
                id: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_shared_digest() {
        let err = TokenIdentityProvider::from_config(&[
            caller("alice", "same"),
            caller("bob", "same"),
        ])
        .unwrap_err();

        assert!(matches!(err, AuthError::DuplicateDigest { ref id, .. } if id == "bob"));
    }
}
