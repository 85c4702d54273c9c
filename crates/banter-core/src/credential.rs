//! Credentials for realtime channel access.
//!
//! A credential is minted per session by the issuance service and handed to
//! the realtime transport. It carries a signed broker token, the anonymous
//! identity it was minted for, and the capability scope it grants. The
//! broker's long-lived API key never appears in a credential.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The credential's expiry is in the past.
    #[error("Credential expired at {expires_at} (now {now})")]
    Expired {
        /// Expiry timestamp in unix milliseconds.
        expires_at: u64,
        /// Current time in unix milliseconds.
        now: u64,
    },
}

/// An operation a credential permits on its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Receive messages published to the channel.
    Subscribe,
    /// Publish messages to the channel.
    Publish,
}

/// The scope a credential grants: a set of operations on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Channel the scope applies to.
    pub channel: String,
    /// Permitted operations.
    pub operations: Vec<Operation>,
}

impl Capability {
    /// Create the standard chat scope: subscribe and publish on one channel.
    #[must_use]
    pub fn subscribe_publish(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            operations: vec![Operation::Subscribe, Operation::Publish],
        }
    }

    /// Check whether the scope permits an operation.
    #[must_use]
    pub fn allows(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}

/// A short-lived, capability-scoped broker access token.
///
/// Exactly one credential is live per session at a time; renewal replaces
/// it wholesale. An expired credential must never be presented to the
/// transport, so callers validate before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Anonymous identity the token was minted for (display only).
    pub identity: String,
    /// Scope the token grants.
    pub capability: Capability,
    /// Issuance timestamp in unix milliseconds.
    pub issued_at: u64,
    /// Expiry timestamp in unix milliseconds.
    pub expires_at: u64,
    /// The signed token in the broker's wire format (opaque).
    pub token: String,
}

impl Credential {
    /// Check whether the credential has expired as of `now` (unix ms).
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Validate the credential for use at `now` (unix ms).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Expired`] if the expiry has passed.
    pub fn validate(&self, now: u64) -> Result<(), CredentialError> {
        if self.is_expired(now) {
            return Err(CredentialError::Expired {
                expires_at: self.expires_at,
                now,
            });
        }
        Ok(())
    }

    /// Milliseconds of validity remaining at `now`, zero if expired.
    #[must_use]
    pub fn ttl_remaining(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}
