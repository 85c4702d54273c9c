//! Upstream token signing.
//!
//! The broker exposes a signing API: given an identity and capability
//! scope, it returns a signed, time-limited token. The long-lived API key
//! authenticates the signing call and lives only inside the signer; it is
//! never part of a request or response body.

use async_trait::async_trait;
use banter_core::Capability;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Signing errors.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The request could not be sent.
    #[error("Signing request failed: {0}")]
    Request(String),

    /// The signing endpoint answered with a non-success status.
    #[error("Signing endpoint returned status {0}")]
    Upstream(u16),

    /// The response body was not a valid signed token.
    #[error("Signing response could not be decoded: {0}")]
    Decode(String),
}

/// A request to mint one signed token.
#[derive(Debug, Clone, Serialize)]
pub struct SignRequest {
    /// Identity the token is minted for.
    pub identity: String,
    /// Capability scope to embed in the token.
    pub capability: Capability,
    /// Requested token lifetime in seconds.
    pub ttl_secs: u64,
}

/// A signed token returned by the broker.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedToken {
    /// The signed token in the broker's wire format.
    pub token: String,
    /// Issuance timestamp in unix milliseconds.
    pub issued_at: u64,
    /// Expiry timestamp in unix milliseconds.
    pub expires_at: u64,
}

/// A client for the broker's token signing API.
#[async_trait]
pub trait CredentialSigner: Send + Sync {
    /// Request a signed, scoped, time-limited token.
    async fn sign(&self, request: &SignRequest) -> Result<SignedToken, SignerError>;
}

/// HTTP signer calling the broker's signing endpoint.
pub struct HttpSigner {
    client: reqwest::Client,
    signing_url: String,
    api_key: String,
}

impl HttpSigner {
    /// Create a signer for the given endpoint, authenticated by `api_key`.
    #[must_use]
    pub fn new(signing_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            signing_url: signing_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CredentialSigner for HttpSigner {
    async fn sign(&self, request: &SignRequest) -> Result<SignedToken, SignerError> {
        debug!(identity = %request.identity, ttl_secs = request.ttl_secs, "Signing token");

        let response = self
            .client
            .post(&self.signing_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| SignerError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignerError::Upstream(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| SignerError::Decode(e.to_string()))
    }
}
