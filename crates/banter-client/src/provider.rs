//! Credential acquisition.
//!
//! A [`CredentialProvider`] is the pull-based renewal callback required by
//! the transport: whenever the broker signals that a token is expiring, the
//! transport re-invokes the provider and never needs to know where
//! credentials come from. The session uses the same provider for its
//! initial credential.

use async_trait::async_trait;
use banter_core::Credential;
use thiserror::Error;
use tracing::debug;

/// Errors raised while fetching a credential.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request could not be sent or timed out.
    #[error("Credential request failed: {0}")]
    Request(String),

    /// The issuance endpoint answered with a non-success status.
    #[error("Credential endpoint returned status {0}")]
    Status(u16),

    /// The response body was not a valid credential.
    #[error("Credential response could not be decoded: {0}")]
    Decode(String),
}

/// A source of fresh credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetch a newly issued credential.
    async fn credential(&self) -> Result<Credential, ProviderError>;
}

/// Fetches credentials from the token issuance HTTP endpoint.
pub struct HttpCredentialProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCredentialProvider {
    /// Create a provider for the given issuance endpoint URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Create a provider reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The issuance endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn credential(&self) -> Result<Credential, ProviderError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let credential: Credential = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        debug!(
            identity = %credential.identity,
            expires_at = credential.expires_at,
            "Fetched credential"
        );

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_endpoint() {
        let provider = HttpCredentialProvider::new("http://localhost:8080/api/token");
        assert_eq!(provider.endpoint(), "http://localhost:8080/api/token");
    }
}
