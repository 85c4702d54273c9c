//! The token issuer core.
//!
//! Stateless: each `issue` call generates a fresh anonymous identity, asks
//! the signer for a scoped token, and assembles a credential. Nothing is
//! retained between calls, so any number of instances can run in parallel.
//! Retry on failure belongs to the caller (the client session), not here.

use banter_core::{generate_handle, Capability, Credential};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::IssuerSettings;
use crate::signer::{CredentialSigner, SignRequest};

/// Issuance failures, deliberately free of upstream detail.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// The upstream signing call failed. Detail is logged server-side only.
    #[error("Credential issuance failed")]
    Issuance,
}

/// Mints short-lived, capability-scoped credentials.
pub struct TokenIssuer {
    settings: IssuerSettings,
    signer: Arc<dyn CredentialSigner>,
}

impl TokenIssuer {
    /// Create an issuer from validated settings and a signer.
    #[must_use]
    pub fn new(settings: IssuerSettings, signer: Arc<dyn CredentialSigner>) -> Self {
        Self { settings, signer }
    }

    /// The channel issued credentials are scoped to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.settings.channel
    }

    /// Mint one credential for a fresh anonymous identity.
    ///
    /// # Errors
    ///
    /// Returns [`IssuerError::Issuance`] if the upstream signing call
    /// fails; the upstream error is logged, not propagated.
    pub async fn issue(&self) -> Result<Credential, IssuerError> {
        let identity = generate_handle(&self.settings.handle_prefix);
        let capability = Capability::subscribe_publish(self.settings.channel.clone());

        let request = SignRequest {
            identity: identity.clone(),
            capability: capability.clone(),
            ttl_secs: self.settings.token_ttl_secs,
        };

        let signed = self.signer.sign(&request).await.map_err(|e| {
            error!(identity = %identity, error = %e, "Upstream signing failed");
            IssuerError::Issuance
        })?;

        debug!(
            identity = %identity,
            channel = %capability.channel,
            expires_at = signed.expires_at,
            "Issued credential"
        );

        Ok(Credential {
            identity,
            capability,
            issued_at: signed.issued_at,
            expires_at: signed.expires_at,
            token: signed.token,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::signer::{SignedToken, SignerError};
    use async_trait::async_trait;
    use banter_core::current_timestamp_ms;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn test_settings() -> IssuerSettings {
        IssuerSettings {
            api_key: "sk_test_123".to_string(),
            signing_url: "https://broker.example.com/keys/sign".to_string(),
            token_ttl_secs: 3600,
            handle_prefix: "guest".to_string(),
            channel: "chat:lobby".to_string(),
        }
    }

    /// Signer double that counts calls and returns a fixed outcome.
    pub(crate) struct CountingSigner {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl CountingSigner {
        pub(crate) fn succeeding() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        pub(crate) fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl CredentialSigner for CountingSigner {
        async fn sign(&self, request: &SignRequest) -> Result<SignedToken, SignerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SignerError::Upstream(503));
            }
            let now = current_timestamp_ms();
            Ok(SignedToken {
                token: format!("signed-for-{}", request.identity),
                issued_at: now,
                expires_at: now + request.ttl_secs * 1000,
            })
        }
    }

    #[tokio::test]
    async fn test_issue_produces_scoped_future_credential() {
        let signer = CountingSigner::succeeding();
        let issuer = TokenIssuer::new(test_settings(), Arc::clone(&signer) as Arc<dyn crate::signer::CredentialSigner>);

        let credential = issuer.issue().await.unwrap();

        assert!(credential.expires_at > credential.issued_at);
        assert_eq!(credential.capability.channel, "chat:lobby");

        // Handle matches `prefix-\d+`.
        let (prefix, suffix) = credential.identity.split_once('-').unwrap();
        assert_eq!(prefix, "guest");
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));

        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_issued_credential_never_contains_api_key() {
        let issuer = TokenIssuer::new(test_settings(), CountingSigner::succeeding());

        let credential = issuer.issue().await.unwrap();
        let wire = serde_json::to_string(&credential).unwrap();
        assert!(!wire.contains("sk_test_123"));
    }

    #[tokio::test]
    async fn test_issue_maps_upstream_failure_without_detail() {
        let signer = CountingSigner::failing();
        let issuer = TokenIssuer::new(test_settings(), Arc::clone(&signer) as Arc<dyn crate::signer::CredentialSigner>);

        let err = issuer.issue().await.unwrap_err();
        assert_eq!(err.to_string(), "Credential issuance failed");
        // No retry inside the issuer.
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_each_issue_mints_a_fresh_identity() {
        let issuer = TokenIssuer::new(test_settings(), CountingSigner::succeeding());

        let mut identities = std::collections::HashSet::new();
        for _ in 0..5 {
            identities.insert(issuer.issue().await.unwrap().identity);
        }
        // Random suffixes may collide occasionally but not five times over.
        assert!(identities.len() > 1);
    }
}
