//! HTTP handlers for the issuance service.
//!
//! One endpoint does the real work: `GET /api/token` mints a credential for
//! an anonymous identity. Failures never leak upstream detail; the client
//! sees a generic 500 body and the detail goes to the server log.

use crate::config::Config;
use crate::issuer::TokenIssuer;
use crate::metrics::{self, RequestMetricsGuard};
use crate::signer::HttpSigner;
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The token issuer; `None` when the broker API key is unconfigured.
    pub issuer: Option<TokenIssuer>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create app state, building the issuer if the configuration allows.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let issuer = match config.issuer_settings() {
            Ok(settings) => {
                let signer = Arc::new(HttpSigner::new(
                    settings.signing_url.clone(),
                    settings.api_key.clone(),
                ));
                Some(TokenIssuer::new(settings, signer))
            }
            Err(e) => {
                // The server still starts; every token request answers 500
                // until the key is configured.
                warn!(error = %e, "Token issuance disabled");
                None
            }
        };

        Self { issuer, config }
    }
}

/// Run the HTTP server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = Router::new()
        .route("/api/token", get(token_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Banter issuer listening on {}", addr);
    info!("Token endpoint: http://{}/api/token", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Token issuance handler.
async fn token_handler(State(state): State<Arc<AppState>>) -> Response {
    let _guard = RequestMetricsGuard::new();

    let Some(issuer) = state.issuer.as_ref() else {
        // No key, no upstream call.
        metrics::record_issuance_failure("unconfigured");
        return issuance_error("token issuance is not configured");
    };

    let start = Instant::now();
    match issuer.issue().await {
        Ok(credential) => {
            metrics::record_token_issued();
            metrics::record_issuance_latency(start.elapsed().as_secs_f64());
            (StatusCode::OK, Json(credential)).into_response()
        }
        Err(e) => {
            // Detail was already logged by the issuer.
            metrics::record_issuance_failure("upstream");
            issuance_error(&e.to_string())
        }
    }
}

/// Build the generic 500 response; the message never carries upstream
/// detail.
fn issuance_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::tests::{test_settings, CountingSigner};
    use banter_core::{current_timestamp_ms, Credential};
    use std::sync::atomic::Ordering;

    fn keyless_config() -> Config {
        let mut config = Config::default();
        config.broker.api_key = None;
        config
    }

    fn state_with_issuer(issuer: Option<TokenIssuer>) -> Arc<AppState> {
        Arc::new(AppState {
            issuer,
            config: keyless_config(),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_token_handler_success() {
        let signer = CountingSigner::succeeding();
        let issuer = TokenIssuer::new(test_settings(), Arc::clone(&signer) as Arc<dyn crate::signer::CredentialSigner>);
        let state = state_with_issuer(Some(issuer));

        let response = token_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let credential: Credential = serde_json::from_value(body.clone()).unwrap();

        let (prefix, suffix) = credential.identity.split_once('-').unwrap();
        assert_eq!(prefix, "guest");
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        assert!(credential.expires_at > current_timestamp_ms());

        // The long-lived key never appears in the response.
        assert!(!body.to_string().contains("sk_test_123"));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_handler_without_key_answers_500() {
        // AppState::new with a keyless config builds no issuer at all, so
        // no signing client even exists to be called.
        let state = Arc::new(AppState::new(keyless_config()));
        assert!(state.issuer.is_none());

        let response = token_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(body.get("error").is_some());
    }

    #[tokio::test]
    async fn test_token_handler_upstream_failure_is_generic() {
        let signer = CountingSigner::failing();
        let issuer = TokenIssuer::new(test_settings(), Arc::clone(&signer) as Arc<dyn crate::signer::CredentialSigner>);
        let state = state_with_issuer(Some(issuer));

        let response = token_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        let message = body["error"].as_str().unwrap();
        // Generic message only; the 503 from the signer stays server-side.
        assert_eq!(message, "Credential issuance failed");
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }
}
