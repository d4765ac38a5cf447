//! Bearer-token lifecycle.
//!
//! The token exchange goes straight to the [`Transport`]; it never passes
//! through the authenticated gateway, so fetching a token can't recurse
//! into fetching a token.

use crate::config::Credentials;
use crate::transport::{HttpRequest, Transport};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, Instrument, Span};

/// Bearer tokens are refreshed once they are older than this.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(900);

/// A bearer token and when it was obtained.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    /// Age is measured from here against [`TOKEN_LIFETIME`].
    pub issued_at: Instant,
}

impl Credential {
    pub fn is_expired(&self, lifetime: Duration) -> bool {
        self.issued_at.elapsed() > lifetime
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges the refresh token for bearer tokens and caches the result.
///
/// The exchange goes straight to the transport, never through the gateway,
/// so a failed refresh can't recurse.
pub struct TokenManager {
    transport: Arc<dyn Transport>,
    token_endpoint: String,
    credentials: Credentials,
    lifetime: Duration,
    // Held across the exchange so refresh-then-cache is atomic for readers.
    cached: Mutex<Option<Credential>>,
    span: Span,
}

impl TokenManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        token_endpoint: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            transport,
            token_endpoint: token_endpoint.into(),
            credentials,
            lifetime: TOKEN_LIFETIME,
            cached: Mutex::new(None),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns a usable bearer token, exchanging the refresh token first when
    /// there is no cached credential or it has expired.
    ///
    /// Never fails: when the exchange fails the result is an empty string and
    /// the request it is attached to will be rejected by the server.
    pub async fn get_token(&self) -> String {
        let mut cached = self.cached.lock().await;
        let stale = match cached.as_ref() {
            Some(credential) => credential.is_expired(self.lifetime),
            None => true,
        };
        if stale {
            *cached = self.exchange().await;
        }
        cached
            .as_ref()
            .map(|credential| credential.token.clone())
            .unwrap_or_default()
    }

    /// Unconditionally exchanges the refresh token for a new bearer token.
    pub async fn refresh(&self) {
        let mut cached = self.cached.lock().await;
        *cached = self.exchange().await;
    }

    /// Drops the cached credential; the next `get_token` exchanges again.
    pub async fn reset(&self) {
        let mut cached = self.cached.lock().await;
        if cached.take().is_some() {
            debug!("bearer token reset");
        }
    }

    /// Snapshot of the cached credential, if any.
    pub async fn current(&self) -> Option<Credential> {
        self.cached.lock().await.clone()
    }

    async fn exchange(&self) -> Option<Credential> {
        let request = HttpRequest::post(&self.token_endpoint).form(vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            (
                "refresh_token".to_string(),
                self.credentials.refresh_token.clone(),
            ),
            ("client_id".to_string(), self.credentials.client_id.clone()),
            (
                "client_secret".to_string(),
                self.credentials.client_secret.clone(),
            ),
        ]);

        let result = self
            .transport
            .send(request)
            .instrument(self.span.clone())
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, url = %self.token_endpoint, "create bearer token failed: transport error");
                return None;
            }
        };

        if response.status != 200 {
            error!(
                status = response.status,
                url = %self.token_endpoint,
                "create bearer token failed: HTTP status code"
            );
            return None;
        }

        match serde_json::from_slice::<TokenResponse>(&response.body) {
            Ok(body) => {
                debug!("successfully obtained bearer token");
                Some(Credential {
                    token: body.access_token,
                    issued_at: Instant::now(),
                })
            }
            Err(e) => {
                error!(error = %e, "create bearer token failed: response has no access_token");
                None
            }
        }
    }
}
