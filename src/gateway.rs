//! Authenticated HTTP gateway.
//!
//! Every call except the token exchange goes through [`HttpGateway::send`],
//! which injects `Authorization: Bearer <token>` and never fails: transport
//! errors and malformed URLs come back as a synthetic response with status
//! [`SYNTHETIC_FAILURE_STATUS`], so callers branch on status codes only.

use crate::token::TokenManager;
use crate::transport::{FilePart, HttpRequest, RawResponse, Transport};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, warn, Instrument, Span};

/// Status used for responses the client fabricates when no request was made
/// or no response arrived.
pub const SYNTHETIC_FAILURE_STATUS: u16 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 200
    Ok,
    /// 201
    Created,
    /// Any other 2xx
    Success,
    /// 400, body carries a structured error
    ValidationError,
    /// 401
    Unauthorized,
    /// 404
    NotFound,
    Unexpected,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200 => StatusClass::Ok,
            201 => StatusClass::Created,
            202..=299 => StatusClass::Success,
            400 => StatusClass::ValidationError,
            401 => StatusClass::Unauthorized,
            404 => StatusClass::NotFound,
            _ => StatusClass::Unexpected,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StatusClass::Ok | StatusClass::Created | StatusClass::Success
        )
    }
}

/// Response-like value returned for every gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status, or [`SYNTHETIC_FAILURE_STATUS`] when nothing was sent.
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn synthetic(message: &str) -> Self {
        let body = serde_json::json!({ "errors": [{ "error": message }] });
        Self {
            status: SYNTHETIC_FAILURE_STATUS,
            body: body.to_string().into_bytes(),
        }
    }

    pub fn class(&self) -> StatusClass {
        StatusClass::of(self.status)
    }

    pub fn is_synthetic(&self) -> bool {
        self.status == SYNTHETIC_FAILURE_STATUS
    }

    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        match serde_json::from_slice(&self.body) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, status = self.status, "response body is not the expected JSON");
                None
            }
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl From<RawResponse> for ApiResponse {
    fn from(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            body: raw.body,
        }
    }
}

/// Authenticated request sender that never fails.
///
/// Every call returns an [`ApiResponse`]: a missing URL or a transport error
/// becomes a synthetic response with status [`SYNTHETIC_FAILURE_STATUS`], and
/// a 401 drops the cached token so the next call fetches a new one.
pub struct HttpGateway {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenManager>,
    span: Span,
}

impl HttpGateway {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<TokenManager>) -> Self {
        Self {
            transport,
            tokens,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn get(&self, url: &str) -> ApiResponse {
        self.send(HttpRequest::get(url)).await
    }

    pub async fn get_with(&self, url: &str, params: &[(&str, String)]) -> ApiResponse {
        let request = params
            .iter()
            .fold(HttpRequest::get(url), |request, (name, value)| {
                request.query(*name, value)
            });
        self.send(request).await
    }

    pub async fn post(&self, url: &str) -> ApiResponse {
        self.send(HttpRequest::post(url)).await
    }

    pub async fn post_json(&self, url: &str, body: serde_json::Value) -> ApiResponse {
        self.send(HttpRequest::post(url).json(body)).await
    }

    pub async fn post_file(&self, url: &str, part: FilePart) -> ApiResponse {
        self.send(HttpRequest::post(url).file(part)).await
    }

    pub async fn put_json(&self, url: &str, body: serde_json::Value) -> ApiResponse {
        self.send(HttpRequest::put(url).json(body)).await
    }

    pub async fn patch_json(&self, url: &str, body: serde_json::Value) -> ApiResponse {
        self.send(HttpRequest::patch(url).json(body)).await
    }

    /// Sends `request` with a bearer token attached unless the caller already
    /// supplied an `Authorization` header.
    pub async fn send(&self, request: HttpRequest) -> ApiResponse {
        let span = self.span.clone();
        self.send_inner(request).instrument(span).await
    }

    async fn send_inner(&self, mut request: HttpRequest) -> ApiResponse {
        let method = request.method.as_str();

        if request.url.trim().is_empty() {
            let message = format!("{method}: missing URL");
            error!(method, "{message}");
            return ApiResponse::synthetic(&message);
        }

        if !request.has_header("Authorization") {
            let token = self.tokens.get_token().await;
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let url = request.url.clone();
        debug!(method, url = %url, "sending request");
        let started = Instant::now();

        let response: ApiResponse = match self.transport.send(request).await {
            Ok(raw) => raw.into(),
            Err(e) => {
                error!(method, url = %url, error = %e, "request failed before a response arrived");
                return ApiResponse::synthetic(&e.to_string());
            }
        };

        debug!(
            method,
            url = %url,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "response received"
        );

        match response.class() {
            StatusClass::Ok | StatusClass::Created | StatusClass::Success => {}
            StatusClass::ValidationError | StatusClass::NotFound => {
                warn!(method, url = %url, status = response.status, body = %response.text(), "request rejected");
            }
            StatusClass::Unauthorized => {
                error!(method, url = %url, "unauthorized, dropping cached bearer token");
                self.tokens.reset().await;
            }
            StatusClass::Unexpected => {
                error!(method, url = %url, status = response.status, body = %response.text(), "unexpected HTTP status");
            }
        }

        response
    }
}
