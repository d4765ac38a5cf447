#![allow(dead_code)]

use prism_load::transport::{HttpRequest, MockTransport, RawResponse};
use prism_load::{ClientConfig, Credentials, PrismClient};
use serde_json::{json, Value};
use std::sync::Arc;

pub const BASE_URL: &str = "https://wd.example.com";
pub const TENANT: &str = "acme";
pub const TOKEN_URL: &str = "https://wd.example.com/ccx/oauth2/acme/token";
pub const PRISM: &str = "https://wd.example.com/api/prismAnalytics/v3/acme";
pub const WQL: &str = "https://wd.example.com/api/wql/v1/acme";
pub const RAAS: &str = "https://wd.example.com/ccx/service";

pub fn credentials() -> Credentials {
    Credentials {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        refresh_token: "refresh-token".to_string(),
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::new(BASE_URL, TENANT, credentials())
}

pub fn is_token_request(request: &HttpRequest) -> bool {
    request.url == TOKEN_URL
}

pub fn token_response(token: &str) -> RawResponse {
    RawResponse::json(200, &json!({ "access_token": token, "token_type": "Bearer" }))
}

/// Answers every token exchange with the same bearer token.
pub fn expect_token(mock: &mut MockTransport) {
    mock.expect_send()
        .withf(is_token_request)
        .returning(|_| Ok(token_response("test-token")));
}

/// Routes the crate's events to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn client(mock: MockTransport) -> PrismClient {
    init_tracing();
    PrismClient::with_transport(&config(), Arc::new(mock))
}

pub fn offset_of(request: &HttpRequest) -> usize {
    request
        .query_value("offset")
        .and_then(|offset| offset.parse().ok())
        .unwrap_or(0)
}

pub fn limit_of(request: &HttpRequest) -> usize {
    request
        .query_value("limit")
        .and_then(|limit| limit.parse().ok())
        .unwrap_or(0)
}

/// `{"total": n, "data": [...]}` page holding `items[offset..offset+limit]`.
pub fn page_of(items: &[Value], request: &HttpRequest) -> RawResponse {
    let offset = offset_of(request).min(items.len());
    let end = (offset + limit_of(request)).min(items.len());
    let data = items[offset..end].to_vec();
    RawResponse::json(200, &json!({ "total": data.len(), "data": data }))
}

pub fn body_json(request: &HttpRequest) -> Option<Value> {
    match &request.body {
        prism_load::transport::RequestBody::Json(value) => Some(value.clone()),
        _ => None,
    }
}

