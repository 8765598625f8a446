//! Shared helpers for integration tests using WireMock.

#![allow(dead_code)]

use integrations_platform::mocks::MockAuthenticator;
use integrations_platform::{PlatformClient, PlatformConfig};
use serde_json::Value;
use std::sync::Arc;
use wiremock::{MockServer, ResponseTemplate};

/// Starts a mock server.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Config pointing every base URL at the mock server.
pub fn config_for(server: &MockServer) -> PlatformConfig {
    PlatformConfig::builder()
        .base_url(server.uri())
        .build()
        .expect("valid test config")
}

/// Client authenticating through a counting mock.
pub fn client_with(server: &MockServer, auth: &MockAuthenticator) -> PlatformClient {
    PlatformClient::with_authenticator(config_for(server), Arc::new(auth.clone()))
        .expect("valid test client")
}

/// Client with a static access token; 401s are never retried.
pub fn static_client(server: &MockServer, token: &str) -> PlatformClient {
    PlatformClient::builder()
        .base_url(server.uri())
        .access_token(token)
        .build()
        .expect("valid test client")
}

/// Helper to create success response templates.
pub fn success_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Helper to create error response templates.
pub fn error_response(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(body)
}
