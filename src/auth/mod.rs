//! Authentication: access tokens, the authenticator collaborator and the token slot.

mod provider;

pub use provider::{TokenFuture, TokenProvider};

use crate::config::PlatformConfig;
use crate::errors::{ErrorBody, PlatformError, PlatformErrorKind, PlatformResult};
use crate::observability::TracingHooks;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sentinel `expires` value for tokens that never expire.
pub const NEVER_EXPIRES: i64 = -1;

/// Bearer credential with an expiry in whole seconds since the epoch.
#[derive(Debug, Clone)]
pub struct Token {
    access_token: SecretString,
    expires: i64,
}

impl Token {
    /// Creates a token expiring at `expires` (seconds since epoch, or [`NEVER_EXPIRES`]).
    pub fn new(access_token: impl Into<String>, expires: i64) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            expires,
        }
    }

    /// Creates a token that never expires.
    pub fn never_expiring(access_token: impl Into<String>) -> Self {
        Self::new(access_token, NEVER_EXPIRES)
    }

    /// Creates a token expiring `seconds` from now.
    pub fn expiring_in(access_token: impl Into<String>, seconds: i64) -> Self {
        Self::new(access_token, Utc::now().timestamp() + seconds)
    }

    /// Exposes the raw access token.
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Expiry in seconds since epoch.
    pub fn expires(&self) -> i64 {
        self.expires
    }

    /// An empty token must never authorize a request.
    pub fn is_empty(&self) -> bool {
        self.access_token.expose_secret().is_empty()
    }

    /// Returns true if the token is expired at `now` (seconds since epoch).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires != NEVER_EXPIRES && now >= self.expires
    }

    /// Returns true if the token is expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Authorization header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }
}

/// Collaborator producing fresh tokens.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns a token. With `force_refresh` any cached token must be discarded.
    async fn authenticate(
        &self,
        config: &PlatformConfig,
        force_refresh: bool,
    ) -> PlatformResult<Token>;
}

/// Authenticator serving a fixed, never-expiring access token.
pub struct StaticTokenAuthenticator {
    token: SecretString,
}

impl StaticTokenAuthenticator {
    /// Creates a new static token authenticator.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, _config: &PlatformConfig, _force: bool) -> PlatformResult<Token> {
        Ok(Token::never_expiring(self.token.expose_secret().clone()))
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchanges the configured API token for short-lived access tokens.
pub struct ApiTokenAuthenticator {
    http: Client,
    cached: Arc<RwLock<Option<Token>>>,
}

impl ApiTokenAuthenticator {
    /// Creates a new authenticator using the given HTTP client.
    pub fn new(http: Client) -> Self {
        Self {
            http,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    async fn cached_token(&self) -> Option<Token> {
        let cache = self.cached.read().await;
        cache.as_ref().filter(|token| !token.is_expired()).cloned()
    }

    async fn exchange(&self, config: &PlatformConfig) -> PlatformResult<Token> {
        let api_token = config.api_token.as_ref().ok_or_else(|| {
            PlatformError::new(
                PlatformErrorKind::MissingAuth,
                "An API token is required to obtain access tokens",
            )
        })?;

        let url = format!("{}/oauth2/token", config.auth_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .basic_auth(&config.client_id, Some(""))
            .form(&[
                ("grant_type", "api_token"),
                ("api_token", api_token.expose_secret().as_str()),
            ])
            .send()
            .await
            .map_err(PlatformError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.map_err(PlatformError::transport)?;
            let body = serde_json::from_str(&text)
                .map(ErrorBody::Json)
                .unwrap_or(ErrorBody::Text(text));
            let cause = PlatformError::from_response(status.as_u16(), body);
            return Err(PlatformError::authentication(format!(
                "Token exchange failed: {}",
                cause.message()
            ))
            .with_status(status.as_u16())
            .with_cause(cause));
        }

        let payload: TokenResponse = response.json().await.map_err(|e| {
            PlatformError::deserialization(format!("Failed to parse token response: {}", e))
        })?;

        let token = match payload.expires_in {
            Some(seconds) => Token::expiring_in(payload.access_token, seconds),
            None => Token::never_expiring(payload.access_token),
        };

        Ok(token)
    }
}

#[async_trait]
impl Authenticator for ApiTokenAuthenticator {
    async fn authenticate(
        &self,
        config: &PlatformConfig,
        force_refresh: bool,
    ) -> PlatformResult<Token> {
        if !force_refresh {
            if let Some(token) = self.cached_token().await {
                return Ok(token);
            }
        }

        let token = self.exchange(config).await?;
        TracingHooks::on_auth_token_refresh(force_refresh);

        let mut cache = self.cached.write().await;
        *cache = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_token_expiry() {
        let token = Token::new("t", 100);
        assert!(!token.is_expired_at(99));
        assert!(token.is_expired_at(100));
        assert!(token.is_expired_at(101));
    }

    #[test]
    fn test_never_expiring_token() {
        let token = Token::never_expiring("T");
        assert!(!token.is_expired_at(i64::MAX));
        assert!(!token.is_expired());
        assert_eq!(token.bearer(), "Bearer T");
    }

    #[test]
    fn test_empty_token() {
        assert!(Token::never_expiring("").is_empty());
        assert!(!Token::never_expiring("x").is_empty());
    }

    #[tokio::test]
    async fn test_static_authenticator() {
        let auth = StaticTokenAuthenticator::new("static");
        let token = auth
            .authenticate(&PlatformConfig::default(), true)
            .await
            .unwrap();
        assert_eq!(token.access_token(), "static");
        assert_eq!(token.expires(), NEVER_EXPIRES);
    }

    fn config_for(server: &MockServer) -> PlatformConfig {
        PlatformConfig::builder()
            .base_url(server.uri())
            .api_token("api-token")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_api_token_exchange_and_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=api_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 900,
                "token_type": "bearer"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let auth = ApiTokenAuthenticator::new(Client::new());

        let first = auth.authenticate(&config, false).await.unwrap();
        assert_eq!(first.access_token(), "fresh");
        assert!(!first.is_expired());

        // Served from cache.
        auth.authenticate(&config, false).await.unwrap();
        // Forced refresh hits the server again.
        auth.authenticate(&config, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_token_exchange_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid API token"
            })))
            .mount(&server)
            .await;

        let auth = ApiTokenAuthenticator::new(Client::new());
        let err = auth
            .authenticate(&config_for(&server), true)
            .await
            .unwrap_err();

        assert_eq!(*err.kind(), PlatformErrorKind::AuthenticationFailed);
        assert_eq!(err.status_code(), Some(400));
        assert!(err.message().contains("Invalid API token"));
    }

    #[tokio::test]
    async fn test_api_token_exchange_text_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
            .mount(&server)
            .await;

        let auth = ApiTokenAuthenticator::new(Client::new());
        let err = auth
            .authenticate(&config_for(&server), false)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(503));
        assert!(err.message().contains("down for maintenance"));
    }

    #[tokio::test]
    async fn test_api_token_required() {
        let auth = ApiTokenAuthenticator::new(Client::new());
        let err = auth
            .authenticate(&PlatformConfig::default(), false)
            .await
            .unwrap_err();
        assert_eq!(*err.kind(), PlatformErrorKind::MissingAuth);
    }
}
