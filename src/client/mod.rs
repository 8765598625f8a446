//! Platform API client implementation.

mod request;
mod response;

pub use request::{ApiRequest, Payload, RequestOptions};
pub use response::ApiResponse;

use crate::auth::{
    ApiTokenAuthenticator, Authenticator, StaticTokenAuthenticator, Token, TokenProvider,
};
use crate::config::{PlatformConfig, PlatformConfigBuilder};
use crate::errors::{ErrorBody, PlatformError, PlatformErrorKind, PlatformResult};
use crate::observability::{redact_url, Metrics, RequestTimer, TracingHooks};
use crate::resource::{Entity, ResourceService};
use crate::services::*;
use crate::template::Params;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

const JSON_CONTENT_TYPE: &str = "application/json";
const IMAGE_CONTENT_TYPES: &[&str] = &["image/gif", "image/jpeg", "image/png"];

/// Outcome of one HTTP exchange.
enum Exchange {
    Complete(ApiResponse),
    /// 401 that still has re-authentication budget.
    Unauthorized,
}

/// Platform API client.
///
/// Cheap to clone; clones share the HTTP pool, the token slot and metrics.
#[derive(Clone)]
pub struct PlatformClient {
    /// HTTP client.
    http: Client,
    /// Configuration.
    config: Arc<PlatformConfig>,
    /// Token-producing collaborator.
    authenticator: Arc<dyn Authenticator>,
    /// Current token future.
    tokens: Arc<TokenProvider>,
    /// Request metrics.
    metrics: Arc<Metrics>,
}

impl PlatformClient {
    /// Creates a new client, choosing the authenticator from the configuration.
    pub fn new(config: PlatformConfig) -> PlatformResult<Self> {
        let http = build_http_client(&config)?;

        let authenticator: Arc<dyn Authenticator> = if let Some(token) = &config.access_token {
            Arc::new(StaticTokenAuthenticator::new(token.expose_secret().clone()))
        } else if config.api_token.is_some() {
            Arc::new(ApiTokenAuthenticator::new(http.clone()))
        } else {
            return Err(PlatformError::new(
                PlatformErrorKind::MissingAuth,
                "Authentication required: configure an access token or an API token",
            ));
        };

        Self::assemble(http, config, authenticator)
    }

    /// Creates a client with a custom authenticator.
    pub fn with_authenticator(
        config: PlatformConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> PlatformResult<Self> {
        let http = build_http_client(&config)?;
        Self::assemble(http, config, authenticator)
    }

    fn assemble(
        http: Client,
        config: PlatformConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> PlatformResult<Self> {
        config.validate()?;
        Ok(Self {
            http,
            config: Arc::new(config),
            authenticator,
            tokens: Arc::new(TokenProvider::new()),
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Creates a new client builder.
    pub fn builder() -> PlatformClientBuilder {
        PlatformClientBuilder::new()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Gets the token slot.
    pub fn token_provider(&self) -> &TokenProvider {
        &self.tokens
    }

    /// Gets the request metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Joins a path onto the main API base URL.
    pub fn api_endpoint(&self, path: &str) -> String {
        join_url(&self.config.api_url, path)
    }

    /// Joins a path onto the account API base URL.
    pub fn account_endpoint(&self, path: &str) -> String {
        join_url(&self.config.account_url, path)
    }

    // Service accessors

    /// Gets a generic service for any entity type.
    pub fn resources<T: Entity>(&self) -> ResourceService<'_, T> {
        ResourceService::new(self)
    }

    /// Gets the environments service.
    pub fn environments(&self) -> EnvironmentsService<'_> {
        EnvironmentsService::new(self)
    }

    /// Gets the regions service.
    pub fn regions(&self) -> RegionsService<'_> {
        RegionsService::new(self)
    }

    /// Gets the organization regions service.
    pub fn organization_regions(&self) -> OrganizationRegionsService<'_> {
        OrganizationRegionsService::new(self)
    }

    /// Gets the addresses service.
    pub fn addresses(&self) -> AddressesService<'_> {
        AddressesService::new(self)
    }

    /// Gets the payment sources service.
    pub fn payment_sources(&self) -> PaymentSourcesService<'_> {
        PaymentSourcesService::new(self)
    }

    /// Gets the comments service.
    pub fn comments(&self) -> CommentsService<'_> {
        CommentsService::new(self)
    }

    /// Gets the two-factor authentication service.
    pub fn two_factor(&self) -> TwoFactorService<'_> {
        TwoFactorService::new(self)
    }

    // HTTP methods

    /// Makes an authenticated GET request and deserializes the body.
    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: Params) -> PlatformResult<T> {
        self.authenticated_request(ApiRequest::get(url).query(query))
            .await?
            .into_typed()
            .await
    }

    /// Makes an authenticated POST request and deserializes the body.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> PlatformResult<T> {
        let body = serde_json::to_value(body).map_err(|e| {
            PlatformError::new(
                PlatformErrorKind::InvalidParameter,
                format!("Failed to serialize request body: {}", e),
            )
        })?;
        self.authenticated_request(ApiRequest::post(url).json(body))
            .await?
            .into_typed()
            .await
    }

    /// Makes an authenticated DELETE request.
    pub async fn delete(&self, url: &str) -> PlatformResult<ApiResponse> {
        self.authenticated_request(ApiRequest::delete(url)).await
    }

    /// Performs one exchange with the request's own headers.
    ///
    /// A 401 with remaining budget forces re-authentication and continues on
    /// the authenticated path.
    pub async fn request(&self, request: ApiRequest) -> PlatformResult<ApiResponse> {
        let observed = self.tokens.generation().await;
        let headers = request.headers.clone();

        match self.execute(&request, headers).await? {
            Exchange::Complete(response) => Ok(response),
            Exchange::Unauthorized => {
                self.reauthenticate(observed, "unauthorized", request.retry_count)
                    .await;
                let mut retry = request;
                retry.retry_count += 1;
                self.authenticated_request(retry).await
            }
        }
    }

    /// Performs a call with a bearer token, re-authenticating on expiry or 401
    /// until `max_auth_retries` is spent.
    pub async fn authenticated_request(
        &self,
        mut request: ApiRequest,
    ) -> PlatformResult<ApiResponse> {
        loop {
            let (generation, token) = self.current_token().await?;

            if !request.headers.contains_key(CONTENT_TYPE) && !request.is_binary() {
                request
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            }

            if token.is_expired() {
                TracingHooks::on_token_expired(token.expires(), request.retry_count);
                if request.retry_count >= self.config.max_auth_retries {
                    return Err(PlatformError::new(
                        PlatformErrorKind::ExpiredToken,
                        "Access token expired and could not be renewed",
                    ));
                }
                self.reauthenticate(generation, "token_expired", request.retry_count)
                    .await;
                request.retry_count += 1;
                continue;
            }

            let mut headers = request.headers.clone();
            let mut authorization = HeaderValue::from_str(&token.bearer()).map_err(|_| {
                PlatformError::authentication("Access token is not a valid header value")
            })?;
            authorization.set_sensitive(true);
            headers.insert(AUTHORIZATION, authorization);

            match self.execute(&request, headers).await? {
                Exchange::Complete(response) => return Ok(response),
                Exchange::Unauthorized => {
                    self.reauthenticate(generation, "unauthorized", request.retry_count)
                        .await;
                    request.retry_count += 1;
                }
            }
        }
    }

    /// Appends the current access token to a server-sent events URL.
    pub async fn event_stream_url(&self, url: &str) -> PlatformResult<String> {
        let Some((_, future)) = self.tokens.get_future().await else {
            return Err(PlatformError::missing_token());
        };
        let token = future
            .await
            .map_err(|error| PlatformError::from_shared(&error))?;
        if token.is_empty() {
            return Err(PlatformError::missing_token());
        }

        let mut parsed = url::Url::parse(url).map_err(|e| {
            PlatformError::invalid_argument(format!("Invalid event stream URL: {}", e))
        })?;
        parsed
            .query_pairs_mut()
            .append_pair("access_token", token.access_token());
        Ok(parsed.into())
    }

    /// Opens a server-sent events channel and yields raw body chunks.
    pub async fn open_event_stream(
        &self,
        url: &str,
    ) -> PlatformResult<impl Stream<Item = PlatformResult<Bytes>>> {
        let url = self.event_stream_url(url).await?;
        TracingHooks::on_request_start("GET", &redact_url(&url), 0);

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(PlatformError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = classify_failure(&url, status, response).await;
            return Err(PlatformError::from_response(status.as_u16(), body));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(PlatformError::transport)))
    }

    // Internal methods

    async fn current_token(&self) -> PlatformResult<(u64, Token)> {
        let (generation, future) = self
            .tokens
            .get_or_install(|| self.authenticate_future(false))
            .await;

        match future.await {
            Ok(token) if token.is_empty() => Err(PlatformError::missing_token()),
            Ok(token) => Ok((generation, token)),
            Err(error) => {
                self.tokens.clear_if_current(generation).await;
                Err(PlatformError::from_shared(&error))
            }
        }
    }

    fn authenticate_future(&self, force_refresh: bool) -> BoxFuture<'static, PlatformResult<Token>> {
        let authenticator = self.authenticator.clone();
        let config = self.config.clone();
        async move { authenticator.authenticate(&config, force_refresh).await }.boxed()
    }

    async fn reauthenticate(&self, observed: u64, reason: &str, attempt: u32) {
        let installed = self
            .tokens
            .replace_if_current(observed, || self.authenticate_future(true))
            .await;
        if installed {
            self.metrics.record_reauthentication();
        }
        TracingHooks::on_reauthenticate(reason, attempt, installed);
    }

    async fn execute(&self, request: &ApiRequest, mut headers: HeaderMap) -> PlatformResult<Exchange> {
        let url = request.target_url();
        let method = request.method.clone();
        let log_url = redact_url(&url);

        if !headers.contains_key(CONTENT_TYPE) {
            match &request.body {
                Some(Payload::Json(_)) => {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                }
                Some(Payload::Binary {
                    content_type: Some(content_type),
                    ..
                }) => {
                    if let Ok(value) = HeaderValue::from_str(content_type) {
                        headers.insert(CONTENT_TYPE, value);
                    }
                }
                _ => {}
            }
        }

        let mut builder = self.http.request(method.clone(), &url).headers(headers);
        if let Some(timeout) = request.options.timeout {
            builder = builder.timeout(timeout);
        }
        if request.sends_body() {
            match &request.body {
                Some(Payload::Json(value)) => {
                    let bytes = serde_json::to_vec(value).map_err(|e| {
                        PlatformError::new(
                            PlatformErrorKind::InvalidParameter,
                            format!("Failed to serialize request body: {}", e),
                        )
                    })?;
                    builder = builder.body(bytes);
                }
                Some(Payload::Binary { bytes, .. }) => {
                    builder = builder.body(bytes.clone());
                }
                None => {}
            }
        }

        TracingHooks::on_request_start(method.as_str(), &log_url, request.retry_count);
        let timer = RequestTimer::new(self.metrics.clone());

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = PlatformError::transport(e);
                TracingHooks::on_request_error(method.as_str(), &log_url, error.message());
                timer.failure();
                return Err(error);
            }
        };

        let status = response.status();
        TracingHooks::on_request_complete(
            method.as_str(),
            &log_url,
            status.as_u16(),
            timer.elapsed(),
        );

        if status == StatusCode::UNAUTHORIZED
            && !self.config.has_static_token()
            && request.retry_count < self.config.max_auth_retries
        {
            timer.failure();
            return Ok(Exchange::Unauthorized);
        }

        if status.is_success() {
            timer.success();
            return classify_success(response).await.map(Exchange::Complete);
        }

        timer.failure();
        let body = classify_failure(&log_url, status, response).await;
        let error = PlatformError::from_response(status.as_u16(), body);
        TracingHooks::on_request_error(method.as_str(), &log_url, error.message());
        Err(error)
    }
}

fn build_http_client(config: &PlatformConfig) -> PlatformResult<Client> {
    config.validate()?;

    Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.pool.max_idle_per_host)
        .pool_idle_timeout(config.pool.idle_timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| {
            PlatformError::new(
                PlatformErrorKind::InvalidConfiguration,
                format!("Failed to create HTTP client: {}", e),
            )
        })
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// A missing content type counts as JSON.
fn is_json_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(value) => matches!(
            media_type(value).as_str(),
            "application/json" | "application/hal+json"
        ),
    }
}

async fn classify_success(response: Response) -> PlatformResult<ApiResponse> {
    let is_image = content_type(&response)
        .map(|value| IMAGE_CONTENT_TYPES.contains(&media_type(&value).as_str()))
        .unwrap_or(false);

    if is_image || response.status() == StatusCode::ACCEPTED {
        return Ok(ApiResponse::Raw(response));
    }

    let text = response.text().await.map_err(PlatformError::transport)?;
    Ok(match serde_json::from_str(&text) {
        Ok(value) => ApiResponse::Json(value),
        Err(_) => ApiResponse::Text(text),
    })
}

async fn classify_failure(url: &str, status: StatusCode, response: Response) -> ErrorBody {
    let json = is_json_content_type(content_type(&response).as_deref());
    let text = match response.text().await {
        Ok(text) => text,
        Err(_) if json => return ErrorBody::Empty,
        Err(_) => String::new(),
    };

    if !json {
        return ErrorBody::Text(text);
    }

    match serde_json::from_str(&text) {
        Ok(value) => ErrorBody::Json(value),
        Err(e) => {
            TracingHooks::on_malformed_error_body(url, status.as_u16(), &e.to_string());
            ErrorBody::Empty
        }
    }
}

/// Builder for PlatformClient.
pub struct PlatformClientBuilder {
    config_builder: PlatformConfigBuilder,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl PlatformClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config_builder: PlatformConfig::builder(),
            authenticator: None,
        }
    }

    /// Creates a builder seeded from `PLATFORM_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            config_builder: PlatformConfigBuilder::from_env(),
            authenticator: None,
        }
    }

    /// Sets the API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_url(url);
        self
    }

    /// Sets the account API base URL.
    pub fn account_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.account_url(url);
        self
    }

    /// Points every base URL at one host.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(url);
        self
    }

    /// Sets the API token exchanged for access tokens.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_token(token);
        self
    }

    /// Sets a static access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.access_token(token);
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(ua);
        self
    }

    /// Sets the re-authentication budget.
    pub fn max_auth_retries(mut self, retries: u32) -> Self {
        self.config_builder = self.config_builder.max_auth_retries(retries);
        self
    }

    /// Uses a custom authenticator.
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Builds the client.
    pub fn build(self) -> PlatformResult<PlatformClient> {
        let config = self.config_builder.build()?;
        match self.authenticator {
            Some(authenticator) => PlatformClient::with_authenticator(config, authenticator),
            None => PlatformClient::new(config),
        }
    }
}

impl Default for PlatformClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.example.com/api/", "/projects/p1"),
            "https://api.example.com/api/projects/p1"
        );
        assert_eq!(
            join_url("https://api.example.com/api", "projects/p1"),
            "https://api.example.com/api/projects/p1"
        );
    }

    #[test]
    fn test_json_content_type_detection() {
        assert!(is_json_content_type(None));
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("application/hal+json; charset=utf-8")));
        assert!(!is_json_content_type(Some("text/html")));
    }

    #[test]
    fn test_client_requires_auth() {
        let err = PlatformClient::new(PlatformConfig::default()).err().unwrap();
        assert_eq!(*err.kind(), PlatformErrorKind::MissingAuth);
    }

    #[test]
    fn test_client_builder() {
        let client = PlatformClient::builder()
            .access_token("static")
            .user_agent("test-client/1.0")
            .build()
            .unwrap();

        assert!(client.config().has_static_token());
        assert_eq!(client.metrics().snapshot().requests, 0);
        assert_eq!(
            client.api_endpoint("/projects"),
            "https://api.platform.sh/api/projects"
        );
    }

    #[tokio::test]
    async fn test_event_stream_url_requires_token() {
        let client = PlatformClient::builder()
            .access_token("static")
            .build()
            .unwrap();

        let err = client
            .event_stream_url("https://api.example.com/events")
            .await
            .unwrap_err();
        assert_eq!(*err.kind(), PlatformErrorKind::MissingToken);

        client
            .token_provider()
            .set_token(Token::never_expiring("abc"))
            .await;
        assert_eq!(
            client
                .event_stream_url("https://api.example.com/events")
                .await
                .unwrap(),
            "https://api.example.com/events?access_token=abc"
        );
    }
}
