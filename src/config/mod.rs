//! Configuration types for the Platform client.

use crate::errors::{PlatformError, PlatformErrorKind};
use secrecy::SecretString;
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.platform.sh/api";

/// Default account API base URL.
pub const DEFAULT_ACCOUNT_URL: &str = "https://accounts.platform.sh/api";

/// Default authentication server URL.
pub const DEFAULT_AUTH_URL: &str = "https://auth.api.platform.sh";

/// Default OAuth client id used for API token exchange.
pub const DEFAULT_CLIENT_ID: &str = "platform-api-user";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = "integrations-platform/0.1.0";

/// Default re-authentication budget per logical call.
pub const DEFAULT_MAX_AUTH_RETRIES: u32 = 2;

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle connections per host.
    pub max_idle_per_host: usize,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Platform client configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Main API base URL.
    pub api_url: String,
    /// Account API base URL.
    pub account_url: String,
    /// Authentication server URL.
    pub auth_url: String,
    /// OAuth client id for the API token grant.
    pub client_id: String,
    /// Long-lived API token exchanged for access tokens.
    pub api_token: Option<SecretString>,
    /// Statically configured access token. When set, 401 responses are never retried.
    pub access_token: Option<SecretString>,
    /// Request timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
    /// Re-authentication budget for one logical call.
    pub max_auth_retries: u32,
    /// Connection pool configuration.
    pub pool: PoolConfig,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            account_url: DEFAULT_ACCOUNT_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            api_token: None,
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_auth_retries: DEFAULT_MAX_AUTH_RETRIES,
            pool: PoolConfig::default(),
        }
    }
}

impl PlatformConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PlatformConfigBuilder {
        PlatformConfigBuilder::new()
    }

    /// Returns true when a static fallback access token is configured.
    pub fn has_static_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), PlatformError> {
        for (name, value) in [
            ("api_url", &self.api_url),
            ("account_url", &self.account_url),
            ("auth_url", &self.auth_url),
        ] {
            validate_base_url(name, value)?;
        }

        if self.user_agent.is_empty() {
            return Err(PlatformError::configuration("User-Agent cannot be empty"));
        }

        Ok(())
    }
}

fn validate_base_url(name: &str, value: &str) -> Result<(), PlatformError> {
    if value.is_empty() {
        return Err(PlatformError::new(
            PlatformErrorKind::InvalidBaseUrl,
            format!("{} cannot be empty", name),
        ));
    }

    let parsed = url::Url::parse(value).map_err(|e| {
        PlatformError::new(
            PlatformErrorKind::InvalidBaseUrl,
            format!("{} is not a valid URL: {}", name, e),
        )
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(PlatformError::new(
            PlatformErrorKind::InvalidBaseUrl,
            format!("{} must start with http:// or https://", name),
        ));
    }

    Ok(())
}

/// Builder for PlatformConfig.
#[derive(Debug, Default)]
pub struct PlatformConfigBuilder {
    api_url: Option<String>,
    account_url: Option<String>,
    auth_url: Option<String>,
    client_id: Option<String>,
    api_token: Option<SecretString>,
    access_token: Option<SecretString>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    max_auth_retries: Option<u32>,
    pool: Option<PoolConfig>,
}

impl PlatformConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder seeded from `PLATFORM_*` environment variables.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            api_url: var("PLATFORM_API_URL"),
            account_url: var("PLATFORM_ACCOUNT_URL"),
            auth_url: var("PLATFORM_AUTH_URL"),
            api_token: var("PLATFORM_API_TOKEN").map(SecretString::new),
            access_token: var("PLATFORM_ACCESS_TOKEN").map(SecretString::new),
            ..Self::default()
        }
    }

    /// Sets the API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Sets the account API base URL.
    pub fn account_url(mut self, url: impl Into<String>) -> Self {
        self.account_url = Some(url.into());
        self
    }

    /// Sets the authentication server URL.
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    /// Points every base URL at one host, mostly useful against a mock server.
    pub fn base_url(self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_url(url.clone()).account_url(url.clone()).auth_url(url)
    }

    /// Sets the OAuth client id.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the API token exchanged for access tokens.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::new(token.into()));
        self
    }

    /// Sets a static access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(SecretString::new(token.into()));
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the re-authentication budget.
    pub fn max_auth_retries(mut self, retries: u32) -> Self {
        self.max_auth_retries = Some(retries);
        self
    }

    /// Sets the connection pool configuration.
    pub fn pool(mut self, config: PoolConfig) -> Self {
        self.pool = Some(config);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<PlatformConfig, PlatformError> {
        let config = PlatformConfig {
            api_url: self.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            account_url: self
                .account_url
                .unwrap_or_else(|| DEFAULT_ACCOUNT_URL.to_string()),
            auth_url: self.auth_url.unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            client_id: self.client_id.unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            api_token: self.api_token,
            access_token: self.access_token,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_auth_retries: self.max_auth_retries.unwrap_or(DEFAULT_MAX_AUTH_RETRIES),
            pool: self.pool.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlatformConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.max_auth_retries, 2);
        assert!(!config.has_static_token());
    }

    #[test]
    fn test_config_builder() {
        let config = PlatformConfig::builder()
            .api_url("https://api.example.com")
            .user_agent("test-client/1.0")
            .timeout(Duration::from_secs(60))
            .access_token("static")
            .build()
            .unwrap();

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.account_url, DEFAULT_ACCOUNT_URL);
        assert_eq!(config.user_agent, "test-client/1.0");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.has_static_token());
    }

    #[test]
    fn test_base_url_sets_all_hosts() {
        let config = PlatformConfig::builder()
            .base_url("http://127.0.0.1:8080")
            .build()
            .unwrap();

        assert_eq!(config.api_url, "http://127.0.0.1:8080");
        assert_eq!(config.account_url, "http://127.0.0.1:8080");
        assert_eq!(config.auth_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = PlatformConfig::builder().api_url("invalid-url").build();
        assert_eq!(*result.unwrap_err().kind(), PlatformErrorKind::InvalidBaseUrl);

        let result = PlatformConfig::builder().auth_url("ftp://auth.example.com").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_user_agent() {
        let result = PlatformConfig::builder().user_agent("").build();
        assert_eq!(
            *result.unwrap_err().kind(),
            PlatformErrorKind::InvalidConfiguration
        );
    }
}
