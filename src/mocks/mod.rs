//! Mock implementations and fixtures for testing Platform API clients.

use crate::auth::{Authenticator, Token};
use crate::config::PlatformConfig;
use crate::errors::{PlatformError, PlatformResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the mock hands out once its queue is drained.
#[derive(Debug, Clone)]
enum Fallback {
    /// A fresh never-expiring token per call.
    Fresh,
    /// Always fail with this message.
    Fail(String),
}

/// Authenticator that serves queued tokens and counts calls.
#[derive(Debug, Clone)]
pub struct MockAuthenticator {
    queue: Arc<Mutex<VecDeque<Token>>>,
    fallback: Fallback,
    calls: Arc<AtomicUsize>,
    forced_calls: Arc<AtomicUsize>,
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthenticator {
    /// Creates a mock that issues `token-1`, `token-2`, ... never expiring.
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Fallback::Fresh,
            calls: Arc::new(AtomicUsize::new(0)),
            forced_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a mock serving `tokens` in order before falling back to fresh tokens.
    pub fn with_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        let mock = Self::new();
        if let Ok(mut queue) = mock.queue.lock() {
            queue.extend(tokens);
        }
        mock
    }

    /// Creates a mock whose every call fails with an authentication error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fallback: Fallback::Fail(message.into()),
            ..Self::new()
        }
    }

    /// Queues another token.
    pub fn push(&self, token: Token) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(token);
        }
    }

    /// Total `authenticate` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls made with `force_refresh`.
    pub fn forced_calls(&self) -> usize {
        self.forced_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn authenticate(
        &self,
        _config: &PlatformConfig,
        force_refresh: bool,
    ) -> PlatformResult<Token> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if force_refresh {
            self.forced_calls.fetch_add(1, Ordering::SeqCst);
        }

        let queued = self.queue.lock().ok().and_then(|mut queue| queue.pop_front());
        if let Some(token) = queued {
            return Ok(token);
        }

        match &self.fallback {
            Fallback::Fresh => Ok(Token::never_expiring(format!("token-{}", call))),
            Fallback::Fail(message) => Err(PlatformError::authentication(message.clone())),
        }
    }
}

/// Attaches a HAL `_links` object to a representation.
pub fn hal(mut value: Value, links: &[(&str, &str)]) -> Value {
    let mut map = Map::new();
    for (rel, href) in links {
        map.insert(rel.to_string(), json!({ "href": href }));
    }
    if let Value::Object(object) = &mut value {
        object.insert("_links".to_string(), Value::Object(map));
    }
    value
}

/// Builds a cursored page body.
pub fn cursor_page(items: Vec<Value>, next: Option<&str>) -> Value {
    let mut links = Map::new();
    if let Some(next) = next {
        links.insert("next".to_string(), json!({ "href": next }));
    }
    let count = items.len();
    json!({
        "items": items,
        "count": count,
        "_links": links,
    })
}

/// Builds an activity wrapped the way action endpoints return it.
pub fn activity_envelope(id: &str, activity_type: &str) -> Value {
    json!({
        "status": "OK",
        "code": 202,
        "_embedded": {
            "activities": [{
                "id": id,
                "type": activity_type,
                "state": "pending"
            }]
        }
    })
}

/// Builds a JSON error body.
pub fn error_body(code: u16, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_authenticator_queue() {
        let mock = MockAuthenticator::with_tokens([Token::new("old", 1)]);
        let config = PlatformConfig::default();

        let first = mock.authenticate(&config, false).await.unwrap();
        assert_eq!(first.access_token(), "old");

        let second = mock.authenticate(&config, true).await.unwrap();
        assert_eq!(second.access_token(), "token-2");
        assert_eq!(mock.calls(), 2);
        assert_eq!(mock.forced_calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_authenticator() {
        let mock = MockAuthenticator::failing("denied");
        let err = mock
            .authenticate(&PlatformConfig::default(), false)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "denied");
    }

    #[test]
    fn test_fixtures() {
        let value = hal(json!({"id": "main"}), &[("self", "/envs/main")]);
        assert_eq!(value["_links"]["self"]["href"], "/envs/main");

        let page = cursor_page(vec![json!({"id": 1})], Some("/next"));
        assert_eq!(page["_links"]["next"]["href"], "/next");
        assert_eq!(page["count"], 1);
    }
}
