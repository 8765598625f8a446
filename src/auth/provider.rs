//! The shared token slot.

use super::Token;
use crate::errors::{PlatformError, PlatformResult};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A token-producing future that any number of callers can await.
pub type TokenFuture = Shared<BoxFuture<'static, Result<Token, Arc<PlatformError>>>>;

#[derive(Default)]
struct Slot {
    generation: u64,
    future: Option<TokenFuture>,
}

/// Holds the single current token future.
///
/// Replacing the future is the re-authentication signal: every reader awaits
/// whatever the slot holds at the time it looks. Each replacement bumps the
/// generation so callers can tell whether someone else already refreshed.
#[derive(Default)]
pub struct TokenProvider {
    slot: RwLock<Slot>,
}

fn share<F>(future: F) -> TokenFuture
where
    F: Future<Output = PlatformResult<Token>> + Send + 'static,
{
    future.map(|result| result.map_err(Arc::new)).boxed().shared()
}

impl TokenProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current future and returns the new generation.
    pub async fn set_future<F>(&self, future: F) -> u64
    where
        F: Future<Output = PlatformResult<Token>> + Send + 'static,
    {
        let mut slot = self.slot.write().await;
        slot.generation += 1;
        slot.future = Some(share(future));
        slot.generation
    }

    /// Replaces the current future with an already resolved token.
    pub async fn set_token(&self, token: Token) -> u64 {
        self.set_future(futures::future::ready(Ok(token))).await
    }

    /// Returns the current generation and future, if any.
    pub async fn get_future(&self) -> Option<(u64, TokenFuture)> {
        let slot = self.slot.read().await;
        slot.future.clone().map(|future| (slot.generation, future))
    }

    /// Current generation.
    pub async fn generation(&self) -> u64 {
        self.slot.read().await.generation
    }

    /// Returns the current future, installing one built by `init` when the slot is empty.
    pub(crate) async fn get_or_install<F>(&self, init: impl FnOnce() -> F) -> (u64, TokenFuture)
    where
        F: Future<Output = PlatformResult<Token>> + Send + 'static,
    {
        if let Some(current) = self.get_future().await {
            return current;
        }

        let mut slot = self.slot.write().await;
        if let Some(future) = slot.future.clone() {
            return (slot.generation, future);
        }
        slot.generation += 1;
        let future = share(init());
        slot.future = Some(future.clone());
        (slot.generation, future)
    }

    /// Installs a future built by `refresh` only if nobody replaced the slot
    /// since `observed`. Returns true if this call installed it.
    pub(crate) async fn replace_if_current<F>(
        &self,
        observed: u64,
        refresh: impl FnOnce() -> F,
    ) -> bool
    where
        F: Future<Output = PlatformResult<Token>> + Send + 'static,
    {
        let mut slot = self.slot.write().await;
        if slot.generation != observed {
            return false;
        }
        slot.generation += 1;
        slot.future = Some(share(refresh()));
        true
    }

    /// Empties the slot if it still holds generation `observed`.
    pub(crate) async fn clear_if_current(&self, observed: u64) {
        let mut slot = self.slot.write().await;
        if slot.generation == observed {
            slot.generation += 1;
            slot.future = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_empty_provider() {
        let provider = TokenProvider::new();
        assert!(provider.get_future().await.is_none());
        assert_eq!(provider.generation().await, 0);
    }

    #[tokio::test]
    async fn test_set_and_read_latest() {
        let provider = TokenProvider::new();
        provider.set_token(Token::never_expiring("first")).await;
        let generation = provider.set_token(Token::never_expiring("second")).await;

        let (current, future) = provider.get_future().await.unwrap();
        assert_eq!(current, generation);
        assert_eq!(future.await.unwrap().access_token(), "second");
    }

    #[tokio::test]
    async fn test_shared_future_resolves_once() {
        let provider = TokenProvider::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        provider
            .set_future(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Token::never_expiring("t"))
            })
            .await;

        let (_, a) = provider.get_future().await.unwrap();
        let (_, b) = provider.get_future().await.unwrap();
        let (ta, tb) = futures::join!(a, b);
        assert_eq!(ta.unwrap().access_token(), "t");
        assert_eq!(tb.unwrap().access_token(), "t");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replace_if_current_coalesces() {
        let provider = TokenProvider::new();
        let observed = provider.set_token(Token::never_expiring("old")).await;

        let first = provider
            .replace_if_current(observed, || async { Ok(Token::never_expiring("a")) })
            .await;
        let second = provider
            .replace_if_current(observed, || async { Ok(Token::never_expiring("b")) })
            .await;

        assert!(first);
        assert!(!second);
        let (_, future) = provider.get_future().await.unwrap();
        assert_eq!(future.await.unwrap().access_token(), "a");
    }

    #[tokio::test]
    async fn test_get_or_install_and_clear() {
        let provider = TokenProvider::new();
        let (generation, future) = provider
            .get_or_install(|| async { Ok(Token::never_expiring("lazy")) })
            .await;
        assert_eq!(future.await.unwrap().access_token(), "lazy");

        let (again, _) = provider
            .get_or_install(|| async { Ok(Token::never_expiring("other")) })
            .await;
        assert_eq!(generation, again);

        provider.clear_if_current(generation).await;
        assert!(provider.get_future().await.is_none());
    }
}
