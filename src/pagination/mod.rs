//! Cursored pagination following HAL `next` links.

use crate::client::{ApiRequest, PlatformClient};
use crate::errors::{PlatformError, PlatformErrorKind, PlatformResult};
use crate::resource::{Entity, Resource};
use crate::template::{ArrayEncoding, Params};
use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::marker::PhantomData;

/// A single page of a cursored collection.
#[derive(Debug, Clone, Default)]
pub struct CursorPage {
    /// Raw item representations.
    pub items: Vec<Value>,
    /// URL of the next page, taken verbatim from `_links.next.href`.
    pub next: Option<String>,
    /// Total item count, when the server reports it.
    pub count: Option<u64>,
}

impl CursorPage {
    /// Parses a page from either `{"items": [...], "_links": {...}}` or a bare array.
    pub fn from_value(value: Value) -> PlatformResult<Self> {
        match value {
            Value::Array(items) => Ok(Self {
                items,
                next: None,
                count: None,
            }),
            Value::Object(mut map) => {
                let next = map
                    .get("_links")
                    .and_then(|links| links.pointer("/next/href"))
                    .and_then(Value::as_str)
                    .map(String::from);
                let count = map.get("count").and_then(Value::as_u64);
                let items = match map.remove("items") {
                    Some(Value::Array(items)) => items,
                    _ => {
                        return Err(PlatformError::new(
                            PlatformErrorKind::UnexpectedFormat,
                            "Cursored page does not contain an item array",
                        ))
                    }
                };
                Ok(Self { items, next, count })
            }
            _ => Err(PlatformError::new(
                PlatformErrorKind::UnexpectedFormat,
                "Cursored page must be an object or an array",
            )),
        }
    }

    /// Returns true if there is a next page.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Options for cursored queries.
#[derive(Debug, Clone, Default)]
pub struct CursorOptions {
    /// Array encoding for the first page's query string.
    pub array_encoding: ArrayEncoding,
}

impl CursorOptions {
    /// Bracket-suffixed array keys (`key[]=a`).
    pub fn brackets() -> Self {
        Self {
            array_encoding: ArrayEncoding::brackets(),
        }
    }
}

/// Lazy, finite sequence of entities across pages.
///
/// A page is only requested once the previous one is drained. Not seekable:
/// start a new query to restart.
pub struct Cursor<'a, T: Entity> {
    client: &'a PlatformClient,
    params: Params,
    buffer: VecDeque<Value>,
    next_url: Option<String>,
    count: Option<u64>,
    pages_fetched: usize,
    _entity: PhantomData<T>,
}

impl<'a, T: Entity> Cursor<'a, T> {
    /// Fetches the first page and returns the cursor positioned before its first item.
    pub async fn start(
        client: &'a PlatformClient,
        url: String,
        query: Params,
        params: Params,
        options: CursorOptions,
    ) -> PlatformResult<Self> {
        let mut cursor = Self {
            client,
            params,
            buffer: VecDeque::new(),
            next_url: None,
            count: None,
            pages_fetched: 0,
            _entity: PhantomData,
        };

        let first = ApiRequest::get(url)
            .query(query)
            .array_encoding(options.array_encoding);
        cursor.load(first).await?;
        Ok(cursor)
    }

    async fn load(&mut self, request: ApiRequest) -> PlatformResult<()> {
        let value = self
            .client
            .authenticated_request(request)
            .await?
            .into_value()
            .await?;
        let page = CursorPage::from_value(value)?;

        self.pages_fetched += 1;
        self.next_url = page.next;
        if page.count.is_some() {
            self.count = page.count;
        }
        self.buffer.extend(page.items);
        Ok(())
    }

    /// Yields the next entity, fetching the following page when the current one is drained.
    pub async fn next(&mut self) -> PlatformResult<Option<Resource<T>>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Resource::from_value(item, self.params.clone(), None).map(Some);
            }

            // Kept until `load` succeeds; a failed page is retried on the next call.
            let Some(url) = self.next_url.clone() else {
                return Ok(None);
            };
            self.load(ApiRequest::get(url)).await?;
        }
    }

    /// Returns true while items remain buffered or a next page exists.
    pub fn has_more(&self) -> bool {
        !self.buffer.is_empty() || self.next_url.is_some()
    }

    /// URL of the next page, if any.
    pub fn next_url(&self) -> Option<&str> {
        self.next_url.as_deref()
    }

    /// Total item count reported by the server.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Number of pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Drains every remaining page.
    pub async fn collect_all(mut self) -> PlatformResult<Vec<Resource<T>>> {
        let mut all_items = Vec::new();

        while let Some(item) = self.next().await? {
            all_items.push(item);
        }

        Ok(all_items)
    }

    /// Exposes the cursor as a stream.
    pub fn into_stream(self) -> impl Stream<Item = PlatformResult<Resource<T>>> + 'a {
        futures::stream::try_unfold(self, |mut cursor| async move {
            Ok(cursor.next().await?.map(|item| (item, cursor)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_with_next() {
        let page = CursorPage::from_value(json!({
            "items": [{"id": "a"}, {"id": "b"}],
            "count": 5,
            "_links": {"next": {"href": "https://api.example.com/regions?cursor=xyz"}}
        }))
        .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.count, Some(5));
        assert_eq!(
            page.next.as_deref(),
            Some("https://api.example.com/regions?cursor=xyz")
        );
    }

    #[test]
    fn test_last_page() {
        let page = CursorPage::from_value(json!({"items": [], "_links": {"self": {"href": "/x"}}}))
            .unwrap();
        assert!(!page.has_next());
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_bare_array_page() {
        let page = CursorPage::from_value(json!([{"id": 1}])).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_next());
    }

    #[test]
    fn test_invalid_page() {
        let err = CursorPage::from_value(json!({"data": []})).unwrap_err();
        assert_eq!(*err.kind(), PlatformErrorKind::UnexpectedFormat);
        assert!(CursorPage::from_value(json!("text")).is_err());
    }
}
