//! Cursor-paginated collection fetcher

use crate::transport::{Transport, TransportExt};
use crate::{Error, Result};
use async_stream::try_stream;
use futures::Stream;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Turns a chain of cursor-linked pages into one lazy stream of items.
///
/// Each stream starts at the first page and holds at most one page in memory.
/// Items come out in server order across page boundaries.
#[derive(Clone)]
pub struct PaginatedFetcher {
    transport: Arc<dyn Transport>,
    page_size: Option<u32>,
}

impl PaginatedFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            page_size: None,
        }
    }

    /// Ask the server for pages of `size` items (sent as `limit`)
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Stream every item of the collection at `path`.
    ///
    /// Nothing is requested until the stream is polled. `cancel` is checked
    /// before each page request; once it fires the stream yields
    /// [`Error::Cancelled`] and ends. A failed page ends the stream with
    /// [`Error::Page`].
    pub fn fetch_items<T>(
        &self,
        path: impl Into<String>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<T>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        let page_size = self.page_size;
        let path = path.into();

        try_stream! {
            let mut cursor: Option<String> = None;
            let mut page_index = 0usize;

            loop {
                page_index += 1;

                if cancel.is_cancelled() {
                    debug!(path = %path, page = page_index, "Pagination cancelled");
                    Err(Error::Cancelled { path: path.clone() })?;
                }

                let page = transport
                    .get_page::<T>(&path, cursor.as_deref(), page_size, &cancel)
                    .await
                    .map_err(|source| Error::Page {
                        path: path.clone(),
                        page: page_index,
                        source: Box::new(source),
                    })?;

                let next = page.next().map(str::to_string);
                debug!(
                    path = %path,
                    page = page_index,
                    items = page.items.len(),
                    has_more = next.is_some(),
                    "Fetched page"
                );

                for item in page.items {
                    yield item;
                }

                match next {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::testing::ScriptedTransport;
    use futures::{StreamExt, TryStreamExt};
    use serde_json::json;

    fn page(items: &[&str], cursor: Option<&str>) -> serde_json::Value {
        json!({ "data": { "items": items, "next_cursor": cursor } })
    }

    #[tokio::test]
    async fn test_two_pages_in_order() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(page(&["A", "B"], Some("c1"))),
            Ok(page(&["C"], None)),
        ]));
        let fetcher = PaginatedFetcher::new(transport.clone());

        let items: Vec<String> = fetcher
            .fetch_items("groups", CancellationToken::new())
            .try_collect()
            .await
            .unwrap();

        assert_eq!(items, vec!["A", "B", "C"]);
        assert_eq!(transport.calls(), 2);

        let requests = transport.requests();
        assert_eq!(requests[0].query, Vec::<(String, String)>::new());
        assert_eq!(
            requests[1].query,
            vec![("cursor".to_string(), "c1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_single_page_makes_one_call() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(page(&["A"], None))]));
        let fetcher = PaginatedFetcher::new(transport.clone());

        let items: Vec<String> = fetcher
            .fetch_items("groups", CancellationToken::new())
            .try_collect()
            .await
            .unwrap();

        assert_eq!(items, vec!["A"]);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_cursor_ends_pagination() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(page(&["A"], Some("")))]));
        let fetcher = PaginatedFetcher::new(transport.clone());

        let items: Vec<String> = fetcher
            .fetch_items("groups", CancellationToken::new())
            .try_collect()
            .await
            .unwrap();

        assert_eq!(items, vec!["A"]);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_between_pages_skips_second_call() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(page(&["A", "B"], Some("c1"))),
            Ok(page(&["C"], None)),
        ]));
        let fetcher = PaginatedFetcher::new(transport.clone());
        let cancel = CancellationToken::new();

        let stream = fetcher.fetch_items::<String>("groups", cancel.clone());
        futures::pin_mut!(stream);

        assert_eq!(stream.next().await.unwrap().unwrap(), "A");
        assert_eq!(stream.next().await.unwrap().unwrap(), "B");

        cancel.cancel();

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(stream.next().await.is_none());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_second_page_reports_page_index() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(page(&["A"], Some("c1"))),
            Err(Error::Http {
                path: "groups".to_string(),
                status: 500,
                body: "boom".to_string(),
            }),
        ]));
        let fetcher = PaginatedFetcher::new(transport.clone());

        let results: Vec<Result<String>> = fetcher
            .fetch_items("groups", CancellationToken::new())
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "A");
        match &results[1] {
            Err(Error::Page { path, page, source }) => {
                assert_eq!(path, "groups");
                assert_eq!(*page, 2);
                assert!(matches!(**source, Error::Http { status: 500, .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_stream_is_lazy_and_restartable_by_refetching() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(page(&["A"], None)),
            Ok(page(&["A"], None)),
        ]));
        let fetcher = PaginatedFetcher::new(transport.clone());

        let stream = fetcher.fetch_items::<String>("groups", CancellationToken::new());
        assert_eq!(transport.calls(), 0);
        drop(stream);

        for _ in 0..2 {
            let items: Vec<String> = fetcher
                .fetch_items("groups", CancellationToken::new())
                .try_collect()
                .await
                .unwrap();
            assert_eq!(items, vec!["A"]);
        }
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_page_size_is_sent_as_limit() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(page(&[], None))]));
        let fetcher = PaginatedFetcher::new(transport.clone()).with_page_size(100);

        let items: Vec<String> = fetcher
            .fetch_items("groups", CancellationToken::new())
            .try_collect()
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(
            transport.requests()[0].query,
            vec![("limit".to_string(), "100".to_string())]
        );
    }
}
