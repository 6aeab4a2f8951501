//! Single-object fetcher

use crate::transport::{Transport, TransportExt};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One GET, one envelope, one optional object
#[derive(Clone)]
pub struct NonPaginatedFetcher {
    transport: Arc<dyn Transport>,
}

impl NonPaginatedFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch the object at `path`. A `null` payload is `Ok(None)`, not an error.
    pub async fn fetch<T>(&self, path: &str, cancel: &CancellationToken) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                path: path.to_string(),
            });
        }

        self.transport.get_object(path, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::testing::ScriptedTransport;
    use crate::models::DataSchemas;
    use serde_json::json;

    #[tokio::test]
    async fn test_null_data_is_absent() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({ "data": null }))]));
        let fetcher = NonPaginatedFetcher::new(transport.clone());

        let schemas: Option<DataSchemas> = fetcher
            .fetch("connectors/c1/schemas", &CancellationToken::new())
            .await
            .unwrap();

        assert!(schemas.is_none());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_object_is_unwrapped() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
            "data": {
                "schemas": {
                    "public": {
                        "name_in_destination": "pg_public",
                        "tables": { "users": { "name_in_destination": "users" } }
                    }
                }
            }
        }))]));
        let fetcher = NonPaginatedFetcher::new(transport.clone());

        let schemas: DataSchemas = fetcher
            .fetch("connectors/c1/schemas", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(schemas.schemas["public"].as_ref().unwrap().name_in_destination, "pg_public");
        assert_eq!(transport.requests()[0].path, "connectors/c1/schemas");
    }

    #[tokio::test]
    async fn test_failure_propagates_unchanged() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(Error::Http {
            path: "connectors/c1/schemas".to_string(),
            status: 404,
            body: "not found".to_string(),
        })]));
        let fetcher = NonPaginatedFetcher::new(transport);

        let err = fetcher
            .fetch::<DataSchemas>("connectors/c1/schemas", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_call() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let fetcher = NonPaginatedFetcher::new(transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher
            .fetch::<DataSchemas>("connectors/c1/schemas", &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.calls(), 0);
    }
}
