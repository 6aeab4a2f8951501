//! Transport seam between the fetch engines and the network
//!
//! [`Transport`] is the object-safe contract: perform one GET for a relative
//! path and hand back the JSON body. [`TransportExt`] layers the two typed
//! operations the engines use on top of it, unwrapping the `data` envelope.
//!
//! The HTTP implementation lives in [`http`]; tests substitute in-memory
//! implementations of the same trait.

pub mod http;

pub use http::{Credentials, HttpTransport, TransportConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

use crate::models::{ObjectEnvelope, Page, PaginatedEnvelope};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Query parameter carrying the pagination cursor
pub const CURSOR_PARAM: &str = "cursor";
/// Query parameter carrying the requested page size
pub const LIMIT_PARAM: &str = "limit";

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `path` (relative to the API root) with `query` and return the JSON body.
    ///
    /// Implementations should give up with [`Error::Cancelled`] when `cancel`
    /// fires while the call is in flight.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Value>;

    /// Release underlying resources. Must be idempotent.
    fn close(&self) {}
}

/// Typed envelope operations available on every [`Transport`]
#[async_trait]
pub trait TransportExt: Transport {
    /// Fetch one page of a paginated endpoint
    async fn get_page<T>(
        &self,
        path: &str,
        cursor: Option<&str>,
        limit: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<Page<T>>
    where
        T: DeserializeOwned + Send,
    {
        let limit = limit.map(|l| l.to_string());
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(2);
        if let Some(cursor) = cursor {
            query.push((CURSOR_PARAM, cursor));
        }
        if let Some(ref limit) = limit {
            query.push((LIMIT_PARAM, limit.as_str()));
        }

        let body = self.get_json(path, &query, cancel).await?;
        let envelope: PaginatedEnvelope<T> = decode(path, body)?;
        Ok(envelope.data)
    }

    /// Fetch a single object; `data: null` yields `None`
    async fn get_object<T>(&self, path: &str, cancel: &CancellationToken) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let body = self.get_json(path, &[], cancel).await?;
        let envelope: ObjectEnvelope<T> = decode(path, body)?;
        Ok(envelope.data)
    }
}

impl<X: Transport + ?Sized> TransportExt for X {}

fn decode<T: DeserializeOwned>(path: &str, body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|source| Error::Decode {
        path: path.to_string(),
        source,
    })
}
