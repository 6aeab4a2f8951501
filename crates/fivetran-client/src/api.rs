//! Fivetran API facade
//!
//! [`RestApi`] is the capability the rest of the application programs
//! against; [`RestApiManager`] implements it by binding the fetch engines to
//! the three endpoints this client knows about.

use crate::fetchers::{NonPaginatedFetcher, PaginatedFetcher};
use crate::models::{Connector, DataSchemas, Group};
use crate::transport::{Credentials, HttpTransport, Transport, TransportConfig, DEFAULT_BASE_URL};
use crate::Result;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Read access to groups, connectors and connector schemas
#[async_trait]
pub trait RestApi: Send + Sync {
    /// Every group visible to the API key, lazily paginated
    fn groups(&self, cancel: CancellationToken) -> BoxStream<'static, Result<Group>>;

    /// Connectors of one group, lazily paginated
    fn connectors(
        &self,
        group_id: &str,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<Connector>>;

    /// Schema configuration of one connector; `None` when the API returns no data
    async fn connector_schemas(
        &self,
        connector_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<DataSchemas>>;

    /// Release resources held by this instance. Safe to call repeatedly.
    fn close(&self);
}

/// Whether a [`RestApiManager`] is responsible for closing its transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Created by the manager; closed exactly once on [`RestApi::close`] or drop
    Owned,
    /// Supplied by the caller; never closed by the manager
    Borrowed,
}

pub struct RestApiManager {
    transport: Arc<dyn Transport>,
    paginated: PaginatedFetcher,
    single: NonPaginatedFetcher,
    ownership: Ownership,
    closed: AtomicBool,
}

impl RestApiManager {
    /// Connect to the public Fivetran API with an owned HTTP transport
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, api_secret, timeout)
    }

    /// Connect to an arbitrary API root with an owned HTTP transport
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let config = TransportConfig::new(Credentials::new(api_key, api_secret))
            .with_base_url(base_url)
            .with_timeout(timeout);
        Self::from_config(config)
    }

    /// Build an owned HTTP transport from a full configuration
    pub fn from_config(config: TransportConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::build(Arc::new(transport), Ownership::Owned))
    }

    /// Wrap a transport owned by the caller. The manager never closes it.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::build(transport, Ownership::Borrowed)
    }

    fn build(transport: Arc<dyn Transport>, ownership: Ownership) -> Self {
        Self {
            paginated: PaginatedFetcher::new(Arc::clone(&transport)),
            single: NonPaginatedFetcher::new(Arc::clone(&transport)),
            transport,
            ownership,
            closed: AtomicBool::new(false),
        }
    }

    /// Request pages of `size` items from paginated endpoints
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.paginated = self.paginated.clone().with_page_size(size);
        self
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }
}

#[async_trait]
impl RestApi for RestApiManager {
    fn groups(&self, cancel: CancellationToken) -> BoxStream<'static, Result<Group>> {
        self.paginated.fetch_items(groups_path(), cancel).boxed()
    }

    fn connectors(
        &self,
        group_id: &str,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<Connector>> {
        self.paginated
            .fetch_items(connectors_path(group_id), cancel)
            .boxed()
    }

    async fn connector_schemas(
        &self,
        connector_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<DataSchemas>> {
        self.single.fetch(&schemas_path(connector_id), cancel).await
    }

    fn close(&self) {
        if self.ownership == Ownership::Borrowed {
            return;
        }
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Releasing owned Fivetran transport");
        self.transport.close();
    }
}

impl Drop for RestApiManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn groups_path() -> String {
    "groups".to_string()
}

fn connectors_path(group_id: &str) -> String {
    format!("groups/{}/connectors", urlencoding::encode(group_id))
}

fn schemas_path(connector_id: &str) -> String {
    format!("connectors/{}/schemas", urlencoding::encode(connector_id))
}
