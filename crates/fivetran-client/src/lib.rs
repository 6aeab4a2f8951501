//! Streaming client for the Fivetran REST API
//!
//! Walks groups, connectors and connector schemas without ever holding more
//! than one page of results in memory.
//!
//! # Example
//!
//! ```no_run
//! use fivetran_client::{RestApi, RestApiManager};
//! use futures::TryStreamExt;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> fivetran_client::Result<()> {
//! let api = RestApiManager::new("api-key", "api-secret", Duration::from_secs(40))?;
//! let cancel = CancellationToken::new();
//!
//! let mut groups = api.groups(cancel.clone());
//! while let Some(group) = groups.try_next().await? {
//!     println!("{} ({})", group.name, group.id);
//! }
//!
//! api.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **cache**: TTL key/value cache with atomic get-or-create
//! - **transport**: transport trait and the reqwest implementation
//! - **fetchers**: cursor pagination and single-object engines
//! - **api**: the [`RestApi`] facade over the three endpoints
//! - **models**: response envelopes and domain records

pub mod api;
pub mod cache;
pub mod error;
pub mod fetchers;
pub mod models;
pub mod retry;
pub mod transport;

pub use api::{Ownership, RestApi, RestApiManager};
pub use cache::TtlCache;
pub use error::{Error, Result};
pub use models::{Connector, DataSchemas, Group, Page, Schema, Table};
pub use retry::RetryConfig;
pub use transport::{Credentials, HttpTransport, Transport, TransportConfig, TransportExt};

// Callers need the same token type to drive cancellation.
pub use tokio_util::sync::CancellationToken;
