//! Connecting to Fivetran and choosing what to import
//!
//! [`ConnectionSupport`] walks the user through credentials and group
//! selection, then hands out an [`ImportSession`] bound to one group.

mod input;

pub use input::{ConsoleInput, InputProvider};

use crate::config::ImportConfig;
use crate::lineage::{self, Mapping};
use crate::{ImportError, Result};
use fivetran_client::{CancellationToken, Credentials, Group, RestApi, RestApiManager};
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Validated API credentials and timeout
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    api_key: String,
    api_secret: String,
    timeout: Duration,
}

impl ConnectionDetails {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if api_key.trim().is_empty() {
            return Err(ImportError::invalid_argument("API key", "cannot be blank"));
        }
        if api_secret.trim().is_empty() {
            return Err(ImportError::invalid_argument("API secret", "cannot be blank"));
        }
        if timeout.is_zero() {
            return Err(ImportError::invalid_argument(
                "timeout",
                "must be greater than zero",
            ));
        }

        Ok(Self {
            api_key,
            api_secret,
            timeout,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn credentials(&self) -> Credentials {
        Credentials::new(self.api_key.clone(), self.api_secret.clone())
    }
}

impl std::fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// An API connection scoped to the group being imported
pub struct ImportSession {
    api: Arc<dyn RestApi>,
    group_id: String,
}

impl ImportSession {
    pub fn new(api: Arc<dyn RestApi>, group_id: impl Into<String>) -> Self {
        Self {
            api,
            group_id: group_id.into(),
        }
    }

    pub fn api(&self) -> &Arc<dyn RestApi> {
        &self.api
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn close(&self) {
        self.api.close();
    }
}

/// Drives an import: credentials, group choice, connection, lineage
pub struct ConnectionSupport<I> {
    input: I,
    config: ImportConfig,
    cancel: CancellationToken,
}

impl<I: InputProvider> ConnectionSupport<I> {
    pub fn new(input: I, config: ImportConfig) -> Self {
        Self {
            input,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop in-flight and future API calls when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Prompt for key and secret; timeout comes from configuration
    pub fn connection_details(&self) -> Result<ConnectionDetails> {
        let api_key = self.input.api_key()?;
        let api_secret = self.input.api_secret()?;
        ConnectionDetails::new(api_key, api_secret, self.config.timeout())
    }

    /// List the groups visible to `details` and ask which one to import
    pub async fn select_to_import(&self, details: &ConnectionDetails) -> Result<String> {
        let api = self.open_api(details)?;
        let selected = self.select_group(&api).await;
        api.close();
        selected
    }

    /// Group selection against an existing API handle
    pub async fn select_group(&self, api: &dyn RestApi) -> Result<String> {
        let groups: Vec<Group> = api.groups(self.cancel.clone()).try_collect().await?;
        if groups.is_empty() {
            return Err(ImportError::NoGroups);
        }

        debug!(count = groups.len(), "Asking for group selection");
        let choice = self.input.group_index(&groups)?;
        let group = choice
            .checked_sub(1)
            .and_then(|i| groups.get(i))
            .ok_or(ImportError::InvalidSelection(choice))?;

        debug!(group_id = %group.id, group_name = %group.name, "Group selected");
        Ok(group.id.clone())
    }

    /// Open an owned API connection for `group_id`
    pub fn connect(&self, details: &ConnectionDetails, group_id: &str) -> Result<ImportSession> {
        if group_id.trim().is_empty() {
            return Err(ImportError::invalid_argument("group id", "cannot be blank"));
        }

        let api = self.open_api(details)?;
        info!(group_id = %group_id, "Connected to Fivetran");
        Ok(ImportSession::new(Arc::new(api), group_id))
    }

    pub fn close(&self, session: &ImportSession) {
        session.close();
    }

    /// Collect every `source -> destination` mapping in the session's group
    pub async fn run_import(&self, session: &ImportSession) -> Result<Vec<Mapping>> {
        let mappings = lineage::collect_mappings(
            session.api().as_ref(),
            session.group_id(),
            self.config.concurrency,
            &self.cancel,
        )
        .await?;

        if mappings.is_empty() {
            info!(
                "No mappings found in the selected group ({}).",
                session.group_id()
            );
        } else {
            info!(
                group_id = %session.group_id(),
                count = mappings.len(),
                "Lineage mappings collected"
            );
            for mapping in &mappings {
                debug!("{}", mapping);
            }
        }

        Ok(mappings)
    }

    /// Owned API handle for `details`, using the configured transport settings
    pub fn open_api(&self, details: &ConnectionDetails) -> Result<RestApiManager> {
        let transport = self
            .config
            .transport_config(details.credentials())
            .with_timeout(details.timeout());
        let mut api = RestApiManager::from_config(transport)?;
        if let Some(size) = self.config.page_size {
            api = api.with_page_size(size);
        }
        Ok(api)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use fivetran_client::{Connector, DataSchemas, Error};
    use futures::stream::{self, BoxStream, StreamExt};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory API with fixed groups, connectors and schemas
    #[derive(Default)]
    pub struct FakeApi {
        pub groups: Vec<Group>,
        pub connectors: HashMap<String, Vec<Connector>>,
        pub schemas: HashMap<String, DataSchemas>,
        pub schema_calls: AtomicUsize,
        pub closes: AtomicUsize,
    }

    #[async_trait]
    impl RestApi for FakeApi {
        fn groups(&self, _cancel: CancellationToken) -> BoxStream<'static, fivetran_client::Result<Group>> {
            stream::iter(self.groups.clone().into_iter().map(Ok)).boxed()
        }

        fn connectors(
            &self,
            group_id: &str,
            _cancel: CancellationToken,
        ) -> BoxStream<'static, fivetran_client::Result<Connector>> {
            let connectors = self.connectors.get(group_id).cloned().unwrap_or_default();
            stream::iter(connectors.into_iter().map(Ok)).boxed()
        }

        async fn connector_schemas(
            &self,
            connector_id: &str,
            cancel: &CancellationToken,
        ) -> fivetran_client::Result<Option<DataSchemas>> {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    path: connector_id.to_string(),
                });
            }
            self.schema_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.schemas.get(connector_id).cloned())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Fixed answers for every prompt, recording the groups offered
    pub struct ScriptedInput {
        pub key: String,
        pub secret: String,
        pub index: usize,
        pub offered: Mutex<Vec<Group>>,
    }

    impl InputProvider for ScriptedInput {
        fn api_key(&self) -> Result<String> {
            Ok(self.key.clone())
        }

        fn api_secret(&self) -> Result<String> {
            Ok(self.secret.clone())
        }

        fn group_index(&self, groups: &[Group]) -> Result<usize> {
            *self.offered.lock().unwrap() = groups.to_vec();
            Ok(self.index)
        }
    }

    pub fn group(id: &str, name: &str) -> Group {
        Group {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn input(index: usize) -> ScriptedInput {
        ScriptedInput {
            key: "key".to_string(),
            secret: "secret".to_string(),
            index,
            offered: Mutex::default(),
        }
    }
}
