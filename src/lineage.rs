//! Source-to-destination lineage for a group
//!
//! Each table of each connector schema in the group becomes one [`Mapping`],
//! whether or not the schema is enabled. Schema fetches run concurrently,
//! bounded by the configured concurrency; output is sorted so repeated runs
//! print the same.

use crate::{ImportError, Result};
use fivetran_client::{CancellationToken, Connector, DataSchemas, RestApi};
use futures::TryStreamExt;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// One source table and where the connector lands it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Mapping {
    pub connector_id: String,
    pub source_schema: String,
    pub source_table: String,
    pub destination_schema: String,
    pub destination_table: String,
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  {}: {}.{} -> {}.{}",
            self.connector_id,
            self.source_schema,
            self.source_table,
            self.destination_schema,
            self.destination_table
        )
    }
}

/// Mappings for one connector's schema configuration; null schemas are skipped
pub fn mappings_for(connector_id: &str, schemas: &DataSchemas) -> Vec<Mapping> {
    schemas
        .iter()
        .flat_map(|(schema_name, schema)| {
            schema.tables.iter().map(move |(table_name, table)| Mapping {
                connector_id: connector_id.to_string(),
                source_schema: schema_name.to_string(),
                source_table: table_name.clone(),
                destination_schema: schema.name_in_destination.clone(),
                destination_table: table.name_in_destination.clone(),
            })
        })
        .collect()
}

/// Walk the connectors of `group_id` and collect every table mapping, sorted
///
/// Fails with [`ImportError::NoConnectors`] when the group has no connectors.
/// A group whose connectors expose no tables yields an empty list.
pub async fn collect_mappings(
    api: &dyn RestApi,
    group_id: &str,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Mapping>> {
    let mut schemas = api
        .connectors(group_id, cancel.clone())
        .map_ok(move |connector: Connector| async move {
            let schemas = api.connector_schemas(&connector.id, cancel).await?;
            Ok::<_, fivetran_client::Error>((connector, schemas))
        })
        .try_buffer_unordered(concurrency.max(1));

    let mut connectors = 0usize;
    let mut mappings = Vec::new();
    while let Some((connector, data)) = schemas.try_next().await? {
        connectors += 1;
        match data {
            Some(data) => mappings.extend(mappings_for(&connector.id, &data)),
            None => debug!(connector_id = %connector.id, "Connector has no schema data"),
        }
    }

    if connectors == 0 {
        return Err(ImportError::NoConnectors(group_id.to_string()));
    }

    mappings.sort();
    debug!(
        group_id = %group_id,
        connectors,
        mappings = mappings.len(),
        "Collected lineage"
    );
    Ok(mappings)
}
