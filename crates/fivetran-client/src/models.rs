//! Fivetran REST API data model
//!
//! Plain value types decoded from response envelopes. Every collection
//! response wraps a [`Page`] under `data`; single-object responses wrap an
//! optional object under the same key.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One page of a cursor-paginated collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// Cursor for the following page; `None` when this page is the last one.
    ///
    /// The server signals the end with either a missing/null or an empty cursor.
    pub fn next(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }
}

/// `{ "data": { "items": [...], "next_cursor": ... } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedEnvelope<T> {
    pub data: Page<T>,
}

/// `{ "data": <object|null> }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEnvelope<T> {
    pub data: Option<T>,
}

/// A Fivetran group (the equivalent of a database)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

/// A connector belonging to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    pub id: String,
    pub service: String,
    /// Destination schema (or schema prefix) the connector writes to
    pub schema: String,
    #[serde(default)]
    pub paused: Option<bool>,
}

/// Schema configuration of one connector, keyed by source schema name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSchemas {
    #[serde(default, deserialize_with = "null_as_default")]
    pub schemas: BTreeMap<String, Option<Schema>>,
}

impl DataSchemas {
    /// Iterate `(source schema, schema)` pairs, skipping null entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.schemas
            .iter()
            .filter_map(|(name, schema)| schema.as_ref().map(|s| (name.as_str(), s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name_in_destination: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Tables keyed by source table name
    #[serde(default, deserialize_with = "null_as_default")]
    pub tables: BTreeMap<String, Table>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name_in_destination: String,
}

/// Missing and explicit `null` both decode to the empty value
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
