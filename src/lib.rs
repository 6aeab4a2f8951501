//! Fivetran Import - connector lineage from the Fivetran REST API
//!
//! Reads which source schemas and tables every connector in a Fivetran group
//! lands in the destination, and reports them as `source -> destination`
//! mappings. API access lives in the `fivetran-client` crate; this crate adds
//! configuration, interactive connection setup and the lineage walk.
//!
//! # Architecture
//!
//! - **config**: YAML configuration and validation
//! - **connection**: credentials, group selection and import sessions
//! - **lineage**: concurrent schema walk producing sorted mappings
//! - **logging**: tracing subscriber setup

pub mod config;
pub mod connection;
pub mod error;
pub mod lineage;
pub mod logging;

pub use error::{ImportError, Result};
