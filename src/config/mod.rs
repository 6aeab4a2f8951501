//! Configuration system
//!
//! Loads ~/.config/fivetran-import/config.yaml with:
//! - API root and credential environment variable names
//! - Request timeout, retry count and concurrency
//! - Page size and the optional response cache
//!
//! Command-line flags override whatever the file says.

mod import_config;
pub mod validation;

pub use import_config::ImportConfig;
pub use validation::{validate_config, validate_config_result, ValidationError};
