//! Error types for the Fivetran import
//!
//! Client failures pass through unchanged; everything else is about local
//! input, configuration, or the selected group having nothing to import.

use thiserror::Error;

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    /// Failure reported by the Fivetran client
    #[error(transparent)]
    Client(#[from] fivetran_client::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller-supplied value failed validation
    #[error("Invalid {name}: {message}")]
    InvalidArgument { name: String, message: String },

    /// Group selection outside the listed range (1-based)
    #[error("Invalid group selection: {0}")]
    InvalidSelection(usize),

    #[error("No groups found for this API key.")]
    NoGroups,

    #[error("No connectors found in the selected group ({0}).")]
    NoConnectors(String),

    /// Interactive prompt failures
    #[error("Input error: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImportError {
    pub(crate) fn invalid_argument(name: &str, message: impl Into<String>) -> Self {
        ImportError::InvalidArgument {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// True when the operation stopped because the caller cancelled it
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ImportError::Client(e) if e.is_cancelled())
    }
}

impl From<dialoguer::Error> for ImportError {
    fn from(e: dialoguer::Error) -> Self {
        ImportError::Input(e.to_string())
    }
}
