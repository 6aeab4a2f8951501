//! Import configuration file handling

use crate::{ImportError, Result};
use fivetran_client::transport::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use fivetran_client::{Credentials, RetryConfig, TransportConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for talking to the Fivetran API
///
/// Secrets never live in the file; only the names of the environment
/// variables that hold them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// API root, e.g. https://api.fivetran.com/v1/
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Environment variable holding the API secret
    #[serde(default = "default_api_secret_env")]
    pub api_secret_env: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Schema fetches in flight at once while collecting lineage
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Items per page requested from paginated endpoints; server default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    /// Cache identical GETs for this many seconds; disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_cache_ttl_secs: Option<u64>,

    /// Retries for rate-limited or transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "FIVETRAN_API_KEY".to_string()
}

fn default_api_secret_env() -> String {
    "FIVETRAN_API_SECRET".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

impl ImportConfig {
    pub fn new() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            api_secret_env: default_api_secret_env(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            page_size: None,
            response_cache_ttl_secs: None,
            max_retries: default_max_retries(),
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ImportError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading import configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            concurrency = config.concurrency,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load `path` (or the default path) when it exists, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::new())
        }
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving import configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/fivetran-import/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("fivetran-import");
        path.push("config.yaml");
        path
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..RetryConfig::default()
        }
    }

    /// Read the API key and secret from the configured environment variables
    pub fn env_credentials(&self) -> (Option<String>, Option<String>) {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        (read(&self.api_key_env), read(&self.api_secret_env))
    }

    /// Transport settings for these credentials
    pub fn transport_config(&self, credentials: Credentials) -> TransportConfig {
        let mut config = TransportConfig::new(credentials)
            .with_base_url(self.base_url.clone())
            .with_timeout(self.timeout())
            .with_retry(self.retry())
            .with_max_concurrent_requests(self.concurrency.max(1));
        if let Some(ttl) = self.response_cache_ttl_secs {
            config = config.with_response_cache(Duration::from_secs(ttl));
        }
        config
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::new()
    }
}
