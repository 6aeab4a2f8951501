//! Configuration validation
//!
//! Collects every problem at once instead of stopping at the first:
//! - API root is an absolute http(s) URL
//! - Credential environment variable names are set
//! - Timeout and concurrency are positive

use super::import_config::ImportConfig;
use crate::ImportError;

/// Validation error details
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub context: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref ctx) = self.context {
            write!(f, "[{}] {}: {}", ctx, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate an import configuration
pub fn validate_config(config: &ImportConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if !is_valid_base_url(&config.base_url) {
        errors.push(ValidationError::new(
            "base_url",
            format!("Invalid API URL: {}", config.base_url),
        ));
    }

    for (field, name) in [
        ("api_key_env", &config.api_key_env),
        ("api_secret_env", &config.api_secret_env),
    ] {
        if name.trim().is_empty() {
            errors.push(
                ValidationError::new(field, "Environment variable name cannot be empty")
                    .with_context("credentials"),
            );
        }
    }

    if config.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "timeout_secs",
            "Timeout must be greater than 0",
        ));
    }

    if config.concurrency == 0 {
        errors.push(ValidationError::new(
            "concurrency",
            "Concurrency must be greater than 0",
        ));
    }

    if config.page_size == Some(0) {
        errors.push(ValidationError::new(
            "page_size",
            "Page size must be greater than 0 when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_base_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split('/').next().unwrap_or("");
            !host.is_empty() && !host.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &ImportConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ImportError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&ImportConfig::new()).is_ok());
    }

    #[test]
    fn test_valid_base_urls() {
        assert!(is_valid_base_url("https://api.fivetran.com/v1/"));
        assert!(is_valid_base_url("http://localhost:8080/v1"));
        assert!(!is_valid_base_url("api.fivetran.com"));
        assert!(!is_valid_base_url("https:///v1"));
        assert!(!is_valid_base_url("ftp://example.com"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ImportConfig::new();
        config.base_url = "nope".to_string();
        config.api_secret_env = " ".to_string();
        config.timeout_secs = 0;
        config.concurrency = 0;
        config.page_size = Some(0);

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "base_url",
                "api_secret_env",
                "timeout_secs",
                "concurrency",
                "page_size"
            ]
        );
        assert_eq!(
            errors[1].to_string(),
            "[credentials] api_secret_env: Environment variable name cannot be empty"
        );
    }

    #[test]
    fn test_validate_config_result_message() {
        let mut config = ImportConfig::new();
        config.timeout_secs = 0;

        let err = validate_config_result(&config).unwrap_err();
        assert!(err
            .to_string()
            .contains("timeout_secs: Timeout must be greater than 0"));
    }
}
