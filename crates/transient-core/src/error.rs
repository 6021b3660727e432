//! Error types for transient-core

use thiserror::Error;

/// Result type alias using transient-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and I/O errors
///
/// Failures of retried operations are reported through
/// [`RetryError`](crate::retry::RetryError) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// A configuration file is not valid YAML for its schema
    #[error("Failed to parse {path}: {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create a YAML parse error for the given file
    pub fn yaml_parse(path: impl Into<String>, source: serde_yaml_ng::Error) -> Self {
        Self::YamlParse {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::config_not_found("/tmp/missing.yaml");
        assert_eq!(
            err.to_string(),
            "Configuration file not found: /tmp/missing.yaml"
        );

        let err = Error::invalid_config("max-attempts must be a number");
        assert!(err.to_string().contains("max-attempts"));
    }

    #[test]
    fn test_yaml_parse_names_file() {
        let yaml_err = serde_yaml_ng::from_str::<u32>("[not, a, number]").unwrap_err();
        let err = Error::yaml_parse("/tmp/runtime.yaml", yaml_err);
        assert!(matches!(err, Error::YamlParse { .. }));
        assert!(err.to_string().starts_with("Failed to parse /tmp/runtime.yaml"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
