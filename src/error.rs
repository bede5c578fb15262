//! Error types for sampling operations.
//!
//! Configuration problems are reported through [`ConfigError`]; everything
//! that can go wrong while reading, analyzing, or writing tables surfaces as
//! a [`SamplerError`].

use thiserror::Error;

pub use crate::config::ConfigError;

/// Errors that can occur while sampling a table.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unique columns not found in header rows: {}", missing.join(", "))]
    MissingUniqueColumns { missing: Vec<String> },

    #[error("Invalid column pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid input pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SamplerError {
    /// Wraps a CSV read error with the path of the file being read.
    pub fn read(path: impl Into<String>, source: csv::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_unique_columns_message() {
        let err = SamplerError::MissingUniqueColumns {
            missing: vec!["state".to_string(), "county".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unique columns not found in header rows: state, county"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: SamplerError = ConfigError::ValidationFailed("bad".to_string()).into();
        assert!(err.to_string().contains("Configuration error"));
    }
}
