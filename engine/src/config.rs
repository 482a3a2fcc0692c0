//! Engine configuration module.
//!
//! Handles loading engine-wide settings from environment variables with
//! sensible defaults.

use thiserror::Error;

/// An environment variable held a value that does not parse.
#[derive(Debug, Error)]
#[error("Invalid value '{value}' for {var}")]
pub struct ConfigError {
    /// Variable name.
    pub var: &'static str,
    /// Rejected value.
    pub value: String,
}

/// Engine-wide settings.
///
/// Configuration values can be set via environment variables:
/// - `LOQ_INFER_SAMPLE_SIZE`: records sampled for schema inference (default: 100)
/// - `LOQ_PREFETCH_ROWS`: read-ahead per scan on a worker thread, 0 disables (default: 0)
/// - `LOQ_MAX_LOGGED_WARNINGS`: runtime warnings logged individually per query (default: 10)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Records sampled for schema inference.
    pub infer_sample_size: usize,
    /// Scan read-ahead in records.
    pub prefetch_rows: usize,
    /// Warnings logged before only counting.
    pub max_logged_warnings: u64,
}

impl EngineConfig {
    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but is not a non-negative
    /// integer, or if `LOQ_INFER_SAMPLE_SIZE` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let infer_sample_size = read("LOQ_INFER_SAMPLE_SIZE")?.unwrap_or(defaults.infer_sample_size);
        if infer_sample_size == 0 {
            return Err(ConfigError {
                var: "LOQ_INFER_SAMPLE_SIZE",
                value: "0".to_string(),
            });
        }
        Ok(Self {
            infer_sample_size,
            prefetch_rows: read("LOQ_PREFETCH_ROWS")?.unwrap_or(defaults.prefetch_rows),
            max_logged_warnings: read("LOQ_MAX_LOGGED_WARNINGS")?
                .unwrap_or(defaults.max_logged_warnings),
        })
    }
}

fn read<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    std::env::var(var)
        .ok()
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ConfigError { var, value })
        })
        .transpose()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            infer_sample_size: 100,
            prefetch_rows: 0,
            max_logged_warnings: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.infer_sample_size, 100);
        assert_eq!(config.prefetch_rows, 0);
        assert_eq!(config.max_logged_warnings, 10);
    }

    #[test]
    fn test_read_unset_variable() {
        let value: Option<usize> = read("LOQ_TEST_CONFIG_SURELY_UNSET").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_error_message() {
        let err = ConfigError {
            var: "LOQ_PREFETCH_ROWS",
            value: "lots".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value 'lots' for LOQ_PREFETCH_ROWS");
    }
}
