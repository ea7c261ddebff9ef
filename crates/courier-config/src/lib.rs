//! Shared configuration for the Courier dispatch core.
//!
//! Configuration is handed to the dispatcher as a plain struct at
//! construction time. Hosts are free to populate it from any source; the
//! struct derives `serde` so it can be read from JSON or TOML documents, and
//! every field carries a default so partial documents are accepted.
//!
//! Enumerated settings ([`LogFormat`], [`ConcurrencyMode`],
//! [`InstanceContextMode`]) parse case-insensitively from their `snake_case`
//! names via `strum`.

mod concurrency;
mod defaults;
mod logging;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use concurrency::{ConcurrencyMode, InstanceContextMode, ModeParseError};
pub use defaults::{
    DEFAULT_ADDRESS_PROCESSOR_POOL_CAPACITY, DEFAULT_ENDPOINT_TABLE_THRESHOLD, DEFAULT_LOG_FILTER,
    default_address_processor_pool_capacity, default_concurrency_mode,
    default_endpoint_table_threshold, default_instance_context_mode, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter expression applied to dispatcher telemetry.
    pub log_filter: String,
    /// Output format for dispatcher telemetry.
    pub log_format: LogFormat,
    /// Concurrency mode applied to runtimes that do not override it.
    pub concurrency_mode: ConcurrencyMode,
    /// Instance context mode applied to runtimes that do not override it.
    pub instance_context_mode: InstanceContextMode,
    /// Returns full error detail inside faults instead of a generic reason.
    pub include_exception_detail_in_faults: bool,
    /// Endpoint count at or below which the resolution table scans linearly.
    pub endpoint_table_threshold: usize,
    /// Upper bound on how long a call waits for an instance lock, in
    /// milliseconds. `None` waits indefinitely.
    pub instance_lock_timeout_ms: Option<u64>,
    /// Maximum number of idle endpoint-address processors kept for reuse.
    pub address_processor_pool_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            concurrency_mode: default_concurrency_mode(),
            instance_context_mode: default_instance_context_mode(),
            include_exception_detail_in_faults: false,
            endpoint_table_threshold: default_endpoint_table_threshold(),
            instance_lock_timeout_ms: None,
            address_processor_pool_capacity: default_address_processor_pool_capacity(),
        }
    }
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the instance lock wait bound, if any.
    #[must_use]
    pub fn instance_lock_timeout(&self) -> Option<Duration> {
        self.instance_lock_timeout_ms.map(Duration::from_millis)
    }

    /// Checks that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the log filter is blank, the lock timeout
    /// is zero, or the processor pool has no capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::invalid("log_filter", "must not be empty"));
        }
        if self.instance_lock_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "instance_lock_timeout_ms",
                "must be greater than zero when set",
            ));
        }
        if self.address_processor_pool_capacity == 0 {
            return Err(ConfigError::invalid(
                "address_processor_pool_capacity",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Errors raised when a configuration value is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds a value the dispatcher cannot honour.
    #[error("invalid configuration for '{field}': {message}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

impl ConfigError {
    /// Builds an invalid-field error.
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().expect("default config is valid");
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"concurrency_mode":"reentrant"}"#).expect("parse config");
        assert_eq!(config.concurrency_mode, ConcurrencyMode::Reentrant);
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(
            config.endpoint_table_threshold,
            DEFAULT_ENDPOINT_TABLE_THRESHOLD
        );
        assert!(config.instance_lock_timeout().is_none());
    }

    #[rstest]
    #[case("single", ConcurrencyMode::Single)]
    #[case("REENTRANT", ConcurrencyMode::Reentrant)]
    #[case("Multiple", ConcurrencyMode::Multiple)]
    fn concurrency_mode_parses_case_insensitively(
        #[case] text: &str,
        #[case] expected: ConcurrencyMode,
    ) {
        assert_eq!(text.parse::<ConcurrencyMode>().expect("parse"), expected);
    }

    #[test]
    fn only_multiple_skips_locking() {
        assert!(ConcurrencyMode::Single.requires_lock());
        assert!(ConcurrencyMode::Reentrant.requires_lock());
        assert!(!ConcurrencyMode::Multiple.requires_lock());
        assert!(ConcurrencyMode::Reentrant.releases_on_call_out());
        assert!(!ConcurrencyMode::Single.releases_on_call_out());
    }

    #[rstest]
    #[case::blank_filter(Config { log_filter: "  ".to_owned(), ..Config::default() }, "log_filter")]
    #[case::zero_timeout(
        Config { instance_lock_timeout_ms: Some(0), ..Config::default() },
        "instance_lock_timeout_ms"
    )]
    #[case::empty_pool(
        Config { address_processor_pool_capacity: 0, ..Config::default() },
        "address_processor_pool_capacity"
    )]
    fn rejects_inconsistent_values(#[case] config: Config, #[case] expected_field: &str) {
        let error = config.validate().expect_err("config should be rejected");
        let ConfigError::Invalid { field, .. } = error;
        assert_eq!(field, expected_field);
    }

    #[test]
    fn lock_timeout_converts_to_duration() {
        let config = Config {
            instance_lock_timeout_ms: Some(250),
            ..Config::default()
        };
        assert_eq!(
            config.instance_lock_timeout(),
            Some(Duration::from_millis(250))
        );
    }
}
