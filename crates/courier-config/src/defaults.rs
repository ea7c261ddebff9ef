//! Default values shared by the dispatcher configuration.

use crate::concurrency::{ConcurrencyMode, InstanceContextMode};
use crate::logging::LogFormat;

/// Default log filter expression used by dispatcher hosts.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Number of endpoints the resolution table scans linearly before it builds
/// an indexed filter table.
pub const DEFAULT_ENDPOINT_TABLE_THRESHOLD: usize = 2;

/// Maximum number of idle endpoint-address processors kept for reuse.
pub const DEFAULT_ADDRESS_PROCESSOR_POOL_CAPACITY: usize = 32;

/// Default log filter expression used by dispatcher hosts.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default concurrency mode applied to new dispatch runtimes.
#[must_use]
pub const fn default_concurrency_mode() -> ConcurrencyMode {
    ConcurrencyMode::Single
}

/// Default instance context mode applied to new dispatch runtimes.
#[must_use]
pub const fn default_instance_context_mode() -> InstanceContextMode {
    InstanceContextMode::PerSession
}

/// Default list-to-table promotion threshold for the endpoint table.
#[must_use]
pub const fn default_endpoint_table_threshold() -> usize {
    DEFAULT_ENDPOINT_TABLE_THRESHOLD
}

/// Default capacity of the endpoint-address processor pool.
#[must_use]
pub const fn default_address_processor_pool_capacity() -> usize {
    DEFAULT_ADDRESS_PROCESSOR_POOL_CAPACITY
}
