//! Error types for filter construction and filter-table operations.

use std::sync::Arc;

use thiserror::Error;

use crate::filter::MessageFilter;

/// Errors from filters and filter tables.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum FilterError {
    /// An action filter was built from an empty action set.
    #[error("an action filter requires at least one action")]
    EmptyActions,

    /// Two or more filters at the highest matching priority matched the same
    /// message.
    #[error("{} filters matched the message at the same priority", filters.len())]
    MultipleFiltersMatched {
        /// Every filter that matched at that priority.
        filters: Vec<Arc<MessageFilter>>,
    },

    /// The filter handle is already registered in the table.
    #[error("filter is already present in the table")]
    DuplicateFilter,

    /// The filter handle is not registered in the table.
    #[error("filter is not present in the table")]
    FilterNotFound,

    /// The table only indexes a particular filter variant.
    #[error("{table} cannot index a {kind} filter")]
    UnsupportedFilter {
        /// Name of the table that rejected the filter.
        table: &'static str,
        /// Variant name of the rejected filter.
        kind: &'static str,
    },

    /// An address cannot be used for the requested comparison.
    #[error("invalid endpoint address '{uri}': {message}")]
    InvalidAddress {
        /// The offending URI.
        uri: String,
        /// Description of the problem.
        message: String,
    },
}

impl FilterError {
    /// Builds an ambiguity error from the conflicting filters.
    #[must_use]
    pub const fn ambiguous(filters: Vec<Arc<MessageFilter>>) -> Self {
        Self::MultipleFiltersMatched { filters }
    }

    /// Builds an invalid-address error.
    #[must_use]
    pub fn invalid_address(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for ambiguity errors.
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::MultipleFiltersMatched { .. })
    }
}
