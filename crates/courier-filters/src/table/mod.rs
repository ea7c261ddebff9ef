//! Filter tables.
//!
//! A filter table associates filters with values and answers "which value
//! does this message select?". Whatever the indexing strategy, a lookup that
//! finds two or more matching filters at the winning priority fails with
//! [`FilterError::MultipleFiltersMatched`] rather than picking one.
//!
//! The specialised tables index a single filter variant each and carry no
//! priorities. [`FilterTable`] groups filters by priority and routes each one
//! to the specialised table for its variant.

mod action;
mod address;
mod and;
mod general;
mod prefix;
mod sequential;
mod synchronized;

use std::fmt;
use std::sync::Arc;

use courier_message::{Message, MessageBuffer};
use tracing::debug;

use crate::error::FilterError;
use crate::filter::MessageFilter;

pub use self::action::ActionFilterTable;
pub use self::address::EndpointAddressFilterTable;
pub use self::and::AndFilterTable;
pub use self::general::FilterTable;
pub use self::prefix::PrefixEndpointAddressFilterTable;
pub use self::sequential::SequentialFilterTable;
pub use self::synchronized::SynchronizedFilterTable;

const TABLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::table");

/// Identity of a filter handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FilterKey(usize);

impl FilterKey {
    pub(crate) fn of(filter: &Arc<MessageFilter>) -> Self {
        Self(Arc::as_ptr(filter).addr())
    }
}

/// A registered filter and its value.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    pub(crate) filter: Arc<MessageFilter>,
    pub(crate) value: V,
}

impl<V> Entry<V> {
    pub(crate) const fn new(filter: Arc<MessageFilter>, value: V) -> Self {
        Self { filter, value }
    }

    pub(crate) const fn as_match(&self) -> FilterMatch<'_, V> {
        FilterMatch {
            filter: &self.filter,
            value: &self.value,
        }
    }
}

/// A filter that matched a message, with its value.
pub struct FilterMatch<'a, V> {
    /// The matching filter.
    pub filter: &'a Arc<MessageFilter>,
    /// The value registered with it.
    pub value: &'a V,
}

impl<V: fmt::Debug> fmt::Debug for FilterMatch<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterMatch")
            .field("filter", &self.filter.kind())
            .field("value", self.value)
            .finish()
    }
}

/// Common interface of every filter table.
pub trait MessageFilterTable<V> {
    /// Registers a filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::DuplicateFilter`] when the handle is already
    /// present, or [`FilterError::UnsupportedFilter`] when the table cannot
    /// index the filter's variant.
    fn add(&mut self, filter: Arc<MessageFilter>, value: V) -> Result<(), FilterError>;

    /// Unregisters a filter and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::FilterNotFound`] when the handle is absent.
    fn remove(&mut self, filter: &Arc<MessageFilter>) -> Result<V, FilterError>;

    /// Value registered with a filter.
    fn get(&self, filter: &Arc<MessageFilter>) -> Option<&V>;

    /// Mutable value registered with a filter.
    fn get_mut(&mut self, filter: &Arc<MessageFilter>) -> Option<&mut V>;

    /// Number of registered filters.
    fn len(&self) -> usize;

    /// Returns `true` when no filter is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends every filter that matches at the winning priority.
    fn collect_matches<'a>(&'a self, message: &Message, out: &mut Vec<FilterMatch<'a, V>>);

    /// The single match for a message.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleFiltersMatched`] when more than one
    /// filter matches at the winning priority.
    fn get_matching(&self, message: &Message) -> Result<Option<FilterMatch<'_, V>>, FilterError> {
        let mut found = Vec::new();
        self.collect_matches(message, &mut found);
        single(found)
    }

    /// Value of the single matching filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleFiltersMatched`] on ambiguity.
    fn get_matching_value(&self, message: &Message) -> Result<Option<&V>, FilterError> {
        Ok(self.get_matching(message)?.map(|found| found.value))
    }

    /// The single matching filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleFiltersMatched`] on ambiguity.
    fn get_matching_filter(
        &self,
        message: &Message,
    ) -> Result<Option<Arc<MessageFilter>>, FilterError> {
        Ok(self
            .get_matching(message)?
            .map(|found| Arc::clone(found.filter)))
    }

    /// Appends the values of every match; returns `true` when any matched.
    fn get_matching_values<'a>(&'a self, message: &Message, results: &mut Vec<&'a V>) -> bool {
        let mut found = Vec::new();
        self.collect_matches(message, &mut found);
        let any = !found.is_empty();
        results.extend(found.into_iter().map(|item| item.value));
        any
    }

    /// Appends every matching filter; returns `true` when any matched.
    fn get_matching_filters(
        &self,
        message: &Message,
        results: &mut Vec<Arc<MessageFilter>>,
    ) -> bool {
        let mut found = Vec::new();
        self.collect_matches(message, &mut found);
        let any = !found.is_empty();
        results.extend(found.into_iter().map(|item| Arc::clone(item.filter)));
        any
    }

    /// [`Self::get_matching_value`] against a buffered message.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleFiltersMatched`] on ambiguity.
    fn get_matching_value_in_buffer(
        &self,
        buffer: &MessageBuffer,
    ) -> Result<Option<&V>, FilterError> {
        self.get_matching_value(&buffer.create_message())
    }

    /// [`Self::get_matching_filter`] against a buffered message.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleFiltersMatched`] on ambiguity.
    fn get_matching_filter_in_buffer(
        &self,
        buffer: &MessageBuffer,
    ) -> Result<Option<Arc<MessageFilter>>, FilterError> {
        self.get_matching_filter(&buffer.create_message())
    }

    /// [`Self::get_matching_values`] against a buffered message.
    fn get_matching_values_in_buffer<'a>(
        &'a self,
        buffer: &MessageBuffer,
        results: &mut Vec<&'a V>,
    ) -> bool {
        self.get_matching_values(&buffer.create_message(), results)
    }
}

/// Reduces a match list to at most one entry.
///
/// # Errors
///
/// Returns [`FilterError::MultipleFiltersMatched`] carrying every filter when
/// the list holds more than one match.
pub fn single<V>(
    mut found: Vec<FilterMatch<'_, V>>,
) -> Result<Option<FilterMatch<'_, V>>, FilterError> {
    if found.len() > 1 {
        debug!(
            target: TABLE_TARGET,
            matches = found.len(),
            "multiple filters matched at the same priority"
        );
        return Err(FilterError::ambiguous(
            found.iter().map(|item| Arc::clone(item.filter)).collect(),
        ));
    }
    Ok(found.pop())
}

pub(crate) fn unsupported(table: &'static str, filter: &MessageFilter) -> FilterError {
    FilterError::UnsupportedFilter {
        table,
        kind: filter.kind(),
    }
}

#[cfg(test)]
mod tests;
