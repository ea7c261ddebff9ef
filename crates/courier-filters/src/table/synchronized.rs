//! Thread-safe wrapper around [`FilterTable`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courier_message::{Message, MessageBuffer};

use super::{FilterTable, MessageFilterTable};
use crate::error::FilterError;
use crate::filter::MessageFilter;

/// [`FilterTable`] guarded by a single mutex.
///
/// Every operation takes the lock for its whole duration. Lookups return
/// owned values because references cannot outlive the guard.
#[derive(Debug)]
pub struct SynchronizedFilterTable<V> {
    inner: Mutex<FilterTable<V>>,
}

impl<V> SynchronizedFilterTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FilterTable::new()),
        }
    }

    // Table operations never leave the table half-updated, so a panic in
    // another holder does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, FilterTable<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the table.
    pub fn with_table<R>(&self, f: impl FnOnce(&mut FilterTable<V>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Registers a filter at the given priority.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::DuplicateFilter`] when the handle is present.
    pub fn add(
        &self,
        filter: Arc<MessageFilter>,
        value: V,
        priority: i32,
    ) -> Result<(), FilterError> {
        self.lock().add_with_priority(filter, value, priority)
    }

    /// Unregisters a filter and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::FilterNotFound`] when the handle is absent.
    pub fn remove(&self, filter: &Arc<MessageFilter>) -> Result<V, FilterError> {
        self.lock().remove(filter)
    }

    /// Number of registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no filter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The single matching filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleFiltersMatched`] on ambiguity.
    pub fn get_matching_filter(
        &self,
        message: &Message,
    ) -> Result<Option<Arc<MessageFilter>>, FilterError> {
        self.lock().get_matching_filter(message)
    }

    /// Every matching filter at the winning priority.
    #[must_use]
    pub fn get_matching_filters(&self, message: &Message) -> Vec<Arc<MessageFilter>> {
        let mut results = Vec::new();
        self.lock().get_matching_filters(message, &mut results);
        results
    }
}

impl<V: Clone> SynchronizedFilterTable<V> {
    /// Value registered with a filter.
    #[must_use]
    pub fn get(&self, filter: &Arc<MessageFilter>) -> Option<V> {
        self.lock().get(filter).cloned()
    }

    /// Value of the single matching filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleFiltersMatched`] on ambiguity.
    pub fn get_matching_value(&self, message: &Message) -> Result<Option<V>, FilterError> {
        Ok(self.lock().get_matching_value(message)?.cloned())
    }

    /// [`Self::get_matching_value`] against a buffered message.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MultipleFiltersMatched`] on ambiguity.
    pub fn get_matching_value_in_buffer(
        &self,
        buffer: &MessageBuffer,
    ) -> Result<Option<V>, FilterError> {
        self.get_matching_value(&buffer.create_message())
    }

    /// Values of every match at the winning priority.
    #[must_use]
    pub fn get_matching_values(&self, message: &Message) -> Vec<V> {
        let table = self.lock();
        let mut results = Vec::new();
        table.get_matching_values(message, &mut results);
        results.into_iter().cloned().collect()
    }
}

impl<V> Default for SynchronizedFilterTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
