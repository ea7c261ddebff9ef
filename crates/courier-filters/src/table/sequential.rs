//! Linear-scan table.

use std::sync::Arc;

use courier_message::Message;

use super::{Entry, FilterMatch, MessageFilterTable};
use crate::error::FilterError;
use crate::filter::MessageFilter;

/// Table that tests every filter in registration order.
///
/// Accepts any filter variant.
#[derive(Debug)]
pub struct SequentialFilterTable<V> {
    entries: Vec<Entry<V>>,
}

impl<V> SequentialFilterTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn position(&self, filter: &Arc<MessageFilter>) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.filter, filter))
    }
}

impl<V> Default for SequentialFilterTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MessageFilterTable<V> for SequentialFilterTable<V> {
    fn add(&mut self, filter: Arc<MessageFilter>, value: V) -> Result<(), FilterError> {
        if self.position(&filter).is_some() {
            return Err(FilterError::DuplicateFilter);
        }
        self.entries.push(Entry::new(filter, value));
        Ok(())
    }

    fn remove(&mut self, filter: &Arc<MessageFilter>) -> Result<V, FilterError> {
        let position = self.position(filter).ok_or(FilterError::FilterNotFound)?;
        Ok(self.entries.remove(position).value)
    }

    fn get(&self, filter: &Arc<MessageFilter>) -> Option<&V> {
        self.entries
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.filter, filter))
            .map(|entry| &entry.value)
    }

    fn get_mut(&mut self, filter: &Arc<MessageFilter>) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|entry| Arc::ptr_eq(&entry.filter, filter))
            .map(|entry| &mut entry.value)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn collect_matches<'a>(&'a self, message: &Message, out: &mut Vec<FilterMatch<'a, V>>) {
        out.extend(
            self.entries
                .iter()
                .filter(|entry| entry.filter.matches(message))
                .map(Entry::as_match),
        );
    }
}
