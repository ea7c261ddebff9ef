//! Conjunction table.

use std::collections::HashMap;
use std::sync::Arc;

use courier_message::Message;

use super::{Entry, FilterKey, FilterMatch, FilterTable, MessageFilterTable, unsupported};
use crate::error::FilterError;
use crate::filter::MessageFilter;

/// Table indexing [`MessageFilter::And`] filters by their first child.
///
/// First children live in a nested [`FilterTable`], so each distinct first
/// child is evaluated once per lookup through whatever index suits it. The
/// second child of every candidate whose first child matched is then
/// re-tested linearly; first children never shadow one another. Endpoint
/// filters put the selective address filter first, which keeps the candidate
/// lists short.
#[derive(Debug)]
pub struct AndFilterTable<V> {
    entries: HashMap<FilterKey, Entry<V>>,
    first: FilterTable<Vec<Arc<MessageFilter>>>,
}

impl<V> AndFilterTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            first: FilterTable::new(),
        }
    }
}

impl<V> Default for AndFilterTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MessageFilterTable<V> for AndFilterTable<V> {
    fn add(&mut self, filter: Arc<MessageFilter>, value: V) -> Result<(), FilterError> {
        let key = FilterKey::of(&filter);
        if self.entries.contains_key(&key) {
            return Err(FilterError::DuplicateFilter);
        }
        let MessageFilter::And(and_filter) = filter.as_ref() else {
            return Err(unsupported("and filter table", &filter));
        };
        let first = and_filter.first();
        if let Some(bucket) = self.first.get_mut(first) {
            bucket.push(Arc::clone(&filter));
        } else {
            self.first
                .add(Arc::clone(first), vec![Arc::clone(&filter)])?;
        }
        self.entries.insert(key, Entry::new(filter, value));
        Ok(())
    }

    fn remove(&mut self, filter: &Arc<MessageFilter>) -> Result<V, FilterError> {
        let entry = self
            .entries
            .remove(&FilterKey::of(filter))
            .ok_or(FilterError::FilterNotFound)?;
        if let MessageFilter::And(and_filter) = entry.filter.as_ref() {
            let first = and_filter.first();
            let now_empty = self.first.get_mut(first).is_some_and(|bucket| {
                bucket.retain(|candidate| !Arc::ptr_eq(candidate, filter));
                bucket.is_empty()
            });
            if now_empty {
                self.first.remove(first)?;
            }
        }
        Ok(entry.value)
    }

    fn get(&self, filter: &Arc<MessageFilter>) -> Option<&V> {
        self.entries
            .get(&FilterKey::of(filter))
            .map(|entry| &entry.value)
    }

    fn get_mut(&mut self, filter: &Arc<MessageFilter>) -> Option<&mut V> {
        self.entries
            .get_mut(&FilterKey::of(filter))
            .map(|entry| &mut entry.value)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn collect_matches<'a>(&'a self, message: &Message, out: &mut Vec<FilterMatch<'a, V>>) {
        let mut first_matches = Vec::new();
        self.first.collect_all_matches(message, &mut first_matches);
        for candidates in first_matches.into_iter().map(|found| found.value) {
            for candidate in candidates {
                let MessageFilter::And(and_filter) = candidate.as_ref() else {
                    continue;
                };
                if !and_filter.second().matches(message) {
                    continue;
                }
                if let Some(entry) = self.entries.get(&FilterKey::of(candidate)) {
                    out.push(entry.as_match());
                }
            }
        }
    }
}
