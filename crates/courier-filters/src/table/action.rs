//! Action-keyed table.

use std::collections::HashMap;
use std::sync::Arc;

use courier_message::Message;

use super::{Entry, FilterKey, FilterMatch, MessageFilterTable, unsupported};
use crate::error::FilterError;
use crate::filter::MessageFilter;

/// Table indexing [`MessageFilter::Action`] filters by action.
///
/// [`MessageFilter::MatchAll`] filters go to an always-tested bucket. A
/// lookup returns the always bucket plus the bucket for the message's
/// action, so an action match coinciding with any match-all filter is
/// ambiguous, as are two match-all filters on their own.
#[derive(Debug)]
pub struct ActionFilterTable<V> {
    entries: HashMap<FilterKey, Entry<V>>,
    always: Vec<FilterKey>,
    by_action: HashMap<String, Vec<FilterKey>>,
}

impl<V> ActionFilterTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            always: Vec::new(),
            by_action: HashMap::new(),
        }
    }

    fn push_bucket<'a>(
        &'a self,
        keys: &[FilterKey],
        out: &mut Vec<FilterMatch<'a, V>>,
    ) {
        out.extend(
            keys.iter()
                .filter_map(|key| self.entries.get(key))
                .map(Entry::as_match),
        );
    }
}

impl<V> Default for ActionFilterTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MessageFilterTable<V> for ActionFilterTable<V> {
    fn add(&mut self, filter: Arc<MessageFilter>, value: V) -> Result<(), FilterError> {
        let key = FilterKey::of(&filter);
        if self.entries.contains_key(&key) {
            return Err(FilterError::DuplicateFilter);
        }
        match filter.as_ref() {
            MessageFilter::MatchAll => self.always.push(key),
            MessageFilter::Action(action_filter) => {
                for action in action_filter.actions() {
                    self.by_action
                        .entry(action.to_owned())
                        .or_default()
                        .push(key);
                }
            }
            other => return Err(unsupported("action filter table", other)),
        }
        self.entries.insert(key, Entry::new(filter, value));
        Ok(())
    }

    fn remove(&mut self, filter: &Arc<MessageFilter>) -> Result<V, FilterError> {
        let key = FilterKey::of(filter);
        let entry = self
            .entries
            .remove(&key)
            .ok_or(FilterError::FilterNotFound)?;
        self.always.retain(|existing| *existing != key);
        if let MessageFilter::Action(action_filter) = entry.filter.as_ref() {
            for action in action_filter.actions() {
                let now_empty = self.by_action.get_mut(action).is_some_and(|bucket| {
                    bucket.retain(|existing| *existing != key);
                    bucket.is_empty()
                });
                if now_empty {
                    self.by_action.remove(action);
                }
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
        self.push_bucket(&self.always, out);
        let action = message.action().unwrap_or_default();
        if let Some(bucket) = self.by_action.get(action) {
            self.push_bucket(bucket, out);
        }
    }
}
