//! Exact-address table.

use std::collections::HashMap;
use std::sync::Arc;

use courier_message::Message;

use super::{Entry, FilterKey, FilterMatch, MessageFilterTable, unsupported};
use crate::error::FilterError;
use crate::filter::MessageFilter;
use crate::uri::UriComparer;

/// Table indexing [`MessageFilter::EndpointAddress`] filters by URI key.
///
/// Host-inclusive and host-agnostic filters are hashed separately. A lookup
/// computes the message's `To` key under each comparer in use and re-tests
/// the required headers of every filter in the hit buckets.
#[derive(Debug)]
pub struct EndpointAddressFilterTable<V> {
    entries: HashMap<FilterKey, Entry<V>>,
    host_inclusive: HashMap<String, Vec<FilterKey>>,
    host_agnostic: HashMap<String, Vec<FilterKey>>,
}

impl<V> EndpointAddressFilterTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            host_inclusive: HashMap::new(),
            host_agnostic: HashMap::new(),
        }
    }

    fn buckets_mut(&mut self, comparer: UriComparer) -> &mut HashMap<String, Vec<FilterKey>> {
        if comparer.include_host_name() {
            &mut self.host_inclusive
        } else {
            &mut self.host_agnostic
        }
    }
}

impl<V> Default for EndpointAddressFilterTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MessageFilterTable<V> for EndpointAddressFilterTable<V> {
    fn add(&mut self, filter: Arc<MessageFilter>, value: V) -> Result<(), FilterError> {
        let key = FilterKey::of(&filter);
        if self.entries.contains_key(&key) {
            return Err(FilterError::DuplicateFilter);
        }
        let MessageFilter::EndpointAddress(address_filter) = filter.as_ref() else {
            return Err(unsupported("endpoint address filter table", &filter));
        };
        self.buckets_mut(address_filter.comparer())
            .entry(address_filter.key().to_owned())
            .or_default()
            .push(key);
        self.entries.insert(key, Entry::new(filter, value));
        Ok(())
    }

    fn remove(&mut self, filter: &Arc<MessageFilter>) -> Result<V, FilterError> {
        let key = FilterKey::of(filter);
        let entry = self
            .entries
            .remove(&key)
            .ok_or(FilterError::FilterNotFound)?;
        if let MessageFilter::EndpointAddress(address_filter) = entry.filter.as_ref() {
            let buckets = self.buckets_mut(address_filter.comparer());
            let now_empty = buckets.get_mut(address_filter.key()).is_some_and(|bucket| {
                bucket.retain(|existing| *existing != key);
                bucket.is_empty()
            });
            if now_empty {
                buckets.remove(address_filter.key());
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
        let Some(to) = message.headers().to() else {
            return;
        };
        let indexes = [
            (&self.host_inclusive, UriComparer::HOST_INCLUSIVE),
            (&self.host_agnostic, UriComparer::HOST_AGNOSTIC),
        ];
        for (buckets, comparer) in indexes {
            if buckets.is_empty() {
                continue;
            }
            let Some(bucket) = buckets.get(&comparer.key(to)) else {
                continue;
            };
            for entry in bucket.iter().filter_map(|key| self.entries.get(key)) {
                let headers_match = match entry.filter.as_ref() {
                    MessageFilter::EndpointAddress(address_filter) => {
                        address_filter.matches_headers(message.headers())
                    }
                    _ => false,
                };
                if headers_match {
                    out.push(entry.as_match());
                }
            }
        }
    }
}
