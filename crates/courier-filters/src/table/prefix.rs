//! URI-prefix table.

use std::collections::HashMap;
use std::sync::Arc;

use courier_message::Message;

use super::{Entry, FilterKey, FilterMatch, MessageFilterTable, unsupported};
use crate::error::FilterError;
use crate::filter::MessageFilter;
use crate::uri::UriComparer;

#[derive(Debug, Default)]
struct PrefixNode {
    children: HashMap<String, PrefixNode>,
    filters: Vec<FilterKey>,
}

impl PrefixNode {
    fn descend_mut(&mut self, segments: &[String]) -> &mut Self {
        segments.iter().fold(self, |node, segment| {
            node.children.entry(segment.clone()).or_default()
        })
    }

    fn find_mut(&mut self, segments: &[String]) -> Option<&mut Self> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.children.get_mut(segment))
    }
}

/// Table indexing [`MessageFilter::PrefixEndpointAddress`] filters in a
/// segment trie rooted at each scheme and authority.
///
/// A lookup walks the message's path once and collects the filters at every
/// node along it, so overlapping prefixes such as `http://a/` and
/// `http://a/svc` both match `http://a/svc/x` and the lookup is ambiguous,
/// exactly as a linear scan would report it.
#[derive(Debug)]
pub struct PrefixEndpointAddressFilterTable<V> {
    entries: HashMap<FilterKey, Entry<V>>,
    roots: HashMap<(bool, String), PrefixNode>,
}

impl<V> PrefixEndpointAddressFilterTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            roots: HashMap::new(),
        }
    }

    fn node_matches<'a>(&'a self, node: &PrefixNode, message: &Message) -> Vec<FilterMatch<'a, V>> {
        node.filters
            .iter()
            .filter_map(|key| self.entries.get(key))
            .filter(|entry| match entry.filter.as_ref() {
                MessageFilter::PrefixEndpointAddress(prefix_filter) => {
                    prefix_filter.matches_headers(message.headers())
                }
                _ => false,
            })
            .map(Entry::as_match)
            .collect()
    }
}

impl<V> Default for PrefixEndpointAddressFilterTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MessageFilterTable<V> for PrefixEndpointAddressFilterTable<V> {
    fn add(&mut self, filter: Arc<MessageFilter>, value: V) -> Result<(), FilterError> {
        let key = FilterKey::of(&filter);
        if self.entries.contains_key(&key) {
            return Err(FilterError::DuplicateFilter);
        }
        let MessageFilter::PrefixEndpointAddress(prefix_filter) = filter.as_ref() else {
            return Err(unsupported("prefix endpoint address filter table", &filter));
        };
        let root_key = (
            prefix_filter.comparer().include_host_name(),
            prefix_filter.authority().to_owned(),
        );
        self.roots
            .entry(root_key)
            .or_default()
            .descend_mut(prefix_filter.segments())
            .filters
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
        if let MessageFilter::PrefixEndpointAddress(prefix_filter) = entry.filter.as_ref() {
            let root_key = (
                prefix_filter.comparer().include_host_name(),
                prefix_filter.authority().to_owned(),
            );
            if let Some(node) = self
                .roots
                .get_mut(&root_key)
                .and_then(|root| root.find_mut(prefix_filter.segments()))
            {
                node.filters.retain(|existing| *existing != key);
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
        let Some(segments) = UriComparer::segments(to) else {
            return;
        };

        for comparer in [UriComparer::HOST_INCLUSIVE, UriComparer::HOST_AGNOSTIC] {
            let root_key = (comparer.include_host_name(), comparer.authority_key(to));
            let Some(root) = self.roots.get(&root_key) else {
                continue;
            };
            let mut node = Some(root);
            let mut remaining = segments.iter();
            while let Some(current) = node {
                out.extend(self.node_matches(current, message));
                node = remaining
                    .next()
                    .and_then(|segment| current.children.get(segment));
            }
        }
    }
}
