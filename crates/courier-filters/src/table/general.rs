//! Priority-aware table that routes filters to specialised indexes.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use courier_message::Message;

use super::{
    ActionFilterTable, AndFilterTable, EndpointAddressFilterTable, FilterKey, FilterMatch,
    MessageFilterTable, PrefixEndpointAddressFilterTable, SequentialFilterTable,
};
use crate::error::FilterError;
use crate::filter::MessageFilter;

#[derive(Debug)]
struct PriorityGroup<V> {
    sequential: SequentialFilterTable<V>,
    action: ActionFilterTable<V>,
    and: AndFilterTable<V>,
    address: EndpointAddressFilterTable<V>,
    prefix: PrefixEndpointAddressFilterTable<V>,
}

impl<V> PriorityGroup<V> {
    fn new() -> Self {
        Self {
            sequential: SequentialFilterTable::new(),
            action: ActionFilterTable::new(),
            and: AndFilterTable::new(),
            address: EndpointAddressFilterTable::new(),
            prefix: PrefixEndpointAddressFilterTable::new(),
        }
    }

    fn route(&self, filter: &MessageFilter) -> &dyn MessageFilterTable<V> {
        match filter {
            MessageFilter::MatchAll | MessageFilter::Action(_) => &self.action,
            MessageFilter::And(_) => &self.and,
            MessageFilter::EndpointAddress(_) => &self.address,
            MessageFilter::PrefixEndpointAddress(_) => &self.prefix,
            MessageFilter::MatchNone | MessageFilter::Header(_) | MessageFilter::Custom(_) => {
                &self.sequential
            }
        }
    }

    fn route_mut(&mut self, filter: &MessageFilter) -> &mut dyn MessageFilterTable<V> {
        match filter {
            MessageFilter::MatchAll | MessageFilter::Action(_) => &mut self.action,
            MessageFilter::And(_) => &mut self.and,
            MessageFilter::EndpointAddress(_) => &mut self.address,
            MessageFilter::PrefixEndpointAddress(_) => &mut self.prefix,
            MessageFilter::MatchNone | MessageFilter::Header(_) | MessageFilter::Custom(_) => {
                &mut self.sequential
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.sequential.is_empty()
            && self.action.is_empty()
            && self.and.is_empty()
            && self.address.is_empty()
            && self.prefix.is_empty()
    }

    fn collect_matches<'a>(&'a self, message: &Message, out: &mut Vec<FilterMatch<'a, V>>) {
        self.action.collect_matches(message, out);
        self.and.collect_matches(message, out);
        self.address.collect_matches(message, out);
        self.prefix.collect_matches(message, out);
        self.sequential.collect_matches(message, out);
    }
}

/// General-purpose filter table with priorities.
///
/// Filters are grouped by priority, highest first. Within a group each
/// filter lives in the index suited to its variant: action and match-all
/// filters in an [`ActionFilterTable`], conjunctions in an
/// [`AndFilterTable`], address filters in the hashed and prefix tables, and
/// everything else in a [`SequentialFilterTable`]. A lookup stops at the
/// first group with any match; two or more matches in that group are
/// ambiguous whichever indexes they came from.
#[derive(Debug)]
pub struct FilterTable<V> {
    groups: BTreeMap<Reverse<i32>, PriorityGroup<V>>,
    priorities: HashMap<FilterKey, i32>,
}

impl<V> FilterTable<V> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
            priorities: HashMap::new(),
        }
    }

    /// Registers a filter at the given priority.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::DuplicateFilter`] when the handle is already
    /// registered at any priority.
    pub fn add_with_priority(
        &mut self,
        filter: Arc<MessageFilter>,
        value: V,
        priority: i32,
    ) -> Result<(), FilterError> {
        let key = FilterKey::of(&filter);
        if self.priorities.contains_key(&key) {
            return Err(FilterError::DuplicateFilter);
        }
        let group = self
            .groups
            .entry(Reverse(priority))
            .or_insert_with(PriorityGroup::new);
        group.route_mut(&filter).add(filter, value)?;
        self.priorities.insert(key, priority);
        Ok(())
    }

    /// Priority a filter was registered at.
    #[must_use]
    pub fn priority_of(&self, filter: &Arc<MessageFilter>) -> Option<i32> {
        self.priorities.get(&FilterKey::of(filter)).copied()
    }

    /// Highest registered priority.
    #[must_use]
    pub fn highest_priority(&self) -> Option<i32> {
        self.groups.keys().next().map(|Reverse(priority)| *priority)
    }

    /// Appends every match from every priority group.
    pub(crate) fn collect_all_matches<'a>(
        &'a self,
        message: &Message,
        out: &mut Vec<FilterMatch<'a, V>>,
    ) {
        for group in self.groups.values() {
            group.collect_matches(message, out);
        }
    }

    fn group_of(&self, filter: &Arc<MessageFilter>) -> Option<&PriorityGroup<V>> {
        let priority = self.priority_of(filter)?;
        self.groups.get(&Reverse(priority))
    }
}

impl<V> Default for FilterTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MessageFilterTable<V> for FilterTable<V> {
    /// Registers a filter at priority zero.
    fn add(&mut self, filter: Arc<MessageFilter>, value: V) -> Result<(), FilterError> {
        self.add_with_priority(filter, value, 0)
    }

    fn remove(&mut self, filter: &Arc<MessageFilter>) -> Result<V, FilterError> {
        let key = FilterKey::of(filter);
        let priority = *self
            .priorities
            .get(&key)
            .ok_or(FilterError::FilterNotFound)?;
        let group = self
            .groups
            .get_mut(&Reverse(priority))
            .ok_or(FilterError::FilterNotFound)?;
        let value = group.route_mut(filter).remove(filter)?;
        if group.is_empty() {
            self.groups.remove(&Reverse(priority));
        }
        self.priorities.remove(&key);
        Ok(value)
    }

    fn get(&self, filter: &Arc<MessageFilter>) -> Option<&V> {
        self.group_of(filter)?.route(filter).get(filter)
    }

    fn get_mut(&mut self, filter: &Arc<MessageFilter>) -> Option<&mut V> {
        let priority = self.priority_of(filter)?;
        self.groups
            .get_mut(&Reverse(priority))?
            .route_mut(filter)
            .get_mut(filter)
    }

    fn len(&self) -> usize {
        self.priorities.len()
    }

    fn collect_matches<'a>(&'a self, message: &Message, out: &mut Vec<FilterMatch<'a, V>>) {
        let before = out.len();
        for group in self.groups.values() {
            group.collect_matches(message, out);
            if out.len() > before {
                break;
            }
        }
    }
}
