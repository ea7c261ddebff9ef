//! Endpoint lookup that switches from a list to a filter table as it grows.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use courier_config::DEFAULT_ENDPOINT_TABLE_THRESHOLD;
use courier_filters::{FilterError, FilterTable, MessageFilter, MessageFilterTable};
use courier_message::Message;
use tracing::debug;

use super::{ENDPOINT_TARGET, EndpointDispatcher};
use crate::errors::DispatchError;

/// Result of resolving a message to an endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointLookup {
    /// Endpoint whose filter matched, if any.
    pub endpoint: Option<Arc<EndpointDispatcher>>,
    /// `true` when some endpoint's address filter matched, even if its
    /// contract filter did not.
    pub address_matched: bool,
}

#[derive(Debug, Clone)]
struct Registration {
    endpoint: Arc<EndpointDispatcher>,
    filter: Arc<MessageFilter>,
    address_filter: Arc<MessageFilter>,
    priority: i32,
}

#[derive(Debug, Default)]
struct TableState {
    registrations: Vec<Registration>,
    table: Option<FilterTable<Arc<EndpointDispatcher>>>,
}

/// Endpoints of one channel dispatcher.
///
/// Up to `threshold` endpoints are scanned linearly; past it the endpoints
/// move into a [`FilterTable`] and stay there. Both forms resolve a
/// message identically. List-mode lookups read a published copy of the
/// list without taking the table lock.
#[derive(Debug)]
pub struct EndpointDispatcherTable {
    threshold: usize,
    state: Mutex<TableState>,
    published: RwLock<Option<Arc<[Registration]>>>,
}

impl Default for EndpointDispatcherTable {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT_TABLE_THRESHOLD)
    }
}

impl EndpointDispatcherTable {
    /// Creates an empty table that promotes itself past `threshold`
    /// endpoints.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            state: Mutex::new(TableState::default()),
            published: RwLock::new(Some(Arc::from(Vec::new()))),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, TableState>, DispatchError> {
        self.state
            .lock()
            .map_err(|_| DispatchError::poisoned("endpoint table"))
    }

    fn publish(&self, state: &TableState) {
        let snapshot = if state.table.is_some() {
            None
        } else {
            Some(Arc::from(state.registrations.clone()))
        };
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Registers `endpoint` under its current endpoint filter and priority.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Filter`] when the filter table rejects the
    /// endpoint filter, for example because another endpoint already uses
    /// the same handle.
    pub fn add(&self, endpoint: Arc<EndpointDispatcher>) -> Result<(), DispatchError> {
        let registration = Registration {
            filter: endpoint.endpoint_filter(),
            address_filter: endpoint.address_filter(),
            priority: endpoint.filter_priority(),
            endpoint,
        };
        let mut state = self.state()?;
        if state
            .registrations
            .iter()
            .any(|existing| Arc::ptr_eq(&existing.filter, &registration.filter))
        {
            return Err(FilterError::DuplicateFilter.into());
        }
        let promote = state.table.is_none() && state.registrations.len() >= self.threshold;
        if promote {
            let mut table = FilterTable::new();
            for existing in state.registrations.iter().chain([&registration]) {
                table.add_with_priority(
                    Arc::clone(&existing.filter),
                    Arc::clone(&existing.endpoint),
                    existing.priority,
                )?;
            }
            state.table = Some(table);
            debug!(
                target: ENDPOINT_TARGET,
                endpoints = state.registrations.len() + 1,
                "endpoint list promoted to filter table"
            );
        } else if let Some(table) = state.table.as_mut() {
            table.add_with_priority(
                Arc::clone(&registration.filter),
                Arc::clone(&registration.endpoint),
                registration.priority,
            )?;
        }
        state.registrations.push(registration);
        self.publish(&state);
        Ok(())
    }

    /// Unregisters `endpoint`. A promoted table stays promoted.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EndpointNotAttached`] when the endpoint is
    /// not registered.
    pub fn remove(&self, endpoint: &Arc<EndpointDispatcher>) -> Result<(), DispatchError> {
        let mut state = self.state()?;
        let index = state
            .registrations
            .iter()
            .position(|existing| Arc::ptr_eq(&existing.endpoint, endpoint))
            .ok_or_else(|| DispatchError::EndpointNotAttached {
                address: endpoint.address().uri().to_string(),
            })?;
        let registration = state.registrations.remove(index);
        if let Some(table) = state.table.as_mut() {
            table.remove(&registration.filter)?;
        }
        self.publish(&state);
        Ok(())
    }

    /// Number of registered endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the table lock is poisoned.
    pub fn len(&self) -> Result<usize, DispatchError> {
        Ok(self.state()?.registrations.len())
    }

    /// Returns `true` when no endpoint is registered.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the table lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, DispatchError> {
        Ok(self.state()?.registrations.is_empty())
    }

    /// Returns `true` once the endpoints live in a filter table.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the table lock is poisoned.
    pub fn is_promoted(&self) -> Result<bool, DispatchError> {
        Ok(self.state()?.table.is_some())
    }

    /// Resolves `message` to an endpoint.
    ///
    /// The highest-priority matching endpoint wins. No match is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Filter`] carrying
    /// [`FilterError::MultipleFiltersMatched`] when several endpoints match
    /// at that priority.
    pub fn lookup(&self, message: &Message) -> Result<EndpointLookup, DispatchError> {
        let published = self
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(list) = published {
            let found = scan(&list, message)?;
            if found.endpoint.is_some() {
                return Ok(found);
            }
        }
        // A miss on the published copy is retried under the lock, since the
        // table may have changed between publishing and reading.
        let state = self.state()?;
        let Some(table) = &state.table else {
            return scan(&state.registrations, message);
        };
        let endpoint = table.get_matching_value(message)?.map(Arc::clone);
        let address_matched = endpoint.is_some()
            || state
                .registrations
                .iter()
                .any(|registration| registration.address_filter.matches(message));
        Ok(EndpointLookup {
            endpoint,
            address_matched,
        })
    }
}

fn scan(
    registrations: &[Registration],
    message: &Message,
) -> Result<EndpointLookup, DispatchError> {
    let mut address_matched = false;
    let mut best_priority = None;
    let mut best: Vec<&Registration> = Vec::new();
    for registration in registrations {
        let matched = registration.filter.matches_with_address_flag(message);
        address_matched |= matched.address_matched;
        if !matched.matched {
            continue;
        }
        match best_priority {
            Some(priority) if registration.priority < priority => {}
            Some(priority) if registration.priority == priority => best.push(registration),
            _ => {
                best_priority = Some(registration.priority);
                best.clear();
                best.push(registration);
            }
        }
    }
    match best.as_slice() {
        [] => Ok(EndpointLookup {
            endpoint: None,
            address_matched,
        }),
        [only] => Ok(EndpointLookup {
            endpoint: Some(Arc::clone(&only.endpoint)),
            address_matched,
        }),
        conflicting => Err(FilterError::ambiguous(
            conflicting
                .iter()
                .map(|registration| Arc::clone(&registration.filter))
                .collect(),
        )
        .into()),
    }
}
