//! Endpoints and the table that routes messages to them.

mod table;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courier_filters::{AndFilter, EndpointAddressFilter, MessageFilter};
use courier_message::EndpointAddress;

use crate::errors::DispatchError;
use crate::runtime::DispatchRuntime;

pub use self::table::{EndpointDispatcherTable, EndpointLookup};

pub(crate) const ENDPOINT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::endpoint");

struct EndpointState {
    address_filter: Arc<MessageFilter>,
    contract_filter: Arc<MessageFilter>,
    endpoint_filter: Option<Arc<MessageFilter>>,
    filter_priority: i32,
    attached: bool,
}

/// Routing target that bundles an address, a contract and the runtime that
/// serves it.
///
/// Filters and priority may only change while the endpoint is detached.
pub struct EndpointDispatcher {
    address: EndpointAddress,
    contract_name: String,
    runtime: Arc<DispatchRuntime>,
    state: Mutex<EndpointState>,
}

impl fmt::Debug for EndpointDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDispatcher")
            .field("address", &self.address.uri().as_str())
            .field("contract_name", &self.contract_name)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl EndpointDispatcher {
    /// Creates an endpoint that matches its exact address, host included,
    /// and accepts every action.
    #[must_use]
    pub fn new(
        address: EndpointAddress,
        contract_name: impl Into<String>,
        runtime: Arc<DispatchRuntime>,
    ) -> Self {
        let address_filter =
            MessageFilter::EndpointAddress(EndpointAddressFilter::new(address.clone(), true))
                .shared();
        Self {
            address,
            contract_name: contract_name.into(),
            runtime,
            state: Mutex::new(EndpointState {
                address_filter,
                contract_filter: MessageFilter::MatchAll.shared(),
                endpoint_filter: None,
                filter_priority: 0,
                attached: false,
            }),
        }
    }

    // No operation leaves the state half-written, so poisoning is ignored.
    fn state(&self) -> MutexGuard<'_, EndpointState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn modify(&self, change: impl FnOnce(&mut EndpointState)) -> Result<(), DispatchError> {
        let mut state = self.state();
        if state.attached {
            return Err(DispatchError::endpoint_attached(self.address.uri().as_str()));
        }
        change(&mut state);
        state.endpoint_filter = None;
        Ok(())
    }

    /// Replaces the filter on the destination address.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EndpointAttached`] once attached.
    pub fn set_address_filter(&self, filter: Arc<MessageFilter>) -> Result<(), DispatchError> {
        self.modify(|state| state.address_filter = filter)
    }

    /// Replaces the filter on the contract, usually an action filter.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EndpointAttached`] once attached.
    pub fn set_contract_filter(&self, filter: Arc<MessageFilter>) -> Result<(), DispatchError> {
        self.modify(|state| state.contract_filter = filter)
    }

    /// Sets the priority the endpoint filter is registered at.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EndpointAttached`] once attached.
    pub fn set_filter_priority(&self, priority: i32) -> Result<(), DispatchError> {
        self.modify(|state| state.filter_priority = priority)
    }

    /// Endpoint address.
    #[must_use]
    pub const fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// Name of the contract served.
    #[must_use]
    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    /// Runtime that serves calls.
    #[must_use]
    pub const fn runtime(&self) -> &Arc<DispatchRuntime> {
        &self.runtime
    }

    /// Current address filter.
    #[must_use]
    pub fn address_filter(&self) -> Arc<MessageFilter> {
        Arc::clone(&self.state().address_filter)
    }

    /// Current contract filter.
    #[must_use]
    pub fn contract_filter(&self) -> Arc<MessageFilter> {
        Arc::clone(&self.state().contract_filter)
    }

    /// Current filter priority.
    #[must_use]
    pub fn filter_priority(&self) -> i32 {
        self.state().filter_priority
    }

    /// Filter a message must pass to reach this endpoint.
    ///
    /// This is the address filter alone when the contract accepts every
    /// message, otherwise the conjunction of both. The handle stays the
    /// same until a filter changes.
    #[must_use]
    pub fn endpoint_filter(&self) -> Arc<MessageFilter> {
        let mut state = self.state();
        if let Some(filter) = &state.endpoint_filter {
            return Arc::clone(filter);
        }
        let filter = if matches!(*state.contract_filter, MessageFilter::MatchAll) {
            Arc::clone(&state.address_filter)
        } else {
            MessageFilter::And(AndFilter::new(
                Arc::clone(&state.address_filter),
                Arc::clone(&state.contract_filter),
            ))
            .shared()
        };
        state.endpoint_filter = Some(Arc::clone(&filter));
        filter
    }

    /// Returns `true` while attached to a channel dispatcher.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state().attached
    }

    pub(crate) fn mark_attached(&self) -> Result<(), DispatchError> {
        let mut state = self.state();
        if state.attached {
            return Err(DispatchError::endpoint_attached(self.address.uri().as_str()));
        }
        state.attached = true;
        Ok(())
    }

    pub(crate) fn mark_detached(&self) {
        self.state().attached = false;
    }
}

#[cfg(test)]
mod tests;
