//! Instance contexts: the unit calls are serialised on.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use courier_message::Message;
use tracing::trace;

use super::{INSTANCE_TARGET, InstanceProvider, ServiceInstance};
use crate::concurrency::ConcurrencyInstanceContextFacet;
use crate::errors::{DispatchError, ServiceError};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);
const NO_SLOT: usize = usize::MAX;

/// Holder of one service instance and its lock.
///
/// The instance slot is filled lazily from the context's
/// [`InstanceProvider`] and emptied again when an operation asks for the
/// instance to be released.
pub struct InstanceContext {
    id: u64,
    session_id: Option<String>,
    transient: bool,
    facet: ConcurrencyInstanceContextFacet,
    instance: Mutex<Option<ServiceInstance>>,
    provider: Arc<dyn InstanceProvider>,
    closed: AtomicBool,
    slot: AtomicUsize,
}

impl fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceContext")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("transient", &self.transient)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl InstanceContext {
    /// Creates a context that outlives individual calls.
    #[must_use]
    pub fn new(session_id: Option<String>, provider: Arc<dyn InstanceProvider>) -> Self {
        Self::build(session_id, provider, false)
    }

    /// Creates a context that is closed once its call completes.
    #[must_use]
    pub fn transient(provider: Arc<dyn InstanceProvider>) -> Self {
        Self::build(None, provider, true)
    }

    fn build(
        session_id: Option<String>,
        provider: Arc<dyn InstanceProvider>,
        transient: bool,
    ) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            session_id,
            transient,
            facet: ConcurrencyInstanceContextFacet::new(),
            instance: Mutex::new(None),
            provider,
            closed: AtomicBool::new(false),
            slot: AtomicUsize::new(NO_SLOT),
        }
    }

    /// Process-unique identifier, used in diagnostics.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Session the context belongs to, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns `true` when the context lives for a single call.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    /// Lock state and waiter queues.
    #[must_use]
    pub const fn facet(&self) -> &ConcurrencyInstanceContextFacet {
        &self.facet
    }

    /// Returns `true` once [`Self::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn instance_slot(&self) -> Result<MutexGuard<'_, Option<ServiceInstance>>, DispatchError> {
        self.instance
            .lock()
            .map_err(|_| DispatchError::poisoned("service instance"))
    }

    /// Returns `true` while a service instance is held.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the slot mutex is poisoned.
    pub fn has_instance(&self) -> Result<bool, DispatchError> {
        Ok(self.instance_slot()?.is_some())
    }

    /// Returns the held service instance, creating it on first use.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error, or returns
    /// [`ServiceError::Dispatch`] when the slot mutex is poisoned.
    pub fn get_service_instance(
        &self,
        message: Option<&Message>,
    ) -> Result<ServiceInstance, ServiceError> {
        let mut slot = self.instance_slot()?;
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }
        let instance = self.provider.get_instance(self, message)?;
        trace!(target: INSTANCE_TARGET, context = self.id, "service instance created");
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }

    /// Hands the held service instance back to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the slot mutex is poisoned.
    pub fn release_service_instance(&self) -> Result<(), DispatchError> {
        let released = self.instance_slot()?.take();
        if let Some(instance) = released {
            trace!(target: INSTANCE_TARGET, context = self.id, "service instance released");
            self.provider.release_instance(self, instance);
        }
        Ok(())
    }

    /// Closes the context and releases its instance.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the slot mutex is poisoned.
    pub fn close(&self) -> Result<(), DispatchError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.release_service_instance()
    }

    pub(crate) fn slot(&self) -> Option<usize> {
        match self.slot.load(Ordering::Acquire) {
            NO_SLOT => None,
            index => Some(index),
        }
    }

    pub(crate) fn set_slot(&self, index: Option<usize>) {
        self.slot.store(index.unwrap_or(NO_SLOT), Ordering::Release);
    }
}
