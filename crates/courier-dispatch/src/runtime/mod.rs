//! Per-endpoint dispatch configuration and the call pipeline.
//!
//! A [`DispatchRuntime`] is the mutable description of how an endpoint
//! serves calls: its operations, concurrency and instancing policy,
//! security managers and error handlers. Calls never read it directly.
//! The first call after a change builds an [`ImmutableDispatchRuntime`]
//! snapshot, which every later call shares until the next change.

mod formatter;
mod immutable;
mod operation;
mod rpc;
mod selector;
mod unhandled;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use courier_config::{ConcurrencyMode, Config, InstanceContextMode};
use courier_message::MessageVersion;
use tracing::debug;

use crate::concurrency::ConcurrencyBehavior;
use crate::errors::DispatchError;
use crate::fault::{ErrorBehavior, ErrorHandler, FaultConverter};
use crate::instance::{
    InstanceContextManager, InstanceContextProvider, InstanceProvider, SingletonInstanceProvider,
};
use crate::security::{SecurityDefaults, ServiceAuthenticationManager, ServiceAuthorizationManager};

pub use self::formatter::{JsonObjectFormatter, MessageFormatter};
pub use self::immutable::ImmutableDispatchRuntime;
pub use self::operation::{
    DispatchOperation, FaultContract, ImpersonationOption, ReleaseInstanceMode,
};
pub use self::selector::{ActionOperationSelector, OperationSelector, WILDCARD_ACTION};
pub use self::unhandled::{ActionNotSupportedInvoker, UNHANDLED_OPERATION};

pub(crate) use self::rpc::correlate;

pub(crate) const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

struct RuntimeState {
    concurrency_mode: ConcurrencyMode,
    lock_timeout: Option<Duration>,
    instance_context_provider: Arc<InstanceContextProvider>,
    instance_provider: Arc<dyn InstanceProvider>,
    authentication: Arc<dyn ServiceAuthenticationManager>,
    authorization: Arc<dyn ServiceAuthorizationManager>,
    operations: Vec<Arc<DispatchOperation>>,
    unhandled_operation: Arc<DispatchOperation>,
    selector: Option<Arc<dyn OperationSelector>>,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
    fault_converter: Option<Arc<dyn FaultConverter>>,
    include_exception_detail: bool,
    message_version: MessageVersion,
}

impl RuntimeState {
    fn position(&self, name: &str) -> Option<usize> {
        self.operations
            .iter()
            .position(|operation| operation.name() == name)
    }
}

/// Mutable dispatch configuration of one endpoint.
///
/// Every setter invalidates the cached snapshot, so a change takes effect
/// from the next call on. Calls already in flight finish with the snapshot
/// they started with.
pub struct DispatchRuntime {
    state: Mutex<RuntimeState>,
    snapshot: RwLock<Option<Arc<ImmutableDispatchRuntime>>>,
    instance_contexts: Arc<InstanceContextManager>,
}

impl fmt::Debug for DispatchRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("DispatchRuntime")
            .field("concurrency_mode", &state.concurrency_mode)
            .field("instance_context_provider", &state.instance_context_provider)
            .field("operations", &state.operations.len())
            .finish_non_exhaustive()
    }
}

impl DispatchRuntime {
    /// Creates a runtime with single-threaded, per-session defaults and
    /// the given security managers.
    ///
    /// Until an instance provider is set, calls are served by an instance
    /// of `()`.
    #[must_use]
    pub fn new(security: &SecurityDefaults) -> Self {
        Self::with_state(RuntimeState {
            concurrency_mode: ConcurrencyMode::default(),
            lock_timeout: None,
            instance_context_provider: Arc::new(InstanceContextProvider::from_mode(
                InstanceContextMode::default(),
            )),
            instance_provider: Arc::new(SingletonInstanceProvider::new(())),
            authentication: security.authentication(),
            authorization: security.authorization(),
            operations: Vec::new(),
            unhandled_operation: Arc::new(unhandled::unhandled_operation()),
            selector: None,
            error_handlers: Vec::new(),
            fault_converter: None,
            include_exception_detail: false,
            message_version: MessageVersion::default(),
        })
    }

    /// Creates a runtime whose policy comes from `config`.
    #[must_use]
    pub fn from_config(config: &Config, security: &SecurityDefaults) -> Self {
        let runtime = Self::new(security);
        {
            let mut state = runtime.state();
            state.concurrency_mode = config.concurrency_mode;
            state.lock_timeout = config.instance_lock_timeout();
            state.instance_context_provider =
                Arc::new(InstanceContextProvider::from_mode(config.instance_context_mode));
            state.include_exception_detail = config.include_exception_detail_in_faults;
        }
        runtime
    }

    fn with_state(state: RuntimeState) -> Self {
        Self {
            state: Mutex::new(state),
            snapshot: RwLock::new(None),
            instance_contexts: Arc::new(InstanceContextManager::new()),
        }
    }

    // Setters leave the state consistent at every step, so a poisoned lock
    // is recovered rather than reported.
    fn state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, change: impl FnOnce(&mut RuntimeState) -> R) -> R {
        let mut state = self.state();
        let result = change(&mut state);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = None;
        result
    }

    /// Sets the concurrency mode.
    pub fn set_concurrency_mode(&self, mode: ConcurrencyMode) {
        self.update(|state| state.concurrency_mode = mode);
    }

    /// Bounds the wait for the instance lock. `None` waits indefinitely.
    pub fn set_instance_lock_timeout(&self, timeout: Option<Duration>) {
        self.update(|state| state.lock_timeout = timeout);
    }

    /// Replaces the instance context policy.
    ///
    /// Contexts created under the previous policy stay tracked until they
    /// close.
    pub fn set_instance_context_provider(&self, provider: InstanceContextProvider) {
        self.update(|state| state.instance_context_provider = Arc::new(provider));
    }

    /// Replaces the source of service instances.
    pub fn set_instance_provider(&self, provider: Arc<dyn InstanceProvider>) {
        self.update(|state| state.instance_provider = provider);
    }

    /// Replaces the authentication manager.
    pub fn set_authentication_manager(&self, manager: Arc<dyn ServiceAuthenticationManager>) {
        self.update(|state| state.authentication = manager);
    }

    /// Replaces the authorization manager.
    pub fn set_authorization_manager(&self, manager: Arc<dyn ServiceAuthorizationManager>) {
        self.update(|state| state.authorization = manager);
    }

    /// Replaces the operation selector. `None` restores selection by action.
    pub fn set_operation_selector(&self, selector: Option<Arc<dyn OperationSelector>>) {
        self.update(|state| state.selector = selector);
    }

    /// Replaces the operation that serves unrecognised messages.
    pub fn set_unhandled_operation(&self, operation: DispatchOperation) {
        self.update(|state| state.unhandled_operation = Arc::new(operation));
    }

    /// Appends an error handler.
    pub fn add_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        self.update(|state| state.error_handlers.push(handler));
    }

    /// Installs the converter consulted before typed faults and handlers.
    pub fn set_fault_converter(&self, converter: Option<Arc<dyn FaultConverter>>) {
        self.update(|state| state.fault_converter = converter);
    }

    /// Sets whether last-resort faults carry the error and its sources.
    pub fn set_include_exception_detail(&self, include: bool) {
        self.update(|state| state.include_exception_detail = include);
    }

    pub(crate) fn bind_message_version(&self, version: MessageVersion) {
        self.update(|state| state.message_version = version);
    }

    /// Registers an operation.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateOperation`] when the name is taken.
    pub fn add_operation(&self, operation: DispatchOperation) -> Result<(), DispatchError> {
        self.update(|state| {
            if state.position(operation.name()).is_some() {
                return Err(DispatchError::DuplicateOperation {
                    name: operation.name().to_owned(),
                });
            }
            debug!(
                target: RUNTIME_TARGET,
                operation = operation.name(),
                action = operation.action(),
                "operation added"
            );
            state.operations.push(Arc::new(operation));
            Ok(())
        })
    }

    /// Unregisters an operation and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownOperation`] when no operation has
    /// that name.
    pub fn remove_operation(&self, name: &str) -> Result<Arc<DispatchOperation>, DispatchError> {
        self.update(|state| {
            let index = state.position(name).ok_or_else(|| unknown_operation(name))?;
            Ok(state.operations.remove(index))
        })
    }

    /// Changes a registered operation in place.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownOperation`] when no operation has
    /// that name.
    pub fn update_operation(
        &self,
        name: &str,
        change: impl FnOnce(&mut DispatchOperation),
    ) -> Result<(), DispatchError> {
        self.update(|state| {
            let index = state.position(name).ok_or_else(|| unknown_operation(name))?;
            let slot = state
                .operations
                .get_mut(index)
                .ok_or_else(|| unknown_operation(name))?;
            change(Arc::make_mut(slot));
            Ok(())
        })
    }

    /// Registered operation by name.
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<Arc<DispatchOperation>> {
        let state = self.state();
        state
            .position(name)
            .and_then(|index| state.operations.get(index))
            .map(Arc::clone)
    }

    /// Number of registered operations.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.state().operations.len()
    }

    /// Configured concurrency mode.
    #[must_use]
    pub fn concurrency_mode(&self) -> ConcurrencyMode {
        self.state().concurrency_mode
    }

    /// Live instance contexts of this runtime.
    #[must_use]
    pub const fn instance_contexts(&self) -> &Arc<InstanceContextManager> {
        &self.instance_contexts
    }

    /// Closes the instance context of a finished session. Returns `false`
    /// when the session had none.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when a mutex is poisoned.
    pub fn end_session(&self, session_id: &str) -> Result<bool, DispatchError> {
        let provider = Arc::clone(&self.state().instance_context_provider);
        provider.end_session(session_id, &self.instance_contexts)
    }

    /// Returns `true` while a snapshot is cached.
    #[must_use]
    pub fn has_snapshot(&self) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Snapshot calls are served from, built on first use after a change.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ImmutableDispatchRuntime> {
        if let Some(cached) = self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(cached);
        }
        // Holding the state lock while building keeps a concurrent setter
        // from clearing the cache before this snapshot is published.
        let state = self.state();
        let mut cache = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref() {
            return Arc::clone(cached);
        }
        let built = Arc::new(self.build(&state));
        debug!(
            target: RUNTIME_TARGET,
            operations = state.operations.len(),
            "dispatch snapshot built"
        );
        *cache = Some(Arc::clone(&built));
        built
    }

    fn build(&self, state: &RuntimeState) -> ImmutableDispatchRuntime {
        let operations: HashMap<String, Arc<DispatchOperation>> = state
            .operations
            .iter()
            .map(|operation| (operation.name().to_owned(), Arc::clone(operation)))
            .collect();
        let selector = state.selector.clone().unwrap_or_else(|| {
            Arc::new(ActionOperationSelector::new(
                state.operations.iter().map(AsRef::as_ref),
            ))
        });
        let mut error_behavior =
            ErrorBehavior::new(state.message_version, state.include_exception_detail)
                .with_handlers(state.error_handlers.iter().cloned());
        if let Some(converter) = &state.fault_converter {
            error_behavior = error_behavior.with_converter(Arc::clone(converter));
        }
        ImmutableDispatchRuntime {
            concurrency: ConcurrencyBehavior::new(state.concurrency_mode, state.lock_timeout),
            instance_context_provider: Arc::clone(&state.instance_context_provider),
            instance_provider: Arc::clone(&state.instance_provider),
            instance_contexts: Arc::clone(&self.instance_contexts),
            authentication: Arc::clone(&state.authentication),
            authorization: Arc::clone(&state.authorization),
            operations,
            selector,
            unhandled: Arc::clone(&state.unhandled_operation),
            error_behavior,
        }
    }
}

fn unknown_operation(name: &str) -> DispatchError {
    DispatchError::UnknownOperation {
        name: name.to_owned(),
    }
}
