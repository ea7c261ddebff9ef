//! Message dispatch core for Courier.
//!
//! A [`ChannelDispatcher`] receives messages from a transport and resolves
//! each one to an attached [`EndpointDispatcher`] by running the endpoints'
//! address and contract filters. The endpoint's [`DispatchRuntime`] then
//! serves the call: it authenticates the sender, selects a
//! [`DispatchOperation`], authorizes the call, finds the instance context
//! and takes its lock, decodes the request, invokes the service method and
//! encodes the reply.
//!
//! Every failure along the way is turned into a fault reply by the
//! two-phase pipeline in [`ErrorBehavior`]. A reply is always produced
//! unless the operation is one-way, and failures no error handler accepts
//! ask the transport to abort the channel.
//!
//! ## Instance locking
//!
//! Calls on one [`InstanceContext`] are serialised unless the runtime uses
//! [`ConcurrencyMode::Multiple`]. Waiting calls suspend rather than block a
//! thread, and the lock is handed over in FIFO order with reentrant
//! call-outs served ahead of new inbound messages.
//!
//! ## Hosting
//!
//! [`bootstrap_with`] loads and validates a [`Config`], installs structured
//! telemetry and returns a [`Courier`] holding the channel dispatcher.
//! Lifecycle events go to a [`HealthReporter`].

mod bootstrap;
mod channel;
mod concurrency;
mod context;
mod endpoint;
mod errors;
mod fault;
mod health;
mod instance;
mod invoker;
mod runtime;
mod security;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Courier, JsonConfigLoader, StaticConfigLoader, bootstrap_with,
};
pub use channel::{ChannelContext, ChannelDispatcher, DispatchOutcome};
pub use concurrency::{
    Acquire, ConcurrencyBehavior, ConcurrencyInstanceContextFacet, InstanceLock, Waiter,
    WaiterKind, WaiterTicket,
};
pub use context::OperationContext;
pub use courier_config::{ConcurrencyMode, Config, InstanceContextMode};
pub use endpoint::{EndpointDispatcher, EndpointDispatcherTable, EndpointLookup};
pub use errors::{BoxError, DispatchError, ServiceError};
pub use fault::{
    ACCESS_DENIED_CODE, ACTION_NOT_SUPPORTED_CODE, AUTHENTICATION_FAILED_CODE,
    CONTRACT_FILTER_MISMATCH_CODE, DESTINATION_UNREACHABLE_CODE, DISPATCHER_NAMESPACE,
    ErrorBehavior, ErrorHandler, ErrorHandlerFaultInfo, ExceptionDetail, FaultConverter,
    FaultException, INTERNAL_ERROR_REASON, INTERNAL_SERVICE_FAULT_CODE, SECURITY_NAMESPACE,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use instance::{
    CustomInstanceContextProvider, FactoryInstanceProvider, InstanceContext,
    InstanceContextManager, InstanceContextProvider, InstanceProvider, ServiceInstance,
    SingletonInstanceProvider,
};
pub use invoker::{
    InvocationOutcome, MethodDelegate, MethodResult, MethodSignature, OperationInvoker, Parameter,
    ParameterDirection, SyncMethodInvoker, TaskMethodInvoker,
};
pub use runtime::{
    ActionNotSupportedInvoker, ActionOperationSelector, DispatchOperation, DispatchRuntime,
    FaultContract, ImmutableDispatchRuntime, ImpersonationOption, JsonObjectFormatter,
    MessageFormatter, OperationSelector, ReleaseInstanceMode, UNHANDLED_OPERATION,
    WILDCARD_ACTION,
};
pub use security::{
    AllowAllAuthentication, AllowAllAuthorization, AuthorizationPolicy, SecurityDefaults,
    SecurityError, ServiceAuthenticationManager, ServiceAuthorizationManager,
};
pub use telemetry::{SubscriberOwner, TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
