//! Service instance providers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use courier_message::Message;

use super::{InstanceContext, ServiceInstance};
use crate::errors::ServiceError;

/// Creates and disposes of service instances for instance contexts.
pub trait InstanceProvider: Send + Sync {
    /// Returns the instance `context` should hold.
    ///
    /// # Errors
    ///
    /// Any error fails the call and is converted into a fault.
    fn get_instance(
        &self,
        context: &InstanceContext,
        message: Option<&Message>,
    ) -> Result<ServiceInstance, ServiceError>;

    /// Disposes of an instance `context` no longer holds.
    fn release_instance(&self, context: &InstanceContext, instance: ServiceInstance);
}

type Factory = dyn Fn() -> Result<ServiceInstance, ServiceError> + Send + Sync;

/// Builds a fresh instance from a constructor closure on every request.
pub struct FactoryInstanceProvider {
    factory: Box<Factory>,
}

impl fmt::Debug for FactoryInstanceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryInstanceProvider").finish_non_exhaustive()
    }
}

impl FactoryInstanceProvider {
    /// Wraps an infallible constructor.
    #[must_use]
    pub fn new<S, F>(factory: F) -> Self
    where
        S: Any + Send + Sync,
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(move || Ok(Arc::new(factory()) as ServiceInstance)),
        }
    }

    /// Wraps a constructor that may fail.
    #[must_use]
    pub fn fallible<F>(factory: F) -> Self
    where
        F: Fn() -> Result<ServiceInstance, ServiceError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
        }
    }
}

impl InstanceProvider for FactoryInstanceProvider {
    fn get_instance(
        &self,
        _context: &InstanceContext,
        _message: Option<&Message>,
    ) -> Result<ServiceInstance, ServiceError> {
        (self.factory)()
    }

    fn release_instance(&self, _context: &InstanceContext, instance: ServiceInstance) {
        drop(instance);
    }
}

/// Hands out one shared instance to every context.
#[derive(Clone)]
pub struct SingletonInstanceProvider {
    instance: ServiceInstance,
}

impl fmt::Debug for SingletonInstanceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonInstanceProvider")
            .finish_non_exhaustive()
    }
}

impl SingletonInstanceProvider {
    /// Shares `instance` with every caller.
    #[must_use]
    pub fn new<S: Any + Send + Sync>(instance: S) -> Self {
        Self {
            instance: Arc::new(instance),
        }
    }

    /// Shares an instance that is already reference-counted.
    #[must_use]
    pub const fn from_shared(instance: ServiceInstance) -> Self {
        Self { instance }
    }
}

impl InstanceProvider for SingletonInstanceProvider {
    fn get_instance(
        &self,
        _context: &InstanceContext,
        _message: Option<&Message>,
    ) -> Result<ServiceInstance, ServiceError> {
        Ok(Arc::clone(&self.instance))
    }

    fn release_instance(&self, _context: &InstanceContext, _instance: ServiceInstance) {}
}
