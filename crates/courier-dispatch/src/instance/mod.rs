//! Instance contexts, instance providers and their bookkeeping.
//!
//! An [`InstanceContextProvider`] decides which [`InstanceContext`] serves a
//! call; the context asks its [`InstanceProvider`] for the service object
//! and [`InstanceContextManager`] keeps track of contexts that are alive.

mod context;
mod context_provider;
mod manager;
mod provider;

use std::any::Any;
use std::sync::Arc;

pub use self::context::InstanceContext;
pub use self::context_provider::{CustomInstanceContextProvider, InstanceContextProvider};
pub use self::manager::InstanceContextManager;
pub use self::provider::{FactoryInstanceProvider, InstanceProvider, SingletonInstanceProvider};

pub(crate) const INSTANCE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::instance");

/// Type-erased service object.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;
