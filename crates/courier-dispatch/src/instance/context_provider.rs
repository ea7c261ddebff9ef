//! Mapping of inbound calls onto instance contexts.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use courier_config::InstanceContextMode;
use courier_message::Message;
use once_cell::sync::OnceCell;
use tracing::debug;

use super::{INSTANCE_TARGET, InstanceContext, InstanceContextManager, InstanceProvider};
use crate::channel::ChannelContext;
use crate::errors::DispatchError;

/// User-defined policy for locating instance contexts.
pub trait CustomInstanceContextProvider: Send + Sync {
    /// Returns a context the call should join, or `None` to create one.
    fn get_existing_instance_context(
        &self,
        message: &Message,
        channel: &ChannelContext,
    ) -> Option<Arc<InstanceContext>>;

    /// Prepares a context created for this call.
    fn initialize_instance_context(
        &self,
        context: &Arc<InstanceContext>,
        message: &Message,
        channel: &ChannelContext,
    );

    /// Returns `true` when a context may be closed after a call completes.
    fn is_idle(&self, _context: &InstanceContext) -> bool {
        true
    }
}

/// Policy that decides which instance context serves a call.
pub enum InstanceContextProvider {
    /// A fresh context per call.
    PerCall,
    /// One context per channel session. Sessionless calls get a fresh
    /// context each time.
    PerSession(Mutex<HashMap<String, Arc<InstanceContext>>>),
    /// One context shared by every call.
    Single(OnceCell<Arc<InstanceContext>>),
    /// Delegates to a user-supplied provider.
    Custom(Arc<dyn CustomInstanceContextProvider>),
}

impl fmt::Debug for InstanceContextProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PerCall => "PerCall",
            Self::PerSession(_) => "PerSession",
            Self::Single(_) => "Single",
            Self::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

impl InstanceContextProvider {
    /// Builds the provider for a configured mode.
    #[must_use]
    pub fn from_mode(mode: InstanceContextMode) -> Self {
        match mode {
            InstanceContextMode::PerCall => Self::PerCall,
            InstanceContextMode::PerSession => Self::PerSession(Mutex::new(HashMap::new())),
            InstanceContextMode::Single => Self::Single(OnceCell::new()),
        }
    }

    /// Wraps a user-supplied provider.
    #[must_use]
    pub fn custom(provider: Arc<dyn CustomInstanceContextProvider>) -> Self {
        Self::Custom(provider)
    }

    /// Finds or creates the context that serves `message`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when a mutex is poisoned.
    pub fn acquire(
        &self,
        message: &Message,
        channel: &ChannelContext,
        instance_provider: &Arc<dyn InstanceProvider>,
        manager: &InstanceContextManager,
    ) -> Result<Arc<InstanceContext>, DispatchError> {
        let register = |context: InstanceContext| -> Result<Arc<InstanceContext>, DispatchError> {
            let context = Arc::new(context);
            manager.add(&context)?;
            debug!(
                target: INSTANCE_TARGET,
                context = context.id(),
                session = context.session_id(),
                "instance context created"
            );
            Ok(context)
        };
        match self {
            Self::PerCall => register(InstanceContext::transient(Arc::clone(instance_provider))),
            Self::PerSession(sessions) => {
                let Some(session_id) = channel.session_id() else {
                    return register(InstanceContext::transient(Arc::clone(instance_provider)));
                };
                let mut sessions = sessions
                    .lock()
                    .map_err(|_| DispatchError::poisoned("session contexts"))?;
                if let Some(existing) = sessions.get(session_id) {
                    return Ok(Arc::clone(existing));
                }
                let context = register(InstanceContext::new(
                    Some(session_id.to_owned()),
                    Arc::clone(instance_provider),
                ))?;
                sessions.insert(session_id.to_owned(), Arc::clone(&context));
                Ok(context)
            }
            Self::Single(shared) => shared
                .get_or_try_init(|| {
                    register(InstanceContext::new(None, Arc::clone(instance_provider)))
                })
                .map(Arc::clone),
            Self::Custom(provider) => {
                if let Some(existing) = provider.get_existing_instance_context(message, channel) {
                    return Ok(existing);
                }
                let context = register(InstanceContext::new(
                    channel.session_id().map(str::to_owned),
                    Arc::clone(instance_provider),
                ))?;
                provider.initialize_instance_context(&context, message, channel);
                Ok(context)
            }
        }
    }

    /// Runs after a call finishes with `context`, closing it when the
    /// policy says it is done.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when a mutex is poisoned.
    pub fn complete(
        &self,
        context: &Arc<InstanceContext>,
        manager: &InstanceContextManager,
    ) -> Result<(), DispatchError> {
        let done = context.is_transient()
            || matches!(self, Self::Custom(provider) if provider.is_idle(context));
        if done {
            manager.remove(context)?;
            context.close()?;
            debug!(target: INSTANCE_TARGET, context = context.id(), "instance context closed");
        }
        Ok(())
    }

    /// Closes the context of a finished session. Returns `false` when the
    /// session had none.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when a mutex is poisoned.
    pub fn end_session(
        &self,
        session_id: &str,
        manager: &InstanceContextManager,
    ) -> Result<bool, DispatchError> {
        let Self::PerSession(sessions) = self else {
            return Ok(false);
        };
        let removed = sessions
            .lock()
            .map_err(|_| DispatchError::poisoned("session contexts"))?
            .remove(session_id);
        let Some(context) = removed else {
            return Ok(false);
        };
        manager.remove(&context)?;
        context.close()?;
        debug!(
            target: INSTANCE_TARGET,
            context = context.id(),
            session = session_id,
            "session ended"
        );
        Ok(true)
    }
}
