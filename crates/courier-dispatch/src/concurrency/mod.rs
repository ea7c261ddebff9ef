//! Per-instance call serialisation.
//!
//! Under [`ConcurrencyMode::Single`] and [`ConcurrencyMode::Reentrant`] at
//! most one call runs against an instance context at a time. Callers that
//! find the lock taken suspend on a `oneshot` continuation rather than
//! parking a thread. [`ConcurrencyMode::Multiple`] never locks.

mod facet;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use courier_config::ConcurrencyMode;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::errors::DispatchError;
use crate::instance::InstanceContext;

pub use self::facet::{
    Acquire, ConcurrencyInstanceContextFacet, Waiter, WaiterKind, WaiterTicket,
};

pub(crate) const CONCURRENCY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::concurrency");

/// Locking policy applied by one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyBehavior {
    mode: ConcurrencyMode,
    lock_timeout: Option<Duration>,
}

impl ConcurrencyBehavior {
    /// Creates a policy for `mode` with an optional bound on lock waits.
    #[must_use]
    pub const fn new(mode: ConcurrencyMode, lock_timeout: Option<Duration>) -> Self {
        Self { mode, lock_timeout }
    }

    /// Concurrency mode.
    #[must_use]
    pub const fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    /// Upper bound on a lock wait, if any.
    #[must_use]
    pub const fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout
    }

    /// Acquires the instance lock for a new call.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InstanceLockTimeout`] when the configured
    /// bound elapses first, or [`DispatchError::Internal`] on a poisoned
    /// facet.
    pub async fn lock_instance(
        &self,
        context: &Arc<InstanceContext>,
    ) -> Result<Arc<InstanceLock>, DispatchError> {
        let held = if self.mode.requires_lock() {
            acquire(context.facet(), WaiterKind::NewMessage, self.lock_timeout).await?;
            true
        } else {
            false
        };
        Ok(Arc::new(InstanceLock {
            context: Arc::clone(context),
            behavior: *self,
            held: AtomicBool::new(held),
        }))
    }

    /// Blocking form of [`Self::lock_instance`] for synchronous call sites.
    ///
    /// Must not be called from within an async runtime. The lock timeout is
    /// not applied.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] on a poisoned facet or when the
    /// waiter is dropped without being resumed.
    pub fn lock_instance_blocking(
        &self,
        context: &Arc<InstanceContext>,
    ) -> Result<Arc<InstanceLock>, DispatchError> {
        let held = if self.mode.requires_lock() {
            match context.facet().try_acquire_or_enqueue(WaiterKind::NewMessage)? {
                Acquire::Granted => {}
                Acquire::Queued(ticket) => ticket
                    .into_receiver()
                    .blocking_recv()
                    .map_err(|_| DispatchError::internal("instance lock waiter was dropped"))?,
            }
            true
        } else {
            false
        };
        Ok(Arc::new(InstanceLock {
            context: Arc::clone(context),
            behavior: *self,
            held: AtomicBool::new(held),
        }))
    }
}

async fn acquire(
    facet: &ConcurrencyInstanceContextFacet,
    kind: WaiterKind,
    timeout: Option<Duration>,
) -> Result<(), DispatchError> {
    let ticket = match facet.try_acquire_or_enqueue(kind)? {
        Acquire::Granted => return Ok(()),
        Acquire::Queued(ticket) => ticket,
    };
    let mut queued = QueuedLock::new(facet, ticket);
    let Some(limit) = timeout else {
        return queued.granted().await;
    };
    match tokio::time::timeout(limit, queued.granted()).await {
        Ok(result) => result,
        Err(_) => {
            if queued.give_up()? {
                debug!(
                    target: CONCURRENCY_TARGET,
                    waiter = queued.id,
                    ?limit,
                    "instance lock wait timed out"
                );
                Err(DispatchError::InstanceLockTimeout { waited: limit })
            } else {
                // Resumed between the deadline and the abandon call; the
                // lock now belongs to this caller.
                queued.granted().await
            }
        }
    }
}

/// A queued lock request that is still owed an answer.
///
/// Dropping it before the hand-off completes leaves the queue, and a lock
/// that was already handed over is passed on to the next waiter.
struct QueuedLock<'a> {
    facet: &'a ConcurrencyInstanceContextFacet,
    id: u64,
    receiver: oneshot::Receiver<()>,
    pending: bool,
}

impl<'a> QueuedLock<'a> {
    fn new(facet: &'a ConcurrencyInstanceContextFacet, ticket: WaiterTicket) -> Self {
        Self {
            facet,
            id: ticket.id(),
            receiver: ticket.into_receiver(),
            pending: true,
        }
    }

    async fn granted(&mut self) -> Result<(), DispatchError> {
        let result = (&mut self.receiver).await;
        self.pending = false;
        result.map_err(|_| DispatchError::internal("instance lock waiter was dropped"))
    }

    /// Leaves the queue; `false` means the lock was handed over first.
    fn give_up(&mut self) -> Result<bool, DispatchError> {
        let removed = self.facet.abandon(self.id)?;
        if removed {
            self.pending = false;
        }
        Ok(removed)
    }
}

impl Drop for QueuedLock<'_> {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }
        let passed_on = match self.facet.abandon(self.id) {
            Ok(true) => return,
            Ok(false) => self.facet.release(),
            Err(error) => Err(error),
        };
        match passed_on {
            Ok(next) => debug!(
                target: CONCURRENCY_TARGET,
                waiter = self.id,
                next,
                "dropped waiter passed the instance lock on"
            ),
            Err(error) => {
                warn!(target: CONCURRENCY_TARGET, %error, "failed to pass instance lock on");
            }
        }
    }
}

/// Instance lock held by one call.
///
/// Under `Multiple` the handle exists but holds nothing. The lock is
/// released by [`InstanceLock::release`] or, failing that, on drop.
#[derive(Debug)]
pub struct InstanceLock {
    context: Arc<InstanceContext>,
    behavior: ConcurrencyBehavior,
    held: AtomicBool,
}

impl InstanceLock {
    /// Returns `true` while this call holds the instance lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Instance context the lock belongs to.
    #[must_use]
    pub const fn context(&self) -> &Arc<InstanceContext> {
        &self.context
    }

    /// Runs `call` outside the service context.
    ///
    /// Under `Reentrant` the lock is released for the duration of `call`
    /// and reacquired afterwards ahead of any new inbound call. Other modes
    /// keep whatever they hold.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the lock cannot be released or
    /// reacquired.
    pub async fn call_out<F>(&self, call: F) -> Result<F::Output, DispatchError>
    where
        F: Future,
    {
        if !(self.behavior.mode().releases_on_call_out() && self.is_held()) {
            return Ok(call.await);
        }
        self.release()?;
        let output = call.await;
        acquire(
            self.context.facet(),
            WaiterKind::CallOut,
            self.behavior.lock_timeout(),
        )
        .await?;
        self.held.store(true, Ordering::Release);
        Ok(output)
    }

    /// Releases the lock if this call holds it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] on a poisoned facet.
    pub fn release(&self) -> Result<(), DispatchError> {
        if self.held.swap(false, Ordering::AcqRel) {
            self.context.facet().release()?;
        }
        Ok(())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            warn!(target: CONCURRENCY_TARGET, %error, "failed to release instance lock");
        }
    }
}

#[cfg(test)]
mod tests;
