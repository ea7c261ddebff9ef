//! Lock state and waiter queues owned by each instance context.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::trace;

use super::CONCURRENCY_TARGET;
use crate::errors::DispatchError;

/// Queue a suspended caller waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum WaiterKind {
    /// A new inbound call.
    NewMessage,
    /// A reentrant call returning from a call-out; served first.
    CallOut,
}

/// Suspended caller waiting for an instance lock.
///
/// The lock is handed to a waiter by resuming it exactly once.
#[derive(Debug)]
pub struct Waiter {
    id: u64,
    kind: WaiterKind,
    sender: Option<oneshot::Sender<()>>,
}

/// Receiving half of a [`Waiter`], held by the suspended caller.
#[derive(Debug)]
pub struct WaiterTicket {
    id: u64,
    receiver: oneshot::Receiver<()>,
}

impl Waiter {
    /// Creates a waiter and the ticket its caller awaits.
    #[must_use]
    pub fn new(id: u64, kind: WaiterKind) -> (Self, WaiterTicket) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                id,
                kind,
                sender: Some(sender),
            },
            WaiterTicket { id, receiver },
        )
    }

    /// Identifier assigned when the waiter was queued.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Queue the waiter belongs to.
    #[must_use]
    pub const fn kind(&self) -> WaiterKind {
        self.kind
    }

    /// Hands the lock to the waiting caller.
    ///
    /// Returns `false` when the caller has stopped waiting, in which case
    /// the lock was not transferred.
    ///
    /// # Panics
    ///
    /// Panics when the waiter has already been resumed. Handing the same
    /// lock to one caller twice would let two calls run on the instance at
    /// once.
    pub fn resume(&mut self) -> bool {
        let Some(sender) = self.sender.take() else {
            panic!("instance lock waiter {} resumed twice", self.id);
        };
        sender.send(()).is_ok()
    }
}

impl WaiterTicket {
    /// Identifier of the matching waiter.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns `true` once the lock has been handed to this ticket.
    pub fn try_granted(&mut self) -> bool {
        self.receiver.try_recv().is_ok()
    }

    pub(crate) fn into_receiver(self) -> oneshot::Receiver<()> {
        self.receiver
    }
}

/// Result of asking for the lock.
#[derive(Debug)]
pub enum Acquire {
    /// The caller now holds the lock.
    Granted,
    /// The lock is held; the caller must wait on the ticket.
    Queued(WaiterTicket),
}

#[derive(Debug, Default)]
struct FacetState {
    locked: bool,
    new_messages: VecDeque<Waiter>,
    call_outs: VecDeque<Waiter>,
    next_id: u64,
}

/// Instance lock with FIFO hand-off.
///
/// One mutex guards the `locked` flag and both waiter queues. Releasing the
/// lock while anyone waits passes it straight to the next waiter, draining
/// call-out waiters before new-message waiters, so the lock is never free
/// between holders.
#[derive(Debug, Default)]
pub struct ConcurrencyInstanceContextFacet {
    state: Mutex<FacetState>,
}

impl ConcurrencyInstanceContextFacet {
    /// Creates an unlocked facet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, FacetState>, DispatchError> {
        self.state
            .lock()
            .map_err(|_| DispatchError::poisoned("instance context"))
    }

    /// Takes the lock if it is free, otherwise queues a waiter of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the facet mutex is poisoned.
    pub fn try_acquire_or_enqueue(&self, kind: WaiterKind) -> Result<Acquire, DispatchError> {
        let mut state = self.lock()?;
        if !state.locked {
            state.locked = true;
            return Ok(Acquire::Granted);
        }
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        let (waiter, ticket) = Waiter::new(id, kind);
        match kind {
            WaiterKind::NewMessage => state.new_messages.push_back(waiter),
            WaiterKind::CallOut => state.call_outs.push_back(waiter),
        }
        trace!(target: CONCURRENCY_TARGET, waiter = id, %kind, "queued for instance lock");
        Ok(Acquire::Queued(ticket))
    }

    /// Releases the lock held by the caller.
    ///
    /// Returns the id of the waiter the lock was handed to, or `None` when
    /// no live waiter remained and the lock is now free.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the facet mutex is poisoned.
    pub fn release(&self) -> Result<Option<u64>, DispatchError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        while let Some(mut waiter) = state
            .call_outs
            .pop_front()
            .or_else(|| state.new_messages.pop_front())
        {
            if waiter.resume() {
                trace!(
                    target: CONCURRENCY_TARGET,
                    waiter = waiter.id(),
                    kind = %waiter.kind(),
                    "instance lock handed off"
                );
                return Ok(Some(waiter.id()));
            }
        }
        state.locked = false;
        Ok(None)
    }

    /// Removes a waiter that gave up before being resumed.
    ///
    /// Returns `false` when the waiter is no longer queued, meaning the
    /// lock has already been handed to it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the facet mutex is poisoned.
    pub fn abandon(&self, id: u64) -> Result<bool, DispatchError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        for queue in [&mut state.call_outs, &mut state.new_messages] {
            if let Some(position) = queue.iter().position(|waiter| waiter.id() == id) {
                queue.remove(position);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns `true` while some call holds the lock.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the facet mutex is poisoned.
    pub fn is_locked(&self) -> Result<bool, DispatchError> {
        Ok(self.lock()?.locked)
    }

    /// Number of queued `(call-out, new-message)` waiters.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the facet mutex is poisoned.
    pub fn waiting(&self) -> Result<(usize, usize), DispatchError> {
        let state = self.lock()?;
        Ok((state.call_outs.len(), state.new_messages.len()))
    }
}
