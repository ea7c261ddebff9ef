//! Registry of live instance contexts.

use std::sync::{Arc, Mutex, MutexGuard};

use super::InstanceContext;
use crate::errors::DispatchError;

#[derive(Debug, Default)]
struct Slot {
    context: Option<Arc<InstanceContext>>,
    next_free: Option<usize>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    first_free: Option<usize>,
    live: usize,
}

/// Arena of live instance contexts.
///
/// Vacated slots form a free list threaded through the slots themselves,
/// so registration reuses indices instead of growing the arena.
#[derive(Debug, Default)]
pub struct InstanceContextManager {
    arena: Mutex<Arena>,
}

impl InstanceContextManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Arena>, DispatchError> {
        self.arena
            .lock()
            .map_err(|_| DispatchError::poisoned("instance context manager"))
    }

    /// Registers a context and returns the slot it occupies.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the arena mutex is poisoned.
    pub fn add(&self, context: &Arc<InstanceContext>) -> Result<usize, DispatchError> {
        let mut arena = self.lock()?;
        let first_free = arena.first_free;
        let reused = first_free.and_then(|index| {
            let slot = arena.slots.get_mut(index)?;
            slot.context = Some(Arc::clone(context));
            Some((index, slot.next_free.take()))
        });
        if let Some((index, next_free)) = reused {
            arena.first_free = next_free;
            return Ok(Self::occupy(&mut arena, context, index));
        }
        arena.slots.push(Slot {
            context: Some(Arc::clone(context)),
            next_free: None,
        });
        let index = arena.slots.len() - 1;
        Ok(Self::occupy(&mut arena, context, index))
    }

    fn occupy(arena: &mut Arena, context: &InstanceContext, index: usize) -> usize {
        arena.live += 1;
        context.set_slot(Some(index));
        index
    }

    /// Unregisters a context. Returns `false` when it was not registered.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the arena mutex is poisoned.
    pub fn remove(&self, context: &InstanceContext) -> Result<bool, DispatchError> {
        let Some(index) = context.slot() else {
            return Ok(false);
        };
        let mut arena = self.lock()?;
        let first_free = arena.first_free;
        let Some(slot) = arena.slots.get_mut(index) else {
            return Ok(false);
        };
        let occupied = slot
            .context
            .as_ref()
            .is_some_and(|held| std::ptr::eq(Arc::as_ptr(held), context));
        if !occupied {
            return Ok(false);
        }
        slot.context = None;
        slot.next_free = first_free;
        arena.first_free = Some(index);
        arena.live -= 1;
        context.set_slot(None);
        Ok(true)
    }

    /// Number of registered contexts.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the arena mutex is poisoned.
    pub fn len(&self) -> Result<usize, DispatchError> {
        Ok(self.lock()?.live)
    }

    /// Returns `true` when no context is registered.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the arena mutex is poisoned.
    pub fn is_empty(&self) -> Result<bool, DispatchError> {
        Ok(self.len()? == 0)
    }

    /// Every registered context.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when the arena mutex is poisoned.
    pub fn contexts(&self) -> Result<Vec<Arc<InstanceContext>>, DispatchError> {
        Ok(self
            .lock()?
            .slots
            .iter()
            .filter_map(|slot| slot.context.clone())
            .collect())
    }

    /// Closes and unregisters every context, returning how many there were.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Internal`] when a mutex is poisoned.
    pub fn close_all(&self) -> Result<usize, DispatchError> {
        let contexts = self.contexts()?;
        for context in &contexts {
            self.remove(context)?;
            context.close()?;
        }
        Ok(contexts.len())
    }
}
