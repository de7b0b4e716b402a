//! Single-slot store for the active handler
//!
//! The slot sits behind a reader/writer lock: invocations clone the handler out
//! and call it without holding the lock, while Init swaps it under the write
//! lock. Concurrent Inits resolve as last-write-wins.

use parking_lot::RwLock;

use crate::resolver::{HandlerReference, ResolvedHandler};

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    slot: RwLock<Option<ResolvedHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active handler, returning the previous one
    pub fn set(&self, handler: ResolvedHandler) -> Option<ResolvedHandler> {
        self.slot.write().replace(handler)
    }

    pub fn get(&self) -> Option<ResolvedHandler> {
        self.slot.read().clone()
    }

    pub fn reference(&self) -> Option<HandlerReference> {
        self.slot.read().as_ref().map(|h| h.reference().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.slot.read().is_none()
    }

    /// Return the active handler, filling an empty slot with `init`.
    ///
    /// The second tuple element is `true` when `init` ran and its handler was
    /// stored. `init` runs at most once per empty slot even when several callers
    /// race; a failed `init` leaves the slot empty.
    ///
    /// `init` runs under the write lock on the calling thread, so a slow module
    /// loader blocks every other Init and Invoke until it returns.
    pub fn get_or_try_init<E, F>(&self, init: F) -> Result<(ResolvedHandler, bool), E>
    where
        F: FnOnce() -> Result<ResolvedHandler, E>,
    {
        if let Some(handler) = self.slot.read().as_ref() {
            return Ok((handler.clone(), false));
        }

        let mut slot = self.slot.write();
        if let Some(handler) = slot.as_ref() {
            return Ok((handler.clone(), false));
        }

        let handler = init()?;
        *slot = Some(handler.clone());
        Ok((handler, true))
    }
}
