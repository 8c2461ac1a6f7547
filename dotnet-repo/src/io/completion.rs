//! Single-fulfillment completion cell.
//!
//! Several threads may race to fulfill a [`Completion`]; the first value wins
//! and every later attempt is a no-op. One waiter blocks until a value exists.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    fulfilled: bool,
}

#[derive(Debug)]
pub struct Completion<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                fulfilled: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Store `value` if nothing was stored before. Returns false (and drops
    /// `value`) when the cell was already fulfilled.
    pub fn fulfill(&self, value: T) -> bool {
        let mut slot = self.lock();
        if slot.fulfilled {
            return false;
        }
        slot.value = Some(value);
        slot.fulfilled = true;
        self.ready.notify_all();
        true
    }

    pub fn is_fulfilled(&self) -> bool {
        self.lock().fulfilled
    }

    /// Inspect the stored value without taking it.
    pub fn peek<R>(&self, inspect: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().value.as_ref().map(inspect)
    }

    /// Block until fulfilled, then take the value.
    ///
    /// Intended for a single waiter; a second `wait` after the value was taken
    /// blocks forever.
    pub fn wait(&self) -> T {
        let mut slot = self.lock();
        loop {
            if let Some(value) = slot.value.take() {
                return value;
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
