//! Single-slot handoff between the optimizer and actuation threads
//!
//! One `Rendezvous` carries a command slot (optimizer → actuation) and a
//! state slot (actuation → optimizer) behind a single mutex. Each slot
//! holds at most one value; producers block while their slot is full,
//! consumers block while it is empty. `close` wakes every waiter and
//! makes all further operations fail, which is how either side tells the
//! other to shut down.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct Slots<C, S> {
    command: Option<C>,
    state: Option<S>,
    closed: bool,
}

/// Bounded two-way handoff with explicit producer and consumer roles
pub struct Rendezvous<C, S> {
    slots: Mutex<Slots<C, S>>,
    command_cv: Condvar,
    state_cv: Condvar,
}

impl<C, S> Default for Rendezvous<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, S> Rendezvous<C, S> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots { command: None, state: None, closed: false }),
            command_cv: Condvar::new(),
            state_cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<C, S>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place a command in the slot, blocking while the previous one is
    /// still unconsumed. Returns false if the rendezvous is closed.
    pub fn offer_command(&self, command: C) -> bool {
        let mut slots = self.lock();
        while slots.command.is_some() && !slots.closed {
            slots = self.command_cv.wait(slots).unwrap_or_else(PoisonError::into_inner);
        }
        if slots.closed {
            return false;
        }
        slots.command = Some(command);
        self.command_cv.notify_all();
        true
    }

    /// Take the pending command, blocking until one arrives.
    /// Returns None once the rendezvous is closed and the slot drained.
    pub fn take_command(&self) -> Option<C> {
        let mut slots = self.lock();
        while slots.command.is_none() && !slots.closed {
            slots = self.command_cv.wait(slots).unwrap_or_else(PoisonError::into_inner);
        }
        let command = slots.command.take();
        self.command_cv.notify_all();
        command
    }

    /// Publish one observed state, blocking while the previous one is
    /// still unconsumed. Returns false if the rendezvous is closed.
    pub fn publish_state(&self, state: S) -> bool {
        let mut slots = self.lock();
        while slots.state.is_some() && !slots.closed {
            slots = self.state_cv.wait(slots).unwrap_or_else(PoisonError::into_inner);
        }
        if slots.closed {
            return false;
        }
        slots.state = Some(state);
        self.state_cv.notify_all();
        true
    }

    /// Wait for the next published state.
    /// Returns None once the rendezvous is closed and the slot drained.
    pub fn await_state(&self) -> Option<S> {
        let mut slots = self.lock();
        while slots.state.is_none() && !slots.closed {
            slots = self.state_cv.wait(slots).unwrap_or_else(PoisonError::into_inner);
        }
        let state = slots.state.take();
        self.state_cv.notify_all();
        state
    }

    /// Shut the handoff down and wake every blocked thread
    pub fn close(&self) {
        let mut slots = self.lock();
        slots.closed = true;
        self.command_cv.notify_all();
        self.state_cv.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
