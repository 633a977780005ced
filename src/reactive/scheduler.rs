//! Frame-boundary debounce: the engine's only concurrency primitive.
//!
//! A [`FrameScheduler`] holds at most one pending invocation. Scheduling
//! repeatedly before the frame boundary collapses to a single slot keeping
//! only the **latest** arguments — earlier arguments are discarded, never
//! merged or queued. Taking the slot at the frame boundary clears the flag,
//! and the next schedule arms a new frame. Single-threaded, cooperative:
//! the frame boundary is wherever the owner calls [`FrameScheduler::take`]
//! (for a session, its `tick`).

use std::cell::RefCell;
use std::rc::Rc;

/// Single-slot, latest-wins scheduler. Clones share the slot, so a clone
/// can live inside a change callback while the owner drains at the frame
/// boundary.
pub struct FrameScheduler<T> {
    pending: Rc<RefCell<Option<T>>>,
}

// Manual impl so we don't require T: Clone for the scheduler itself.
impl<T> Clone for FrameScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Rc::clone(&self.pending),
        }
    }
}

impl<T> Default for FrameScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameScheduler<T> {
    /// Create a scheduler with nothing pending.
    pub fn new() -> Self {
        Self {
            pending: Rc::new(RefCell::new(None)),
        }
    }

    /// Schedule an invocation with these arguments. If one is already
    /// pending, its arguments are replaced — latest wins.
    pub fn schedule(&self, args: T) {
        *self.pending.borrow_mut() = Some(args);
    }

    /// Whether an invocation is pending.
    pub fn is_scheduled(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// The frame boundary: clear the flag and yield the pending arguments,
    /// if any.
    pub fn take(&self) -> Option<T> {
        self.pending.borrow_mut().take()
    }
}

impl<T> std::fmt::Debug for FrameScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}
