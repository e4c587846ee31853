// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Runtime clock and timers backed by tokio.
//!
//! Timers are spawned with `spawn_local`, so [`TokioTimer::schedule`] must be
//! called from inside a `tokio::task::LocalSet`. All callbacks then run on
//! the same thread as the rest of the application, one at a time.
//!
//! Both types read `tokio::time::Instant`, which means a runtime started
//! with paused time drives them deterministically.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

use super::{Callback, Clock, Timer, TimerHandle};

/// Monotonic clock measuring from its creation
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// One-shot timers running as local tasks
#[derive(Debug, Default)]
pub struct TokioTimer {
    /// Armed tasks by timer id; a task removes itself just before firing
    tasks: Rc<RefCell<HashMap<u64, AbortHandle>>>,
    next_id: Cell<u64>,
}

impl TokioTimer {
    /// Create a timer with nothing armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let tasks = Rc::clone(&self.tasks);
        let join = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if tasks.borrow_mut().remove(&id).is_some() {
                callback();
            }
        });

        // The task cannot have been polled yet, so this insert always
        // precedes its removal
        self.tasks.borrow_mut().insert(id, join.abort_handle());
        trace!(id, ?delay, "timer armed");
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let task = self.tasks.borrow_mut().remove(&handle.id());
        if let Some(task) = task {
            task.abort();
            trace!(id = handle.id(), "timer cancelled");
        }
    }
}
