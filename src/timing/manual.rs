// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Deterministic scheduler over a virtual clock.
//!
//! Time only moves when [`ManualScheduler::advance`] or
//! [`ManualScheduler::advance_to`] is called. Timers fire in deadline order;
//! timers sharing a deadline fire in the order they were armed.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::time::Duration;

use super::{Callback, Clock, Timer, TimerHandle};

/// Queue entry; the callback itself lives in a side table so that
/// cancellation is a map removal
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Duration,
    id: u64,
}

// For BinaryHeap - we want earliest deadline first, then lowest id
impl Eq for Deadline {}

impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.id == other.id
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Queue {
    now: Duration,
    next_id: u64,
    deadlines: BinaryHeap<Deadline>,
    callbacks: HashMap<u64, Callback>,
}

impl Queue {
    /// Pop the next live timer due at or before `limit`
    fn pop_due(&mut self, limit: Duration) -> Option<Callback> {
        while let Some(next) = self.deadlines.peek().copied() {
            if next.at > limit {
                return None;
            }
            self.deadlines.pop();
            // Cancelled timers leave a stale deadline behind
            if let Some(callback) = self.callbacks.remove(&next.id) {
                self.now = self.now.max(next.at);
                return Some(callback);
            }
        }
        None
    }
}

/// Virtual-time scheduler implementing both [`Clock`] and [`Timer`]
#[derive(Default)]
pub struct ManualScheduler {
    queue: RefCell<Queue>,
}

impl ManualScheduler {
    /// Create a scheduler at virtual time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `by`, firing every timer that comes due
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.advance_to(target);
    }

    /// Move time forward to `target`, firing every timer that comes due.
    ///
    /// Callbacks run without any internal borrow held, so they may arm or
    /// cancel timers; newly armed timers due before `target` fire in the
    /// same call. Targets in the past are ignored.
    pub fn advance_to(&self, target: Duration) {
        loop {
            let due = self.queue.borrow_mut().pop_due(target);
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }

        let mut queue = self.queue.borrow_mut();
        queue.now = queue.now.max(target);
    }

    /// Number of armed, uncancelled timers
    pub fn pending(&self) -> usize {
        self.queue.borrow().callbacks.len()
    }

    /// Deadline of the earliest live timer
    pub fn next_deadline(&self) -> Option<Duration> {
        let queue = self.queue.borrow();
        queue
            .deadlines
            .iter()
            .filter(|d| queue.callbacks.contains_key(&d.id))
            .map(|d| d.at)
            .min()
    }
}

impl Clock for ManualScheduler {
    fn now(&self) -> Duration {
        self.queue.borrow().now
    }
}

impl Timer for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;

        let at = queue.now + delay;
        queue.deadlines.push(Deadline { at, id });
        queue.callbacks.insert(id, callback);
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.queue.borrow_mut().callbacks.remove(&handle.id());
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("ManualScheduler")
            .field("now", &queue.now)
            .field("pending", &queue.callbacks.len())
            .finish()
    }
}
