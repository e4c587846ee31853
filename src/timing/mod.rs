// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Time sources and one-shot timers.
//!
//! The loop engine only needs two things from its environment: a monotonic
//! "now" and a way to run a callback after a delay. Both are traits so the
//! engine can run against the tokio runtime or against a deterministic
//! scheduler that is advanced by hand.
//!
//! - [`TokioClock`] / [`TokioTimer`] drive the real application
//! - [`ManualScheduler`] implements both traits over a virtual clock

pub mod clock;
pub mod manual;

pub use clock::{TokioClock, TokioTimer};
pub use manual::ManualScheduler;

use std::time::Duration;

/// Work to run when a timer expires
pub type Callback = Box<dyn FnOnce()>;

/// Opaque handle to an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub(crate) fn id(self) -> u64 {
        self.0
    }
}

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;
}

/// One-shot delayed callbacks.
///
/// Implementations must never invoke the callback from inside `schedule`,
/// and once `cancel` returns the callback must not run.
pub trait Timer {
    /// Arm a callback to run after `delay`
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerHandle;

    /// Disarm a callback. Cancelling a fired or already-cancelled handle
    /// does nothing.
    fn cancel(&self, handle: TimerHandle);
}
