// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bookkeeping for armed playback timers.

use crate::timing::{Timer, TimerHandle};

/// Every timer armed for the current playback, cancellable as one unit
#[derive(Debug, Default)]
pub struct PendingCallbackSet {
    handles: Vec<TimerHandle>,
}

impl PendingCallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly armed timer
    pub fn arm(&mut self, handle: TimerHandle) {
        self.handles.push(handle);
    }

    /// Cancel every tracked timer, then forget them all.
    ///
    /// Handles that already fired are passed to the timer too; cancelling
    /// those is a no-op.
    pub fn cancel_all(&mut self, timer: &dyn Timer) {
        for handle in self.handles.drain(..) {
            timer.cancel(handle);
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ManualScheduler;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn test_cancel_all_disarms_everything() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(Cell::new(0));
        let mut pending = PendingCallbackSet::new();

        for delay in [10, 20, 30] {
            let count = Rc::clone(&fired);
            pending.arm(scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move || count.set(count.get() + 1)),
            ));
        }
        assert_eq!(pending.len(), 3);

        // One fires before the cancel
        scheduler.advance(Duration::from_millis(15));
        pending.cancel_all(&scheduler);
        assert!(pending.is_empty());

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(fired.get(), 1);
        assert_eq!(scheduler.pending(), 0);

        // Cancelling an empty set is fine
        pending.cancel_all(&scheduler);
    }
}
