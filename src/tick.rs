//! # Tick Dispatcher
//!
//! Called from the periodic timer interrupt once per tick:
//! 1. **Age sleepers**: every Sleeping slot counts down, reaching zero wakes it
//! 2. **Guard** (every `GUARD_PERIOD_TICKS` ticks): canary check of every
//!    occupied slot
//! 3. **Reschedule**: always pend a deferred switch, so a ready thread of
//!    higher priority preempts without waiting for a wake-up of its own

use crate::arch::Port;
use crate::config::GUARD_PERIOD_TICKS;
use crate::scheduler::Scheduler;

impl Scheduler {
    /// Handle one timer tick. Does nothing before launch.
    pub fn tick<P: Port>(&mut self, port: &P) {
        if !self.running {
            return;
        }
        self.ticks = self.ticks.wrapping_add(1);

        for tcb in self.tcbs.iter_mut() {
            tcb.age();
        }

        self.ticks_since_guard += 1;
        if self.ticks_since_guard >= GUARD_PERIOD_TICKS {
            self.ticks_since_guard = 0;
            self.guard_pass();
        }

        port.request_switch();
    }
}
