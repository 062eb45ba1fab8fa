//! # Stack Guard
//!
//! Overflow detection by canary inspection. The lowest word of every stack
//! holds [`STACK_CANARY`](crate::config::STACK_CANARY); if a thread grows
//! its stack past the bottom it overwrites that word, and the next guard
//! pass retires the thread. The rest of the kernel keeps running.
//!
//! This is a single watchpoint: an overflow that jumps past the guard word,
//! or corrupts the neighbouring region before reaching it, goes unnoticed.

use crate::config::MAX_THREADS;
use crate::scheduler::{Scheduler, IDLE_SLOT};

impl Scheduler {
    /// Inspect the canary of `slot` and record its stack peak.
    ///
    /// A corrupted user thread is retired on the spot: its slot becomes Free
    /// and its overflow counter goes up by one. Nothing is delivered to the
    /// thread, its own state is already untrustworthy. The idle slot can
    /// never be retired, so its overflow is only counted and the canary
    /// re-armed.
    ///
    /// # Returns
    /// `true` if an overflow was detected.
    pub fn check_stack_overflow(&mut self, slot: usize) -> bool {
        if slot >= MAX_THREADS || self.tcbs[slot].is_free() {
            return false;
        }

        let peak = self.stacks[slot].high_water_mark();
        self.stack_peaks[slot] = self.stack_peaks[slot].max(peak);

        if self.stacks[slot].canary_intact() {
            return false;
        }

        self.overflow_counts[slot] = self.overflow_counts[slot].saturating_add(1);

        if slot == IDLE_SLOT {
            log::error!("idle stack overflow, canary re-armed");
            self.stacks[slot].rearm_canary();
            return true;
        }

        log::error!(
            "stack overflow in '{}' (slot {}), thread retired",
            self.tcbs[slot].name,
            slot
        );
        self.unlink(slot);
        self.tcbs[slot].release();
        self.active_threads -= 1;
        true
    }

    /// Run the guard over every occupied slot.
    pub(crate) fn guard_pass(&mut self) {
        for slot in 0..MAX_THREADS {
            self.check_stack_overflow(slot);
        }
    }
}
