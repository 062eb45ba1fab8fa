//! # Architecture Abstraction Layer
//!
//! The kernel touches hardware through exactly three operations, collected
//! in [`Port`]. The Cortex-M port implements them for real silicon; host
//! tests use a recording mock.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod armv7m;

#[cfg(test)]
pub mod mock;

/// Hardware seam used by the scheduler.
pub trait Port {
    /// Start the periodic tick at `tick_hz` and drop the deferred-switch
    /// exception to the lowest hardware priority.
    fn arm_tick(&self, tick_hz: u32);

    /// Pend a deferred context switch. Requests made before it is serviced
    /// collapse into one scheduling pass.
    fn request_switch(&self);

    /// Load `stack_pointer` and begin executing the frame's return address
    /// in thread mode.
    ///
    /// # Safety
    /// `stack_pointer` must come from [`crate::stack::Stack::prepare`] or a
    /// genuine context save, and interrupts must be masked on entry. Returns
    /// only if the hand-off failed.
    unsafe fn enter_first_task(&self, stack_pointer: *mut u32);
}
