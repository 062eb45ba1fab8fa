//! # Synchronization Primitives
//!
//! Interrupt masking is the only lock in the kernel. Every guarded
//! operation runs inside one global critical section; sections are never
//! nested by the kernel, so a guarded operation must not be called from
//! inside another one.
//!
//! On Cortex-M the implementation comes from `cortex-m`'s
//! `critical-section-single-core` feature (PRIMASK); host tests use the
//! `critical-section` crate's `std` implementation.

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex, RestoreState};

/// Interrupt-safe cell holding kernel state.
pub type KernelCell<T> = Mutex<RefCell<T>>;

/// Execute a closure within a critical section (interrupts masked).
///
/// # Usage
/// ```ignore
/// sync::critical_section(|cs| {
///     // Access shared state safely
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// Critical section that outlives the closure style, for the launch
/// hand-off: interrupts are masked on `enter` and stay masked while control
/// passes to the first thread, whose entry routine unmasks them. `leave` is
/// only reached when that hand-off fails.
pub struct HandoffSection {
    restore: RestoreState,
}

impl HandoffSection {
    /// Mask interrupts.
    ///
    /// # Safety
    /// Must not be called inside another critical section, and must be
    /// paired with [`HandoffSection::leave`] if control comes back.
    pub unsafe fn enter() -> Self {
        // SAFETY: forwarded to the caller.
        let restore = unsafe { critical_section::acquire() };
        Self { restore }
    }

    /// Token proving interrupts are masked.
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: the section is held for as long as `self` lives.
        unsafe { CriticalSection::new() }
    }

    /// Restore the interrupt state saved by `enter`.
    ///
    /// # Safety
    /// No token from [`HandoffSection::token`] may still be in use.
    pub unsafe fn leave(self) {
        // SAFETY: `restore` came from the matching `acquire`.
        unsafe { critical_section::release(self.restore) };
    }
}
