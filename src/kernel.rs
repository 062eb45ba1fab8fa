//! # Kernel
//!
//! Global kernel instance and the public API used by firmware and by the
//! port's exception handlers. Every function runs inside the global
//! critical section; none of them may be called from inside another.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()          ← Idle task in slot 0
//!         ├─► kernel::add_thread()    ← Register threads (≤ MAX_THREADS - 1)
//!         └─► kernel::launch()        ← No return on success
//!               ├─► Port::arm_tick()  ← SysTick + PendSV priority
//!               ├─► Scheduler::schedule()
//!               └─► Port::enter_first_task()
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::arch::Port;
use crate::error::KernelError;
use crate::scheduler::Scheduler;
use crate::sync::{self, HandoffSection, KernelCell};
use crate::task::{ThreadEntry, ThreadInfo};

// ---------------------------------------------------------------------------
// Global kernel instance
// ---------------------------------------------------------------------------

static KERNEL: KernelCell<Scheduler> = Mutex::new(RefCell::new(Scheduler::new()));

fn with_kernel<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    sync::critical_section(|cs| f(&mut KERNEL.borrow_ref_mut(cs)))
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Reset the kernel and register the default idle task.
///
/// Must be called before any other kernel function. Calling it again
/// frees every user slot.
pub fn init() {
    with_kernel(|k| k.init());
}

/// Like [`init`], with a custom idle body (e.g. a `wfi` loop).
pub fn init_with_idle(idle: ThreadEntry) {
    with_kernel(|k| k.init_with_idle(idle));
}

/// Register a new thread.
///
/// # Returns
/// - `Ok(slot)`: the slot index now holding the thread.
/// - `Err(_)`: no entry point, or every slot is taken. Nothing changed.
///
/// # Example
/// ```ignore
/// kernel::add_thread(Some(sensor_task), 2, "sensor")?;
/// ```
pub fn add_thread(
    entry: Option<ThreadEntry>,
    priority: u8,
    name: &'static str,
) -> Result<usize, KernelError> {
    let result = with_kernel(|k| k.add_thread(entry, priority, name));
    if let Err(err) = result {
        log::warn!("thread '{}' rejected: {}", name, err);
    }
    result
}

/// Put the calling thread to sleep for `ticks` ticks. Zero yields.
///
/// The switch itself happens in the deferred-switch handler once this
/// returns and interrupts are unmasked.
pub fn sleep<P: Port>(port: &P, ticks: u32) {
    with_kernel(|k| k.sleep(port, ticks));
}

/// Start the kernel. **Does not return on success.**
///
/// Arms the tick, picks the first thread and enters it with interrupts
/// still masked; the first-start routine unmasks them.
///
/// # Returns
/// The reason launching failed. Nothing was changed unless the error is
/// [`KernelError::FirstTaskReturned`].
pub fn launch<P: Port>(port: &P, tick_hz: u32) -> KernelError {
    // SAFETY: not nested; left below if control comes back.
    let section = unsafe { HandoffSection::enter() };

    let prepared = KERNEL.borrow_ref_mut(section.token()).launch(port, tick_hz);
    let err = match prepared {
        Ok(first_sp) => {
            // SAFETY: `first_sp` was built by the stack frame builder and
            // interrupts are masked.
            unsafe { port.enter_first_task(first_sp) };
            log::error!("first-start routine returned");
            KernelError::FirstTaskReturned
        }
        Err(err) => {
            log::warn!("launch refused: {}", err);
            err
        }
    };

    // SAFETY: the token's borrow ended with the statement above.
    unsafe { section.leave() };
    err
}

/// Timer interrupt entry: age sleepers, run the guard every
/// `GUARD_PERIOD_TICKS` ticks, request a reschedule.
pub fn tick_handler<P: Port>(port: &P) {
    with_kernel(|k| k.tick(port));
}

/// Context switch, first half: store the outgoing thread's stack pointer.
pub fn save_context(stack_pointer: *mut u32) {
    with_kernel(|k| k.save_context(stack_pointer));
}

/// Context switch, second half: schedule and return the stack pointer
/// to resume.
pub fn switch_context() -> *mut u32 {
    with_kernel(|k| k.switch_context())
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Snapshot of a registered thread.
pub fn thread_info(slot: usize) -> Option<ThreadInfo> {
    with_kernel(|k| k.thread_info(slot))
}

/// Slot of the thread currently selected to run.
pub fn current_slot() -> usize {
    with_kernel(|k| k.current_slot())
}

/// Ticks handled since launch.
pub fn ticks() -> u32 {
    with_kernel(|k| k.ticks())
}

/// Registered slots, idle included.
pub fn active_threads() -> usize {
    with_kernel(|k| k.active_threads())
}

/// Overflows the guard has recorded for `slot`. Survives the slot being
/// retired, so it stays readable after [`thread_info`] returns `None`.
pub fn overflow_count(slot: usize) -> u32 {
    with_kernel(|k| k.overflow_count(slot))
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
