//! # ARMv7-M Port Layer
//!
//! Binds the kernel to a Cortex-M3/M4: SysTick drives
//! [`kernel::tick_handler`] and PendSV performs the deferred switch.
//!
//! ## Frame Contract
//!
//! A suspended thread is described by one word, the stack pointer kept in
//! its TCB. It points at a 16-word frame: R4-R11 pushed by PendSV, then
//! the eight words the core stacks on exception entry. Threads that never
//! ran get the same frame from [`Stack::prepare`](crate::stack::Stack::prepare),
//! so PendSV does not distinguish first runs from resumptions.
//!
//! PendSV itself only moves registers. It hands the outgoing pointer to
//! [`kernel::save_context`] and resumes whatever [`kernel::switch_context`]
//! returns; both take the kernel lock, so a tick cannot land between them
//! with the scheduler half updated.
//!
//! Both handlers sit at the lowest priority (0xFF). PendSV therefore runs
//! only once every other handler has finished.

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SCB;

use super::Port;
use crate::config::SYSTEM_CLOCK_HZ;
use crate::kernel;

/// SysTick reload is a 24-bit field.
const SYST_RELOAD_MAX: u32 = 0x00FF_FFFF;

/// Port instance used by the exception handlers.
pub static PORT: CortexM = CortexM::new(SYSTEM_CLOCK_HZ);

/// Cortex-M implementation of the hardware seam.
pub struct CortexM {
    core_clock_hz: u32,
}

impl CortexM {
    pub const fn new(core_clock_hz: u32) -> Self {
        Self { core_clock_hz }
    }
}

impl Port for CortexM {
    fn arm_tick(&self, tick_hz: u32) {
        // SAFETY: the kernel is the only owner of SYST and the system
        // handler priorities, and launch runs with interrupts masked.
        let mut cp = unsafe { cortex_m::Peripherals::steal() };

        let reload = (self.core_clock_hz / tick_hz).saturating_sub(1).min(SYST_RELOAD_MAX);
        cp.SYST.set_reload(reload);
        cp.SYST.clear_current();
        cp.SYST.set_clock_source(SystClkSource::Core);
        cp.SYST.enable_counter();
        cp.SYST.enable_interrupt();

        // SAFETY: lowering handler priorities cannot break a priority-based
        // critical section; the kernel masks interrupts globally.
        unsafe {
            cp.SCB.set_priority(SystemHandler::PendSV, 0xFF);
            cp.SCB.set_priority(SystemHandler::SysTick, 0xFF);
        }
    }

    #[inline]
    fn request_switch(&self) {
        SCB::set_pendsv();
    }

    unsafe fn enter_first_task(&self, stack_pointer: *mut u32) {
        // SAFETY: caller guarantees a builder-produced frame at `stack_pointer`.
        unsafe {
            asm!(
                // Leave the software half behind, the first run starts with
                // whatever R4-R11 hold
                "adds r0, #32",
                "msr psp, r0",
                "movs r1, #2",
                "msr control, r1",
                "isb",

                // There is no exception to return from yet, so the
                // hardware half is unstacked with plain pops
                "pop {{r0-r3, r12}}",
                "add sp, #4",          // EXC_RETURN slot
                "pop {{r5, r6}}",
                // The frame keeps bit 0 clear, `bx` needs it set
                "orr r5, r5, #1",
                "cpsie i",
                "bx r5",

                in("r0") stack_pointer,
                options(noreturn)
            );
        }
    }
}

/// Idle body for targets that should sleep between interrupts.
/// Pass to [`kernel::init_with_idle`].
pub extern "C" fn idle_wfi() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// Deferred switch. Runs on MSP with the outgoing thread's hardware frame
/// already on its PSP.
///
/// # Safety
/// Naked function invoked by the NVIC only.
#[unsafe(naked)]
#[no_mangle]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        // Complete the outgoing frame and hand it to the kernel
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {save}",
        // r0 = frame of the thread to resume
        "bl {switch}",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        // Return to thread mode on PSP; LR was lost to the calls
        "ldr r0, =0xFFFFFFFD",
        "bx r0",
        save = sym save_context,
        switch = sym switch_context,
    );
}

extern "C" fn save_context(psp: *mut u32) {
    kernel::save_context(psp);
}

extern "C" fn switch_context() -> *mut u32 {
    kernel::switch_context()
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// One kernel tick per SysTick period.
#[no_mangle]
pub extern "C" fn SysTick() {
    kernel::tick_handler(&PORT);
}
