//! # PriOS Example Firmware
//!
//! Three threads at different priorities, each sleeping for a different
//! period:
//!
//! | Thread | Priority | Period | Behavior |
//! |--------|----------|--------|----------|
//! | `control` | 1 | 10 ticks | Short burst, then sleeps |
//! | `telemetry` | 4 | 100 ticks | Longer burst, preempted by `control` |
//! | `housekeeping` | 9 | 500 ticks | Records the deepest stack use |
//!
//! Whenever all three sleep, the idle thread waits for the next interrupt.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicUsize, Ordering};

use cortex_m_rt::entry;
use panic_halt as _;

use prios::arch::armv7m::{idle_wfi, PORT};
use prios::config::{MAX_THREADS, STACK_WORDS, TICK_HZ};
use prios::kernel;

extern "C" fn control() -> ! {
    let mut _cycles: u32 = 0;
    loop {
        for _ in 0..500 {
            _cycles = _cycles.wrapping_add(1);
        }
        kernel::sleep(&PORT, 10);
    }
}

extern "C" fn telemetry() -> ! {
    let mut _samples: u32 = 0;
    loop {
        // Long enough to span several ticks, so `control` preempts it
        for _ in 0..50_000 {
            _samples = _samples.wrapping_add(1);
        }
        kernel::sleep(&PORT, 100);
    }
}

/// Deepest stack use of any thread, in words. Read it with a debugger.
#[no_mangle]
static STACK_PEAK_WORDS: AtomicUsize = AtomicUsize::new(0);

extern "C" fn housekeeping() -> ! {
    loop {
        for slot in 0..MAX_THREADS {
            if let Some(info) = kernel::thread_info(slot) {
                STACK_PEAK_WORDS.fetch_max(info.stack_peak_words, Ordering::Relaxed);
                log::info!(
                    "'{}': peak {}/{} words, {} overflows",
                    info.name,
                    info.stack_peak_words,
                    STACK_WORDS,
                    info.overflow_count
                );
            }
        }
        kernel::sleep(&PORT, 500);
    }
}

#[entry]
fn main() -> ! {
    kernel::init_with_idle(idle_wfi);

    let threads: [(prios::ThreadEntry, u8, &'static str); 3] = [
        (control, 1, "control"),
        (telemetry, 4, "telemetry"),
        (housekeeping, 9, "housekeeping"),
    ];
    for (entry, priority, name) in threads {
        if kernel::add_thread(Some(entry), priority, name).is_err() {
            break;
        }
    }

    // Only returns if the hand-off failed
    let _err = kernel::launch(&PORT, TICK_HZ);
    loop {
        cortex_m::asm::bkpt();
    }
}
