//! # PriOS Configuration
//!
//! Compile-time constants governing the kernel. All limits are fixed at
//! compile time: no dynamic allocation.

/// Number of thread slots, idle task included. Slot 0 is reserved for the
/// idle task, so at most `MAX_THREADS - 1` user threads can exist.
pub const MAX_THREADS: usize = 8;

/// Per-thread stack size in 32-bit words. Must leave room for the deepest
/// call chain plus the hardware exception frame (8 words) and the
/// software-saved context (8 words for R4–R11).
pub const STACK_WORDS: usize = 256;

/// Required alignment of the initial stack top in bytes (AAPCS).
pub const STACK_ALIGN: usize = 8;

/// Priority of the idle task. Lowest possible.
pub const IDLE_PRIORITY: u8 = 255;

/// The stack guard runs once every this many ticks. Trades detection
/// latency against tick-handler overhead.
pub const GUARD_PERIOD_TICKS: u32 = 100;

/// Guard word stored in the lowest-addressed word of every stack.
pub const STACK_CANARY: u32 = 0xDEAD_BEEF;

/// Pattern the rest of every stack is filled with before first use.
pub const STACK_FILL_PATTERN: u32 = 0xA5A5_A5A5;

/// Default SysTick frequency in Hz used by the demo firmware.
pub const TICK_HZ: u32 = 1000;

/// Core clock in Hz (STM32F103 running from the PLL at 72 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 72_000_000;
