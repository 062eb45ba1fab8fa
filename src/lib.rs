//! # PriOS: fixed-capacity priority kernel
//!
//! A preemptive, priority-based multitasking kernel for single-core
//! Cortex-M microcontrollers (developed on an STM32F103). Threads are
//! registered at startup into a fixed slot array, each with its own stack,
//! and are switched either voluntarily (`sleep`) or by the periodic tick
//! when a higher-priority thread becomes ready.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Threads                  │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │      init() · add_thread() · sleep() · launch()        │
//! ├──────────────┬──────────────┬──────────────┬───────────┤
//! │  Scheduler   │ Tick         │ Stack Guard  │ Sync      │
//! │ scheduler.rs │ tick.rs      │ guard.rs     │ sync.rs   │
//! │ ─ schedule() │ ─ tick()     │ ─ canary     │ ─ critical│
//! │ ─ launch()   │ ─ wake-ups   │ ─ retire     │   section │
//! ├──────────────┴──────────────┴──────────────┴───────────┤
//! │       Thread Model (task.rs) · Stacks (stack.rs)        │
//! ├────────────────────────────────────────────────────────┤
//! │   Hardware seam (arch::Port) · ARMv7-M port (armv7m)   │
//! │        SysTick · PendSV · first-thread entry           │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **Fixed slot arena**: `MAX_THREADS` TCBs and stacks addressed by index
//! - **Slot 0**: the idle task, always present, never retired
//! - **Critical sections**: the `critical-section` crate over PRIMASK

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod task;
pub mod stack;
pub mod scheduler;
pub mod tick;
pub mod guard;
pub mod arch;
pub mod kernel;
pub mod sync;

pub use error::KernelError;
pub use scheduler::Scheduler;
pub use task::{ThreadEntry, ThreadInfo, ThreadStatus};
