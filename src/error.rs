//! Kernel error type.

use core::fmt;

/// Reasons a kernel operation can be refused.
///
/// Every variant leaves the kernel state exactly as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// `add_thread` was given no entry point.
    NoEntryPoint,
    /// Every user slot is occupied.
    NoFreeSlot,
    /// `launch` was called before `init` registered the idle task.
    NotInitialized,
    /// `launch` was called a second time.
    AlreadyRunning,
    /// A tick rate of zero was requested.
    InvalidTickRate,
    /// The first-start routine came back instead of entering the task.
    FirstTaskReturned,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::NoEntryPoint => "thread has no entry point",
            KernelError::NoFreeSlot => "no free thread slot",
            KernelError::NotInitialized => "kernel not initialized",
            KernelError::AlreadyRunning => "kernel already running",
            KernelError::InvalidTickRate => "tick rate must be non-zero",
            KernelError::FirstTaskReturned => "first-start routine returned",
        };
        f.write_str(msg)
    }
}
