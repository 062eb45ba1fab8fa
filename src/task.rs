//! # Thread Control Block
//!
//! Defines the per-thread descriptor kept in the scheduler's fixed slot
//! array. A slot is addressed by its index; slot 0 always holds the idle
//! task once the kernel is initialized.

// ---------------------------------------------------------------------------
// Thread state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a slot.
///
/// ```text
///              add_thread()
///   ┌──────┐ ───────────────► ┌────────┐   sleep(n > 0)   ┌──────────┐
///   │ Free │                  │ Active │ ───────────────► │ Sleeping │
///   └──────┘ ◄─────────────── └────────┘ ◄─────────────── └──────────┘
///       ▲     stack overflow                countdown = 0       │
///       └───────────────────────────────────────────────────────┘
///                           stack overflow
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Slot unused.
    Free,
    /// Eligible for scheduling.
    Active,
    /// Ineligible until its countdown reaches zero.
    Sleeping,
}

/// Thread entry point. Threads never return.
pub type ThreadEntry = extern "C" fn() -> !;

// ---------------------------------------------------------------------------
// Thread Control Block
// ---------------------------------------------------------------------------

/// Thread Control Block (TCB).
///
/// The stack itself lives in the scheduler's stack array at the same slot
/// index; the TCB only records where the thread's saved register frame is.
#[derive(Debug, Clone, Copy)]
pub struct ThreadControlBlock {
    /// Current lifecycle state.
    pub status: ThreadStatus,

    /// 0 is the highest priority, 255 the lowest. Not unique.
    pub priority: u8,

    /// Ticks left before an automatic wake. Only meaningful while Sleeping.
    pub sleep_ticks: u32,

    /// Saved stack pointer. Written by the frame builder and by the context
    /// switch; never touched by thread code.
    pub stack_pointer: *mut u32,

    /// Diagnostic label.
    pub name: &'static str,

    /// Ring link to the next registered slot. Maintained on registration and
    /// retirement but not consulted when choosing the next thread.
    pub next: usize,
}

// Safety: `stack_pointer` always points into the slot's own stack in the
// scheduler, and TCBs are only accessed inside critical sections.
unsafe impl Send for ThreadControlBlock {}
unsafe impl Sync for ThreadControlBlock {}

impl ThreadControlBlock {
    /// An unused slot. Used to initialize the static array.
    pub const EMPTY: Self = Self {
        status: ThreadStatus::Free,
        priority: 0,
        sleep_ticks: 0,
        stack_pointer: core::ptr::null_mut(),
        name: "",
        next: 0,
    };

    /// Claim this slot for a fresh thread. The stack frame is built
    /// separately by [`crate::stack::Stack::prepare`].
    pub fn activate(&mut self, priority: u8, name: &'static str, next: usize) {
        self.status = ThreadStatus::Active;
        self.priority = priority;
        self.sleep_ticks = 0;
        self.name = name;
        self.next = next;
    }

    /// Return the slot to the free pool.
    pub fn release(&mut self) {
        *self = Self::EMPTY;
    }

    /// Active with no pending sleep, i.e. a scheduling candidate.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.status == ThreadStatus::Active && self.sleep_ticks == 0
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.status == ThreadStatus::Free
    }

    /// Put the thread to sleep for `ticks` ticks. Zero leaves it Active,
    /// which makes the request a plain yield.
    pub fn sleep_for(&mut self, ticks: u32) {
        self.sleep_ticks = ticks;
        self.status = if ticks > 0 {
            ThreadStatus::Sleeping
        } else {
            ThreadStatus::Active
        };
    }

    /// Age the sleep countdown by one tick. Returns `true` if the thread
    /// woke up on this tick.
    pub fn age(&mut self) -> bool {
        if self.status != ThreadStatus::Sleeping || self.sleep_ticks == 0 {
            return false;
        }
        self.sleep_ticks -= 1;
        if self.sleep_ticks == 0 {
            self.status = ThreadStatus::Active;
            return true;
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Read-only snapshot of a slot, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub slot: usize,
    pub name: &'static str,
    pub status: ThreadStatus,
    pub priority: u8,
    pub sleep_ticks: u32,
    /// Times the guard found this slot's canary overwritten.
    pub overflow_count: u32,
    /// Deepest stack use seen by the guard, in words.
    pub stack_peak_words: usize,
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
