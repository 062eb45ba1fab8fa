//! # Thread Stacks
//!
//! Each slot owns one fixed-size, 8-byte aligned stack. Before a thread
//! first runs, its stack is filled with a recognisable pattern, the lowest
//! word is set to the guard canary, and an exception-return frame is built
//! at the top so the first PendSV "return" starts executing the entry point.
//!
//! ## Initial Frame Layout (top = high address, growing down)
//!
//! ```text
//! [alignment padding]
//! [Hardware stacked frame]
//!   xPSR  (Thumb bit set)        offset 15
//!   PC    (entry, bit 0 clear)   offset 14
//!   LR    (EXC_RETURN: thread mode, PSP)  13
//!   R12                          offset 12
//!   R3 R2 R1 R0                  offsets 11..8
//! [Software saved context]
//!   R11 .. R4                    offsets 7..0   <- saved stack pointer
//! ...
//! [fill pattern]
//! [canary]                       word 0
//! ```

use crate::config::{STACK_ALIGN, STACK_CANARY, STACK_FILL_PATTERN, STACK_WORDS};
use crate::task::ThreadEntry;

const WORD_BYTES: usize = core::mem::size_of::<u32>();

/// xPSR value with the Thumb execution-state bit set.
pub const XPSR_THUMB: u32 = 1 << 24;

/// EXC_RETURN value selecting thread mode on the process stack.
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Value stored in the PC slot of a fresh frame. An exception return needs
/// bit 0 clear; the Thumb state lives in xPSR instead.
#[inline]
pub fn resume_address(entry: ThreadEntry) -> u32 {
    (entry as usize as u32) & !1
}

/// Word offsets of the saved registers, relative to the saved stack pointer.
pub mod frame {
    pub const R4: usize = 0;
    pub const R11: usize = 7;
    pub const R0: usize = 8;
    pub const R12: usize = 12;
    pub const LR: usize = 13;
    pub const PC: usize = 14;
    pub const XPSR: usize = 15;
    /// Words in a full saved frame (hardware + software part).
    pub const WORDS: usize = 16;
}

/// Private stack region of one slot.
#[repr(C, align(8))]
pub struct Stack {
    pub(crate) words: [u32; STACK_WORDS],
}

impl Stack {
    pub const EMPTY: Self = Self {
        words: [0; STACK_WORDS],
    };

    /// Build the initial frame for `entry` and return the saved stack
    /// pointer the context switch will resume from.
    pub fn prepare(&mut self, entry: ThreadEntry) -> *mut u32 {
        self.words.fill(STACK_FILL_PATTERN);
        self.words[0] = STACK_CANARY;

        let base = self.words.as_ptr() as usize;
        let top = (base + STACK_WORDS * WORD_BYTES) & !(STACK_ALIGN - 1);
        let mut sp = (top - base) / WORD_BYTES;

        let mut push = |value: u32| {
            sp -= 1;
            self.words[sp] = value;
        };

        // Hardware frame, consumed by the exception return
        push(XPSR_THUMB);
        push(resume_address(entry));
        push(EXC_RETURN_THREAD_PSP);
        push(0x1212_1212); // R12
        push(0x0303_0303); // R3
        push(0x0202_0202); // R2
        push(0x0101_0101); // R1
        push(0x0000_0000); // R0

        // Software frame, restored by PendSV
        push(0x1111_1111); // R11
        push(0x1010_1010); // R10
        push(0x0909_0909); // R9
        push(0x0808_0808); // R8
        push(0x0707_0707); // R7
        push(0x0606_0606); // R6
        push(0x0505_0505); // R5
        push(0x0404_0404); // R4

        self.words.as_mut_ptr().wrapping_add(sp)
    }

    /// Whether the guard word still holds the canary.
    #[inline]
    pub fn canary_intact(&self) -> bool {
        self.words[0] == STACK_CANARY
    }

    /// Restore the guard word after an overflow was recorded.
    pub fn rearm_canary(&mut self) {
        self.words[0] = STACK_CANARY;
    }

    /// Number of words that no longer hold the fill pattern, counted from
    /// the top down to the first untouched word. The canary is excluded.
    pub fn high_water_mark(&self) -> usize {
        let untouched = self.words[1..]
            .iter()
            .take_while(|&&w| w == STACK_FILL_PATTERN)
            .count();
        STACK_WORDS - 1 - untouched
    }

    /// Word index of `sp` inside this stack, if it points into it.
    pub fn index_of(&self, sp: *const u32) -> Option<usize> {
        let base = self.words.as_ptr() as usize;
        let addr = sp as usize;
        if addr < base || (addr - base) % WORD_BYTES != 0 {
            return None;
        }
        let index = (addr - base) / WORD_BYTES;
        (index < STACK_WORDS).then_some(index)
    }

    /// The saved frame starting at `sp`, if `sp` points into this stack
    /// with a full frame above it.
    pub fn frame_at(&self, sp: *const u32) -> Option<&[u32]> {
        let index = self.index_of(sp)?;
        self.words.get(index..index + frame::WORDS)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
