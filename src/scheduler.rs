//! # Scheduler
//!
//! The kernel state object: the fixed slot arena (TCBs and their stacks),
//! the currently running slot, the run flag and the bookkeeping the tick
//! dispatcher and stack guard need. A single instance lives behind the
//! global critical-section mutex in `kernel.rs`; tests build their own.
//!
//! ## Scheduling Algorithm
//!
//! Every slot is scanned. A slot is a candidate when it is Active with no
//! pending sleep. The lowest priority number wins. On a tie the running
//! thread keeps the CPU; otherwise the first slot found at that priority
//! wins. With no candidate the idle slot runs.
//!
//! This is a linear scan per decision, fine for a handful of slots but it
//! does not scale. There is no rotation between ready peers of equal
//! priority: the one that got the CPU first keeps it until it sleeps.

use crate::arch::Port;
use crate::config::{IDLE_PRIORITY, MAX_THREADS};
use crate::error::KernelError;
use crate::stack::Stack;
use crate::task::{ThreadControlBlock, ThreadEntry, ThreadInfo, ThreadStatus};

/// Slot permanently owned by the idle task.
pub const IDLE_SLOT: usize = 0;

/// Default idle body: always ready, does nothing.
pub extern "C" fn idle_spin() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// Kernel state. Index 0 of every per-slot array belongs to the idle task.
pub struct Scheduler {
    /// Fixed-size array of TCBs.
    pub(crate) tcbs: [ThreadControlBlock; MAX_THREADS],

    /// One private stack per slot.
    pub(crate) stacks: [Stack; MAX_THREADS],

    /// Index of the running slot (`RunPt`).
    pub(crate) run_pt: usize,

    /// Set once `launch` hands control to the first thread.
    pub(crate) running: bool,

    /// Number of non-Free slots, idle included.
    pub(crate) active_threads: usize,

    /// Overflows detected per slot.
    pub(crate) overflow_counts: [u32; MAX_THREADS],

    /// Deepest stack use seen per slot, in words.
    pub(crate) stack_peaks: [usize; MAX_THREADS],

    /// Ticks handled since launch.
    pub(crate) ticks: u32,

    /// Ticks since the last stack guard pass.
    pub(crate) ticks_since_guard: u32,
}

impl Scheduler {
    /// An uninitialized kernel: every slot Free, not even the idle task.
    pub const fn new() -> Self {
        Self {
            tcbs: [ThreadControlBlock::EMPTY; MAX_THREADS],
            stacks: [Stack::EMPTY; MAX_THREADS],
            run_pt: IDLE_SLOT,
            running: false,
            active_threads: 0,
            overflow_counts: [0; MAX_THREADS],
            stack_peaks: [0; MAX_THREADS],
            ticks: 0,
            ticks_since_guard: 0,
        }
    }

    /// Reset every slot and register the default idle task.
    pub fn init(&mut self) {
        self.init_with_idle(idle_spin);
    }

    /// Reset every slot and register `idle` as the idle task. Lets a target
    /// substitute a low-power wait for the busy loop.
    pub fn init_with_idle(&mut self, idle: ThreadEntry) {
        for tcb in self.tcbs.iter_mut() {
            tcb.release();
        }
        self.overflow_counts = [0; MAX_THREADS];
        self.stack_peaks = [0; MAX_THREADS];

        let idle_tcb = &mut self.tcbs[IDLE_SLOT];
        idle_tcb.activate(IDLE_PRIORITY, "Idle", IDLE_SLOT);
        idle_tcb.stack_pointer = self.stacks[IDLE_SLOT].prepare(idle);

        self.run_pt = IDLE_SLOT;
        self.active_threads = 1;
        self.running = false;
        self.ticks = 0;
        self.ticks_since_guard = 0;
    }

    /// Register a new thread.
    ///
    /// # Returns
    /// - `Ok(slot)`: the slot now holding the thread
    /// - `Err(KernelError::NoEntryPoint)`: `entry` was `None`
    /// - `Err(KernelError::NoFreeSlot)`: every user slot is taken
    pub fn add_thread(
        &mut self,
        entry: Option<ThreadEntry>,
        priority: u8,
        name: &'static str,
    ) -> Result<usize, KernelError> {
        let entry = entry.ok_or(KernelError::NoEntryPoint)?;
        let slot = (IDLE_SLOT + 1..MAX_THREADS)
            .find(|&i| self.tcbs[i].is_free())
            .ok_or(KernelError::NoFreeSlot)?;

        // Insert right after the idle task in the ring
        let next = self.tcbs[IDLE_SLOT].next;
        self.tcbs[slot].activate(priority, name, next);
        self.tcbs[slot].stack_pointer = self.stacks[slot].prepare(entry);
        self.tcbs[IDLE_SLOT].next = slot;

        self.stack_peaks[slot] = 0;
        self.active_threads += 1;

        log::debug!("thread '{}' registered in slot {} at priority {}", name, slot, priority);
        Ok(slot)
    }

    /// Take `slot` out of the ring. The idle task is never unlinked.
    pub(crate) fn unlink(&mut self, slot: usize) {
        if slot == IDLE_SLOT {
            return;
        }
        let mut prev = IDLE_SLOT;
        for _ in 0..MAX_THREADS {
            let next = self.tcbs[prev].next;
            if next == slot {
                self.tcbs[prev].next = self.tcbs[slot].next;
                return;
            }
            if next == IDLE_SLOT {
                return;
            }
            prev = next;
        }
    }

    /// Put the running thread to sleep for `ticks` ticks and request a
    /// deferred switch. Zero is a yield. Ignored before launch, from the
    /// idle task, which must stay ready, and from a thread retired by the
    /// guard that has not been switched out yet.
    pub fn sleep<P: Port>(&mut self, port: &P, ticks: u32) {
        if !self.running || self.run_pt == IDLE_SLOT || self.tcbs[self.run_pt].is_free() {
            return;
        }
        self.tcbs[self.run_pt].sleep_for(ticks);
        port.request_switch();
    }

    /// Select the next thread and make it the running slot.
    ///
    /// # Returns
    /// Index of the selected slot.
    pub fn schedule(&mut self) -> usize {
        self.run_pt = select_next(&self.tcbs, self.run_pt);
        self.run_pt
    }

    /// Record the stack pointer of the thread being switched out. A slot
    /// retired since it was switched in keeps its cleared state.
    pub fn save_context(&mut self, stack_pointer: *mut u32) {
        let tcb = &mut self.tcbs[self.run_pt];
        if !tcb.is_free() {
            tcb.stack_pointer = stack_pointer;
        }
    }

    /// Run the scheduler and return the saved stack pointer to resume.
    pub fn switch_context(&mut self) -> *mut u32 {
        let next = self.schedule();
        self.tcbs[next].stack_pointer
    }

    /// Arm the tick, mark the kernel running and pick the first thread.
    ///
    /// Returns the saved stack pointer the first-start routine must enter.
    /// On error nothing has been changed.
    pub fn launch<P: Port>(&mut self, port: &P, tick_hz: u32) -> Result<*mut u32, KernelError> {
        if self.active_threads == 0 {
            return Err(KernelError::NotInitialized);
        }
        if self.running {
            return Err(KernelError::AlreadyRunning);
        }
        if tick_hz == 0 {
            return Err(KernelError::InvalidTickRate);
        }

        port.arm_tick(tick_hz);
        self.running = true;
        let first = self.schedule();

        log::info!(
            "launching at {} Hz with {} threads, first '{}'",
            tick_hz,
            self.active_threads,
            self.tcbs[first].name
        );
        Ok(self.tcbs[first].stack_pointer)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn current_slot(&self) -> usize {
        self.run_pt
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_threads(&self) -> usize {
        self.active_threads
    }

    /// Ticks handled since launch (wraps).
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn tcb(&self, slot: usize) -> Option<&ThreadControlBlock> {
        self.tcbs.get(slot)
    }

    pub fn overflow_count(&self, slot: usize) -> u32 {
        self.overflow_counts.get(slot).copied().unwrap_or(0)
    }

    pub fn stack_peak(&self, slot: usize) -> usize {
        self.stack_peaks.get(slot).copied().unwrap_or(0)
    }

    /// Snapshot of a non-Free slot.
    pub fn thread_info(&self, slot: usize) -> Option<ThreadInfo> {
        let tcb = self.tcbs.get(slot).filter(|t| !t.is_free())?;
        Some(ThreadInfo {
            slot,
            name: tcb.name,
            status: tcb.status,
            priority: tcb.priority,
            sleep_ticks: if tcb.status == ThreadStatus::Sleeping { tcb.sleep_ticks } else { 0 },
            overflow_count: self.overflow_counts[slot],
            stack_peak_words: self.stack_peaks[slot],
        })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Choose the slot to run next, given the running slot `current`.
///
/// Pure function of the registry: never mutates, never blocks.
pub fn select_next(tcbs: &[ThreadControlBlock; MAX_THREADS], current: usize) -> usize {
    let mut best: Option<(usize, u8)> = None;

    for (slot, tcb) in tcbs.iter().enumerate() {
        if !tcb.is_ready() {
            continue;
        }
        best = match best {
            None => Some((slot, tcb.priority)),
            // Lower number = higher priority
            Some((_, prio)) if tcb.priority < prio => Some((slot, tcb.priority)),
            // The running thread holds on against equal-priority peers
            Some((_, prio)) if tcb.priority == prio && slot == current => Some((slot, prio)),
            keep => keep,
        };
    }

    best.map_or(IDLE_SLOT, |(slot, _)| slot)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::mock::MockPort;
    use crate::stack::{frame, resume_address};

    extern "C" fn worker() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    extern "C" fn other_worker() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    static IDLE_PASSES: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);

    extern "C" fn counting_idle() -> ! {
        loop {
            IDLE_PASSES.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        }
    }

    fn booted() -> Box<Scheduler> {
        let mut s = Box::new(Scheduler::new());
        s.init();
        s
    }

    #[test]
    fn test_init_registers_idle() {
        let s = booted();
        assert_eq!(s.active_threads(), 1);
        assert_eq!(s.current_slot(), IDLE_SLOT);
        assert!(!s.is_running());

        let idle = s.tcb(IDLE_SLOT).unwrap();
        assert_eq!(idle.status, ThreadStatus::Active);
        assert_eq!(idle.priority, IDLE_PRIORITY);
        assert_eq!(idle.next, IDLE_SLOT);
        assert!(s.tcbs[1..].iter().all(|t| t.is_free()));
    }

    #[test]
    fn test_capacity_is_max_minus_idle() {
        let mut s = booted();
        for i in 1..MAX_THREADS {
            assert_eq!(s.add_thread(Some(worker), 10, "w"), Ok(i));
        }
        assert_eq!(s.add_thread(Some(worker), 10, "w"), Err(KernelError::NoFreeSlot));
        assert_eq!(s.active_threads(), MAX_THREADS);
    }

    #[test]
    fn test_missing_entry_leaves_state_unchanged() {
        let mut s = booted();
        assert_eq!(s.add_thread(None, 1, "ghost"), Err(KernelError::NoEntryPoint));
        assert_eq!(s.active_threads(), 1);
        assert_eq!(s.tcbs[IDLE_SLOT].next, IDLE_SLOT);
        assert!(s.tcb(1).unwrap().is_free());
    }

    #[test]
    fn test_added_thread_frame_points_at_entry() {
        let mut s = booted();
        let slot = s.add_thread(Some(worker), 3, "w").unwrap();
        let sp = s.tcbs[slot].stack_pointer;
        let frame = s.stacks[slot].frame_at(sp).unwrap();
        assert_eq!(frame[frame::PC], resume_address(worker));
    }

    #[test]
    fn test_ring_inserts_after_idle() {
        let mut s = booted();
        let a = s.add_thread(Some(worker), 1, "a").unwrap();
        assert_eq!(s.tcbs[IDLE_SLOT].next, a);
        assert_eq!(s.tcbs[a].next, IDLE_SLOT);

        let b = s.add_thread(Some(worker), 1, "b").unwrap();
        assert_eq!(s.tcbs[IDLE_SLOT].next, b);
        assert_eq!(s.tcbs[b].next, a);
        assert_eq!(s.tcbs[a].next, IDLE_SLOT);

        s.unlink(b);
        assert_eq!(s.tcbs[IDLE_SLOT].next, a);
        s.unlink(a);
        assert_eq!(s.tcbs[IDLE_SLOT].next, IDLE_SLOT);
    }

    #[test]
    fn test_reinit_frees_everything() {
        let mut s = booted();
        s.add_thread(Some(worker), 1, "a").unwrap();
        s.add_thread(Some(worker), 2, "b").unwrap();
        s.overflow_counts[2] = 3;

        s.init();
        assert_eq!(s.active_threads(), 1);
        assert_eq!(s.current_slot(), IDLE_SLOT);
        assert!(s.tcbs[1..].iter().all(|t| t.is_free()));
        assert_eq!(s.overflow_count(2), 0);
    }

    #[test]
    fn test_running_thread_keeps_cpu_against_equal_peer() {
        let mut s = booted();
        let p5 = s.add_thread(Some(worker), 5, "p5").unwrap();
        let first = s.add_thread(Some(worker), 3, "first").unwrap();
        let second = s.add_thread(Some(worker), 3, "second").unwrap();

        s.run_pt = second;
        assert_eq!(s.schedule(), second);

        s.run_pt = first;
        assert_eq!(s.schedule(), first);

        // Not running either peer: first one scanned wins
        s.run_pt = p5;
        assert_eq!(s.schedule(), first);
    }

    #[test]
    fn test_higher_priority_preempts_runner() {
        let mut s = booted();
        let low = s.add_thread(Some(worker), 7, "low").unwrap();
        let high = s.add_thread(Some(worker), 2, "high").unwrap();
        s.run_pt = low;
        assert_eq!(s.schedule(), high);
    }

    #[test]
    fn test_never_selects_sleeping_or_free() {
        let mut s = booted();
        let sleeper = s.add_thread(Some(worker), 0, "sleeper").unwrap();
        let freed = s.add_thread(Some(worker), 0, "freed").unwrap();
        let ready = s.add_thread(Some(worker), 9, "ready").unwrap();

        s.tcbs[sleeper].sleep_for(5);
        s.tcbs[freed].release();

        for current in [IDLE_SLOT, sleeper, freed, ready] {
            s.run_pt = current;
            assert_eq!(s.schedule(), ready);
        }
    }

    #[test]
    fn test_all_sleeping_selects_idle() {
        let mut s = booted();
        let a = s.add_thread(Some(worker), 1, "a").unwrap();
        let b = s.add_thread(Some(worker), 2, "b").unwrap();
        s.tcbs[a].sleep_for(3);
        s.tcbs[b].sleep_for(1);

        s.run_pt = a;
        assert_eq!(s.schedule(), IDLE_SLOT);
    }

    #[test]
    fn test_launch_requires_init() {
        let mut s = Box::new(Scheduler::new());
        let port = MockPort::new();
        assert_eq!(s.launch(&port, 1000), Err(KernelError::NotInitialized));
        assert_eq!(port.armed_hz.get(), None);
        assert!(!s.is_running());
    }

    #[test]
    fn test_launch_rejects_zero_rate_and_relaunch() {
        let mut s = booted();
        let port = MockPort::new();
        assert_eq!(s.launch(&port, 0), Err(KernelError::InvalidTickRate));
        assert!(!s.is_running());

        s.launch(&port, 1000).unwrap();
        assert_eq!(s.launch(&port, 500), Err(KernelError::AlreadyRunning));
        assert_eq!(port.armed_hz.get(), Some(1000));
    }

    #[test]
    fn test_launch_picks_highest_priority() {
        let mut s = booted();
        let port = MockPort::new();
        s.add_thread(Some(worker), 4, "slow").unwrap();
        let fast = s.add_thread(Some(other_worker), 1, "fast").unwrap();

        let sp = s.launch(&port, 250).unwrap();
        assert!(s.is_running());
        assert_eq!(s.current_slot(), fast);
        assert_eq!(sp, s.tcbs[fast].stack_pointer);
        assert_eq!(s.stacks[fast].frame_at(sp).unwrap()[frame::PC], resume_address(other_worker));
    }

    #[test]
    fn test_launch_with_only_idle() {
        let mut s = booted();
        let port = MockPort::new();
        let sp = s.launch(&port, 1000).unwrap();
        assert_eq!(s.current_slot(), IDLE_SLOT);
        assert_eq!(sp, s.tcbs[IDLE_SLOT].stack_pointer);
    }

    #[test]
    fn test_custom_idle_body_is_launched() {
        let mut s = Box::new(Scheduler::new());
        s.init_with_idle(counting_idle);
        assert_eq!(s.active_threads(), 1);
        assert_eq!(s.tcb(IDLE_SLOT).unwrap().priority, IDLE_PRIORITY);

        let idle_sp = s.tcbs[IDLE_SLOT].stack_pointer;
        let pc = s.stacks[IDLE_SLOT].frame_at(idle_sp).unwrap()[frame::PC];
        assert_eq!(pc, resume_address(counting_idle));
        assert_ne!(pc, resume_address(idle_spin));

        let port = MockPort::new();
        let sp = s.launch(&port, 1000).unwrap();
        assert_eq!(s.current_slot(), IDLE_SLOT);
        assert_eq!(sp, idle_sp);
        assert_eq!(port.armed_hz.get(), Some(1000));
    }

    #[test]
    fn test_sleep_ignored_before_launch_and_from_idle() {
        let mut s = booted();
        let port = MockPort::new();
        let a = s.add_thread(Some(worker), 1, "a").unwrap();

        s.run_pt = a;
        s.sleep(&port, 10);
        assert_eq!(s.tcbs[a].status, ThreadStatus::Active);
        assert_eq!(port.switch_requests.get(), 0);

        s.launch(&port, 1000).unwrap();
        s.run_pt = IDLE_SLOT;
        s.sleep(&port, 10);
        assert_eq!(s.tcbs[IDLE_SLOT].status, ThreadStatus::Active);
        assert_eq!(port.switch_requests.get(), 0);
    }

    #[test]
    fn test_sleep_defers_and_requests_switch() {
        let mut s = booted();
        let port = MockPort::new();
        let a = s.add_thread(Some(worker), 1, "a").unwrap();
        s.launch(&port, 1000).unwrap();
        assert_eq!(s.current_slot(), a);

        s.sleep(&port, 10);
        assert_eq!(s.tcbs[a].status, ThreadStatus::Sleeping);
        assert_eq!(port.switch_requests.get(), 1);
        // No inline switch
        assert_eq!(s.current_slot(), a);

        assert_eq!(s.schedule(), IDLE_SLOT);
    }

    #[test]
    fn test_context_save_and_switch() {
        let mut s = booted();
        let port = MockPort::new();
        let a = s.add_thread(Some(worker), 1, "a").unwrap();
        s.launch(&port, 1000).unwrap();

        let saved = s.tcbs[a].stack_pointer.wrapping_sub(4);
        s.save_context(saved);
        assert_eq!(s.tcbs[a].stack_pointer, saved);

        s.sleep(&port, 1);
        assert_eq!(s.switch_context(), s.tcbs[IDLE_SLOT].stack_pointer);
        assert_eq!(s.current_slot(), IDLE_SLOT);
    }

    #[test]
    fn test_save_skips_retired_slot() {
        let mut s = booted();
        let port = MockPort::new();
        let a = s.add_thread(Some(worker), 1, "a").unwrap();
        s.launch(&port, 1000).unwrap();

        s.tcbs[a].release();
        let stale = s.stacks[a].words.as_mut_ptr();
        s.save_context(stale);
        assert!(s.tcbs[a].stack_pointer.is_null());

        // Nor can it come back by sleeping
        s.sleep(&port, 5);
        assert!(s.tcbs[a].is_free());
    }

    #[test]
    fn test_thread_info_snapshot() {
        let mut s = booted();
        let a = s.add_thread(Some(worker), 6, "sensor").unwrap();
        s.tcbs[a].sleep_for(4);

        let info = s.thread_info(a).unwrap();
        assert_eq!(info.name, "sensor");
        assert_eq!(info.priority, 6);
        assert_eq!(info.status, ThreadStatus::Sleeping);
        assert_eq!(info.sleep_ticks, 4);
        assert_eq!(info.overflow_count, 0);

        assert_eq!(s.thread_info(a + 1), None);
        assert_eq!(s.thread_info(MAX_THREADS), None);
    }
}
