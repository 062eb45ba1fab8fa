//! Recording [`Port`] for host tests.

use core::cell::Cell;

use super::Port;

#[derive(Default)]
pub struct MockPort {
    /// Last rate passed to `arm_tick`.
    pub armed_hz: Cell<Option<u32>>,
    /// Number of deferred switches requested.
    pub switch_requests: Cell<u32>,
    /// Pointer handed to the first-start routine.
    pub entered: Cell<Option<*mut u32>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Port for MockPort {
    fn arm_tick(&self, tick_hz: u32) {
        self.armed_hz.set(Some(tick_hz));
    }

    fn request_switch(&self) {
        self.switch_requests.set(self.switch_requests.get() + 1);
    }

    unsafe fn enter_first_task(&self, stack_pointer: *mut u32) {
        self.entered.set(Some(stack_pointer));
    }
}
