use crate::{InterruptStatus, Interrupts, Processor};
use core::cell::Cell;

/// Processor whose threads never really block: `sleep` returns at once, so
/// a caller stays queued on the primitive it waited on.
pub struct TestCpu {
    interrupts: Cell<InterruptStatus>,
    current: Cell<u32>,
}

impl TestCpu {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interrupts: Cell::new(InterruptStatus::On),
            current: Cell::new(0),
        }
    }

    /// Pretends `thread` now holds the CPU.
    pub fn switch_to(&self, thread: u32) {
        self.current.set(thread);
    }
}

impl Interrupts for TestCpu {
    fn status(&self) -> InterruptStatus {
        self.interrupts.get()
    }

    fn set_status(&self, status: InterruptStatus) -> InterruptStatus {
        self.interrupts.replace(status)
    }
}

impl Processor for TestCpu {
    type Thread = u32;

    fn current_thread(&self) -> u32 {
        self.current.get()
    }

    fn sleep(&self) {
        assert_eq!(self.status(), InterruptStatus::Off, "sleep with interrupts on");
    }

    fn yield_now(&self) {}

    fn ready_to_run(&self, _thread: u32) {}
}
