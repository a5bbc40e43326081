use crate::irq::IrqGuard;
use crate::{Processor, SpinMutex, WaitQueue};
use alloc::string::String;
use log::trace;

/// Counting semaphore.
///
/// `value` may drop below zero; a negative value is the number of threads
/// blocked in [`p`](Self::p). Blocked threads are woken in FIFO order.
pub struct Semaphore<'k, P: Processor> {
    name: String,
    processor: &'k P,
    state: SpinMutex<SemaphoreState<P::Thread>>,
}

struct SemaphoreState<T> {
    value: i64,
    queue: WaitQueue<T>,
}

impl<'k, P: Processor> Semaphore<'k, P> {
    /// Creates a semaphore holding `initial` permits.
    pub fn new(processor: &'k P, name: impl Into<String>, initial: u32) -> Self {
        Self {
            name: name.into(),
            processor,
            state: SpinMutex::new(SemaphoreState {
                value: i64::from(initial),
                queue: WaitQueue::new(),
            }),
        }
    }

    /// Takes a permit, sleeping while none is available.
    pub fn p(&self) {
        let _irq = IrqGuard::new(self.processor);
        let must_sleep = {
            let mut state = self.state.lock();
            state.value -= 1;
            trace!("P({}) -> {}", self.name, state.value);
            if state.value < 0 {
                state.queue.push(self.processor.current_thread());
                true
            } else {
                false
            }
        };
        if must_sleep {
            self.processor.sleep();
        }
    }

    /// Returns a permit and wakes the longest-waiting thread, if any.
    ///
    /// Never blocks; callable with interrupts already disabled.
    pub fn v(&self) {
        let _irq = IrqGuard::new(self.processor);
        let woken = {
            let mut state = self.state.lock();
            state.value += 1;
            trace!("V({}) -> {}", self.name, state.value);
            state.queue.pop()
        };
        if let Some(thread) = woken {
            self.processor.ready_to_run(thread);
        }
    }

    /// Current counter value; negative while threads are blocked.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.state.lock().value
    }

    /// Number of threads blocked in [`p`](Self::p).
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.lock().queue.len()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<P: Processor> Drop for Semaphore<'_, P> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        assert!(
            state.queue.is_empty(),
            "semaphore \"{}\" destroyed with {} blocked thread(s), head {:?}",
            self.name,
            state.queue.len(),
            state.queue.iter().next()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_cpu::TestCpu;

    #[test]
    fn v_without_waiters_banks_a_permit() {
        let cpu = TestCpu::new();
        let sem = Semaphore::new(&cpu, "s", 0);
        sem.v();
        sem.p();
        assert_eq!(sem.value(), 0);
        assert_eq!(sem.waiters(), 0);
    }

    #[test]
    #[should_panic(expected = "destroyed with 1 blocked thread(s)")]
    fn destroying_with_a_blocked_thread_panics() {
        let cpu = TestCpu::new();
        let sem = Semaphore::new(&cpu, "empty", 0);
        sem.p();
        assert_eq!(sem.value(), -1);
        drop(sem);
    }
}
