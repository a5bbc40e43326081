use crate::irq::IrqGuard;
use crate::{Lock, Processor, SpinMutex, WaitQueue};
use alloc::string::String;
use alloc::vec::Vec;
use log::trace;

/// Condition variable without an embedded predicate or lock.
///
/// The associated [`Lock`] is managed by the caller (Mesa-style monitor):
/// release it before [`wait`](Self::wait) and re-acquire it afterwards, or
/// use [`wait_with`](Self::wait_with) which does both.
pub struct Condition<'k, P: Processor> {
    name: String,
    processor: &'k P,
    waiters: SpinMutex<WaitQueue<P::Thread>>,
}

impl<'k, P: Processor> Condition<'k, P> {
    pub fn new(processor: &'k P, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processor,
            waiters: SpinMutex::new(WaitQueue::new()),
        }
    }

    /// Blocks the calling thread until signalled.
    pub fn wait(&self) {
        let _irq = IrqGuard::new(self.processor);
        self.enqueue_current();
        self.processor.sleep();
    }

    /// Releases `lock`, blocks until signalled, then re-acquires `lock`.
    ///
    /// Enqueueing and releasing happen in one atomic section, so a signal
    /// sent right after the lock is handed over cannot be lost.
    ///
    /// # Panics
    /// If the caller does not hold `lock`.
    pub fn wait_with(&self, lock: &Lock<'_, P>) {
        assert!(
            lock.is_held_by_current_thread(),
            "wait on condition \"{}\" without holding lock \"{}\"",
            self.name,
            lock.name()
        );
        {
            let _irq = IrqGuard::new(self.processor);
            self.enqueue_current();
            lock.release();
            self.processor.sleep();
        }
        lock.acquire();
    }

    /// Wakes the longest-waiting thread, if any.
    pub fn signal(&self) {
        let _irq = IrqGuard::new(self.processor);
        let woken = self.waiters.lock().pop();
        trace!("Signal({}) woke {woken:?}", self.name);
        if let Some(thread) = woken {
            self.processor.ready_to_run(thread);
        }
    }

    /// Wakes every waiting thread in FIFO order.
    pub fn broadcast(&self) {
        let _irq = IrqGuard::new(self.processor);
        let woken: Vec<_> = {
            let mut waiters = self.waiters.lock();
            core::iter::from_fn(|| waiters.pop()).collect()
        };
        trace!("Broadcast({}) woke {}", self.name, woken.len());
        for thread in woken {
            self.processor.ready_to_run(thread);
        }
    }

    /// Number of threads blocked on this condition.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.waiters.lock().len()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn enqueue_current(&self) {
        let me = self.processor.current_thread();
        trace!("[{me:?}] Wait({})", self.name);
        self.waiters.lock().push(me);
    }
}

impl<P: Processor> Drop for Condition<'_, P> {
    fn drop(&mut self) {
        let waiters = self.waiters.get_mut();
        assert!(
            waiters.is_empty(),
            "condition \"{}\" destroyed with {} blocked thread(s)",
            self.name,
            waiters.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_cpu::TestCpu;

    #[test]
    #[should_panic(expected = "destroyed with 1 blocked thread(s)")]
    fn destroying_with_a_blocked_thread_panics() {
        let cpu = TestCpu::new();
        let cond = Condition::new(&cpu, "never");
        cond.wait();
        assert_eq!(cond.waiters(), 1);
        drop(cond);
    }
}
