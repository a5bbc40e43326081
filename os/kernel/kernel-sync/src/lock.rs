use crate::irq::IrqGuard;
use crate::{Processor, SpinMutex, WaitQueue};
use alloc::string::String;
use log::trace;

/// Sleeping mutual-exclusion lock with an owner.
///
/// The lock is free exactly when it has no owner. On release the head
/// waiter becomes the owner directly, so the lock never looks free while
/// threads are queued on it.
pub struct Lock<'k, P: Processor> {
    name: String,
    processor: &'k P,
    state: SpinMutex<LockState<P::Thread>>,
}

struct LockState<T> {
    owner: Option<T>,
    waiters: WaitQueue<T>,
}

impl<'k, P: Processor> Lock<'k, P> {
    /// Creates a free lock.
    pub fn new(processor: &'k P, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processor,
            state: SpinMutex::new(LockState {
                owner: None,
                waiters: WaitQueue::new(),
            }),
        }
    }

    /// Takes the lock, sleeping until it is handed over if it is held.
    pub fn acquire(&self) {
        let _irq = IrqGuard::new(self.processor);
        let me = self.processor.current_thread();
        let must_sleep = {
            let mut state = self.state.lock();
            trace!("[{me:?}] Acquire({}) free={}", self.name, state.owner.is_none());
            if state.owner.is_none() {
                state.owner = Some(me);
                false
            } else {
                state.waiters.push(me);
                true
            }
        };
        if must_sleep {
            // Release() installs us as the owner before waking us.
            self.processor.sleep();
        }
    }

    /// Releases the lock, handing it to the head waiter if there is one.
    ///
    /// # Panics
    /// If the calling thread is not the owner.
    pub fn release(&self) {
        let _irq = IrqGuard::new(self.processor);
        let me = self.processor.current_thread();
        let next = {
            let mut state = self.state.lock();
            assert_eq!(
                state.owner,
                Some(me),
                "lock \"{}\" released by a thread that does not hold it",
                self.name
            );
            let next = state.waiters.pop();
            state.owner = next;
            trace!("[{me:?}] Release({}) next={next:?}", self.name);
            next
        };
        if let Some(thread) = next {
            self.processor.ready_to_run(thread);
        }
    }

    /// Acquires the lock and returns a guard releasing it on drop.
    pub fn lock(&self) -> LockGuard<'_, 'k, P> {
        self.acquire();
        LockGuard { lock: self }
    }

    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(self.processor.current_thread())
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.state.lock().owner.is_none()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<P: Processor> Drop for Lock<'_, P> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        assert!(
            state.waiters.is_empty(),
            "lock \"{}\" destroyed with {} blocked thread(s)",
            self.name,
            state.waiters.len()
        );
    }
}

/// Releases the [`Lock`] when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, 'k, P: Processor> {
    lock: &'a Lock<'k, P>,
}

impl<P: Processor> Drop for LockGuard<'_, '_, P> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
