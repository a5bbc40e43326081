use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Flag lock behind [`SpinMutex`](crate::SpinMutex).
///
/// Kernel state is only touched with interrupts off on the single CPU, so
/// the flag is normally free when taken. Spinning only happens when host
/// threads outside the simulated CPU inspect the same state.
#[derive(Debug, Default)]
pub struct RawSpin {
    held: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    #[inline]
    fn acquire_once(&self) -> bool {
        self.held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl RawLock for RawSpin {
    fn raw_lock(&self) {
        while !self.acquire_once() {
            while self.is_locked() {
                spin_loop();
            }
        }
    }

    fn raw_try_lock(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self) {
        debug_assert!(self.is_locked(), "unlocking a free spin lock");
        self.held.store(false, Ordering::Release);
    }
}
