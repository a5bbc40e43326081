//! # Kernel synchronization primitives
//!
//! Blocking primitives for cooperatively scheduled kernel threads on a single
//! logical CPU:
//!
//! | Primitive       | Blocks? | Wake order | Use |
//! |-----------------|---------|------------|-----|
//! | [`Semaphore`]   | on `P` when no permit is left | FIFO | counting resources, signalling events |
//! | [`Lock`]        | on `acquire` when held | FIFO, direct hand-over | mutual exclusion with an owner |
//! | [`Condition`]   | always on `wait` | FIFO | monitor-style waiting next to a [`Lock`] |
//!
//! Atomicity comes from masking interrupts ([`IrqGuard`]); there is no other
//! mutual exclusion between threads. Each primitive keeps its counter and
//! [`WaitQueue`] in a [`SpinMutex`] so the state is `Sync`, but that spin lock
//! is only ever taken inside an interrupt-atomic section and released before
//! the thread sleeps.
//!
//! The primitives are generic over a [`Processor`], the thread-control and
//! scheduler interface of the machine they run on.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod condition;
pub mod irq;
mod lock;
mod mutex;
mod processor;
mod raw_spin;
mod semaphore;
#[cfg(test)]
mod test_cpu;
mod wait_queue;

pub use condition::Condition;
pub use irq::{InterruptStatus, Interrupts, IrqGuard, IrqMutex};
pub use lock::{Lock, LockGuard};
pub use mutex::{Mutex, MutexGuard};
pub use processor::Processor;
pub use raw_spin::RawSpin;
pub use semaphore::Semaphore;
pub use wait_queue::WaitQueue;

pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The caller must hold the lock.
    unsafe fn raw_unlock(&self);
}
