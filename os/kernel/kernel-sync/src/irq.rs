use crate::{Mutex, MutexGuard, RawLock, RawUnlock};
use core::ops::{Deref, DerefMut};

/// Interrupt-enable state of the (single) logical CPU.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InterruptStatus {
    /// Interrupts are masked; no context switch or device handler can run.
    Off,
    /// Interrupts are delivered.
    On,
}

/// Access to the interrupt-enable state of the processor.
///
/// On hardware this is `cli`/`sti` and the `IF` flag; the simulator keeps
/// the flag per simulated thread.
pub trait Interrupts {
    /// Returns the current interrupt state.
    fn status(&self) -> InterruptStatus;

    /// Sets the interrupt state and returns the state it replaced.
    fn set_status(&self, status: InterruptStatus) -> InterruptStatus;
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// This is the interrupt-atomic section every kernel state transition runs
/// in. `IrqGuard::new` snapshots the current status and switches interrupts
/// off; on drop the snapshot is written back, so sections nest: an inner
/// guard restores `Off` and only the outermost guard turns interrupts on
/// again.
///
/// # Examples
///
/// ```
/// # use core::cell::Cell;
/// # use kernel_sync::irq::{InterruptStatus, Interrupts, IrqGuard};
/// # struct Flag(Cell<InterruptStatus>);
/// # impl Interrupts for Flag {
/// #     fn status(&self) -> InterruptStatus { self.0.get() }
/// #     fn set_status(&self, s: InterruptStatus) -> InterruptStatus { self.0.replace(s) }
/// # }
/// let cpu = Flag(Cell::new(InterruptStatus::On));
/// {
///     let _outer = IrqGuard::new(&cpu);
///     {
///         let _inner = IrqGuard::new(&cpu);
///     }
///     assert_eq!(cpu.status(), InterruptStatus::Off);
/// }
/// assert_eq!(cpu.status(), InterruptStatus::On);
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<'a, I: Interrupts + ?Sized> {
    interrupts: &'a I,
    /// The status that was active when the guard was created.
    previous: InterruptStatus,
}

impl<'a, I: Interrupts + ?Sized> IrqGuard<'a, I> {
    /// Disables interrupts and remembers the previous state.
    #[inline]
    pub fn new(interrupts: &'a I) -> Self {
        let previous = interrupts.set_status(InterruptStatus::Off);
        Self {
            interrupts,
            previous,
        }
    }

    /// The interrupt state that will be restored on drop.
    #[inline]
    #[must_use]
    pub const fn previous(&self) -> InterruptStatus {
        self.previous
    }
}

impl<I: Interrupts + ?Sized> Drop for IrqGuard<'_, I> {
    fn drop(&mut self) {
        self.interrupts.set_status(self.previous);
    }
}

/// A mutex guard that also disables interrupts while held.
///
/// `IrqMutex` combines an [`IrqGuard`] with a regular [`MutexGuard`].
/// When created via [`Mutex::lock_irq`], it:
///
/// 1. saves the current interrupt state and disables interrupts, and
/// 2. acquires the underlying mutex,
///
/// releasing them in reverse order on drop (fields drop in declaration
/// order, so the mutex guard comes first).
///
/// On a single CPU the spin lock is never contended while interrupts are
/// off; it exists so the state can be shared as `Sync` data.
pub struct IrqMutex<'a, T, R: RawLock + RawUnlock, I: Interrupts + ?Sized> {
    g: MutexGuard<'a, T, R>,
    _irq: IrqGuard<'a, I>,
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Acquires the mutex with interrupts disabled for the guard's lifetime.
    #[inline]
    pub fn lock_irq<'a, I: Interrupts + ?Sized>(
        &'a self,
        interrupts: &'a I,
    ) -> IrqMutex<'a, T, R, I> {
        let irq = IrqGuard::new(interrupts);
        let g = self.lock();
        IrqMutex { g, _irq: irq }
    }
}

impl<T, R: RawLock + RawUnlock, I: Interrupts + ?Sized> Deref for IrqMutex<'_, T, R, I> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.g
    }
}

impl<T, R: RawLock + RawUnlock, I: Interrupts + ?Sized> DerefMut for IrqMutex<'_, T, R, I> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpinMutex;
    use core::cell::Cell;

    struct Flag(Cell<InterruptStatus>);

    impl Interrupts for Flag {
        fn status(&self) -> InterruptStatus {
            self.0.get()
        }

        fn set_status(&self, status: InterruptStatus) -> InterruptStatus {
            self.0.replace(status)
        }
    }

    #[test]
    fn guard_restores_previous_state() {
        let cpu = Flag(Cell::new(InterruptStatus::On));
        let g = IrqGuard::new(&cpu);
        assert_eq!(g.previous(), InterruptStatus::On);
        assert_eq!(cpu.status(), InterruptStatus::Off);
        drop(g);
        assert_eq!(cpu.status(), InterruptStatus::On);
    }

    #[test]
    fn guard_keeps_interrupts_off_when_already_off() {
        let cpu = Flag(Cell::new(InterruptStatus::Off));
        drop(IrqGuard::new(&cpu));
        assert_eq!(cpu.status(), InterruptStatus::Off);
    }

    #[test]
    fn lock_irq_masks_interrupts_while_held() {
        let cpu = Flag(Cell::new(InterruptStatus::On));
        let m = SpinMutex::new(1u32);
        {
            let mut g = m.lock_irq(&cpu);
            *g += 1;
            assert_eq!(cpu.status(), InterruptStatus::Off);
            assert!(m.try_lock().is_none());
        }
        assert_eq!(cpu.status(), InterruptStatus::On);
        assert_eq!(*m.lock(), 2);
    }
}
