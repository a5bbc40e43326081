use crate::irq::Interrupts;
use core::fmt::Debug;

/// The thread-control and scheduler operations the kernel primitives consume.
///
/// There is exactly one logical CPU. Threads are cooperatively scheduled and
/// only ever preempted by device interrupts, so a section running with
/// interrupts [`Off`](crate::irq::InterruptStatus::Off) is atomic with
/// respect to every other thread.
pub trait Processor: Interrupts {
    /// Opaque thread identity. Threads stay owned by the scheduler; wait
    /// queues only hold these handles.
    type Thread: Copy + Eq + Debug + Send;

    /// The thread currently holding the CPU.
    fn current_thread(&self) -> Self::Thread;

    /// Relinquishes the CPU until another thread calls
    /// [`ready_to_run`](Self::ready_to_run) for the current thread.
    ///
    /// Interrupts must be disabled by the caller. The call returns, still
    /// with interrupts disabled, once the thread is scheduled again.
    fn sleep(&self);

    /// Gives up the CPU voluntarily; the thread stays runnable and may be
    /// rescheduled immediately.
    fn yield_now(&self);

    /// Makes a sleeping thread runnable. Interrupts must be disabled.
    fn ready_to_run(&self, thread: Self::Thread);
}
