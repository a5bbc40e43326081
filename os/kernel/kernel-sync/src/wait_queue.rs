use alloc::collections::VecDeque;

/// FIFO queue of blocked threads: insertion order is wake order.
///
/// The queue only stores thread handles; it never owns the threads.
#[derive(Debug)]
pub struct WaitQueue<T> {
    waiters: VecDeque<T>,
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WaitQueue<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }

    /// Appends a thread at the tail.
    #[inline]
    pub fn push(&mut self, thread: T) {
        self.waiters.push_back(thread);
    }

    /// Removes the longest-waiting thread.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.waiters.pop_front()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Waiters from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.waiters.iter()
    }
}
