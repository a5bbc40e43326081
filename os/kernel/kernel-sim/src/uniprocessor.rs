use kernel_sync::{InterruptStatus, Interrupts, Processor};
use log::debug;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, Scope};

/// Handle of a simulated kernel thread.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling state of a simulated thread.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThreadStatus {
    /// In the ready queue.
    Ready,
    /// Holding the CPU.
    Running,
    /// Asleep until made runnable.
    Blocked,
    Finished,
}

struct SimThread {
    name: String,
    status: ThreadStatus,
    /// Interrupt state saved while the thread is switched out.
    interrupts: InterruptStatus,
}

struct State {
    threads: Vec<SimThread>,
    ready: VecDeque<ThreadId>,
    running: Option<ThreadId>,
    interrupts: InterruptStatus,
    halted: bool,
    switches: u64,
}

impl State {
    fn add_thread(&mut self, name: &str, status: ThreadStatus) -> ThreadId {
        let id = ThreadId(self.threads.len());
        self.threads.push(SimThread {
            name: name.to_owned(),
            status,
            interrupts: InterruptStatus::On,
        });
        id
    }

    fn current(&self) -> ThreadId {
        self.running.expect("no simulated thread holds the CPU")
    }

    fn thread_mut(&mut self, id: ThreadId) -> &mut SimThread {
        &mut self.threads[id.0]
    }

    fn dispatch(&mut self, next: ThreadId) {
        self.running = Some(next);
        let thread = self.thread_mut(next);
        thread.status = ThreadStatus::Running;
        let interrupts = thread.interrupts;
        self.interrupts = interrupts;
        self.switches += 1;
    }

    fn blocked(&self) -> Vec<String> {
        self.threads
            .iter()
            .filter(|t| t.status == ThreadStatus::Blocked)
            .map(|t| t.name.clone())
            .collect()
    }
}

/// Unwinding payload used to stop simulated threads after the processor halted.
struct Halted;

/// A single logical CPU running cooperatively scheduled kernel threads.
///
/// Every simulated thread is backed by a host thread, but only the one
/// holding the CPU baton executes; all others wait on a condition variable.
/// Context switches happen only in [`Processor::sleep`],
/// [`Processor::yield_now`] and when a thread finishes, so interleavings are
/// deterministic: the ready queue is FIFO and a newly spawned thread first
/// runs when the spawning thread gives up the CPU.
///
/// The interrupt-enable flag is saved and restored per thread across
/// switches. New threads start with interrupts on.
///
/// If the running thread goes to sleep and nothing else is runnable, or a
/// thread panics, the processor halts: the offending thread panics and all
/// others unwind quietly.
pub struct Uniprocessor {
    state: Mutex<State>,
    turn: Condvar,
}

impl Default for Uniprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Uniprocessor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State {
                threads: Vec::new(),
                ready: VecDeque::new(),
                running: None,
                interrupts: InterruptStatus::On,
                halted: false,
                switches: 0,
            }),
            turn: Condvar::new(),
        }
    }

    /// Boots the processor with `main` as its first thread.
    ///
    /// `main` runs on the calling host thread and may spawn further
    /// threads. The call returns once every simulated thread has finished.
    ///
    /// # Panics
    /// On deadlock, or when any simulated thread panics.
    pub fn run<'env, F>(&'env self, main: F)
    where
        F: for<'scope> FnOnce(&Spawner<'scope, 'env>),
    {
        thread::scope(|scope| {
            let me = {
                let mut st = self.lock_state();
                assert!(
                    st.running.is_none() && !st.halted,
                    "processor is already running or has halted"
                );
                let id = st.add_thread("main", ThreadStatus::Running);
                st.running = Some(id);
                st.interrupts = InterruptStatus::On;
                id
            };
            let spawner = Spawner {
                scope,
                processor: self,
            };
            match panic::catch_unwind(AssertUnwindSafe(|| main(&spawner))) {
                Ok(()) => self.exit(me),
                Err(payload) => {
                    self.halt();
                    if payload.is::<Halted>() {
                        panic!("simulated processor halted");
                    }
                    panic::resume_unwind(payload);
                }
            }
        });
    }

    #[must_use]
    pub fn thread_status(&self, thread: ThreadId) -> ThreadStatus {
        self.lock_state().threads[thread.0].status
    }

    #[must_use]
    pub fn thread_name(&self, thread: ThreadId) -> String {
        self.lock_state().threads[thread.0].name.clone()
    }

    /// Number of context switches performed so far.
    #[must_use]
    pub fn context_switches(&self) -> u64 {
        self.lock_state().switches
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, me: ThreadId, f: impl FnOnce()) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            drop(self.wait_for_turn(self.lock_state(), me));
            f();
        }));
        match outcome {
            Ok(()) => self.exit(me),
            Err(payload) => {
                self.halt();
                if !payload.is::<Halted>() {
                    panic::resume_unwind(payload);
                }
            }
        }
    }

    /// Blocks the host thread until `me` holds the CPU.
    fn wait_for_turn<'a>(
        &'a self,
        mut st: MutexGuard<'a, State>,
        me: ThreadId,
    ) -> MutexGuard<'a, State> {
        while st.running != Some(me) {
            if st.halted {
                drop(st);
                panic::resume_unwind(Box::new(Halted));
            }
            st = self.turn.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
        st
    }

    /// Hands the CPU to the head of the ready queue and waits to be rescheduled.
    fn switch_away(&self, mut st: MutexGuard<'_, State>, me: ThreadId) {
        let interrupts = st.interrupts;
        st.thread_mut(me).interrupts = interrupts;
        let Some(next) = st.ready.pop_front() else {
            let blocked = st.blocked();
            st.halted = true;
            drop(st);
            self.turn.notify_all();
            panic!("deadlock: no runnable thread left, blocked: {blocked:?}");
        };
        st.dispatch(next);
        self.turn.notify_all();
        drop(self.wait_for_turn(st, me));
    }

    fn exit(&self, me: ThreadId) {
        let mut st = self.lock_state();
        debug!("thread {} ({}) finished", me, st.threads[me.0].name);
        st.thread_mut(me).status = ThreadStatus::Finished;
        st.running = None;
        if let Some(next) = st.ready.pop_front() {
            st.dispatch(next);
            drop(st);
            self.turn.notify_all();
            return;
        }
        let blocked = st.blocked();
        if !blocked.is_empty() {
            st.halted = true;
            drop(st);
            self.turn.notify_all();
            panic!("deadlock: all remaining threads are blocked: {blocked:?}");
        }
    }

    fn halt(&self) {
        let mut st = self.lock_state();
        st.halted = true;
        st.running = None;
        drop(st);
        self.turn.notify_all();
    }
}

impl Interrupts for Uniprocessor {
    fn status(&self) -> InterruptStatus {
        self.lock_state().interrupts
    }

    fn set_status(&self, status: InterruptStatus) -> InterruptStatus {
        std::mem::replace(&mut self.lock_state().interrupts, status)
    }
}

impl Processor for Uniprocessor {
    type Thread = ThreadId;

    fn current_thread(&self) -> ThreadId {
        self.lock_state().current()
    }

    fn sleep(&self) {
        let mut st = self.lock_state();
        assert_eq!(
            st.interrupts,
            InterruptStatus::Off,
            "sleep called with interrupts enabled"
        );
        let me = st.current();
        st.thread_mut(me).status = ThreadStatus::Blocked;
        self.switch_away(st, me);
    }

    fn yield_now(&self) {
        let mut st = self.lock_state();
        let me = st.current();
        if st.ready.is_empty() {
            return;
        }
        st.thread_mut(me).status = ThreadStatus::Ready;
        st.ready.push_back(me);
        self.switch_away(st, me);
    }

    fn ready_to_run(&self, thread: ThreadId) {
        let mut st = self.lock_state();
        assert_eq!(
            st.interrupts,
            InterruptStatus::Off,
            "ready_to_run called with interrupts enabled"
        );
        let status = st.threads[thread.0].status;
        assert_eq!(
            status,
            ThreadStatus::Blocked,
            "thread {thread} made runnable while {status:?}"
        );
        st.thread_mut(thread).status = ThreadStatus::Ready;
        st.ready.push_back(thread);
    }
}

/// Spawns simulated threads from inside [`Uniprocessor::run`].
pub struct Spawner<'scope, 'env: 'scope> {
    scope: &'scope Scope<'scope, 'env>,
    processor: &'env Uniprocessor,
}

impl<'scope, 'env> Spawner<'scope, 'env> {
    /// Creates a runnable thread at the tail of the ready queue.
    ///
    /// # Panics
    /// If the host thread cannot be created.
    pub fn spawn<F>(&self, name: &str, f: F) -> ThreadId
    where
        F: FnOnce() + Send + 'scope,
    {
        let id = {
            let mut st = self.processor.lock_state();
            let id = st.add_thread(name, ThreadStatus::Ready);
            st.ready.push_back(id);
            id
        };
        let processor = self.processor;
        thread::Builder::new()
            .name(name.to_owned())
            .spawn_scoped(self.scope, move || processor.start(id, f))
            .expect("failed to create host thread");
        id
    }

    #[must_use]
    pub const fn processor(&self) -> &'env Uniprocessor {
        self.processor
    }
}
