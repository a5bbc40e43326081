//! # Host Simulation of the Kernel Processor
//!
//! This crate runs kernel code that is written against the
//! [`kernel_sync::Processor`] interface as ordinary host threads, so the
//! synchronization primitives and the paging subsystem can be exercised by
//! `cargo test` without booting a machine.
//!
//! ## Overview
//!
//! The kernel assumes a single logical CPU with cooperatively scheduled
//! threads: a thread only loses the CPU when it sleeps, yields or finishes.
//! Masking interrupts is therefore enough to make a sequence of operations
//! atomic. [`Uniprocessor`] reproduces exactly this model: each simulated
//! thread is backed by a host thread, but a baton guarantees that only one
//! of them executes at any time.
//!
//! ```text
//! Uniprocessor::run(main)
//!     ↓
//! main thread ── Spawner::spawn ──→ ready queue (FIFO)
//!     ↓ sleep / yield_now / exit
//! dispatch head of ready queue, restore its interrupt flag
//!     ↓
//! no runnable thread but blocked ones → halt (deadlock)
//! ```
//!
//! ## Core Components
//!
//! ### Processor ([`Uniprocessor`])
//! * **Deterministic**: switches only at the documented points.
//! * **Per-thread interrupt flag**: saved on switch-out, restored on dispatch.
//! * **Deadlock detection**: sleeping with nothing runnable halts the processor.
//!
//! ### Logger ([`SimLogger`])
//! A `log::Log` implementation writing to stderr, level selected by the
//! `KERNEL_LOG` environment variable.
//!
//! ### Trace Macro ([`sim_trace!`])
//! Unbuffered formatted output that bypasses the logging framework.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_sim::Uniprocessor;
//! use kernel_sync::Semaphore;
//!
//! kernel_sim::init_from_env();
//! let cpu = Uniprocessor::new();
//! let done = Semaphore::new(&cpu, "done", 0);
//! cpu.run(|kernel| {
//!     kernel.spawn("worker", || done.v());
//!     done.p();
//! });
//! ```

mod logger;
mod uniprocessor;

pub use logger::{LOG_LEVEL_VAR, SimLogger, init_from_env};
pub use uniprocessor::{Spawner, ThreadId, ThreadStatus, Uniprocessor};

#[doc(hidden)]
pub mod sim_fmt {
    use std::fmt;
    use std::io::{self, Write};

    #[doc(hidden)]
    pub fn sim_write(args: fmt::Arguments) {
        // Best-effort debug output.
        let _ = io::stderr().lock().write_fmt(args);
    }
}

#[macro_export]
macro_rules! sim_trace {
    ($($arg:tt)*) => {{
        $crate::sim_fmt::sim_write(::core::format_args!($($arg)*));
    }};
}
