//! # Demand Paging
//!
//! This crate implements the paged virtual memory of the kernel: address
//! spaces whose pages are brought into physical frames on first access, and
//! evicted again with the clock algorithm when memory runs out.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            Memory Manager (MMU access path)         │
//! │    • translate / read_memory / write_memory         │
//! │    • address space creation and teardown            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ page not valid
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Page-Fault Resolver                    │
//! │    • io bit serializes faults on one page           │
//! │    • fetch: swap │ executable │ zero-fill           │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ locked frame
//! ┌─────────────────▼───────────────────────────────────┐
//! │            Physical Frame Table                     │
//! │    • free list, frame records                       │
//! │    • clock eviction, write-back to swap             │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Translation Table ([`TranslationTable`])
//! One entry per virtual page with `valid`, `io`, `swap`, U and M bits, the
//! frame number and the backing store locator. The MMU path sets U on every
//! access and M on writes; the clock algorithm clears U.
//!
//! ### Frame Table ([`FrameTable`])
//! * **Free list**: O(1) allocation while frames are free.
//! * **Locking**: frames being filled are locked and never evicted.
//! * **Clock hand**: persists across evictions; unreferenced, unlocked frames
//!   are chosen, every other visited frame loses its U bit.
//!
//! ### Backing Store ([`SwapDevice`], [`ExecutableFile`])
//! Modified victims are written to swap before their frame is reused; clean
//! ones are dropped and re-read from their source on the next fault.
//!
//! ## Concurrency
//!
//! There is a single logical CPU. Frame records and translation entries are
//! only changed with interrupts disabled ([`kernel_sync::IrqGuard`]); the
//! polling loops yield the CPU between checks and never hold an atomic
//! section across the yield.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::MemoryConfig;
//! use kernel_paging::{MemoryManager, SwapArea};
//! use kernel_sim::Uniprocessor;
//!
//! let cfg = MemoryConfig::DEFAULT.with_num_phys_pages(2);
//! let cpu = Uniprocessor::new();
//! let swap = SwapArea::new(&cfg);
//! let mm = MemoryManager::new(&cpu, &swap, cfg).unwrap();
//!
//! cpu.run(|_| {
//!     let space = mm.new_address_space("init", 4, None).unwrap();
//!     space.map_anonymous(0..4, true).unwrap();
//!     for page in 0..4u8 {
//!         mm.write_memory(&space, usize::from(page) * 128, &[page]).unwrap();
//!     }
//!     let mut byte = [0];
//!     mm.read_memory(&space, 128, &mut byte).unwrap();
//!     assert_eq!(byte, [1]);
//!     mm.release_address_space(&space);
//! });
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

mod address_space;
mod addresses;
mod backing;
mod fault;
mod frame_table;
mod manager;
mod physical;
mod translation;

pub use address_space::AddressSpace;
pub use addresses::{FrameNumber, PageNumber, SwapSlot};
pub use backing::{BackingError, ExecutableFile, ExecutableImage, SwapArea, SwapDevice};
pub use fault::{Exception, PageFaultError};
pub use frame_table::{FrameInfo, FrameTable};
pub use manager::{Access, MemoryManager, PagingError};
pub use physical::PhysicalMemory;
pub use translation::{Backing, IoClaim, PageEntryBits, PageTableEntry, TranslationTable};
