//! # Page-Fault Resolution
//!
//! Per faulting page:
//!
//! ```text
//! io set? ── yes ──→ yield, re-check
//!   │ no
//! valid? ── yes ──→ done (another thread resolved it)
//!   │ no
//! set io, get locked frame (may evict)
//!   │
//! swap write pending? ── yes ──→ yield, re-check
//!   │
//! fill frame: swap slot │ executable range │ zeroes
//!   │
//! clear io, set valid, unlock frame
//! ```
//!
//! Faults on different pages proceed independently; faults on the same page
//! are serialized through the entry's `io` bit.

use crate::address_space::AddressSpace;
use crate::addresses::{FrameNumber, PageNumber};
use crate::backing::{BackingError, SwapDevice};
use crate::manager::MemoryManager;
use crate::translation::{Backing, IoClaim, TranslationTable};
use alloc::sync::Arc;
use alloc::vec;
use kernel_sync::{IrqGuard, Processor};
use log::{debug, trace, warn};

/// Trap result reported to the exception dispatcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Exception {
    NoException,
    /// Access outside the address space or to an unmapped page.
    AddressError,
    /// Write to a page mapped read-only.
    ReadOnly,
    /// The backing store could not deliver or take the page.
    BusError,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageFaultError {
    #[error("page {0} is outside the address space")]
    OutOfRange(PageNumber),
    #[error("page {0} is not mapped")]
    Unmapped(PageNumber),
    #[error("backing store failure: {0}")]
    Backing(#[from] BackingError),
}

impl From<&PageFaultError> for Exception {
    fn from(value: &PageFaultError) -> Self {
        match value {
            PageFaultError::OutOfRange(_) | PageFaultError::Unmapped(_) => Self::AddressError,
            PageFaultError::Backing(_) => Self::BusError,
        }
    }
}

impl<P: Processor, S: SwapDevice + ?Sized> MemoryManager<'_, P, S> {
    /// Makes `page` of `space` resident.
    ///
    /// Returns immediately if the page already is. Concurrent faults on the
    /// same page fetch its content once; every caller sees the page valid
    /// on success.
    ///
    /// # Errors
    /// [`PageFaultError::OutOfRange`] and [`PageFaultError::Unmapped`] for
    /// pages without a mapping, [`PageFaultError::Backing`] when the content
    /// could not be read or no frame could be freed. Nothing is left
    /// half-done: the frame is released and the page stays non-resident.
    pub fn page_fault(
        &self,
        space: &Arc<AddressSpace>,
        page: PageNumber,
    ) -> Result<(), PageFaultError> {
        let table = space.table();
        let entry = table.entry(page).ok_or(PageFaultError::OutOfRange(page))?;
        if !entry.bits.mapped() {
            return Err(PageFaultError::Unmapped(page));
        }

        loop {
            let claim = {
                let _irq = IrqGuard::new(self.processor());
                table.claim_io(page)
            };
            match claim {
                IoClaim::Resident => return Ok(()),
                IoClaim::Claimed => break,
                IoClaim::Busy => {
                    trace!("{}:{page} in flight, yielding", space.name());
                    self.processor().yield_now();
                }
            }
        }

        let frames = self.frame_table();
        let frame = match frames.add_physical_to_virtual_mapping(space, page) {
            Ok(frame) => frame,
            Err(err) => {
                self.end_io(table, page);
                return Err(err.into());
            }
        };

        let Some(backing) = self.pending_backing(table, page, frame) else {
            // The swap-out of this page failed and its old mapping is back.
            debug!("{}:{page} became resident while faulting", space.name());
            self.end_io(table, page);
            frames.release_frame(frame);
            return Ok(());
        };

        if let Err(err) = self.fill(space, frame, backing) {
            warn!("fault on {}:{page} failed: {err}", space.name());
            self.end_io(table, page);
            frames.release_frame(frame);
            return Err(err.into());
        }

        {
            let _irq = IrqGuard::new(self.processor());
            table.update(page, |e| {
                e.bits.set_io(false);
                e.bits.set_valid(true);
                e.bits.set_modified(false);
            });
        }
        frames.unlock_page(frame);
        debug!("{}:{page} -> {frame} from {backing:?}", space.name());
        Ok(())
    }

    /// Resolves a fault and reports it as a trap result.
    pub fn handle_page_fault(&self, space: &Arc<AddressSpace>, page: PageNumber) -> Exception {
        match self.page_fault(space, page) {
            Ok(()) => Exception::NoException,
            Err(err) => {
                warn!("page fault in {} at {page}: {err}", space.name());
                Exception::from(&err)
            }
        }
    }

    /// Records `frame` in the entry and returns where to fetch the page
    /// from, waiting while a swap write of the page is still in flight.
    ///
    /// `None` if the page became valid again in the meantime.
    fn pending_backing(
        &self,
        table: &TranslationTable,
        page: PageNumber,
        frame: FrameNumber,
    ) -> Option<Backing> {
        loop {
            let backing = {
                let _irq = IrqGuard::new(self.processor());
                table.update(page, |e| {
                    if e.bits.valid() {
                        return None;
                    }
                    e.bits.set_frame_number(frame);
                    Some(e.backing())
                })
            }?;
            if backing != Backing::SwapPending {
                return Some(backing);
            }
            trace!("{page} swap slot pending, yielding");
            self.processor().yield_now();
        }
    }

    fn fill(
        &self,
        space: &AddressSpace,
        frame: FrameNumber,
        backing: Backing,
    ) -> Result<(), BackingError> {
        let memory = self.frame_table().memory();
        let mut buf = vec![0; memory.page_size()];
        match backing {
            Backing::Zero => {
                memory.zero_frame(frame);
                return Ok(());
            }
            Backing::SwapPending => unreachable!("fetch started before the swap slot was known"),
            Backing::Swap(slot) => self.swap().get_page(slot, &mut buf)?,
            Backing::Executable(offset) => {
                let exe = space.executable().ok_or(BackingError::NoExecutable)?;
                // Bytes past the end of the file stay zero.
                exe.read_at(&mut buf, offset)?;
            }
        }
        memory.write_frame(frame, &buf);
        Ok(())
    }

    fn end_io(&self, table: &TranslationTable, page: PageNumber) {
        let _irq = IrqGuard::new(self.processor());
        table.clear_io(page);
    }
}
