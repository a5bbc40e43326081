use crate::address_space::AddressSpace;
use crate::addresses::PageNumber;
use crate::backing::{ExecutableFile, SwapDevice};
use crate::fault::{Exception, PageFaultError};
use crate::frame_table::FrameTable;
use alloc::string::String;
use alloc::sync::Arc;
use kernel_info::{ConfigError, MemoryConfig};
use kernel_sync::{IrqGuard, Processor};
use log::debug;

/// Kind of memory access performed through the MMU path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PagingError {
    #[error(transparent)]
    Fault(#[from] PageFaultError),
    #[error("write to read-only page {0}")]
    ReadOnly(PageNumber),
    #[error("page {0} is not readable")]
    NotReadable(PageNumber),
    #[error("address space of {requested} pages exceeds the limit of {max}")]
    TooManyPages { requested: usize, max: usize },
    #[error("pages {start}..{end} exceed the address space of {pages} pages")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        pages: usize,
    },
    #[error("address space has no executable file")]
    NoExecutable,
    #[error("invalid memory configuration")]
    Config(#[from] ConfigError),
}

impl PagingError {
    /// Trap code for an access that failed with this error.
    #[must_use]
    pub fn exception(&self) -> Exception {
        match self {
            Self::Fault(fault) => Exception::from(fault),
            Self::ReadOnly(_) => Exception::ReadOnly,
            Self::NotReadable(_)
            | Self::TooManyPages { .. }
            | Self::RangeOutOfBounds { .. }
            | Self::NoExecutable
            | Self::Config(_) => Exception::AddressError,
        }
    }
}

/// The paging context: frame table, physical memory and swap device.
///
/// Constructed once and shared by reference with every thread that touches
/// paged memory.
pub struct MemoryManager<'k, P: Processor, S: SwapDevice + ?Sized> {
    config: MemoryConfig,
    processor: &'k P,
    swap: &'k S,
    frames: FrameTable<'k, P, S>,
}

impl<'k, P: Processor, S: SwapDevice + ?Sized> MemoryManager<'k, P, S> {
    /// # Errors
    /// The configuration does not validate.
    pub fn new(processor: &'k P, swap: &'k S, config: MemoryConfig) -> Result<Self, ConfigError> {
        let frames = FrameTable::new(processor, swap, &config)?;
        debug!(
            "memory manager: {} frames of {} bytes",
            config.num_phys_pages, config.page_size
        );
        Ok(Self {
            config,
            processor,
            swap,
            frames,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    #[must_use]
    pub const fn processor(&self) -> &'k P {
        self.processor
    }

    #[must_use]
    pub const fn swap(&self) -> &'k S {
        self.swap
    }

    #[must_use]
    pub const fn frame_table(&self) -> &FrameTable<'k, P, S> {
        &self.frames
    }

    /// Creates an empty address space of `pages` virtual pages.
    ///
    /// # Errors
    /// [`PagingError::TooManyPages`] beyond `max_virt_pages`.
    pub fn new_address_space(
        &self,
        name: impl Into<String>,
        pages: usize,
        executable: Option<Arc<dyn ExecutableFile>>,
    ) -> Result<Arc<AddressSpace>, PagingError> {
        if pages > self.config.max_virt_pages {
            return Err(PagingError::TooManyPages {
                requested: pages,
                max: self.config.max_virt_pages,
            });
        }
        Ok(Arc::new(AddressSpace::new(
            name,
            pages,
            self.config.page_size,
            executable,
        )))
    }

    /// MMU translation of virtual address `addr`.
    ///
    /// Faults the page in as often as needed, then records the access in the
    /// U/M bits and returns the physical address.
    ///
    /// # Errors
    /// Permission violations, and whatever [`page_fault`](Self::page_fault)
    /// reports.
    pub fn translate(
        &self,
        space: &Arc<AddressSpace>,
        addr: usize,
        access: Access,
    ) -> Result<usize, PagingError> {
        let page_size = self.config.page_size;
        let page = PageNumber::containing(addr, page_size);
        let table = space.table();
        loop {
            let entry = table
                .entry(page)
                .ok_or(PageFaultError::OutOfRange(page))?;
            if !entry.bits.mapped() {
                return Err(PageFaultError::Unmapped(page).into());
            }
            match access {
                Access::Read if !entry.bits.read_allowed() => {
                    return Err(PagingError::NotReadable(page));
                }
                Access::Write if !entry.bits.write_allowed() => {
                    return Err(PagingError::ReadOnly(page));
                }
                _ => {}
            }

            let resident = {
                let _irq = IrqGuard::new(self.processor);
                table.touch(page, access == Access::Write)
            };
            if let Some(frame) = resident {
                return Ok(frame.address(page_size, addr % page_size));
            }
            self.page_fault(space, page)?;
        }
    }

    /// Copies `buf.len()` bytes of `space` starting at `addr` into `buf`.
    ///
    /// # Errors
    /// See [`translate`](Self::translate).
    pub fn read_memory(
        &self,
        space: &Arc<AddressSpace>,
        addr: usize,
        buf: &mut [u8],
    ) -> Result<(), PagingError> {
        let mut done = 0;
        while done < buf.len() {
            let chunk = self.chunk_len(addr + done, buf.len() - done);
            let pa = self.translate(space, addr + done, Access::Read)?;
            self.frames.memory().read(pa, &mut buf[done..done + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Copies `data` into `space` starting at `addr`.
    ///
    /// # Errors
    /// See [`translate`](Self::translate).
    pub fn write_memory(
        &self,
        space: &Arc<AddressSpace>,
        addr: usize,
        data: &[u8],
    ) -> Result<(), PagingError> {
        let mut done = 0;
        while done < data.len() {
            let chunk = self.chunk_len(addr + done, data.len() - done);
            let pa = self.translate(space, addr + done, Access::Write)?;
            self.frames.memory().write(pa, &data[done..done + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Bytes from `addr` to the end of its page, at most `remaining`.
    const fn chunk_len(&self, addr: usize, remaining: usize) -> usize {
        let to_page_end = self.config.page_size - addr % self.config.page_size;
        if to_page_end < remaining {
            to_page_end
        } else {
            remaining
        }
    }

    /// Tears down `space`: frees its frames and its swap slots.
    ///
    /// No thread may run in `space` any more. Returns the number of frames
    /// freed.
    pub fn release_address_space(&self, space: &Arc<AddressSpace>) -> usize {
        let freed = self.frames.release_owned_by(space);
        let table = space.table();
        let mut slots = 0;
        for page in (0..table.len()).map(PageNumber::new) {
            let slot = {
                let _irq = IrqGuard::new(self.processor);
                table.update(page, |e| {
                    let slot = e.swap_slot()?;
                    e.bits.set_swap(false);
                    e.disk = None;
                    Some(slot)
                })
            };
            if let Some(slot) = slot {
                self.swap.release_page(slot);
                slots += 1;
            }
        }
        debug!(
            "released {}: {freed} frame(s), {slots} swap slot(s)",
            space.name()
        );
        freed
    }
}
