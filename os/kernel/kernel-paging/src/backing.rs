//! # Backing Store
//!
//! Page content that is not resident comes from one of two collaborators:
//! the executable file of the address space ([`ExecutableFile`]), or the
//! swap device ([`SwapDevice`]). Both are consumed through traits; this
//! module also provides in-memory implementations.

use crate::addresses::SwapSlot;
use alloc::boxed::Box;
use alloc::vec::Vec;
use kernel_info::MemoryConfig;
use kernel_sync::SpinMutex;
use log::trace;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackingError {
    #[error("swap device is full")]
    SwapFull,
    #[error("swap slot {0} holds no page")]
    InvalidSlot(SwapSlot),
    #[error("page buffer of {actual} bytes, expected {expected}")]
    PageSize { expected: usize, actual: usize },
    #[error("address space has no executable file")]
    NoExecutable,
    #[error("device error: {0}")]
    Device(&'static str),
}

/// Read access to the program image backing an address space.
pub trait ExecutableFile: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at byte `offset`.
    ///
    /// Returns the number of bytes read, which is short (possibly zero) at
    /// the end of the file.
    ///
    /// # Errors
    /// Device failures.
    fn read_at(&self, buf: &mut [u8], offset: usize) -> Result<usize, BackingError>;
}

/// Page-granular storage for evicted pages.
///
/// Calls may suspend the calling thread.
pub trait SwapDevice: Sync {
    /// Stores one page and returns the slot it was written to.
    ///
    /// `hint` names the slot the page occupied before, if any; devices
    /// should reuse it.
    ///
    /// # Errors
    /// [`BackingError::SwapFull`] when no slot is left, or device failures.
    fn put_page(&self, hint: Option<SwapSlot>, page: &[u8]) -> Result<SwapSlot, BackingError>;

    /// Reads the page stored in `slot` into `page`.
    ///
    /// # Errors
    /// [`BackingError::InvalidSlot`] for slots holding no page, or device
    /// failures.
    fn get_page(&self, slot: SwapSlot, page: &mut [u8]) -> Result<(), BackingError>;

    /// Marks `slot` unused. Releasing an unused slot does nothing.
    fn release_page(&self, slot: SwapSlot);
}

/// In-memory swap device with a fixed number of page-sized slots.
pub struct SwapArea {
    page_size: usize,
    slots: SpinMutex<Vec<Option<Box<[u8]>>>>,
}

impl SwapArea {
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        let mut slots = Vec::with_capacity(config.num_swap_slots);
        slots.resize_with(config.num_swap_slots, || None);
        Self {
            page_size: config.page_size,
            slots: SpinMutex::new(slots),
        }
    }

    /// Number of slots holding a page.
    #[must_use]
    pub fn used_slots(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    const fn check_size(&self, actual: usize) -> Result<(), BackingError> {
        if actual == self.page_size {
            Ok(())
        } else {
            Err(BackingError::PageSize {
                expected: self.page_size,
                actual,
            })
        }
    }
}

impl SwapDevice for SwapArea {
    fn put_page(&self, hint: Option<SwapSlot>, page: &[u8]) -> Result<SwapSlot, BackingError> {
        self.check_size(page.len())?;
        let mut slots = self.slots.lock();
        let index = hint
            .map(SwapSlot::as_usize)
            .filter(|&i| i < slots.len())
            .or_else(|| slots.iter().position(Option::is_none))
            .ok_or(BackingError::SwapFull)?;
        slots[index] = Some(page.into());
        trace!("PutPageSwap({hint:?}) -> {index}");
        Ok(SwapSlot::new(index))
    }

    fn get_page(&self, slot: SwapSlot, page: &mut [u8]) -> Result<(), BackingError> {
        self.check_size(page.len())?;
        let slots = self.slots.lock();
        let stored = slots
            .get(slot.as_usize())
            .and_then(Option::as_deref)
            .ok_or(BackingError::InvalidSlot(slot))?;
        page.copy_from_slice(stored);
        trace!("GetPageSwap({slot})");
        Ok(())
    }

    fn release_page(&self, slot: SwapSlot) {
        if let Some(s) = self.slots.lock().get_mut(slot.as_usize()) {
            *s = None;
        }
    }
}

/// Program image held in memory.
pub struct ExecutableImage {
    bytes: Vec<u8>,
}

impl ExecutableImage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ExecutableFile for ExecutableImage {
    fn read_at(&self, buf: &mut [u8], offset: usize) -> Result<usize, BackingError> {
        let available = self.bytes.get(offset..).unwrap_or_default();
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}
