use crate::addresses::PageNumber;
use crate::backing::ExecutableFile;
use crate::manager::PagingError;
use crate::translation::{PageEntryBits, TranslationTable};
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use core::ops::Range;

/// A process address space: its translation table and the executable its
/// file-backed pages are read from.
///
/// Address spaces are shared through [`Arc`]: the owning process holds one
/// reference and every frame record of a resident page holds another as its
/// owner back-link.
pub struct AddressSpace {
    name: String,
    page_size: usize,
    table: TranslationTable,
    executable: Option<Arc<dyn ExecutableFile>>,
}

impl AddressSpace {
    /// An address space of `pages` unmapped pages.
    pub fn new(
        name: impl Into<String>,
        pages: usize,
        page_size: usize,
        executable: Option<Arc<dyn ExecutableFile>>,
    ) -> Self {
        Self {
            name: name.into(),
            page_size,
            table: TranslationTable::new(pages),
            executable,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn table(&self) -> &TranslationTable {
        &self.table
    }

    #[must_use]
    pub fn executable(&self) -> Option<&dyn ExecutableFile> {
        self.executable.as_deref()
    }

    /// Number of virtual pages.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Maps `pages` as zero-filled anonymous memory (stack, bss, heap).
    ///
    /// # Errors
    /// [`PagingError::RangeOutOfBounds`] if the range exceeds the table.
    pub fn map_anonymous(&self, pages: Range<usize>, writable: bool) -> Result<(), PagingError> {
        self.check_range(&pages)?;
        for page in pages {
            self.table.update(PageNumber::new(page), |e| {
                e.bits = mapped_bits(writable);
                e.disk = None;
            });
        }
        Ok(())
    }

    /// Maps `pages` to consecutive pages of the executable, the first one
    /// starting at byte `file_offset`.
    ///
    /// # Errors
    /// [`PagingError::NoExecutable`] if the address space has no executable
    /// file, [`PagingError::RangeOutOfBounds`] if the range exceeds the table.
    pub fn map_executable(
        &self,
        pages: Range<usize>,
        file_offset: usize,
        writable: bool,
    ) -> Result<(), PagingError> {
        if self.executable.is_none() {
            return Err(PagingError::NoExecutable);
        }
        self.check_range(&pages)?;
        for (i, page) in pages.enumerate() {
            let offset = file_offset + i * self.page_size;
            self.table.update(PageNumber::new(page), |e| {
                e.bits = mapped_bits(writable);
                e.disk = Some(offset);
            });
        }
        Ok(())
    }

    fn check_range(&self, pages: &Range<usize>) -> Result<(), PagingError> {
        let len = self.table.len();
        if pages.start > pages.end || pages.end > len {
            return Err(PagingError::RangeOutOfBounds {
                start: pages.start,
                end: pages.end,
                pages: len,
            });
        }
        Ok(())
    }
}

const fn mapped_bits(writable: bool) -> PageEntryBits {
    PageEntryBits::new()
        .with_mapped(true)
        .with_read_allowed(true)
        .with_write_allowed(writable)
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("name", &self.name)
            .field("pages", &self.pages())
            .field("executable", &self.executable.is_some())
            .finish()
    }
}
