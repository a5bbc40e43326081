//! # Translation Table
//!
//! One [`PageTableEntry`] per virtual page of an address space. The entry
//! carries the state bits the pager and the MMU path share and the backing
//! store locator (`disk`) that says where the page content lives while it is
//! not resident.

use crate::addresses::{FrameNumber, PageNumber, SwapSlot};
use alloc::vec;
use alloc::vec::Vec;
use bitfield_struct::bitfield;
use kernel_sync::SpinMutex;

/// State bits of one virtual page.
///
/// ### Bit layout
///
/// | Bits   | Name            | Meaning |
/// |--------|-----------------|---------|
/// | 0      | `valid`         | Page is resident; `frame` holds its frame |
/// | 1      | `io`            | A fault on this page is being resolved |
/// | 2      | `swap`          | Content lives on swap (`disk` is the slot, pending while `None`) |
/// | 3      | `referenced`    | U bit, set by the MMU on every access |
/// | 4      | `modified`      | M bit, set by the MMU on writes |
/// | 5      | `read_allowed`  | Reads permitted |
/// | 6      | `write_allowed` | Writes permitted |
/// | 7      | `mapped`        | Page belongs to a mapped region |
/// | 8–31   | reserved        | |
/// | 32–63  | `frame`         | Physical frame number, meaningful while `valid` |
///
/// ```rust
/// # use kernel_paging::PageEntryBits;
/// let bits = PageEntryBits::new().with_mapped(true).with_read_allowed(true);
/// assert!(bits.mapped());
/// assert!(!bits.valid());
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    pub valid: bool,
    pub io: bool,
    pub swap: bool,
    pub referenced: bool,
    pub modified: bool,
    pub read_allowed: bool,
    pub write_allowed: bool,
    pub mapped: bool,
    #[bits(24)]
    __: u32,
    #[bits(32)]
    pub frame: u32,
}

impl PageEntryBits {
    #[inline]
    #[must_use]
    pub const fn frame_number(&self) -> FrameNumber {
        FrameNumber::new(self.frame() as usize)
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn set_frame_number(&mut self, frame: FrameNumber) {
        // Frame tables are limited to u32::MAX frames on construction.
        self.set_frame(frame.as_usize() as u32);
    }
}

/// Where the content of a non-resident page comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backing {
    /// Anonymous page never written back: zero-filled on first touch.
    Zero,
    /// Read from the executable file at this byte offset.
    Executable(usize),
    /// Read back from this swap slot.
    Swap(SwapSlot),
    /// Being written to swap; the slot is not known yet.
    SwapPending,
}

/// A translation table entry: state bits plus backing store locator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PageTableEntry {
    pub bits: PageEntryBits,
    /// Swap slot when `bits.swap()` is set, executable offset otherwise.
    pub disk: Option<usize>,
}

impl PageTableEntry {
    #[must_use]
    pub const fn backing(&self) -> Backing {
        match (self.bits.swap(), self.disk) {
            (true, Some(slot)) => Backing::Swap(SwapSlot::new(slot)),
            (true, None) => Backing::SwapPending,
            (false, Some(offset)) => Backing::Executable(offset),
            (false, None) => Backing::Zero,
        }
    }

    /// Swap slot holding a copy of the page, if any.
    #[must_use]
    pub const fn swap_slot(&self) -> Option<SwapSlot> {
        match self.backing() {
            Backing::Swap(slot) => Some(slot),
            _ => None,
        }
    }
}

/// Outcome of [`TranslationTable::claim_io`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IoClaim {
    /// The page became resident; nothing to do.
    Resident,
    /// Another thread is resolving a fault on the page.
    Busy,
    /// The caller now owns the fault resolution (`io` is set).
    Claimed,
}

/// Per-address-space table of [`PageTableEntry`] values.
///
/// Accessors index by [`PageNumber`] and panic on pages beyond
/// [`len`](Self::len); callers range-check first.
pub struct TranslationTable {
    entries: SpinMutex<Vec<PageTableEntry>>,
}

impl TranslationTable {
    /// A table of `pages` unmapped entries.
    #[must_use]
    pub fn new(pages: usize) -> Self {
        Self {
            entries: SpinMutex::new(vec![PageTableEntry::default(); pages]),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the entry for `page`, `None` when out of range.
    #[must_use]
    pub fn entry(&self, page: PageNumber) -> Option<PageTableEntry> {
        self.entries.lock().get(page.as_usize()).copied()
    }

    /// Runs `f` on the entry for `page` as one step.
    pub fn update<R>(&self, page: PageNumber, f: impl FnOnce(&mut PageTableEntry) -> R) -> R {
        f(&mut self.entries.lock()[page.as_usize()])
    }

    fn bits(&self, page: PageNumber) -> PageEntryBits {
        self.entries.lock()[page.as_usize()].bits
    }

    #[must_use]
    pub fn is_valid(&self, page: PageNumber) -> bool {
        self.bits(page).valid()
    }

    pub fn set_valid(&self, page: PageNumber) {
        self.update(page, |e| e.bits.set_valid(true));
    }

    pub fn clear_valid(&self, page: PageNumber) {
        self.update(page, |e| e.bits.set_valid(false));
    }

    #[must_use]
    pub fn is_io(&self, page: PageNumber) -> bool {
        self.bits(page).io()
    }

    pub fn clear_io(&self, page: PageNumber) {
        self.update(page, |e| e.bits.set_io(false));
    }

    #[must_use]
    pub fn is_swap(&self, page: PageNumber) -> bool {
        self.bits(page).swap()
    }

    #[must_use]
    pub fn is_referenced(&self, page: PageNumber) -> bool {
        self.bits(page).referenced()
    }

    pub fn set_referenced(&self, page: PageNumber) {
        self.update(page, |e| e.bits.set_referenced(true));
    }

    pub fn clear_referenced(&self, page: PageNumber) {
        self.update(page, |e| e.bits.set_referenced(false));
    }

    #[must_use]
    pub fn is_modified(&self, page: PageNumber) -> bool {
        self.bits(page).modified()
    }

    pub fn set_modified(&self, page: PageNumber) {
        self.update(page, |e| e.bits.set_modified(true));
    }

    pub fn clear_modified(&self, page: PageNumber) {
        self.update(page, |e| e.bits.set_modified(false));
    }

    #[must_use]
    pub fn frame(&self, page: PageNumber) -> FrameNumber {
        self.bits(page).frame_number()
    }

    pub fn set_frame(&self, page: PageNumber, frame: FrameNumber) {
        self.update(page, |e| e.bits.set_frame_number(frame));
    }

    #[must_use]
    pub fn disk(&self, page: PageNumber) -> Option<usize> {
        self.entries.lock()[page.as_usize()].disk
    }

    pub fn set_disk(&self, page: PageNumber, disk: Option<usize>) {
        self.update(page, |e| e.disk = disk);
    }

    /// Starts a fault resolution unless one is running or the page is resident.
    pub fn claim_io(&self, page: PageNumber) -> IoClaim {
        self.update(page, |e| {
            if e.bits.io() {
                IoClaim::Busy
            } else if e.bits.valid() {
                IoClaim::Resident
            } else {
                e.bits.set_io(true);
                IoClaim::Claimed
            }
        })
    }

    /// Records an MMU access: sets U, and M for writes.
    ///
    /// Returns the frame when the page is resident, `None` (and no bit
    /// changes) when it is not.
    pub fn touch(&self, page: PageNumber, write: bool) -> Option<FrameNumber> {
        self.update(page, |e| {
            if !e.bits.valid() {
                return None;
            }
            e.bits.set_referenced(true);
            if write {
                e.bits.set_modified(true);
            }
            Some(e.bits.frame_number())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_bits_layout() {
        let bits = PageEntryBits::new()
            .with_valid(true)
            .with_modified(true)
            .with_frame(5);
        assert_eq!(bits.into_bits(), (5 << 32) | 0b1_0001);
        assert_eq!(bits.frame_number(), FrameNumber::new(5));
    }

    #[test]
    fn backing_follows_swap_bit_and_locator() {
        let mut e = PageTableEntry::default();
        assert_eq!(e.backing(), Backing::Zero);
        e.disk = Some(256);
        assert_eq!(e.backing(), Backing::Executable(256));
        e.bits.set_swap(true);
        assert_eq!(e.backing(), Backing::Swap(SwapSlot::new(256)));
        assert_eq!(e.swap_slot(), Some(SwapSlot::new(256)));
        e.disk = None;
        assert_eq!(e.backing(), Backing::SwapPending);
        assert_eq!(e.swap_slot(), None);
    }

    #[test]
    fn claim_io_serializes_fault_resolution() {
        let t = TranslationTable::new(2);
        let p = PageNumber::new(1);
        assert_eq!(t.claim_io(p), IoClaim::Claimed);
        assert!(t.is_io(p));
        assert_eq!(t.claim_io(p), IoClaim::Busy);

        t.clear_io(p);
        t.set_valid(p);
        assert_eq!(t.claim_io(p), IoClaim::Resident);
        assert!(!t.is_io(p));
    }

    #[test]
    fn touch_sets_usage_bits_only_for_resident_pages() {
        let t = TranslationTable::new(1);
        let p = PageNumber::new(0);
        assert_eq!(t.touch(p, true), None);
        assert!(!t.is_referenced(p));

        t.set_frame(p, FrameNumber::new(3));
        t.set_valid(p);
        assert_eq!(t.touch(p, false), Some(FrameNumber::new(3)));
        assert!(t.is_referenced(p));
        assert!(!t.is_modified(p));
        assert_eq!(t.touch(p, true), Some(FrameNumber::new(3)));
        assert!(t.is_modified(p));
    }

    #[test]
    fn entry_is_none_out_of_range() {
        let t = TranslationTable::new(4);
        assert_eq!(t.len(), 4);
        assert!(t.entry(PageNumber::new(3)).is_some());
        assert!(t.entry(PageNumber::new(4)).is_none());
    }
}
