//! # Page, Frame and Swap Slot Numbers
//!
//! Newtypes over `usize` so a virtual page number can never be passed where a
//! physical frame or a swap slot is expected.

use core::fmt;

/// Index of a physical page frame.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameNumber(usize);

/// Index of a virtual page within one address space.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageNumber(usize);

/// Index of a page-sized slot on the swap device.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapSlot(usize);

macro_rules! index_newtype {
    ($ty:ident, $prefix:literal) => {
        impl $ty {
            #[inline]
            #[must_use]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            #[inline]
            #[must_use]
            pub const fn as_usize(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $ty {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

index_newtype!(FrameNumber, "F");
index_newtype!(PageNumber, "V");
index_newtype!(SwapSlot, "S");

impl PageNumber {
    /// The page containing byte `addr` for pages of `page_size` bytes.
    #[inline]
    #[must_use]
    pub const fn containing(addr: usize, page_size: usize) -> Self {
        Self(addr / page_size)
    }
}

impl FrameNumber {
    /// Physical address of byte `offset` within this frame.
    #[inline]
    #[must_use]
    pub const fn address(self, page_size: usize, offset: usize) -> usize {
        self.0 * page_size + offset
    }
}
