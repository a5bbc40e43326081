//! # Memory Configuration

use alloc::string::{String, ToString};
use serde::Deserialize;

/// Bytes per page (and per frame) unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 128;

/// Number of physical page frames unless configured otherwise.
pub const DEFAULT_NUM_PHYS_PAGES: usize = 20;

/// Upper bound on the number of virtual pages of one address space.
pub const DEFAULT_MAX_VIRT_PAGES: usize = 1024;

/// Number of page-sized slots on the swap device.
pub const DEFAULT_NUM_SWAP_SLOTS: usize = 1024;

/// Sizes of the paged memory system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Bytes per page and per frame. A power of two.
    pub page_size: usize,
    /// Number of physical frames managed by the frame table.
    pub num_phys_pages: usize,
    /// Largest virtual address space, in pages.
    pub max_virt_pages: usize,
    /// Capacity of the swap device, in pages.
    pub num_swap_slots: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl MemoryConfig {
    pub const DEFAULT: Self = Self {
        page_size: DEFAULT_PAGE_SIZE,
        num_phys_pages: DEFAULT_NUM_PHYS_PAGES,
        max_virt_pages: DEFAULT_MAX_VIRT_PAGES,
        num_swap_slots: DEFAULT_NUM_SWAP_SLOTS,
    };

    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn with_num_phys_pages(mut self, num_phys_pages: usize) -> Self {
        self.num_phys_pages = num_phys_pages;
        self
    }

    #[must_use]
    pub const fn with_max_virt_pages(mut self, max_virt_pages: usize) -> Self {
        self.max_virt_pages = max_virt_pages;
        self
    }

    #[must_use]
    pub const fn with_num_swap_slots(mut self, num_swap_slots: usize) -> Self {
        self.num_swap_slots = num_swap_slots;
        self
    }

    /// Size of physical memory in bytes, saturating for configurations
    /// that [`validate`](Self::validate) rejects.
    #[must_use]
    pub const fn physical_bytes(&self) -> usize {
        self.page_size.saturating_mul(self.num_phys_pages)
    }

    /// Checks the sizes are usable.
    ///
    /// # Errors
    /// - [`ConfigError::PageSize`] unless the page size is a non-zero power of two.
    /// - [`ConfigError::NoFrames`] / [`ConfigError::NoVirtualPages`] for empty
    ///   physical or virtual memory.
    /// - [`ConfigError::TooManyFrames`] if a frame number does not fit the
    ///   32-bit frame field of a translation entry.
    /// - [`ConfigError::PhysicalTooLarge`] / [`ConfigError::VirtualTooLarge`]
    ///   if a byte address would not fit a `usize`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.page_size.is_power_of_two() {
            return Err(ConfigError::PageSize(self.page_size));
        }
        if self.num_phys_pages == 0 {
            return Err(ConfigError::NoFrames);
        }
        if self.max_virt_pages == 0 {
            return Err(ConfigError::NoVirtualPages);
        }
        if u32::try_from(self.num_phys_pages).is_err() {
            return Err(ConfigError::TooManyFrames(self.num_phys_pages));
        }
        if self.page_size.checked_mul(self.num_phys_pages).is_none() {
            return Err(ConfigError::PhysicalTooLarge {
                page_size: self.page_size,
                pages: self.num_phys_pages,
            });
        }
        if self.page_size.checked_mul(self.max_virt_pages).is_none() {
            return Err(ConfigError::VirtualTooLarge {
                page_size: self.page_size,
                pages: self.max_virt_pages,
            });
        }
        Ok(())
    }

    /// Reads a TOML table on top of [`MemoryConfig::DEFAULT`].
    ///
    /// Recognized keys are `PageSize`, `NumPhysPages`, `MaxVirtPages` and
    /// `NumSwapSlots`; missing keys keep their default.
    ///
    /// ```
    /// use kernel_info::memory::MemoryConfig;
    ///
    /// let cfg = MemoryConfig::parse("NumPhysPages = 4 # tiny\nPageSize = 64").unwrap();
    /// assert_eq!(cfg.num_phys_pages, 4);
    /// assert_eq!(cfg.page_size, 64);
    /// assert_eq!(cfg.max_virt_pages, MemoryConfig::DEFAULT.max_virt_pages);
    /// ```
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for malformed TOML, unknown keys and values that
    /// are not unsigned integers, and any [`validate`](Self::validate) error.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("page size {0} is not a non-zero power of two")]
    PageSize(usize),
    #[error("physical memory needs at least one frame")]
    NoFrames,
    #[error("address spaces need at least one virtual page")]
    NoVirtualPages,
    #[error("{0} frames exceed the translation entry frame field")]
    TooManyFrames(usize),
    #[error("{pages} frames of {page_size} bytes overflow the physical address range")]
    PhysicalTooLarge { page_size: usize, pages: usize },
    #[error("{pages} pages of {page_size} bytes overflow the virtual address range")]
    VirtualTooLarge { page_size: usize, pages: usize },
    #[error("malformed configuration: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.message().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_single_fields() {
        let cfg = MemoryConfig::DEFAULT
            .with_page_size(64)
            .with_num_phys_pages(4)
            .with_max_virt_pages(16)
            .with_num_swap_slots(8);
        assert_eq!(
            cfg,
            MemoryConfig {
                page_size: 64,
                num_phys_pages: 4,
                max_virt_pages: 16,
                num_swap_slots: 8,
            }
        );
        assert_eq!(cfg.physical_bytes(), 256);
        assert_eq!(MemoryConfig::default(), MemoryConfig::DEFAULT);
    }

    #[test]
    fn validate_rejects_degenerate_sizes() {
        let d = MemoryConfig::DEFAULT;
        assert_eq!(d.with_page_size(0).validate(), Err(ConfigError::PageSize(0)));
        assert_eq!(
            d.with_page_size(100).validate(),
            Err(ConfigError::PageSize(100))
        );
        assert_eq!(
            d.with_num_phys_pages(0).validate(),
            Err(ConfigError::NoFrames)
        );
        assert_eq!(
            d.with_max_virt_pages(0).validate(),
            Err(ConfigError::NoVirtualPages)
        );
        // A machine without swap is fine.
        assert_eq!(d.with_num_swap_slots(0).validate(), Ok(()));
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn parse_reads_all_keys_and_skips_comments() {
        let text = "\
            # paging setup\n\
            PageSize = 256\n\
            \n\
            NumPhysPages=8   # small machine\n\
            MaxVirtPages = 32\n\
            NumSwapSlots = 0\n";
        let cfg = MemoryConfig::parse(text).unwrap();
        assert_eq!(cfg.page_size, 256);
        assert_eq!(cfg.num_phys_pages, 8);
        assert_eq!(cfg.max_virt_pages, 32);
        assert_eq!(cfg.num_swap_slots, 0);
    }

    #[test]
    fn parse_of_empty_text_is_the_default() {
        assert_eq!(MemoryConfig::parse("").unwrap(), MemoryConfig::DEFAULT);
    }

    #[test]
    fn parse_rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            MemoryConfig::parse("PageSize = 64\nFrames = 3"),
            Err(ConfigError::Parse(msg)) if msg.contains("Frames")
        ));
        assert!(matches!(
            MemoryConfig::parse("\nNumPhysPages"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            MemoryConfig::parse("NumPhysPages = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            MemoryConfig::parse("NumPhysPages = -1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn parse_validates_the_result() {
        assert_eq!(
            MemoryConfig::parse("PageSize = 96"),
            Err(ConfigError::PageSize(96))
        );
        assert_eq!(
            MemoryConfig::parse("PageSize = 1152921504606846976\nNumPhysPages = 32\nNumSwapSlots = 0"),
            Err(ConfigError::PhysicalTooLarge {
                page_size: 1 << 60,
                pages: 32
            })
        );
    }

    #[test]
    fn validate_rejects_sizes_that_overflow() {
        let d = MemoryConfig::DEFAULT;
        let huge = usize::MAX / 2 + 1;
        assert_eq!(
            d.with_page_size(huge).validate(),
            Err(ConfigError::PhysicalTooLarge {
                page_size: huge,
                pages: DEFAULT_NUM_PHYS_PAGES
            })
        );
        assert_eq!(
            d.with_page_size(huge).with_num_phys_pages(1).validate(),
            Err(ConfigError::VirtualTooLarge {
                page_size: huge,
                pages: DEFAULT_MAX_VIRT_PAGES
            })
        );
        assert_eq!(d.with_page_size(huge).physical_bytes(), usize::MAX);
    }

    #[test]
    fn validate_rejects_frames_beyond_the_entry_field() {
        let frames = usize::try_from(u64::from(u32::MAX) + 1).unwrap();
        assert_eq!(
            MemoryConfig::DEFAULT
                .with_page_size(1)
                .with_num_phys_pages(frames)
                .validate(),
            Err(ConfigError::TooManyFrames(frames))
        );
    }
}
