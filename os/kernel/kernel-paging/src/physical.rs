use crate::addresses::FrameNumber;
use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;
use kernel_info::MemoryConfig;
use kernel_sync::SpinMutex;

/// Main memory: `num_phys_pages` frames of `page_size` bytes.
pub struct PhysicalMemory {
    page_size: usize,
    bytes: SpinMutex<Vec<u8>>,
}

impl PhysicalMemory {
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            page_size: config.page_size,
            bytes: SpinMutex::new(vec![0; config.physical_bytes()]),
        }
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.bytes.lock().len() / self.page_size
    }

    const fn frame_range(&self, frame: FrameNumber) -> Range<usize> {
        let start = frame.address(self.page_size, 0);
        start..start + self.page_size
    }

    /// Copies frame `frame` into `page`, which must be one page long.
    pub fn read_frame(&self, frame: FrameNumber, page: &mut [u8]) {
        page.copy_from_slice(&self.bytes.lock()[self.frame_range(frame)]);
    }

    /// Overwrites frame `frame` with `page`, which must be one page long.
    pub fn write_frame(&self, frame: FrameNumber, page: &[u8]) {
        self.bytes.lock()[self.frame_range(frame)].copy_from_slice(page);
    }

    pub fn zero_frame(&self, frame: FrameNumber) {
        self.bytes.lock()[self.frame_range(frame)].fill(0);
    }

    /// Copies `buf.len()` bytes starting at physical address `addr`.
    pub fn read(&self, addr: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.bytes.lock()[addr..addr + buf.len()]);
    }

    /// Writes `data` starting at physical address `addr`.
    pub fn write(&self, addr: usize, data: &[u8]) {
        self.bytes.lock()[addr..addr + data.len()].copy_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_disjoint_page_sized_windows() {
        let mem = PhysicalMemory::new(&MemoryConfig::DEFAULT.with_page_size(4).with_num_phys_pages(3));
        assert_eq!(mem.num_frames(), 3);

        mem.write_frame(FrameNumber::new(1), b"abcd");
        let mut page = [0; 4];
        mem.read_frame(FrameNumber::new(0), &mut page);
        assert_eq!(page, [0; 4]);
        mem.read_frame(FrameNumber::new(1), &mut page);
        assert_eq!(&page, b"abcd");

        let mut bytes = [0; 2];
        mem.read(5, &mut bytes);
        assert_eq!(&bytes, b"bc");
        mem.write(7, b"xy");
        mem.read_frame(FrameNumber::new(2), &mut page);
        assert_eq!(&page, b"y\0\0\0");

        mem.zero_frame(FrameNumber::new(1));
        mem.read_frame(FrameNumber::new(1), &mut page);
        assert_eq!(page, [0; 4]);
    }
}
