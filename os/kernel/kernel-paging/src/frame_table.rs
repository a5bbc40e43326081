//! # Physical Frame Table
//!
//! One record per physical frame plus the free-frame list and the clock hand
//! used for page replacement.
//!
//! ```text
//!              hand
//!               ↓
//!  ┌────┬────┬────┬────┬────┐   U=1, unlocked → clear U, advance
//!  │ F0 │ F1 │ F2 │ F3 │ F4 │   locked        → clear U, advance
//!  └────┴────┴────┴────┴────┘   U=0, unlocked → victim, hand = victim + 1
//! ```
//!
//! Frame records are only changed with interrupts disabled. A frame handed
//! out by [`FrameTable::add_physical_to_virtual_mapping`] is *locked* until
//! the caller has filled it and calls [`FrameTable::unlock_page`]; locked
//! frames are never chosen for eviction.

use crate::address_space::AddressSpace;
use crate::addresses::{FrameNumber, PageNumber, SwapSlot};
use crate::backing::{BackingError, SwapDevice};
use crate::physical::PhysicalMemory;
use crate::translation::PageTableEntry;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use kernel_info::{ConfigError, MemoryConfig};
use kernel_sync::{IrqGuard, IrqMutex, Processor, RawSpin, SpinMutex};
use log::{debug, trace, warn};

/// Snapshot of one frame record.
#[derive(Clone, Debug)]
pub struct FrameInfo {
    pub free: bool,
    pub locked: bool,
    pub owner: Option<Arc<AddressSpace>>,
    /// Meaningful only while the frame is not free.
    pub virtual_page: PageNumber,
}

impl FrameInfo {
    #[must_use]
    pub fn is_owned_by(&self, space: &Arc<AddressSpace>) -> bool {
        self.owner.as_ref().is_some_and(|o| Arc::ptr_eq(o, space))
    }
}

#[derive(Clone)]
struct FrameRecord {
    free: bool,
    locked: bool,
    owner: Option<Arc<AddressSpace>>,
    virtual_page: PageNumber,
}

struct FrameTableState {
    records: Vec<FrameRecord>,
    free_list: VecDeque<FrameNumber>,
    hand: usize,
}

impl FrameTableState {
    fn take_free(&mut self) -> Option<FrameNumber> {
        let frame = self.free_list.pop_front()?;
        let rec = &mut self.records[frame.as_usize()];
        assert!(rec.free, "frame {frame} on the free list is in use");
        rec.free = false;
        Some(frame)
    }

    fn claim(&mut self, frame: FrameNumber, owner: &Arc<AddressSpace>, page: PageNumber) {
        let rec = &mut self.records[frame.as_usize()];
        rec.free = false;
        rec.locked = true;
        rec.owner = Some(Arc::clone(owner));
        rec.virtual_page = page;
    }

    /// Clock scan. Visits at most two full turns: the first clears every U
    /// bit, so the second finds any unlocked frame.
    fn select_victim(&mut self) -> Option<(FrameNumber, Arc<AddressSpace>, PageNumber)> {
        let n = self.records.len();
        for _ in 0..2 * n {
            let index = self.hand;
            self.hand = (self.hand + 1) % n;

            let rec = &self.records[index];
            let Some(owner) = rec.owner.as_ref() else {
                continue;
            };
            let table = owner.table();
            if !rec.locked && !table.is_referenced(rec.virtual_page) {
                return Some((FrameNumber::new(index), Arc::clone(owner), rec.virtual_page));
            }
            table.clear_referenced(rec.virtual_page);
        }
        None
    }
}

/// The allocator's view of physical memory.
pub struct FrameTable<'k, P: Processor, S: SwapDevice + ?Sized> {
    processor: &'k P,
    swap: &'k S,
    memory: PhysicalMemory,
    state: SpinMutex<FrameTableState>,
}

impl<'k, P: Processor, S: SwapDevice + ?Sized> FrameTable<'k, P, S> {
    /// All frames free, hand at frame 0.
    ///
    /// # Errors
    /// Any [`MemoryConfig::validate`] error.
    pub fn new(
        processor: &'k P,
        swap: &'k S,
        config: &MemoryConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let n = config.num_phys_pages;
        let record = FrameRecord {
            free: true,
            locked: false,
            owner: None,
            virtual_page: PageNumber::new(0),
        };
        Ok(Self {
            processor,
            swap,
            memory: PhysicalMemory::new(config),
            state: SpinMutex::new(FrameTableState {
                records: vec![record; n],
                free_list: (0..n).map(FrameNumber::new).collect(),
                hand: 0,
            }),
        })
    }

    fn state(&self) -> IrqMutex<'_, FrameTableState, RawSpin, P> {
        self.state.lock_irq(self.processor)
    }

    #[must_use]
    pub const fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the record of `frame`.
    #[must_use]
    pub fn frame(&self, frame: FrameNumber) -> FrameInfo {
        let st = self.state();
        let rec = &st.records[frame.as_usize()];
        FrameInfo {
            free: rec.free,
            locked: rec.locked,
            owner: rec.owner.clone(),
            virtual_page: rec.virtual_page,
        }
    }

    /// Frame the next eviction scan starts at.
    #[must_use]
    pub fn clock_hand(&self) -> FrameNumber {
        FrameNumber::new(self.state().hand)
    }

    /// Number of frames on the free list.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.state().free_list.len()
    }

    /// Takes a frame off the free list, without evicting.
    ///
    /// The frame is marked in use but has no owner yet.
    pub fn find_free_page(&self) -> Option<FrameNumber> {
        let frame = self.state().take_free();
        trace!("FindFreePage -> {frame:?}");
        frame
    }

    /// Returns a frame for `page` of `owner`, evicting one if none is free.
    ///
    /// The frame comes back **locked**; call [`unlock_page`](Self::unlock_page)
    /// once its content and mapping are in place. Yields while every frame
    /// is locked.
    ///
    /// # Errors
    /// Writing the evicted page to swap failed. The victim keeps its mapping.
    pub fn add_physical_to_virtual_mapping(
        &self,
        owner: &Arc<AddressSpace>,
        page: PageNumber,
    ) -> Result<FrameNumber, BackingError> {
        loop {
            {
                let mut st = self.state();
                if let Some(frame) = st.take_free() {
                    st.claim(frame, owner, page);
                    trace!("map {}:{page} -> free {frame}", owner.name());
                    return Ok(frame);
                }
            }
            if let Some(frame) = self.try_evict()? {
                self.state().claim(frame, owner, page);
                trace!("map {}:{page} -> evicted {frame}", owner.name());
                return Ok(frame);
            }
            warn!("all frames are locked, yielding");
            self.processor.yield_now();
        }
    }

    /// Selects a victim with the clock algorithm and takes its page out of
    /// memory, writing it to swap first if it was modified.
    ///
    /// The victim is returned locked and still recorded under its previous
    /// owner. Yields while every frame is locked.
    ///
    /// # Errors
    /// Writing the page to swap failed. The victim keeps its mapping.
    pub fn evict_page(&self) -> Result<FrameNumber, BackingError> {
        loop {
            if let Some(frame) = self.try_evict()? {
                return Ok(frame);
            }
            warn!("all frames are locked, yielding");
            self.processor.yield_now();
        }
    }

    fn try_evict(&self) -> Result<Option<FrameNumber>, BackingError> {
        let (frame, owner, page, before, write_back) = {
            let mut st = self.state();
            let Some((frame, owner, page)) = st.select_victim() else {
                return Ok(None);
            };
            st.records[frame.as_usize()].locked = true;
            let (before, write_back) = owner.table().update(page, take_out);
            (frame, owner, page, before, write_back)
        };
        debug!(
            "evict {frame} ({}:{page}), write back: {}",
            owner.name(),
            write_back.is_some()
        );

        let Some(hint) = write_back else {
            return Ok(Some(frame));
        };

        let mut buf = vec![0; self.memory.page_size()];
        self.memory.read_frame(frame, &mut buf);
        match self.swap.put_page(hint, &buf) {
            Ok(slot) => {
                let _irq = IrqGuard::new(self.processor);
                owner.table().set_disk(page, Some(slot.as_usize()));
                trace!("{}:{page} -> swap {slot}", owner.name());
                Ok(Some(frame))
            }
            Err(err) => {
                let _irq = IrqGuard::new(self.processor);
                owner.table().update(page, |e| restore(e, &before));
                self.state.lock().records[frame.as_usize()].locked = false;
                warn!("swap-out of {}:{page} failed: {err}", owner.name());
                Err(err)
            }
        }
    }

    /// Marks a frame filled; it becomes eligible for eviction.
    ///
    /// # Panics
    /// If the frame is free or not locked.
    pub fn unlock_page(&self, frame: FrameNumber) {
        let mut st = self.state();
        let rec = &mut st.records[frame.as_usize()];
        assert!(!rec.free, "unlocking free frame {frame}");
        assert!(rec.locked, "unlocking frame {frame} which is not locked");
        rec.locked = false;
    }

    /// Frees a frame and invalidates the page mapped to it.
    ///
    /// # Panics
    /// If the frame is already free.
    pub fn remove_physical_to_virtual_mapping(&self, frame: FrameNumber) {
        self.free_frame(frame, true);
    }

    /// Frees a frame without touching the translation table of its owner.
    ///
    /// Used to give back a frame whose page never became resident in it.
    ///
    /// # Panics
    /// If the frame is already free.
    pub fn release_frame(&self, frame: FrameNumber) {
        self.free_frame(frame, false);
    }

    fn free_frame(&self, frame: FrameNumber, invalidate: bool) {
        let mut st = self.state();
        let rec = &mut st.records[frame.as_usize()];
        assert!(!rec.free, "frame {frame} is already free");
        rec.free = true;
        rec.locked = false;
        if let Some(owner) = rec.owner.take()
            && invalidate
        {
            owner.table().clear_valid(rec.virtual_page);
        }
        st.free_list.push_front(frame);
        trace!("free {frame}");
    }

    /// Rebinds a frame to another address space.
    ///
    /// # Panics
    /// If the frame is free.
    pub fn change_owner(&self, frame: FrameNumber, owner: &Arc<AddressSpace>) {
        let mut st = self.state();
        let rec = &mut st.records[frame.as_usize()];
        assert!(!rec.free, "changing owner of free frame {frame}");
        rec.owner = Some(Arc::clone(owner));
    }

    /// Frees every frame owned by `space`, waiting for locked ones.
    ///
    /// Returns the number of frames freed.
    pub fn release_owned_by(&self, space: &Arc<AddressSpace>) -> usize {
        let mut freed = 0;
        loop {
            let busy = {
                let mut st = self.state();
                let mut busy = 0;
                for index in 0..st.records.len() {
                    let rec = &st.records[index];
                    if !rec.owner.as_ref().is_some_and(|o| Arc::ptr_eq(o, space)) {
                        continue;
                    }
                    if rec.locked {
                        busy += 1;
                        continue;
                    }
                    space.table().clear_valid(rec.virtual_page);
                    let rec = &mut st.records[index];
                    rec.free = true;
                    rec.owner = None;
                    st.free_list.push_front(FrameNumber::new(index));
                    freed += 1;
                }
                busy
            };
            if busy == 0 {
                return freed;
            }
            debug!("{busy} frame(s) of {} locked, yielding", space.name());
            self.processor.yield_now();
        }
    }

    /// Dumps every frame record with the U/M bits of its page at debug level.
    pub fn log_contents(&self) {
        let records = self.state().records.clone();
        debug!("Contents of the frame table ({} frames)", records.len());
        for (i, rec) in records.iter().enumerate() {
            let (owner, u, m) = rec.owner.as_ref().map_or(("-", false, false), |o| {
                (
                    o.name(),
                    o.table().is_referenced(rec.virtual_page),
                    o.table().is_modified(rec.virtual_page),
                )
            });
            debug!(
                "Frame {i} free={} locked={} virtpage={} owner={owner} U={} M={}",
                rec.free,
                rec.locked,
                rec.virtual_page.as_usize(),
                u8::from(u),
                u8::from(m)
            );
        }
    }
}

/// Invalidates a victim's entry and, if it was modified, marks its swap
/// copy pending. Returns the entry as it was and, for modified pages, the
/// swap slot hint.
fn take_out(e: &mut PageTableEntry) -> (PageTableEntry, Option<Option<SwapSlot>>) {
    let before = *e;
    e.bits.set_valid(false);
    if !e.bits.modified() {
        return (before, None);
    }
    let hint = e.swap_slot();
    e.bits.set_swap(true);
    e.bits.set_modified(false);
    e.disk = None;
    (before, Some(hint))
}

/// Undoes [`take_out`]; bits owned by a concurrent fault (`io`, U) are kept.
fn restore(e: &mut PageTableEntry, before: &PageTableEntry) {
    e.bits.set_valid(before.bits.valid());
    e.bits.set_modified(before.bits.modified());
    e.bits.set_swap(before.bits.swap());
    e.bits.set_frame(before.bits.frame());
    e.disk = before.disk;
}
