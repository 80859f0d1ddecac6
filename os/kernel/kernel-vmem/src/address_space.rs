//! # Address Space
//!
//! Per-process description of user memory: up to [`MAX_REGIONS`] regions
//! defined by the program loader plus a fixed [`STACK_PAGES`]-page stack that
//! ends at [`USER_STACK`].
//!
//! ```text
//!  0x0000_0000                                           USER_STACK
//!   │   ┌──────────┐      ┌────────┐              ┌────────────┐│
//!   │   │ region 0 │      │region 1│              │   stack    ││ kseg0 ...
//!   │   └──────────┘      └────────┘              └────────────┘│
//! ```
//!
//! Every page is backed by its own frame from the [`FrameAllocator`], recorded
//! in the segment's [`PageTable`]. Frames are allocated and zeroed up front by
//! [`prepare_load`](AddressSpace::prepare_load); faults never allocate.
//!
//! ## Lifecycle
//!
//! ```text
//! create ─► define_region ×≤2 ─► prepare_load ─► complete_load ─► destroy
//!  Created     RegionsDefined        Loading          Ready       (consumed)
//! ```
//!
//! After [`complete_load`](AddressSpace::complete_load) the first region
//! (the program text) is mapped read-only.
//!
//! A failed `prepare_load` or `copy` leaves every frame it did allocate
//! recorded; [`destroy`](AddressSpace::destroy) returns them.

use crate::VmError;
use crate::page_table::PageTable;
use crate::tlb::{Tlb, flush_all};
use core::iter;
use kernel_alloc::{FrameAllocator, PhysMapper};
use kernel_info::memory::{MAX_REGIONS, STACK_PAGES, USER_STACK, USER_STACK_BASE, USER_STACK_TOP};
use kernel_memory_addresses::{
    PhysicalAddress, PhysicalPage, VirtualAddress, VirtualPage, pages_for,
};
use kernel_sync::InterruptControl;
use log::{debug, warn};

/// Access rights requested for a region.
///
/// Recorded but not enforced: regions are writable while loading, and only
/// the first region becomes read-only afterwards.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Permissions {
    pub const RW: Self = Self::new(true, true, false);
    pub const RX: Self = Self::new(true, false, true);

    #[must_use]
    pub const fn new(read: bool, write: bool, execute: bool) -> Self {
        Self {
            read,
            write,
            execute,
        }
    }
}

/// Which part of an address space a page belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Segment {
    /// One of the loader-defined regions, by definition order.
    Region(usize),
    Stack,
}

/// A page-aligned, fixed-size range of virtual pages and its backing frames.
#[derive(Debug)]
pub struct Region {
    base: VirtualPage,
    pages: usize,
    perms: Permissions,
    table: PageTable,
}

impl Region {
    fn new(base: VirtualPage, pages: usize, perms: Permissions) -> Result<Self, VmError> {
        Ok(Self {
            base,
            pages,
            perms,
            table: PageTable::with_pages(pages)?,
        })
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> VirtualPage {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn pages(&self) -> usize {
        self.pages
    }

    /// First page past the region.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualPage {
        self.base.add_pages(self.pages as u64)
    }

    #[inline]
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        self.perms
    }

    #[inline]
    #[must_use]
    pub const fn page_table(&self) -> &PageTable {
        &self.table
    }

    /// Page-table index of `page`, if the region contains it.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn index_of(&self, page: VirtualPage) -> Option<usize> {
        let idx = page.number().checked_sub(self.base.number())? as usize;
        (idx < self.pages).then_some(idx)
    }

    fn overlaps(&self, base: VirtualPage, end: VirtualPage) -> bool {
        base < self.end() && self.base < end
    }

    /// Back every page without a frame by a fresh, zeroed one.
    fn populate<M: PhysMapper>(&mut self, frames: &FrameAllocator<M>) -> Result<(), VmError> {
        for index in 0..self.table.len() {
            if self.table.get(index).is_some() {
                continue;
            }
            let frame = frames.alloc_frames(1)?;
            // SAFETY: freshly allocated; nobody else knows the frame yet.
            unsafe { frames.zero_frame(frame) };
            self.table.set(index, frame);
        }
        Ok(())
    }
}

/// Lifecycle state, see the [module docs](self).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AsState {
    Created,
    RegionsDefined,
    Loading,
    Ready,
}

/// Result of looking up a virtual page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub segment: Segment,
    /// Backing frame; `None` until the segment is prepared.
    pub frame: Option<PhysicalPage>,
}

#[derive(Debug)]
pub struct AddressSpace {
    regions: [Option<Region>; MAX_REGIONS],
    stack: Region,
    prepared: bool,
    load_complete: bool,
}

impl AddressSpace {
    /// Empty address space: no regions, stack not yet backed.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] if the kernel heap is exhausted.
    pub fn create() -> Result<Self, VmError> {
        let stack_base = VirtualPage::containing_address(VirtualAddress::new(USER_STACK_BASE));
        Ok(Self {
            regions: [const { None }; MAX_REGIONS],
            stack: Region::new(stack_base, STACK_PAGES, Permissions::RW)?,
            prepared: false,
            load_complete: false,
        })
    }

    #[must_use]
    pub fn state(&self) -> AsState {
        if self.load_complete {
            AsState::Ready
        } else if self.prepared {
            AsState::Loading
        } else if self.regions.iter().any(Option::is_some) {
            AsState::RegionsDefined
        } else {
            AsState::Created
        }
    }

    /// Region `index` in definition order.
    #[must_use]
    pub fn region(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)?.as_ref()
    }

    #[must_use]
    pub const fn stack(&self) -> &Region {
        &self.stack
    }

    #[inline]
    #[must_use]
    pub const fn is_load_complete(&self) -> bool {
        self.load_complete
    }

    /// Regions in definition order, then the stack.
    pub fn segments(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().flatten().chain(iter::once(&self.stack))
    }

    fn segments_mut(&mut self) -> impl Iterator<Item = &mut Region> {
        self.regions
            .iter_mut()
            .flatten()
            .chain(iter::once(&mut self.stack))
    }

    /// Define the next region to cover `[vaddr, vaddr + size)`, widened to
    /// whole pages.
    ///
    /// # Errors
    /// - [`VmError::UnsupportedLayout`] if both regions are already defined,
    ///   the space was already prepared, or the range overlaps another
    ///   segment or leaves user space. Existing regions are unchanged.
    /// - [`VmError::OutOfMemory`] if the page table cannot be allocated.
    pub fn define_region(
        &mut self,
        vaddr: VirtualAddress,
        size: u64,
        perms: Permissions,
    ) -> Result<(), VmError> {
        if self.prepared {
            warn!("region at {vaddr} defined after prepare_load");
            return Err(VmError::UnsupportedLayout);
        }

        let Some(bytes) = size
            .checked_add(vaddr.offset())
            .filter(|&b| vaddr.as_u64() < USER_STACK_TOP && b <= USER_STACK_TOP)
        else {
            warn!("region at {vaddr} of {size:#x} bytes exceeds user space");
            return Err(VmError::UnsupportedLayout);
        };

        let base = vaddr.page();
        let pages = pages_for(bytes);
        let end = base.add_pages(pages);
        if end.base().as_u64() > USER_STACK_TOP || self.segments().any(|s| s.overlaps(base, end)) {
            warn!("region {base}..{end} collides with the existing layout");
            return Err(VmError::UnsupportedLayout);
        }

        let Some(slot) = self.regions.iter_mut().find(|r| r.is_none()) else {
            warn!("too many regions: only {MAX_REGIONS} are supported");
            return Err(VmError::UnsupportedLayout);
        };

        #[allow(clippy::cast_possible_truncation)]
        let region = Region::new(base, pages as usize, perms)?;
        debug!("region {base}..{end} ({pages} pages, {perms:?})");
        *slot = Some(region);
        Ok(())
    }

    /// Back every page of every region and of the stack with a zeroed frame.
    ///
    /// Pages that already have a frame keep it, so a call after a partial
    /// failure only fills the gaps.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] when the frame allocator runs dry. The frames
    /// allocated so far stay recorded.
    pub fn prepare_load<M: PhysMapper>(&mut self, frames: &FrameAllocator<M>) -> Result<(), VmError> {
        for segment in self.segments_mut() {
            segment.populate(frames)?;
        }
        self.prepared = true;
        Ok(())
    }

    /// Loading is done; the first region becomes read-only.
    pub const fn complete_load(&mut self) {
        self.load_complete = true;
    }

    /// Initial user stack pointer.
    ///
    /// # Errors
    /// [`VmError::StackNotPrepared`] if the stack has no frames yet.
    pub fn define_stack(&self) -> Result<VirtualAddress, VmError> {
        if self.stack.table.is_populated() {
            Ok(USER_STACK)
        } else {
            Err(VmError::StackNotPrepared)
        }
    }

    /// Duplicate this space: same layout, fresh frames, identical contents.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`]; the partial copy has already been destroyed.
    pub fn copy<M: PhysMapper>(&self, frames: &FrameAllocator<M>) -> Result<Self, VmError> {
        let mut copy = Self::create()?;

        let prepared = copy.copy_layout(self).and_then(|()| copy.prepare_load(frames));
        if let Err(err) = prepared {
            copy.destroy(frames);
            return Err(err);
        }

        for (dst, src) in copy.segments().zip(self.segments()) {
            for index in 0..src.pages {
                if let (Some(d), Some(s)) = (dst.table.get(index), src.table.get(index)) {
                    // SAFETY: `d` was just allocated for the copy; `s` belongs
                    // to `self`, which is borrowed immutably throughout.
                    unsafe { frames.copy_frame(d, s) };
                }
            }
        }

        copy.load_complete = self.load_complete;
        Ok(copy)
    }

    fn copy_layout(&mut self, source: &Self) -> Result<(), VmError> {
        for (dst, src) in self.regions.iter_mut().zip(&source.regions) {
            if let Some(src) = src {
                *dst = Some(Region::new(src.base, src.pages, src.perms)?);
            }
        }
        Ok(())
    }

    /// Return every recorded frame to `frames` and drop the descriptor.
    pub fn destroy<M: PhysMapper>(mut self, frames: &FrameAllocator<M>) {
        let mut released = 0usize;
        for segment in self.segments_mut() {
            for frame in segment.table.drain() {
                frames.free_frames(frame);
                released += 1;
            }
        }
        debug!("address space destroyed, {released} frame(s) released");
    }

    /// Make this the space the TLB translates for.
    pub fn activate<T, C>(&self, tlb: &mut T, irq: &C)
    where
        T: Tlb + ?Sized,
        C: InterruptControl + ?Sized,
    {
        flush_all(tlb, irq);
    }

    /// Nothing to undo; the next [`activate`](Self::activate) flushes the TLB.
    pub const fn deactivate(&self) {}

    /// Segment and frame for `page`, or `None` outside every segment.
    #[must_use]
    pub fn lookup(&self, page: VirtualPage) -> Option<Mapping> {
        let regions = self
            .regions
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (Segment::Region(i), r)));

        regions
            .chain(iter::once((Segment::Stack, &self.stack)))
            .find_map(|(segment, region)| {
                let index = region.index_of(page)?;
                Some(Mapping {
                    segment,
                    frame: region.table.get(index),
                })
            })
    }

    /// Physical address backing `va`, offset included.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (page, offset) = va.split();
        Some(self.lookup(page)?.frame?.join(offset))
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        if self.segments().any(|s| s.table.frames().next().is_some()) {
            warn!("address space dropped without destroy; its frames are leaked");
        }
    }
}
