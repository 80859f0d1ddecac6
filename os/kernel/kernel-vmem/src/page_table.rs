//! # Direct page table
//!
//! One slot per virtual page of a region, holding the physical frame that
//! backs it once the region is prepared. There is no second level and no
//! sharing: a frame recorded here is owned by this table alone.

use crate::VmError;
use alloc::vec::Vec;
use kernel_memory_addresses::PhysicalPage;

#[derive(Debug, Default)]
pub struct PageTable {
    frames: Vec<Option<PhysicalPage>>,
}

impl PageTable {
    /// Table for `pages` pages, none backed yet.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] if the kernel heap cannot hold the table.
    pub fn with_pages(pages: usize) -> Result<Self, VmError> {
        let mut frames = Vec::new();
        frames
            .try_reserve_exact(pages)
            .map_err(|_| VmError::OutOfMemory)?;
        frames.resize(pages, None);
        Ok(Self { frames })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame backing page `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<PhysicalPage> {
        self.frames.get(index).copied().flatten()
    }

    /// Every page has a frame.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.frames.iter().all(Option::is_some)
    }

    /// Recorded frames, in page order.
    pub fn frames(&self) -> impl Iterator<Item = PhysicalPage> + '_ {
        self.frames.iter().flatten().copied()
    }

    pub(crate) fn set(&mut self, index: usize, frame: PhysicalPage) {
        debug_assert!(self.frames[index].is_none(), "page {index} already backed");
        self.frames[index] = Some(frame);
    }

    /// Forget every recorded frame and hand them to the caller.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = PhysicalPage> + '_ {
        self.frames.iter_mut().filter_map(Option::take)
    }
}
