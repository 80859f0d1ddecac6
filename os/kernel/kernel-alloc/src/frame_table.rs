//! # Frame table (coremap)
//!
//! One [`FrameState`] per manageable physical frame, in address order,
//! starting at the table's base frame. Multi-frame allocations form a *run*:
//! every frame but the last is [`FrameState::InUseRunMember`], the last is
//! [`FrameState::InUseRunEnd`]. Releasing the base frame of a run walks
//! forward to the run's end and frees everything on the way.
//!
//! ```text
//!  base                                                      base + N frames
//!   │ Free │ Member │ Member │ End │ Free │ End │ Free │ ... │
//!            └──── run of 3 ─────┘        └ 1 ┘
//! ```
//!
//! Allocation is first-fit in index order without wraparound. Fragmentation is
//! accepted.

use crate::phys_mapper::PhysMapper;
use core::mem::size_of;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, align_up};

/// State of one physical frame.
#[repr(u8)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameState {
    #[default]
    Free,
    /// In use, and the next frame belongs to the same run.
    InUseRunMember,
    /// In use, and the last frame of its run.
    InUseRunEnd,
}

impl FrameState {
    #[inline]
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

/// The frame table proper. Not synchronized; [`FrameAllocator`](crate::FrameAllocator)
/// wraps it in its lock.
pub struct FrameTable<'t> {
    base: PhysicalPage,
    frames: &'t mut [FrameState],
}

impl<'t> FrameTable<'t> {
    /// Manage `frames.len()` frames starting at `base`. All frames start free.
    pub fn new(base: PhysicalPage, frames: &'t mut [FrameState]) -> Self {
        frames.fill(FrameState::Free);
        Self { base, frames }
    }

    /// Build the table inside the RAM range `[lo, hi)`.
    ///
    /// The state array is placed at `lo`; the first managed frame is the first
    /// page boundary after it, so the table's own storage is permanently
    /// reserved. The number of managed frames is recomputed from that base.
    ///
    /// # Safety
    /// `[lo, hi)` must be RAM that nobody else uses, reachable through
    /// `mapper` for the rest of the program.
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn carve<M: PhysMapper>(
        mapper: &M,
        lo: PhysicalAddress,
        hi: PhysicalAddress,
    ) -> FrameTable<'static> {
        let span = hi.as_u64().saturating_sub(lo.as_u64());
        let table_bytes = (span / PAGE_SIZE) * size_of::<FrameState>() as u64;
        let base = align_up(lo.as_u64() + table_bytes, PAGE_SIZE).min(hi.as_u64().max(lo.as_u64()));
        let count = (hi.as_u64().saturating_sub(base) / PAGE_SIZE) as usize;

        // SAFETY: the `count` state bytes at `lo` lie below `base`, inside the
        // range the caller handed over. Zero is `FrameState::Free`, so the
        // slice is fully initialized before it is formed.
        let frames = unsafe {
            core::ptr::write_bytes(mapper.frame_ptr(lo), 0, count * size_of::<FrameState>());
            mapper.phys_slice_mut::<FrameState>(lo, count)
        };
        FrameTable::new(PhysicalPage::from_addr(PhysicalAddress::new(base)), frames)
    }

    /// First managed frame.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalPage {
        self.base
    }

    /// Number of managed frames.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Per-frame states, in address order.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &[FrameState] {
        &*self.frames
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_free()).count()
    }

    /// Table index of `frame`, if it is managed by this table.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn index_of(&self, frame: PhysicalPage) -> Option<usize> {
        let idx = frame.number().checked_sub(self.base.number())? as usize;
        (idx < self.frames.len()).then_some(idx)
    }

    /// Frame at table index `idx`.
    #[inline]
    #[must_use]
    pub const fn frame_at(&self, idx: usize) -> PhysicalPage {
        self.base.add_pages(idx as u64)
    }

    /// First-fit search for `n` contiguous free frames. On success the frames
    /// are marked as one run and the base frame is returned; on failure the
    /// table is left untouched.
    pub fn allocate(&mut self, n: usize) -> Option<PhysicalPage> {
        if n == 0 || n > self.frames.len() {
            return None;
        }

        let len = self.frames.len();
        let mut i = 0;
        while i < len {
            if !self.frames[i].is_free() {
                i += 1;
                continue;
            }

            let mut count = 0;
            while count < n && i + count < len && self.frames[i + count].is_free() {
                count += 1;
            }

            if count == n {
                let run = &mut self.frames[i..i + n];
                run.fill(FrameState::InUseRunMember);
                run[n - 1] = FrameState::InUseRunEnd;
                return Some(self.frame_at(i));
            }

            // frames[i + count] is in use or past the end
            i += count;
        }
        None
    }

    /// Release the run starting at `frame`. Returns the number of frames that
    /// went back to [`FrameState::Free`], or `None` if `frame` is not managed
    /// by this table.
    pub fn release(&mut self, frame: PhysicalPage) -> Option<usize> {
        let start = self.index_of(frame)?;
        let mut freed = 0;
        for state in &mut self.frames[start..] {
            let was = *state;
            if !was.is_free() {
                freed += 1;
            }
            *state = FrameState::Free;
            if was != FrameState::InUseRunMember {
                break;
            }
        }
        Some(freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FrameState::{Free, InUseRunEnd, InUseRunMember};

    fn table(states: &mut [FrameState]) -> FrameTable<'_> {
        FrameTable::new(PhysicalPage::from_number(0x100), states)
    }

    #[test]
    fn runs_are_marked_member_then_end() {
        let mut states = [Free; 6];
        let mut t = table(&mut states);
        let a = t.allocate(3).unwrap();
        assert_eq!(a, PhysicalPage::from_number(0x100));
        assert_eq!(
            t.snapshot(),
            &[InUseRunMember, InUseRunMember, InUseRunEnd, Free, Free, Free]
        );
    }

    #[test]
    fn first_fit_skips_too_small_holes() {
        let mut states = [Free; 8];
        let mut t = table(&mut states);
        let a = t.allocate(1).unwrap();
        let b = t.allocate(2).unwrap();
        let _c = t.allocate(1).unwrap();
        t.release(a);
        t.release(b);
        // Layout now: Free Free Free End Free ...; a 4-run starts after c.
        let d = t.allocate(4).unwrap();
        assert_eq!(t.index_of(d), Some(4));
        // The 3-frame hole at the bottom is still used first for smaller runs.
        let e = t.allocate(3).unwrap();
        assert_eq!(t.index_of(e), Some(0));
    }

    #[test]
    fn exhaustion_leaves_table_untouched() {
        let mut states = [Free; 4];
        let mut t = table(&mut states);
        t.allocate(1).unwrap();
        t.allocate(1).unwrap();
        let before = t.snapshot().to_vec();
        assert!(t.allocate(3).is_none());
        assert!(t.allocate(5).is_none());
        assert!(t.allocate(0).is_none());
        assert_eq!(t.snapshot(), before.as_slice());
    }

    #[test]
    fn release_frees_exactly_one_run() {
        let mut states = [Free; 6];
        let mut t = table(&mut states);
        let a = t.allocate(2).unwrap();
        let b = t.allocate(2).unwrap();
        assert_eq!(t.release(a), Some(2));
        assert_eq!(t.snapshot(), &[Free, Free, InUseRunMember, InUseRunEnd, Free, Free]);
        assert_eq!(t.release(b), Some(2));
        assert_eq!(t.free_count(), 6);
    }

    #[test]
    fn release_of_unmanaged_frame_is_rejected() {
        let mut states = [Free; 2];
        let mut t = table(&mut states);
        assert_eq!(t.release(PhysicalPage::from_number(0x10)), None);
        assert_eq!(t.release(PhysicalPage::from_number(0x102)), None);
    }

    #[test]
    fn round_trip_for_every_size() {
        let mut states = [Free; 16];
        let mut t = table(&mut states);
        t.allocate(1).unwrap();
        for n in 1..=15 {
            let before = t.snapshot().to_vec();
            let run = t.allocate(n).unwrap();
            assert_eq!(t.release(run), Some(n));
            assert_eq!(t.snapshot(), before.as_slice(), "n = {n}");
        }
    }
}
