//! # Early-boot RAM stealing
//!
//! Before the frame table exists, physical memory is handed out by bumping a
//! cursor through the RAM the firmware reported as free. Frames taken this way
//! are never returned: once the frame table is carved out of whatever is left,
//! the stolen range is permanently below its base.

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, align_down, align_up};

/// The not-yet-managed part of physical RAM: `[first_free, last)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootMemory {
    first_free: PhysicalAddress,
    last: PhysicalAddress,
}

impl BootMemory {
    /// Describe free RAM between `first_free` and `last`. The range is shrunk
    /// to whole frames.
    #[must_use]
    pub const fn new(first_free: PhysicalAddress, last: PhysicalAddress) -> Self {
        let lo = align_up(first_free.as_u64(), PAGE_SIZE);
        let hi = align_down(last.as_u64(), PAGE_SIZE);
        let lo = if lo > hi { hi } else { lo };
        Self {
            first_free: PhysicalAddress::new(lo),
            last: PhysicalAddress::new(hi),
        }
    }

    /// First address not yet handed out.
    #[must_use]
    pub const fn first_free(&self) -> PhysicalAddress {
        self.first_free
    }

    /// One past the last byte of RAM.
    #[must_use]
    pub const fn last(&self) -> PhysicalAddress {
        self.last
    }

    /// Number of whole frames still available.
    #[must_use]
    pub const fn remaining_frames(&self) -> u64 {
        (self.last.as_u64() - self.first_free.as_u64()) / PAGE_SIZE
    }

    /// Take `npages` contiguous frames off the bottom of free RAM.
    pub fn steal(&mut self, npages: u64) -> Option<PhysicalPage> {
        let size = npages.checked_mul(PAGE_SIZE)?;
        let end = self.first_free.as_u64().checked_add(size)?;
        if npages == 0 || end > self.last.as_u64() {
            return None;
        }
        let page = PhysicalPage::from_addr(self.first_free);
        self.first_free = PhysicalAddress::new(end);
        Some(page)
    }

    /// Hand the whole remaining range over to its next owner. Later
    /// [`steal`](Self::steal) calls fail.
    pub const fn take_remaining(&mut self) -> (PhysicalAddress, PhysicalAddress) {
        let range = (self.first_free, self.last);
        self.first_free = self.last;
        range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_shrunk_to_whole_frames() {
        let mem = BootMemory::new(PhysicalAddress::new(0x1234), PhysicalAddress::new(0x9FFF));
        assert_eq!(mem.first_free().as_u64(), 0x2000);
        assert_eq!(mem.last().as_u64(), 0x9000);
        assert_eq!(mem.remaining_frames(), 7);
    }

    #[test]
    fn steal_bumps_and_never_returns() {
        let mut mem = BootMemory::new(PhysicalAddress::new(0x1000), PhysicalAddress::new(0x5000));
        assert_eq!(mem.steal(2).map(|p| p.base().as_u64()), Some(0x1000));
        assert_eq!(mem.steal(1).map(|p| p.base().as_u64()), Some(0x3000));
        assert_eq!(mem.steal(2), None);
        assert_eq!(mem.steal(1).map(|p| p.base().as_u64()), Some(0x4000));
        assert_eq!(mem.steal(1), None);
    }

    #[test]
    fn zero_pages_are_refused() {
        let mut mem = BootMemory::new(PhysicalAddress::new(0x1000), PhysicalAddress::new(0x5000));
        assert_eq!(mem.steal(0), None);
        assert_eq!(mem.remaining_frames(), 4);
    }

    #[test]
    fn take_remaining_drains() {
        let mut mem = BootMemory::new(PhysicalAddress::new(0x1000), PhysicalAddress::new(0x5000));
        let _ = mem.steal(1);
        let (lo, hi) = mem.take_remaining();
        assert_eq!((lo.as_u64(), hi.as_u64()), (0x2000, 0x5000));
        assert_eq!(mem.remaining_frames(), 0);
        assert_eq!(mem.steal(1), None);
    }
}
