use crate::{PAGE_FRAME, PAGE_SHIFT, PAGE_SIZE, PhysicalAddress};
use core::fmt;

/// Physical frame base.
///
/// ### Invariants
/// - The low [`PAGE_SHIFT`] bits of the base are always zero.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(PhysicalAddress);

impl PhysicalPage {
    /// The frame containing `pa` (rounds down).
    #[inline]
    #[must_use]
    pub const fn from_addr(pa: PhysicalAddress) -> Self {
        Self(PhysicalAddress::new(pa.as_u64() & PAGE_FRAME))
    }

    /// Interprets `pa` as a frame base, rejecting unaligned addresses.
    #[inline]
    #[must_use]
    pub const fn from_aligned(pa: PhysicalAddress) -> Option<Self> {
        if pa.is_page_aligned() {
            Some(Self(pa))
        } else {
            None
        }
    }

    /// The frame with the given frame number.
    #[inline]
    #[must_use]
    pub const fn from_number(number: u64) -> Self {
        Self(PhysicalAddress::new(number << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        self.0
    }

    /// Frame number, i.e. the base shifted right by [`PAGE_SHIFT`].
    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0.as_u64() >> PAGE_SHIFT
    }

    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> PhysicalAddress {
        debug_assert!(offset < PAGE_SIZE);
        PhysicalAddress::new(self.0.as_u64() + offset)
    }

    /// The frame `n` frames above this one.
    #[inline]
    #[must_use]
    pub const fn add_pages(self, n: u64) -> Self {
        Self(PhysicalAddress::new(self.0.as_u64() + n * PAGE_SIZE))
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage(0x{:08X})", self.0.as_u64())
    }
}
