use crate::{PAGE_FRAME, PAGE_SHIFT, PAGE_SIZE, VirtualAddress};
use core::fmt;

/// Page-aligned base of a user virtual page.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(VirtualAddress);

impl VirtualPage {
    /// The page containing `va` (rounds down).
    #[inline]
    #[must_use]
    pub const fn containing_address(va: VirtualAddress) -> Self {
        Self(VirtualAddress::new(va.as_u64() & PAGE_FRAME))
    }

    /// The page with the given virtual page number.
    #[inline]
    #[must_use]
    pub const fn from_number(number: u64) -> Self {
        Self(VirtualAddress::new(number << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        self.0
    }

    /// Virtual page number (VPN).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0.as_u64() >> PAGE_SHIFT
    }

    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> VirtualAddress {
        debug_assert!(offset < PAGE_SIZE);
        VirtualAddress::new(self.0.as_u64() + offset)
    }

    #[inline]
    #[must_use]
    pub const fn add_pages(self, n: u64) -> Self {
        Self(VirtualAddress::new(self.0.as_u64() + n * PAGE_SIZE))
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage(0x{:08X})", self.0.as_u64())
    }
}
