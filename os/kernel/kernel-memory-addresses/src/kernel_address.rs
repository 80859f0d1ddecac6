use core::fmt;

/// Kernel-virtual address inside the direct-mapped window.
///
/// This is what `alloc_kpages` hands to the rest of the kernel. Unlike a
/// [`PhysicalAddress`](crate::PhysicalAddress) it can be turned into a pointer;
/// the translation between the two lives in exactly one place
/// (`kernel_alloc::phys_mapper`).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct KernelAddress(u64);

impl KernelAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reinterpret as a raw pointer.
    ///
    /// Producing the pointer is safe; dereferencing it is only valid while the
    /// direct map covers the address.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as usize as *mut T
    }
}

impl fmt::Debug for KernelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVA(0x{:08X})", self.0)
    }
}

impl fmt::Display for KernelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u64> for KernelAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}
