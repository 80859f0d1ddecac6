//! # Physical memory access through kseg0
//!
//! The kernel never dereferences a [`PhysicalAddress`]. Physical RAM is visible
//! through the direct-mapped kseg0 window, and the translation between the two
//! address kinds lives here and nowhere else:
//!
//! ```text
//! KernelAddress = KSEG0_BASE + PhysicalAddress
//! ```
//!
//! [`PhysMapper`] abstracts *how* the bytes behind a physical address are
//! reached, so the frame table, the page-zeroing and the frame-copying code
//! run unchanged on the real direct map ([`Kseg0Mapper`]) and on simulated
//! RAM in hosted tests.

use core::ptr;
use kernel_info::memory::{KSEG0_BASE, KSEG0_SIZE};
use kernel_memory_addresses::{KernelAddress, PAGE_SIZE, PhysicalAddress, PhysicalPage};

/// Physical → kernel-virtual.
#[inline]
#[must_use]
pub const fn phys_to_kernel(pa: PhysicalAddress) -> KernelAddress {
    KernelAddress::new(pa.as_u64() + KSEG0_BASE)
}

/// Kernel-virtual → physical. Addresses outside the kseg0 window have no
/// physical counterpart and yield `None`.
#[inline]
#[must_use]
pub const fn kernel_to_phys(ka: KernelAddress) -> Option<PhysicalAddress> {
    match ka.as_u64().checked_sub(KSEG0_BASE) {
        Some(pa) if pa < KSEG0_SIZE => Some(PhysicalAddress::new(pa)),
        _ => None,
    }
}

/// Reaches the bytes behind a physical address.
///
/// # Safety
/// Implementations must return a pointer that is valid for reads and writes of
/// the addressed byte and everything up to the end of its frame (and, for
/// [`phys_slice_mut`](Self::phys_slice_mut), of every frame the slice spans).
pub unsafe trait PhysMapper {
    /// Pointer to the byte at `pa` in the current address space.
    fn frame_ptr(&self, pa: PhysicalAddress) -> *mut u8;

    /// Convert a physical range to a typed mutable slice of `len` elements.
    ///
    /// # Safety
    /// - `pa` must be suitably aligned for `T` and the bytes must be valid `T`s.
    /// - The caller guarantees exclusive access for `'a`.
    #[inline]
    unsafe fn phys_slice_mut<'a, T>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [T] {
        unsafe { core::slice::from_raw_parts_mut(self.frame_ptr(pa).cast::<T>(), len) }
    }

    /// Fill one frame with zeroes.
    ///
    /// # Safety
    /// The caller must own `frame`; nothing else may access it concurrently.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn zero_frame(&self, frame: PhysicalPage) {
        unsafe { ptr::write_bytes(self.frame_ptr(frame.base()), 0, PAGE_SIZE as usize) }
    }

    /// Copy the contents of `src` into `dst`.
    ///
    /// # Safety
    /// The caller must own `dst`, `src` must not be written concurrently, and
    /// the frames must be distinct.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn copy_frame(&self, dst: PhysicalPage, src: PhysicalPage) {
        debug_assert_ne!(dst, src);
        unsafe {
            ptr::copy_nonoverlapping(
                self.frame_ptr(src.base()).cast_const(),
                self.frame_ptr(dst.base()),
                PAGE_SIZE as usize,
            );
        }
    }
}

/// [`PhysMapper`] for the kseg0 direct map.
///
/// # Safety
/// Only valid in kernel mode, for physical addresses inside the kseg0 window.
#[derive(Debug, Default, Copy, Clone)]
pub struct Kseg0Mapper;

unsafe impl PhysMapper for Kseg0Mapper {
    #[inline]
    fn frame_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        phys_to_kernel(pa).as_mut_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_round_trips() {
        let pa = PhysicalAddress::new(0x0012_3000);
        let ka = phys_to_kernel(pa);
        assert_eq!(ka.as_u64(), 0x8012_3000);
        assert_eq!(kernel_to_phys(ka), Some(pa));
    }

    #[test]
    fn user_addresses_are_not_kernel_addresses() {
        assert_eq!(kernel_to_phys(KernelAddress::new(0x0040_0000)), None);
        // kseg1 and above
        assert_eq!(kernel_to_phys(KernelAddress::new(0xA000_0000)), None);
    }
}
