//! # Physical, Virtual and Kernel Address Types
//!
//! Strongly typed wrappers for the three kinds of addresses the memory
//! subsystem juggles.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] / [`PhysicalPage`] | Location in RAM as seen by the memory bus (TLB `EntryLo` frame numbers). |
//! | [`VirtualAddress`] / [`VirtualPage`] | User address translated through the TLB. |
//! | [`KernelAddress`] | Kernel-virtual address inside the direct-mapped window (kseg0). |
//!
//! Frames and pages are always [`PAGE_SIZE`] bytes. The types are
//! `#[repr(transparent)]` wrappers around `u64` and never convert implicitly
//! into each other: going from a [`PhysicalAddress`] to a [`KernelAddress`] is
//! a single explicit function owned by the allocator crate, so arithmetic on
//! the wrong kind of address does not type-check.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0040_1234);
//! let (page, off) = va.split();
//! assert_eq!(page.base().as_u64(), 0x0040_1000);
//! assert_eq!(off, 0x234);
//! assert_eq!(page.join(off), va);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod kernel_address;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use crate::kernel_address::KernelAddress;
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;
pub use crate::virtual_page::VirtualPage;

/// log2 of the page size; number of low bits used for the in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Size of one page / frame in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Mask selecting the page-number bits of an address.
pub const PAGE_FRAME: u64 = !(PAGE_SIZE - 1);

/// Align `x` down to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0,      4096), 0);
/// assert_eq!(align_down(4095,   4096), 0);
/// assert_eq!(align_down(8191,   4096), 4096);
/// assert_eq!(align_down(0x12345,   16), 0x12340);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
/// - `x + (a - 1)` must **not overflow** `u64`.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(0,       4096), 0);
/// assert_eq!(align_up(1,       4096), 4096);
/// assert_eq!(align_up(4096,    4096), 4096);
/// assert_eq!(align_up(4097,    4096), 8192);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}

/// Number of whole pages needed to cover `bytes` bytes.
#[inline(always)]
#[must_use]
pub const fn pages_for(bytes: u64) -> u64 {
    align_up(bytes, PAGE_SIZE) >> PAGE_SHIFT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_virtual() {
        let va = VirtualAddress::new(0x7FFF_EFFC);
        let (vp, off) = va.split();
        assert_eq!(vp.base().as_u64(), 0x7FFF_E000);
        assert_eq!(off, 0xFFC);
        assert_eq!(vp.join(off), va);
    }

    #[test]
    fn split_and_join_physical() {
        let pa = PhysicalAddress::new(0x0020_3042);
        let (pp, off) = pa.split();
        assert_eq!(pp.base().as_u64() & (PAGE_SIZE - 1), 0);
        assert_eq!(off, 0x42);
        assert_eq!(pp.join(off), pa);
    }

    #[test]
    fn page_arithmetic() {
        let pp = PhysicalPage::from_addr(PhysicalAddress::new(0x5000));
        assert_eq!(pp.add_pages(3).base().as_u64(), 0x8000);
        assert_eq!(pp.number(), 5);

        let vp = VirtualPage::containing_address(VirtualAddress::new(0x0040_0FFF));
        assert_eq!(vp.base().as_u64(), 0x0040_0000);
        assert_eq!(vp.add_pages(2).base().as_u64(), 0x0040_2000);
    }

    #[test]
    fn unaligned_addresses_are_rejected_as_pages() {
        assert!(PhysicalPage::from_aligned(PhysicalAddress::new(0x1001)).is_none());
        assert!(PhysicalPage::from_aligned(PhysicalAddress::new(0x1000)).is_some());
        assert!(!VirtualAddress::new(0x10).is_page_aligned());
    }

    #[test]
    fn page_counts() {
        assert_eq!(pages_for(0), 0);
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(PAGE_SIZE), 1);
        assert_eq!(pages_for(PAGE_SIZE + 1), 2);
    }

    #[test]
    fn debug_formatting_names_the_kind() {
        assert_eq!(format!("{:?}", PhysicalAddress::new(0x1000)), "PA(0x00001000)");
        assert_eq!(format!("{:?}", VirtualAddress::new(0x1000)), "VA(0x00001000)");
        assert_eq!(format!("{:?}", KernelAddress::new(0x8000_1000)), "KVA(0x80001000)");
    }
}
