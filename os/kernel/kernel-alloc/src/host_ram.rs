//! Simulated physical RAM for hosted tests.

use crate::boot_memory::BootMemory;
use crate::phys_mapper::PhysMapper;
use alloc::vec;
use alloc::vec::Vec;
use core::ptr::NonNull;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};

#[repr(C, align(4096))]
#[derive(Clone)]
struct RawFrame([u8; PAGE_SIZE as usize]);

/// `frames` frames of zeroed host memory standing in for physical addresses
/// `0 .. frames * PAGE_SIZE`.
///
/// The memory is leaked so that references handed out through [`PhysMapper`]
/// stay valid for `'static`, like real RAM.
#[derive(Debug, Copy, Clone)]
pub struct HostRam {
    base: NonNull<u8>,
    frames: usize,
}

// SAFETY: the backing memory is leaked and never freed; synchronization of
// its contents is the frame owner's business, exactly as with real RAM.
unsafe impl Send for HostRam {}
unsafe impl Sync for HostRam {}

impl HostRam {
    #[must_use]
    pub fn new(frames: usize) -> Self {
        let mem: &'static mut [RawFrame] = Vec::leak(vec![RawFrame([0; PAGE_SIZE as usize]); frames]);
        Self {
            base: NonNull::from(mem).cast(),
            frames,
        }
    }

    #[must_use]
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// One past the last simulated physical byte.
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.frames as u64 * PAGE_SIZE)
    }

    /// Free RAM as firmware would report it, with the lowest `reserved`
    /// frames taken by the kernel image.
    #[must_use]
    pub const fn boot_memory(&self, reserved: usize) -> BootMemory {
        BootMemory::new(PhysicalAddress::new(reserved as u64 * PAGE_SIZE), self.end())
    }

    /// Copy bytes out of simulated RAM.
    pub fn read(&self, pa: PhysicalAddress, buf: &mut [u8]) {
        self.check(pa, buf.len());
        unsafe { core::ptr::copy_nonoverlapping(self.frame_ptr(pa), buf.as_mut_ptr(), buf.len()) }
    }

    /// Copy bytes into simulated RAM.
    pub fn write(&self, pa: PhysicalAddress, data: &[u8]) {
        self.check(pa, data.len());
        unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), self.frame_ptr(pa), data.len()) }
    }

    fn check(&self, pa: PhysicalAddress, len: usize) {
        assert!(
            pa.as_u64() + len as u64 <= self.end().as_u64(),
            "{pa:?} + {len} outside simulated RAM"
        );
    }
}

unsafe impl PhysMapper for HostRam {
    #[allow(clippy::cast_possible_truncation)]
    fn frame_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        self.check(pa, 0);
        // SAFETY: checked to be inside the leaked allocation (or one past it).
        unsafe { self.base.as_ptr().add(pa.as_u64() as usize) }
    }
}
