//! Physical frame allocator: the kernel's `alloc_kpages` / `free_kpages`.
//!
//! Constructed once at boot and never destroyed. Until [`FrameAllocator::bootstrap`]
//! runs, requests are served by stealing from [`BootMemory`]; afterwards by
//! the [`FrameTable`]. The switch is one-way.
//!
//! Frames stolen before the switch are not tracked. Releasing one is logged and
//! dropped; those frames stay reserved for the lifetime of the system.

use crate::boot_memory::BootMemory;
use crate::frame_table::{FrameState, FrameTable};
use crate::phys_mapper::{PhysMapper, kernel_to_phys, phys_to_kernel};
use kernel_memory_addresses::{KernelAddress, PhysicalPage};
use kernel_sync::{SpinLock, SyncOnceCell};
use log::{debug, error, info, warn};

/// Allocation failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("out of memory ({requested} contiguous frames requested)")]
    OutOfMemory { requested: usize },
    #[error("zero-frame allocation requested")]
    ZeroPages,
}

/// Point-in-time frame usage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames managed by the frame table (0 before bootstrap).
    pub total: usize,
    /// Frames currently free in the frame table.
    pub free: usize,
    /// Frames still available to the steal allocator.
    pub stealable: u64,
}

pub struct FrameAllocator<M: PhysMapper> {
    mapper: M,
    /// Early-boot bump allocator, under its own lock.
    boot: SpinLock<BootMemory>,
    /// Frame table, present once bootstrapped.
    table: SyncOnceCell<SpinLock<FrameTable<'static>>>,
}

impl<M: PhysMapper> FrameAllocator<M> {
    pub const fn new(mapper: M, boot: BootMemory) -> Self {
        Self {
            mapper,
            boot: SpinLock::new(boot),
            table: SyncOnceCell::new(),
        }
    }

    #[inline]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    #[inline]
    pub fn is_bootstrapped(&self) -> bool {
        self.table.is_initialized()
    }

    /// Build the frame table over all RAM that has not been stolen yet.
    ///
    /// Calling this more than once is a no-op. The boot lock is held until
    /// the table is published, so concurrent callers and stealers see either
    /// the untouched boot range or the finished table.
    pub fn bootstrap(&self) {
        let mut boot = self.boot.lock();
        if self.is_bootstrapped() {
            warn!("frame table already bootstrapped");
            return;
        }

        let (lo, hi) = boot.take_remaining();

        // SAFETY: `take_remaining` hands the range over exclusively; the
        // steal allocator can no longer reach it.
        let table = unsafe { FrameTable::carve(&self.mapper, lo, hi) };
        let (base, capacity) = (table.base(), table.capacity());

        if self.table.set(SpinLock::new(table)).is_err() {
            error!("frame table published twice; RAM {lo}..{hi} is lost");
            return;
        }
        drop(boot);

        info!(
            "frame table: {capacity} frames managed from {base} (RAM {lo}..{hi}, table at {lo})"
        );
    }

    /// Allocate `n` physically contiguous frames.
    ///
    /// # Errors
    /// [`FrameAllocError::OutOfMemory`] if no run of `n` free frames exists
    /// (the frame table is left unchanged); [`FrameAllocError::ZeroPages`] for `n == 0`.
    pub fn alloc_frames(&self, n: usize) -> Result<PhysicalPage, FrameAllocError> {
        if n == 0 {
            return Err(FrameAllocError::ZeroPages);
        }

        let table = match self.table.get() {
            Some(table) => table,
            None => {
                let mut boot = self.boot.lock();
                // `bootstrap` publishes the table before releasing this lock.
                match self.table.get() {
                    Some(table) => table,
                    None => return Self::steal(&mut boot, n),
                }
            }
        };

        let (found, free) = {
            let mut table = table.lock();
            let found = table.allocate(n);
            (found, found.is_none().then(|| table.free_count()))
        };

        found.ok_or_else(|| {
            error!(
                "out of physical memory: no run of {n} free frame(s) ({} free in total)",
                free.unwrap_or_default()
            );
            FrameAllocError::OutOfMemory { requested: n }
        })
    }

    fn steal(boot: &mut BootMemory, n: usize) -> Result<PhysicalPage, FrameAllocError> {
        boot.steal(n as u64).map_or_else(
            || {
                error!("cannot steal {n} frame(s): early-boot RAM exhausted");
                Err(FrameAllocError::OutOfMemory { requested: n })
            },
            |page| {
                debug!("stole {n} frame(s) at {page}");
                Ok(page)
            },
        )
    }

    /// Release the run of frames starting at `frame`.
    pub fn free_frames(&self, frame: PhysicalPage) {
        let Some(table) = self.table.get() else {
            warn!("release of {frame} before the frame table exists; frame stays reserved");
            return;
        };

        match table.lock().release(frame) {
            Some(0) => warn!("release of {frame}: already free"),
            Some(_) => {}
            None => warn!("release of {frame}: not managed by the frame table"),
        }
    }

    /// `alloc_kpages`: allocate `n` contiguous frames and return their kseg0
    /// address.
    ///
    /// # Errors
    /// See [`alloc_frames`](Self::alloc_frames).
    pub fn alloc_kpages(&self, n: usize) -> Result<KernelAddress, FrameAllocError> {
        self.alloc_frames(n).map(|page| phys_to_kernel(page.base()))
    }

    /// `free_kpages`: release the run containing the kseg0 address `addr`.
    pub fn free_kpages(&self, addr: KernelAddress) {
        match kernel_to_phys(addr) {
            Some(pa) => self.free_frames(pa.page()),
            None => warn!("free_kpages({addr}): not a kernel address"),
        }
    }

    /// Zero one frame. The frame-table lock is not held.
    ///
    /// # Safety
    /// The caller must own `frame`.
    #[inline]
    pub unsafe fn zero_frame(&self, frame: PhysicalPage) {
        unsafe { self.mapper.zero_frame(frame) }
    }

    /// Copy `src` into `dst`. The frame-table lock is not held.
    ///
    /// # Safety
    /// The caller must own `dst` and keep `src` from being written meanwhile.
    #[inline]
    pub unsafe fn copy_frame(&self, dst: PhysicalPage, src: PhysicalPage) {
        unsafe { self.mapper.copy_frame(dst, src) }
    }

    #[must_use]
    pub fn stats(&self) -> FrameStats {
        let stealable = self.boot.lock().remaining_frames();
        let (total, free) = self.table.get().map_or((0, 0), |t| {
            let t = t.lock();
            (t.capacity(), t.free_count())
        });
        FrameStats {
            total,
            free,
            stealable,
        }
    }

    /// Run `f` on the frame states while holding the table lock. `None` before
    /// bootstrap.
    pub fn with_frame_states<R>(&self, f: impl FnOnce(&[FrameState]) -> R) -> Option<R> {
        self.table.get().map(|t| f(t.lock().snapshot()))
    }

    /// First frame managed by the frame table.
    pub fn table_base(&self) -> Option<PhysicalPage> {
        self.table.get().map(|t| t.lock().base())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_ram::HostRam;
    use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
    use std::sync::Arc;
    use std::thread;

    /// 64 frames of RAM, the lowest 2 taken by the "kernel image".
    fn allocator() -> (HostRam, FrameAllocator<HostRam>) {
        let ram = HostRam::new(64);
        let frames = FrameAllocator::new(ram, ram.boot_memory(2));
        (ram, frames)
    }

    #[test]
    fn zero_frames_are_refused() {
        let (_, frames) = allocator();
        assert_eq!(frames.alloc_frames(0), Err(FrameAllocError::ZeroPages));
        frames.bootstrap();
        assert_eq!(frames.alloc_frames(0), Err(FrameAllocError::ZeroPages));
    }

    #[test]
    fn steals_before_bootstrap() {
        let (_, frames) = allocator();
        assert!(!frames.is_bootstrapped());
        let a = frames.alloc_frames(1).unwrap();
        let b = frames.alloc_frames(3).unwrap();
        assert_eq!(a.number(), 2);
        assert_eq!(b.number(), 3);
        assert_eq!(frames.stats().stealable, 64 - 2 - 4);
        assert!(frames.with_frame_states(<[FrameState]>::len).is_none());
    }

    #[test]
    fn release_before_bootstrap_is_a_no_op() {
        let (_, frames) = allocator();
        let a = frames.alloc_frames(2).unwrap();
        frames.free_frames(a);
        // Not handed out again: stolen memory is never reused.
        assert_ne!(frames.alloc_frames(1).unwrap(), a);
    }

    #[test]
    fn bootstrap_manages_everything_not_stolen() {
        let (_, frames) = allocator();
        let stolen = frames.alloc_frames(2).unwrap();
        frames.bootstrap();

        // 60 frames left; the 60-byte state array takes one page of them.
        let base = frames.table_base().unwrap();
        assert_eq!(base.number(), stolen.number() + 2 + 1);
        let stats = frames.stats();
        assert_eq!(stats.total, 59);
        assert_eq!(stats.free, 59);
        assert_eq!(stats.stealable, 0);

        // Stolen frames are unknown to the table; releasing them changes nothing.
        frames.free_frames(stolen);
        assert_eq!(frames.stats().free, 59);
    }

    #[test]
    fn second_bootstrap_is_ignored() {
        let (_, frames) = allocator();
        frames.bootstrap();
        let a = frames.alloc_frames(4).unwrap();
        frames.bootstrap();
        assert_eq!(frames.stats().free, frames.stats().total - 4);
        frames.free_frames(a);
        assert_eq!(frames.stats().free, frames.stats().total);
    }

    #[test]
    fn racing_bootstraps_build_one_table() {
        let (_, frames) = allocator();
        let frames = Arc::new(frames);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let frames = Arc::clone(&frames);
                thread::spawn(move || frames.bootstrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 62 frames left after the image; one page holds the state array.
        let stats = frames.stats();
        assert_eq!(frames.table_base().unwrap().number(), 3);
        assert_eq!(stats.total, 61);
        assert_eq!(stats.free, 61);
        assert_eq!(stats.stealable, 0);
    }

    #[test]
    fn allocations_racing_bootstrap_all_succeed() {
        let (_, frames) = allocator();
        let frames = Arc::new(frames);

        let mut handles: Vec<_> = (0..4)
            .map(|_| {
                let frames = Arc::clone(&frames);
                thread::spawn(move || {
                    (0..5)
                        .map(|_| frames.alloc_frames(1).unwrap().number())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let bootstrapper = Arc::clone(&frames);
        handles.push(thread::spawn(move || {
            bootstrapper.bootstrap();
            Vec::new()
        }));

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 20);

        // Whatever was stolen sits below the table; the table covers the rest.
        let base = frames.table_base().unwrap().number();
        let stolen = all.iter().filter(|&&n| n < base).count();
        let stats = frames.stats();
        assert_eq!(base + stats.total as u64, 64);
        assert_eq!(stats.free, stats.total - (20 - stolen));
    }

    #[test]
    fn allocations_never_overlap() {
        let (_, frames) = allocator();
        frames.bootstrap();

        let mut runs = Vec::new();
        for n in [1, 3, 2, 5, 1, 4] {
            runs.push((frames.alloc_frames(n).unwrap(), n as u64));
        }
        for (i, &(a, na)) in runs.iter().enumerate() {
            for &(b, nb) in &runs[i + 1..] {
                let disjoint = a.number() + na <= b.number() || b.number() + nb <= a.number();
                assert!(disjoint, "{a}+{na} overlaps {b}+{nb}");
            }
        }
    }

    #[test]
    fn round_trip_restores_the_table() {
        let (_, frames) = allocator();
        frames.bootstrap();
        let _pinned = frames.alloc_frames(1).unwrap();

        let before = frames.with_frame_states(<[FrameState]>::to_vec).unwrap();
        let run = frames.alloc_frames(7).unwrap();
        frames.free_frames(run);
        let after = frames.with_frame_states(<[FrameState]>::to_vec).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn exhaustion_reports_out_of_memory_without_side_effects() {
        let (_, frames) = allocator();
        frames.bootstrap();
        let total = frames.stats().total;
        let _most = frames.alloc_frames(total - 2).unwrap();

        let before = frames.with_frame_states(<[FrameState]>::to_vec).unwrap();
        assert_eq!(
            frames.alloc_frames(3),
            Err(FrameAllocError::OutOfMemory { requested: 3 })
        );
        let after = frames.with_frame_states(<[FrameState]>::to_vec).unwrap();
        assert_eq!(before, after);
        assert!(frames.alloc_frames(2).is_ok());
    }

    #[test]
    fn kernel_pages_are_direct_mapped() {
        let (_, frames) = allocator();
        frames.bootstrap();
        let ka = frames.alloc_kpages(2).unwrap();
        let pa = kernel_to_phys(ka).unwrap();
        assert!(pa.is_page_aligned());
        assert_eq!(frames.stats().free, frames.stats().total - 2);

        frames.free_kpages(ka);
        assert_eq!(frames.stats().free, frames.stats().total);

        // A user address is rejected without touching the table.
        frames.free_kpages(KernelAddress::new(0x0040_0000));
        assert_eq!(frames.stats().free, frames.stats().total);
    }

    #[test]
    fn zero_and_copy_go_through_the_mapper() {
        let (ram, frames) = allocator();
        frames.bootstrap();
        let a = frames.alloc_frames(1).unwrap();
        let b = frames.alloc_frames(1).unwrap();

        ram.write(a.join(100), b"frame contents");
        unsafe { frames.copy_frame(b, a) };
        let mut buf = [0u8; 14];
        ram.read(b.join(100), &mut buf);
        assert_eq!(&buf, b"frame contents");

        unsafe { frames.zero_frame(b) };
        ram.read(b.join(100), &mut buf);
        assert_eq!(buf, [0; 14]);
    }

    #[test]
    fn table_storage_is_inside_reserved_memory() {
        let (ram, frames) = allocator();
        frames.bootstrap();
        let base = frames.table_base().unwrap();

        // Scribbling over every managed frame must not disturb the table.
        let total = frames.stats().total;
        let all = frames.alloc_frames(total).unwrap();
        for i in 0..total as u64 {
            ram.write(all.add_pages(i).base(), &[0xA5; PAGE_SIZE as usize]);
        }
        frames.free_frames(all);
        assert_eq!(frames.stats().free, total);
        assert!(base.base() > PhysicalAddress::new(2 * PAGE_SIZE));
    }

    #[test]
    fn concurrent_allocations_are_disjoint() {
        let ram = HostRam::new(256);
        let frames = Arc::new(FrameAllocator::new(ram, ram.boot_memory(1)));
        frames.bootstrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let frames = Arc::clone(&frames);
                thread::spawn(move || {
                    let mut mine = Vec::new();
                    for _ in 0..40 {
                        let page = frames.alloc_frames(1).unwrap();
                        unsafe { frames.zero_frame(page) };
                        mine.push(page.number());
                    }
                    mine
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        let len = all.len();
        all.dedup();
        assert_eq!(all.len(), len);
        assert_eq!(frames.stats().free, frames.stats().total - 160);
    }
}
