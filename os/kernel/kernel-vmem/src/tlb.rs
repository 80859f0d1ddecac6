//! # Software-managed TLB
//!
//! The MMU has no page-table walker: every translation lives in one of
//! [`TLB_SLOTS`] entries that the kernel writes itself. An entry is a pair of
//! 32-bit words:
//!
//! ```text
//!  EntryHi   31                      12 11        6 5      0
//!           ┌──────────────────────────┬───────────┬────────┐
//!           │ VPN                      │ ASID      │ 0      │
//!           └──────────────────────────┴───────────┴────────┘
//!  EntryLo   31                      12 11  10  9   8 7     0
//!           ┌──────────────────────────┬───┬───┬───┬───┬────┐
//!           │ PFN                      │ N │ D │ V │ G │ 0  │
//!           └──────────────────────────┴───┴───┴───┴───┴────┘
//! ```
//!
//! `D` ("dirty") is the write-enable bit: a store through an entry without it
//! raises a read-only fault. `V` marks the slot valid.
//!
//! There are no address-space identifiers in use, so every address-space
//! switch invalidates all slots ([`flush_all`]). Invalid slots are given
//! distinct kseg0 page numbers so no two slots can ever match the same
//! address.

use bitfield_struct::bitfield;
use kernel_info::memory::{KSEG0_BASE, TLB_SLOTS, TLB_WIRED};
use kernel_memory_addresses::{PAGE_SHIFT, PhysicalPage, VirtualPage};
use kernel_sync::{InterruptControl, IrqGuard};

/// High word of a TLB entry: the virtual page it matches.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EntryHi {
    #[bits(6)]
    __: u8,
    /// Address-space identifier (unused, always 0).
    #[bits(6)]
    pub asid: u8,
    /// Virtual page number.
    #[bits(20)]
    pub vpn: u32,
}

/// Low word of a TLB entry: the physical frame and its access bits.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EntryLo {
    #[bits(8)]
    __: u8,
    /// Ignore the ASID when matching.
    pub global: bool,
    /// Slot holds a live translation.
    pub valid: bool,
    /// Writes allowed.
    pub dirty: bool,
    /// Uncached access.
    pub no_cache: bool,
    /// Physical frame number.
    #[bits(20)]
    pub pfn: u32,
}

impl EntryHi {
    /// Entry matching `page`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn for_page(page: VirtualPage) -> Self {
        Self::new().with_vpn(page.number() as u32)
    }

    /// Placeholder for invalid slot `slot`: a kseg0 page number unique to the
    /// slot. kseg0 is never translated, so the entry can never match.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn invalid(slot: usize) -> Self {
        Self::new().with_vpn((KSEG0_BASE >> PAGE_SHIFT) as u32 + slot as u32)
    }

    #[must_use]
    pub fn page(self) -> VirtualPage {
        VirtualPage::from_number(u64::from(self.vpn()))
    }
}

impl EntryLo {
    /// Valid entry for `frame`, writable iff `writable`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn for_frame(frame: PhysicalPage, writable: bool) -> Self {
        Self::new()
            .with_pfn(frame.number() as u32)
            .with_valid(true)
            .with_dirty(writable)
    }

    #[must_use]
    pub fn frame(self) -> PhysicalPage {
        PhysicalPage::from_number(u64::from(self.pfn()))
    }
}

/// One TLB slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TlbEntry {
    pub hi: EntryHi,
    pub lo: EntryLo,
}

impl TlbEntry {
    /// The invalidated contents of slot `slot`.
    #[must_use]
    pub fn invalid(slot: usize) -> Self {
        Self {
            hi: EntryHi::invalid(slot),
            lo: EntryLo::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lo.valid()
    }
}

/// Access to the TLB of the current CPU.
///
/// All mutation happens with interrupts masked; implementations do not mask
/// them themselves.
pub trait Tlb {
    /// Number of slots.
    fn slots(&self) -> usize;

    /// Read slot `slot`.
    fn read(&self, slot: usize) -> TlbEntry;

    /// Overwrite slot `slot`.
    fn write(&mut self, slot: usize, entry: TlbEntry);

    /// Write `entry` into a slot picked by the hardware random register and
    /// return that slot.
    fn write_random(&mut self, entry: TlbEntry) -> usize;

    /// Slot holding a valid entry for `hi`'s page, if any.
    fn find_slot(&self, hi: EntryHi) -> Option<usize> {
        (0..self.slots()).find(|&slot| {
            let e = self.read(slot);
            e.is_valid() && e.hi.vpn() == hi.vpn()
        })
    }

    /// First slot not holding a valid entry.
    fn first_invalid(&self) -> Option<usize> {
        (0..self.slots()).find(|&slot| !self.read(slot).is_valid())
    }
}

/// Invalidate every slot.
pub fn flush_all<T, C>(tlb: &mut T, irq: &C)
where
    T: Tlb + ?Sized,
    C: InterruptControl + ?Sized,
{
    let _irq = IrqGuard::new(irq);
    for slot in 0..tlb.slots() {
        tlb.write(slot, TlbEntry::invalid(slot));
    }
}

/// Cross-CPU invalidation of every slot. There is only one CPU.
///
/// # Panics
/// Always.
pub fn shootdown_all() -> ! {
    panic!("TLB shootdown requested on a single-CPU system");
}

/// Cross-CPU invalidation of `page`. There is only one CPU.
///
/// # Panics
/// Always.
pub fn shootdown(page: VirtualPage) -> ! {
    panic!("TLB shootdown of {page} requested on a single-CPU system");
}

/// TLB kept in memory, for hosted use.
///
/// Models the random register the way the hardware does: it counts down over
/// the non-wired slots `TLB_WIRED..TLB_SLOTS` and wraps back to the top.
#[derive(Debug, Clone)]
pub struct SoftTlb {
    entries: [TlbEntry; TLB_SLOTS],
    random: usize,
}

impl Default for SoftTlb {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftTlb {
    /// All slots invalid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: core::array::from_fn(TlbEntry::invalid),
            random: TLB_SLOTS - 1,
        }
    }

    /// Number of valid slots.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_valid()).count()
    }

    /// Frame `page` currently translates to, and whether it is writable.
    #[must_use]
    pub fn lookup(&self, page: VirtualPage) -> Option<(PhysicalPage, bool)> {
        let slot = self.find_slot(EntryHi::for_page(page))?;
        let lo = self.entries[slot].lo;
        Some((lo.frame(), lo.dirty()))
    }
}

impl Tlb for SoftTlb {
    fn slots(&self) -> usize {
        TLB_SLOTS
    }

    fn read(&self, slot: usize) -> TlbEntry {
        self.entries[slot]
    }

    fn write(&mut self, slot: usize, entry: TlbEntry) {
        self.entries[slot] = entry;
    }

    fn write_random(&mut self, entry: TlbEntry) -> usize {
        let slot = self.random;
        self.random = if slot <= TLB_WIRED { TLB_SLOTS - 1 } else { slot - 1 };
        self.entries[slot] = entry;
        slot
    }
}
