//! # Memory Layout

use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};

/// Base of the direct-mapped kernel segment. A physical address `pa` is
/// visible to the kernel at `KSEG0_BASE + pa`.
pub const KSEG0_BASE: u64 = 0x8000_0000;

/// Size of the kseg0 window; physical RAM beyond this cannot be direct-mapped.
pub const KSEG0_SIZE: u64 = 0x2000_0000;

/// One past the highest user address; the user stack grows down from here.
pub const USER_STACK_TOP: u64 = 0x8000_0000;

/// [`USER_STACK_TOP`] as a typed address.
pub const USER_STACK: VirtualAddress = VirtualAddress::new(USER_STACK_TOP);

/// Fixed number of pages of every user stack (48 KiB).
pub const STACK_PAGES: usize = 12;

/// Lowest address of the user stack region.
pub const USER_STACK_BASE: u64 = USER_STACK_TOP - STACK_PAGES as u64 * PAGE_SIZE;

/// Number of code/data regions an address space may define.
pub const MAX_REGIONS: usize = 2;

/// Number of hardware TLB slots.
pub const TLB_SLOTS: usize = 64;

/// Slots below this index are never chosen by random replacement.
pub const TLB_WIRED: usize = 8;

const _: () = {
    assert!(USER_STACK_TOP.is_multiple_of(PAGE_SIZE));
    assert!(USER_STACK_TOP <= KSEG0_BASE);
    assert!(KSEG0_BASE.is_multiple_of(PAGE_SIZE));
    assert!(STACK_PAGES > 0);
    assert!(TLB_WIRED < TLB_SLOTS);
};
