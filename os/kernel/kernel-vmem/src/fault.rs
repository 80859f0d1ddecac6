//! # TLB fault handler
//!
//! Entered from the trap handler on a TLB miss or a store through a
//! read-only entry. The handler never allocates: it looks the faulting page up
//! in the current [`AddressSpace`] and installs the translation.
//!
//! Slot choice: the first invalid slot, otherwise the one picked by the
//! hardware random register.

use crate::address_space::{AddressSpace, Segment};
use crate::tlb::{EntryHi, EntryLo, Tlb, TlbEntry};
use crate::{FatalReason, FaultError};
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::{InterruptControl, IrqGuard};
use log::debug;

/// Kind of access that faulted, as delivered by the trap frame.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// Load missed the TLB.
    Read = 0,
    /// Store missed the TLB.
    Write = 1,
    /// Store through a valid entry without the dirty bit.
    ReadOnly = 2,
}

impl TryFrom<u32> for FaultKind {
    type Error = FaultError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Read),
            1 => Ok(Self::Write),
            2 => Ok(Self::ReadOnly),
            other => Err(FaultError::BadRequest(other)),
        }
    }
}

/// Resolve a fault of kind `code` at `addr` against `space`, the current
/// process's address space (`None` for a kernel thread or early boot).
///
/// # Errors
/// - [`FaultError::BadRequest`] for an unknown `code`.
/// - [`FaultError::PermissionFault`] for a store to a read-only page.
/// - [`FaultError::FatalFault`] if there is no address space, `addr` is
///   outside every segment, or its segment has no frames yet.
pub fn handle_fault<T, C>(
    tlb: &mut T,
    irq: &C,
    space: Option<&AddressSpace>,
    code: u32,
    addr: VirtualAddress,
) -> Result<(), FaultError>
where
    T: Tlb + ?Sized,
    C: InterruptControl + ?Sized,
{
    let kind = FaultKind::try_from(code)?;
    let page = addr.page();
    debug!("fault: {kind:?} at {addr}");

    if kind == FaultKind::ReadOnly {
        return Err(FaultError::PermissionFault);
    }

    let space = space.ok_or(FaultError::FatalFault(FatalReason::NoAddressSpace))?;
    let mapping = space
        .lookup(page)
        .ok_or(FaultError::FatalFault(FatalReason::Unmapped(addr)))?;
    let frame = mapping
        .frame
        .ok_or(FaultError::FatalFault(FatalReason::NotPrepared(addr)))?;

    let writable = !(mapping.segment == Segment::Region(0) && space.is_load_complete());
    if kind == FaultKind::Write && !writable {
        return Err(FaultError::PermissionFault);
    }

    let entry = TlbEntry {
        hi: EntryHi::for_page(page),
        lo: EntryLo::for_frame(frame, writable),
    };

    let slot = {
        let _irq = IrqGuard::new(irq);
        match tlb.find_slot(entry.hi).or_else(|| tlb.first_invalid()) {
            Some(slot) => {
                tlb.write(slot, entry);
                slot
            }
            None => tlb.write_random(entry),
        }
    };

    debug!("{page} -> {frame} in slot {slot} (writable: {writable})");
    Ok(())
}
