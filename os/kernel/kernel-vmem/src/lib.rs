//! # Virtual Memory
//!
//! User address spaces on a CPU with a software-managed TLB.
//!
//! ```text
//!  user load/store ──miss──► trap ──► handle_fault ──► AddressSpace::lookup
//!                                          │                 │
//!                                          ▼                 ▼
//!                                   Tlb::write(slot)     PageTable ─► frame
//! ```
//!
//! * [`AddressSpace`]: regions, stack and their frames, with the loader-facing
//!   lifecycle (`create`, `define_region`, `prepare_load`, `complete_load`,
//!   `define_stack`, `copy`, `destroy`, `activate`).
//! * [`PageTable`]: one frame per virtual page.
//! * [`tlb`]: the `EntryHi`/`EntryLo` words, the [`Tlb`] trait and a
//!   software [`SoftTlb`].
//! * [`handle_fault`]: the TLB refill path.
//!
//! Frames come from a [`kernel_alloc::FrameAllocator`] passed in by reference.
//!
//! ## Example
//!
//! ```
//! use kernel_alloc::{FrameAllocator, HostRam};
//! use kernel_memory_addresses::VirtualAddress;
//! use kernel_sync::SoftInterrupts;
//! use kernel_vmem::{AddressSpace, Permissions, SoftTlb, handle_fault};
//!
//! let ram = HostRam::new(64);
//! let frames = FrameAllocator::new(ram, ram.boot_memory(1));
//! frames.bootstrap();
//!
//! let mut space = AddressSpace::create().unwrap();
//! space.define_region(VirtualAddress::new(0x0040_0000), 0x1800, Permissions::RX).unwrap();
//! space.prepare_load(&frames).unwrap();
//!
//! let (mut tlb, irq) = (SoftTlb::new(), SoftInterrupts::new());
//! space.activate(&mut tlb, &irq);
//! handle_fault(&mut tlb, &irq, Some(&space), 0, VirtualAddress::new(0x0040_1004)).unwrap();
//!
//! space.destroy(&frames);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod address_space;
mod error;
pub mod fault;
pub mod page_table;
pub mod tlb;

pub use crate::address_space::{AddressSpace, AsState, Mapping, Permissions, Region, Segment};
pub use crate::error::{FatalReason, FaultError, VmError};
pub use crate::fault::{FaultKind, handle_fault};
pub use crate::page_table::PageTable;
pub use crate::tlb::{EntryHi, EntryLo, SoftTlb, Tlb, TlbEntry};
