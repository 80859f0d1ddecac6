//! # Physical Memory Allocation
//!
//! Everything the kernel needs to hand out physical frames, from the first
//! instruction after boot until shutdown.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               FrameAllocator                        │
//! │    • alloc_kpages / free_kpages                     │
//! │    • one-way switch from stealing to the table      │
//! └──────────┬────────────────────────┬─────────────────┘
//!            │ before bootstrap       │ after bootstrap
//! ┌──────────▼──────────┐   ┌─────────▼─────────────────┐
//! │     BootMemory      │   │       FrameTable          │
//! │  • bump "steal"     │   │  • one state per frame    │
//! │  • never freed      │   │  • first-fit runs         │
//! └─────────────────────┘   └─────────┬─────────────────┘
//!                                     │
//! ┌───────────────────────────────────▼─────────────────┐
//! │                  PhysMapper                         │
//! │    • physical address → kernel pointer (kseg0)      │
//! │    • frame zeroing / copying                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The frame table lives in the RAM it manages: [`FrameAllocator::bootstrap`]
//! places the state array at the bottom of the remaining RAM and manages only
//! the frames above it.
//!
//! ## Locking
//!
//! The steal allocator and the frame table each have their own spin lock.
//! Neither is held while a frame is zeroed or copied, and neither is ever
//! taken while the other is held.
//!
//! ## Hosted testing
//!
//! With the `host-ram` feature (always on for this crate's own tests),
//! [`HostRam`] provides simulated physical RAM so that the allocator and
//! its users can be exercised with `cargo test`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "host-ram"))]
extern crate alloc;

pub mod boot_memory;
pub mod frame_alloc;
pub mod frame_table;
#[cfg(any(test, feature = "host-ram"))]
pub mod host_ram;
pub mod phys_mapper;

pub use crate::boot_memory::BootMemory;
pub use crate::frame_alloc::{FrameAllocError, FrameAllocator, FrameStats};
pub use crate::frame_table::{FrameState, FrameTable};
#[cfg(any(test, feature = "host-ram"))]
pub use crate::host_ram::HostRam;
pub use crate::phys_mapper::{Kseg0Mapper, PhysMapper, kernel_to_phys, phys_to_kernel};
