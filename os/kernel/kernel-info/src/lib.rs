//! # Kernel Memory Configuration
//!
//! This crate is the single source of truth for the layout constants shared by
//! the frame allocator, the address-space code and the TLB fault handler.
//! Everything here is fixed at compile time; there is no runtime
//! configuration for the memory subsystem.
//!
//! ## Address Space Layout (32-bit, MIPS-style segments)
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   kuseg: user space (TLB-mapped)│
//!             │     region 1 (code)             │
//!             │     region 2 (data)             │
//!             │            ...                  │
//!             │     stack (STACK_PAGES pages)   │
//! USER_STACK_TOP ├──────────────────────────────┤ 0x8000_0000
//!             │   kseg0: direct-mapped RAM      │
//!             │   (KSEG0_BASE + pa)             │
//! 0xA000_0000 └─────────────────────────────────┘
//! ```
//!
//! * User addresses are translated by the software-managed TLB only.
//! * The kernel reaches every physical frame through the kseg0 window and
//!   never needs a TLB entry for it.
//! * Invalid TLB entries are parked on kseg0 page numbers, which user
//!   translations can never match.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
