//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: busy-waiting mutual exclusion for short critical sections
//!   (frame table, steal allocator).
//! * [`SyncOnceCell`]: write-once cell for state built during boot.
//! * [`irq`]: scoped interrupt masking for the TLB refill path.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;
mod sync_once_cell;

pub use irq::{InterruptControl, InterruptState, IrqGuard, SoftInterrupts};
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
