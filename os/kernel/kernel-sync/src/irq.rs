//! # Interrupt masking
//!
//! The TLB refill path must not be re-entered by the interrupt that would
//! otherwise trigger another TLB miss, so it runs with interrupts masked on
//! the local CPU. [`IrqGuard`] scopes that: interrupts are disabled when the
//! guard is created and the previous state is restored when it is dropped,
//! including on early returns.
//!
//! The actual masking is behind [`InterruptControl`]: the embedding kernel
//! implements it for its CPU's interrupt-enable bit, and hosted runs use the
//! simulated flag in [`SoftInterrupts`].

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Interrupt state captured before masking ("spl" level).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InterruptState {
    /// Whether interrupts were enabled when the state was captured.
    pub enabled: bool,
}

/// Local-CPU interrupt masking.
pub trait InterruptControl {
    /// Disables interrupts on the current CPU and returns the previous state.
    fn disable(&self) -> InterruptState;

    /// Restores a state previously returned by [`disable`](Self::disable).
    fn restore(&self, previous: InterruptState);

    /// Whether interrupts are currently enabled.
    fn enabled(&self) -> bool;
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// Interrupts are re-enabled on drop **only** if they were enabled when the
/// guard was created, so guards nest.
///
/// # Examples
///
/// ```
/// use kernel_sync::irq::{InterruptControl, IrqGuard, SoftInterrupts};
///
/// let irq = SoftInterrupts::new();
/// {
///     let _g = IrqGuard::new(&irq);
///     assert!(!irq.enabled());
/// }
/// assert!(irq.enabled());
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<'a, C: InterruptControl + ?Sized> {
    ctl: &'a C,
    previous: InterruptState,
}

impl<'a, C: InterruptControl + ?Sized> IrqGuard<'a, C> {
    #[inline]
    pub fn new(ctl: &'a C) -> Self {
        let previous = ctl.disable();
        Self { ctl, previous }
    }

    /// Whether interrupts were enabled before this guard masked them.
    #[inline]
    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.previous.enabled
    }
}

impl<C: InterruptControl + ?Sized> Drop for IrqGuard<'_, C> {
    fn drop(&mut self) {
        self.ctl.restore(self.previous);
    }
}

/// Simulated interrupt flag.
///
/// Behaves like a single CPU's interrupt-enable bit and counts how often
/// interrupts were masked, which lets hosted tests check that a critical
/// section was entered and left.
#[derive(Debug)]
pub struct SoftInterrupts {
    enabled: AtomicBool,
    masked: AtomicUsize,
}

impl Default for SoftInterrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftInterrupts {
    /// Starts with interrupts enabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            masked: AtomicUsize::new(0),
        }
    }

    /// Number of times interrupts went from enabled to disabled.
    #[must_use]
    pub fn times_masked(&self) -> usize {
        self.masked.load(Ordering::Relaxed)
    }
}

impl InterruptControl for SoftInterrupts {
    fn disable(&self) -> InterruptState {
        let enabled = self.enabled.swap(false, Ordering::AcqRel);
        if enabled {
            self.masked.fetch_add(1, Ordering::Relaxed);
        }
        InterruptState { enabled }
    }

    fn restore(&self, previous: InterruptState) {
        if previous.enabled {
            self.enabled.store(true, Ordering::Release);
        }
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
