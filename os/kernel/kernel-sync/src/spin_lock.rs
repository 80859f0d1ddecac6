use core::cell::UnsafeCell;
use core::fmt;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Busy-waiting lock for the allocator's short critical sections.
///
/// Guards the frame table and the early-boot steal allocator. Holders only
/// flip frame states: no zeroing or copying of frames happens under the lock,
/// and nothing blocks while holding it.
///
/// Waiters spin on a relaxed load and only retry the atomic exchange once the
/// lock looks free. Every acquisition that had to wait is counted, see
/// [`contended`](Self::contended).
pub struct SpinLock<T> {
    held: AtomicBool,
    waits: AtomicUsize,
    value: UnsafeCell<T>,
}

// SAFETY: the flag grants one guard at a time; T moves between CPUs with it.
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            held: AtomicBool::new(false),
            waits: AtomicUsize::new(0),
            value: UnsafeCell::new(value),
        }
    }

    #[inline]
    fn acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Spin until the lock is ours.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        if self.acquire() {
            return SpinLockGuard { lock: self };
        }

        self.waits.fetch_add(1, Ordering::Relaxed);
        loop {
            while self.held.load(Ordering::Relaxed) {
                spin_loop();
            }
            if self.acquire() {
                return SpinLockGuard { lock: self };
            }
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// Number of [`lock`](Self::lock) calls that found the lock taken.
    #[inline]
    pub fn contended(&self) -> usize {
        self.waits.load(Ordering::Relaxed)
    }
}

impl<T> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .field("contended", &self.contended())
            .finish_non_exhaustive()
    }
}

/// Proof of holding a [`SpinLock`]; releases it on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard is the only holder.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard is the only holder.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}
