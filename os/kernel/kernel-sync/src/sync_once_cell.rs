use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const FULL: u8 = 2;

/// Write-once cell for state built during boot.
///
/// The frame allocator keeps its frame table in one of these: empty while the
/// steal allocator is in charge, full (and never emptied again) once the
/// table has been built.
pub struct SyncOnceCell<T> {
    state: AtomicU8,
    slot: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == FULL
    }

    /// The value, once published.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: FULL is only stored after the slot was written.
        self.is_initialized().then(|| unsafe { self.value() })
    }

    /// Publish `value`. If the cell is already full, or another CPU is
    /// filling it, `value` is handed back.
    ///
    /// # Errors
    /// Returns `value` when the cell was not empty.
    pub fn set(&self, value: T) -> Result<&T, T> {
        if self.claim() {
            Ok(self.publish(value))
        } else {
            Err(value)
        }
    }

    fn claim(&self) -> bool {
        self.state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn publish(&self, value: T) -> &T {
        // SAFETY: `claim` succeeded, so this is the only writer and no reader
        // looks at the slot before FULL.
        unsafe { (*self.slot.get()).write(value) };
        self.state.store(FULL, Ordering::Release);
        unsafe { self.value() }
    }

    /// # Safety
    /// The cell must be full.
    unsafe fn value(&self) -> &T {
        unsafe { (*self.slot.get()).assume_init_ref() }
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == FULL {
            // SAFETY: full, and `&mut self` rules out readers.
            unsafe { self.slot.get_mut().assume_init_drop() };
        }
    }
}

// SAFETY: readers only see the value after it was published; there is one writer.
unsafe impl<T: Sync + Send> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}
