//! Interrupt-masking mutex.
//!
//! `IrqMutex` is a spinlock that masks interrupts while the lock is held.
//! A plain spinlock deadlocks in kernel code the moment an interrupt handler
//! tries to acquire a lock that the interrupted code already holds:
//!
//! ```text
//! 1. Kernel path acquires the lock
//! 2. Interrupt fires mid-critical-section
//! 3. Handler tries to acquire the same lock
//! 4. Handler spins forever; the owner never resumes
//! ```
//!
//! Masking interrupts for the duration of the critical section prevents this.
//! This is the standard kernel pattern (Linux: `spin_lock_irqsave()`): save
//! the current interrupt state, mask, take the spinlock; on drop release the
//! lock and restore the saved state, unconditionally on every exit path.

use core::ops::{Deref, DerefMut};

use crate::arch::IrqState;

/// Spinlock that masks interrupts while held.
///
/// # Example
/// ```ignore
/// static HEAP: IrqMutex<Heap> = IrqMutex::new(Heap::empty());
///
/// let mut heap = HEAP.lock();
/// heap.allocate(64)?;
/// // Lock released and interrupt state restored when the guard drops
/// ```
pub struct IrqMutex<T> {
    inner: spin::Mutex<T>,
}

impl<T> IrqMutex<T> {
    /// Create a new mutex.
    pub const fn new(value: T) -> Self {
        Self {
            inner: spin::Mutex::new(value),
        }
    }

    /// Acquire the lock with interrupts masked.
    ///
    /// Returns a guard; dropping it releases the spinlock and then restores
    /// the saved interrupt state, in that order.
    pub fn lock(&self) -> IrqMutexGuard<'_, T> {
        // Mask first so no interrupt can preempt us while spinning or while
        // holding the lock.
        let irq_state = IrqState::save_and_mask();
        IrqMutexGuard {
            guard: self.inner.lock(),
            _irq_state: irq_state,
        }
    }
}

/// Guard returned by [`IrqMutex::lock`].
pub struct IrqMutexGuard<'a, T> {
    // Field order matters: the spinlock guard must drop (releasing the lock)
    // before the interrupt state is restored, otherwise an interrupt handler
    // could spin on a lock we still hold.
    guard: spin::MutexGuard<'a, T>,
    _irq_state: IrqState,
}

impl<T> Deref for IrqMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
