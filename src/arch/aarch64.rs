//! AArch64 interrupt-state primitives.
//!
//! Interrupt masking on AArch64 goes through the DAIF register (Debug,
//! SError, IRQ, FIQ mask bits). Only the IRQ bit (bit 1) is managed here.

use core::arch::asm;

/// Saved DAIF state, captured while masking IRQs.
///
/// Restores the saved state when dropped.
pub struct IrqState {
    daif: u64,
}

impl IrqState {
    /// Save the current interrupt state and mask IRQs.
    pub fn save_and_mask() -> Self {
        let daif: u64;

        // SAFETY: DAIF is readable and writable at EL1, and `msr daifset`
        // sets the IRQ mask bit atomically; the previous value is saved for
        // restoration.
        unsafe {
            asm!("mrs {}, daif", out(reg) daif, options(nomem, nostack));
            asm!("msr daifset, #2", options(nomem, nostack));
        }

        Self { daif }
    }
}

impl Drop for IrqState {
    fn drop(&mut self) {
        // SAFETY: writing back a value previously read from DAIF; a single
        // MSR instruction, atomic with respect to interrupt delivery.
        unsafe {
            asm!("msr daif, {}", in(reg) self.daif, options(nomem, nostack));
        }
    }
}
