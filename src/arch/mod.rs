//! Architecture-specific code.
//!
//! Currently just the saved-interrupt-state primitive used by
//! [`crate::sync::IrqMutex`]. On hosted targets (unit tests) interrupt
//! masking is meaningless, so a no-op stand-in is provided there.

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(target_arch = "aarch64")]
pub use aarch64::IrqState;

#[cfg(not(target_arch = "aarch64"))]
mod hosted {
    /// No-op interrupt state for targets without interrupt masking.
    pub struct IrqState;

    impl IrqState {
        pub fn save_and_mask() -> Self {
            Self
        }
    }
}

#[cfg(not(target_arch = "aarch64"))]
pub use hosted::IrqState;
