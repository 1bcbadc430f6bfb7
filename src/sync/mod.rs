//! Synchronization primitives.
//!
//! Interrupt-safe locking for kernel data structures shared between the main
//! execution context and interrupt handlers.

pub mod mutex;

pub use mutex::{IrqMutex, IrqMutexGuard};
