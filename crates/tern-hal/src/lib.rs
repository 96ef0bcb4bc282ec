//! Hardware Abstraction Layer trait for the Tern module kernel
//!
//! The kernel core is pure and never touches hardware. Everything the
//! runtime wrapper needs from the platform goes through this trait:
//!
//! - Monotonic time (drives the kernel tick)
//! - Wall-clock time (audit timestamps)
//! - Interrupt posture (the privileged interrupt-control call)
//! - Debug output (kernel and module-manager logging)

#![no_std]

/// Interrupt posture value meaning "interrupts enabled".
pub const INTERRUPTS_ENABLED: u32 = 0;

/// Interrupt posture value meaning "interrupts disabled".
pub const INTERRUPTS_DISABLED: u32 = 1;

/// Default kernel tick period (10 ms).
pub const DEFAULT_TICK_PERIOD_NANOS: u64 = 10_000_000;

/// Hardware Abstraction Layer trait
///
/// Implementations provide platform-specific functionality for:
/// - Time measurement
/// - Interrupt masking
/// - Debug output
pub trait HAL: Send + Sync + 'static {
    // === Time ===

    /// Get current time in nanoseconds (monotonic)
    fn now_nanos(&self) -> u64;

    /// Get wall-clock time in milliseconds since Unix epoch
    ///
    /// This is real time-of-day, not monotonic.
    fn wallclock_ms(&self) -> u64;

    /// Length of one kernel tick in nanoseconds
    fn tick_period_nanos(&self) -> u64 {
        DEFAULT_TICK_PERIOD_NANOS
    }

    // === Interrupts ===

    /// Apply a new interrupt posture and return the previous one.
    ///
    /// # Returns
    /// * `Ok(previous)` - Posture applied
    /// * `Err(HalError::InvalidArgument)` - Posture value not understood
    fn set_interrupt_posture(&self, posture: u32) -> Result<u32, HalError>;

    // === Debug ===

    /// Write a debug message to the platform's console/log
    fn debug_write(&self, msg: &str);
}

/// HAL errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// Operation not supported on this platform
    #[error("operation not supported")]
    NotSupported,
    /// Invalid argument
    #[error("invalid argument")]
    InvalidArgument,
}
