//! Mock HAL implementation for testing the Tern module kernel
//!
//! This provides a mock implementation of the HAL trait that can be used
//! for unit testing the kernel without real hardware.

#![no_std]
extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tern_hal::{HalError, DEFAULT_TICK_PERIOD_NANOS, HAL, INTERRUPTS_DISABLED, INTERRUPTS_ENABLED};

/// Mock HAL for unit testing
///
/// Provides simulated time, interrupt posture and a captured debug log.
pub struct MockHal {
    /// Simulated time in nanoseconds
    time: AtomicU64,
    /// Simulated wall clock in milliseconds
    wallclock: AtomicU64,
    /// Tick period in nanoseconds
    tick_period: AtomicU64,
    /// Current interrupt posture
    posture: AtomicU32,
    /// Captured debug messages
    debug_log: RefCell<Vec<String>>,
}

impl MockHal {
    /// Create a new mock HAL
    pub fn new() -> Self {
        Self::with_time(0)
    }

    /// Create a mock HAL with a specific starting time
    pub fn with_time(nanos: u64) -> Self {
        Self {
            time: AtomicU64::new(nanos),
            wallclock: AtomicU64::new(1737504000000),
            tick_period: AtomicU64::new(DEFAULT_TICK_PERIOD_NANOS),
            posture: AtomicU32::new(INTERRUPTS_ENABLED),
            debug_log: RefCell::new(Vec::new()),
        }
    }

    /// Advance the simulated time by the given duration
    pub fn advance_time(&self, nanos: u64) {
        self.time.fetch_add(nanos, Ordering::SeqCst);
        self.wallclock.fetch_add(nanos / 1_000_000, Ordering::SeqCst);
    }

    /// Advance the simulated time by a whole number of kernel ticks
    pub fn advance_ticks(&self, ticks: u64) {
        let period = self.tick_period.load(Ordering::SeqCst);
        self.advance_time(period.saturating_mul(ticks));
    }

    /// Set the simulated time to a specific value
    pub fn set_time(&self, nanos: u64) {
        self.time.store(nanos, Ordering::SeqCst);
    }

    /// Change the tick period
    pub fn set_tick_period(&self, nanos: u64) {
        self.tick_period.store(nanos, Ordering::SeqCst);
    }

    /// Current interrupt posture
    pub fn interrupt_posture(&self) -> u32 {
        self.posture.load(Ordering::SeqCst)
    }

    /// Get all captured debug messages
    pub fn get_debug_log(&self) -> Vec<String> {
        self.debug_log.borrow().clone()
    }

    /// Clear the debug log
    pub fn clear_debug_log(&self) {
        self.debug_log.borrow_mut().clear();
    }

    /// Check if a specific message was logged
    pub fn has_log_containing(&self, substr: &str) -> bool {
        self.debug_log
            .borrow()
            .iter()
            .any(|msg| msg.contains(substr))
    }

    /// Get the number of debug messages
    pub fn debug_log_count(&self) -> usize {
        self.debug_log.borrow().len()
    }
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

// MockHal is Send + Sync because it uses atomic operations and RefCell
// is only accessed in single-threaded test contexts
unsafe impl Send for MockHal {}
unsafe impl Sync for MockHal {}

impl HAL for MockHal {
    fn now_nanos(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    fn wallclock_ms(&self) -> u64 {
        self.wallclock.load(Ordering::SeqCst)
    }

    fn tick_period_nanos(&self) -> u64 {
        self.tick_period.load(Ordering::SeqCst)
    }

    fn set_interrupt_posture(&self, posture: u32) -> Result<u32, HalError> {
        if posture != INTERRUPTS_ENABLED && posture != INTERRUPTS_DISABLED {
            return Err(HalError::InvalidArgument);
        }
        Ok(self.posture.swap(posture, Ordering::SeqCst))
    }

    fn debug_write(&self, msg: &str) {
        self.debug_log.borrow_mut().push(String::from(msg));
    }
}
