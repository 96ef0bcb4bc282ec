//! Kernel configuration
//!
//! Every field has a default matching the stock build, so a configuration
//! file only needs to name what it changes.

use serde::{Deserialize, Serialize};

use crate::memory::Region;
use crate::types::{Addr, WORD};

/// Build-time kernel parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Start of kernel-owned memory (control threads and their queues)
    pub kernel_memory_start: Addr,
    /// Size of kernel-owned memory in bytes
    pub kernel_memory_size: u32,
    /// Number of priority levels; valid priorities are `0..max_priorities`
    pub max_priorities: u32,
    /// Smallest stack a thread may be created with
    pub minimum_stack: u32,
    /// Time slices a module stop routine gets before it is terminated
    pub stop_poll_limit: u32,
    /// Depth of each module's callback request queue
    pub callback_queue_depth: u32,
    /// Time slice given to module control threads
    pub control_time_slice: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            kernel_memory_start: 0x0010_0000,
            kernel_memory_size: 0x0001_0000,
            max_priorities: 32,
            minimum_stack: 200,
            stop_poll_limit: 100,
            callback_queue_depth: 8,
            control_time_slice: 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("kernel memory at {start:#010x} of {size} bytes wraps the address space")]
    KernelMemoryWraps { start: Addr, size: u32 },
    #[error("kernel memory must be non-empty and word aligned")]
    KernelMemoryLayout,
    #[error("max_priorities must be between 1 and 1024, got {0}")]
    Priorities(u32),
    #[error("callback queue depth must be non-zero")]
    CallbackQueueDepth,
    #[error("stop poll limit must be non-zero")]
    StopPollLimit,
}

impl KernelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let region = self.kernel_memory()?;
        if region.is_empty() || region.start % WORD != 0 {
            return Err(ConfigError::KernelMemoryLayout);
        }
        if self.max_priorities == 0 || self.max_priorities > 1024 {
            return Err(ConfigError::Priorities(self.max_priorities));
        }
        if self.callback_queue_depth == 0 {
            return Err(ConfigError::CallbackQueueDepth);
        }
        if self.stop_poll_limit == 0 {
            return Err(ConfigError::StopPollLimit);
        }
        Ok(())
    }

    pub fn kernel_memory(&self) -> Result<Region, ConfigError> {
        Region::new(self.kernel_memory_start, self.kernel_memory_size).ok_or(
            ConfigError::KernelMemoryWraps {
                start: self.kernel_memory_start,
                size: self.kernel_memory_size,
            },
        )
    }
}
