//! Runtime errors
//!
//! Module calls never fail at the Rust level: they answer with a result
//! word. These errors cover the host-side operations around them.

use tern_kernel_core::{ConfigError, Status};

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The kernel configuration is unusable.
    #[error("invalid kernel configuration: {0}")]
    Config(#[from] ConfigError),

    /// A configuration or module descriptor document did not parse.
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The module manager refused a lifecycle operation.
    #[error("{operation} refused with status {status:?} ({:#04x})", status.word())]
    Refused { operation: &'static str, status: Status },

    /// The object pool region wraps the address space.
    #[error("object pool at {start:#010x} of {size} bytes wraps the address space")]
    PoolRegion { start: u32, size: u32 },
}

impl KernelError {
    /// Status word behind a refused operation, if that is what this is.
    pub fn status(&self) -> Option<Status> {
        match self {
            KernelError::Refused { status, .. } => Some(*status),
            _ => None,
        }
    }
}
