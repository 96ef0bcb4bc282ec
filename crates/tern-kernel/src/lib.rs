//! Tern Kernel Runtime
//!
//! Wraps the pure [`tern_kernel_core`] state machine for a host platform:
//! - Every module call passes through the Axiom gateway (SysLog + CommitLog)
//! - Lifecycle events and refused calls are logged through the HAL
//! - Kernel ticks are driven from HAL time
//! - Configuration and module descriptors load from JSON

#![no_std]
extern crate alloc;

mod error;
mod system;

pub use error::KernelError;
pub use system::System;

// Re-export HAL types
pub use tern_hal::{HalError, HAL as HalTrait};

// Re-export Axiom types
pub use tern_axiom::{AxiomGateway, Commit, CommitLog, CommitType, SysEvent, SysEventType, SysLog};

// Re-export the core surface a host needs
pub use tern_kernel_core::{
    check_all_invariants, Addr, ApplicationDispatch, CallbackTarget, Completion, ExtensionRange,
    ExternalDispatch, InvariantViolation, KernelConfig, KernelState, ModuleDescriptor, ModuleId,
    ModuleProperties, ModuleState, ObjectClass, Region, RunOutcome, Status, StopReport,
    ThreadRunner, NULL, WORD,
};
pub use tern_kernel_core::dispatch::request;
