//! Tern Kernel Core - Module Isolation State Machine
//!
//! This crate contains the **HAL-free** core of the Tern module kernel: the
//! kernel objects, the boundary every module call crosses, the shared object
//! pool, and the module manager that loads, starts and tears modules down.
//!
//! # Architecture
//!
//! ```text
//!   module thread                         tern-kernel-core
//!  ┌──────────────┐   request, P0..P2   ┌──────────────────────────────────────┐
//!  │  module code │ ──────────────────▶ │ dispatch::module_call                 │
//!  └──────────────┘                     │   table ──▶ policy ──▶ handler        │
//!         ▲                             │   (checks)  (predicates) (primitive)  │
//!         │ callback queue              │                                       │
//!         │                             │ ┌────────────┐  ┌──────────────────┐  │
//!  ┌──────────────┐   notify::drain     │ │ objects::* │  │ pool: ObjectPool │  │
//!  │callback thread│◀────────────────── │ │ 8 classes  │  │ owner headers    │  │
//!  └──────────────┘                     │ └────────────┘  └──────────────────┘  │
//!                                       │ ┌─────────────────────────────────┐   │
//!                                       │ │ manager: load/start/stop/unload │   │
//!                                       │ └─────────────────────────────────┘   │
//!                                       └──────────────────────────────────────┘
//!                                                        │ CommitType
//!                                                        ▼
//!                                       tern-kernel (HAL, audit gateway)
//! ```
//!
//! # Module Organization
//!
//! - `types`, `status` - Addresses, object classes and result words
//! - `memory`, `arena` - Simulated address space and first-fit allocator
//! - `objects` - Threads, timers, queues, event flags, semaphores, mutexes,
//!   block pools and byte pools
//! - `pool` - Shared object pool with per-module ownership
//! - `predicates` - Memory-protection range checks
//! - `dispatch` - Request table, per-request validation and handlers
//! - `manager` - Module lifecycle and teardown
//! - `invariants` - Runtime-checkable invariants

#![no_std]
extern crate alloc;

pub mod arena;
pub mod config;
pub mod dispatch;
pub mod invariants;
pub mod manager;
pub mod memory;
pub mod module;
pub mod notify;
pub mod objects;
pub mod pool;
pub mod predicates;
pub mod state;
pub mod status;
pub mod time;
pub mod types;
pub mod wait;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, KernelConfig};
pub use dispatch::{module_call, ApplicationDispatch, ExtensionRange, ExternalDispatch};
pub use invariants::{check_all_invariants, InvariantViolation};
pub use manager::{RunOutcome, StopReport, ThreadRunner};
pub use memory::{Memory, MemoryFault, Region};
pub use module::{ModuleDescriptor, ModuleInstance, ModuleProperties, ModuleState};
pub use notify::CallbackTarget;
pub use state::KernelState;
pub use status::{Completion, Status};
pub use types::{Addr, ModuleId, ObjectClass, NULL, WORD};
