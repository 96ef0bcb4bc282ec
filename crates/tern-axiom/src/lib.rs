//! Axiom audit layer for the Tern module kernel
//!
//! Every module call into the kernel passes through the [`AxiomGateway`]:
//!
//! - [`SysLog`] records each request and its response word (audit trail)
//! - [`CommitLog`] records each kernel state mutation, hash-chained so the
//!   history can be verified after the fact
//!
//! The kernel core produces [`CommitType`] values; this crate only stores
//! and verifies them.

#![no_std]
extern crate alloc;

pub mod commitlog;
pub mod gateway;
pub mod syslog;
pub mod types;

pub use commitlog::{Commit, CommitLog, CommitType};
pub use gateway::{AxiomGateway, GatewayState};
pub use syslog::{SysEvent, SysEventType, SysLog};
pub use types::{CallerId, CommitId, EventId};
