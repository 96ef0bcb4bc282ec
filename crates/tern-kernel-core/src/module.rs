//! Module instances
//!
//! A module is a unit of less-trusted code and data running under the
//! shared scheduler. Its instance records the memory it may touch, the
//! capabilities it was loaded with, its control threads, and the list of
//! shared-pool allocations it owns.

use alloc::string::String;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::memory::Region;
use crate::types::{Addr, ModuleId, NULL};

bitflags! {
    /// Capability flags a module is loaded with.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModuleProperties: u32 {
        /// Module threads run unprivileged; privileged-only calls are refused.
        const USER_MODE = 0x0000_0001;
        /// Every pointer the module passes is range-checked.
        const MEMORY_PROTECTION = 0x0000_0002;
    }
}

/// Lifecycle state, with the module manager's numeric codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ModuleState {
    Loaded = 1,
    Started = 2,
    Stopping = 3,
    Stopped = 4,
}

/// Head and length of a module's shared-pool allocation list.
///
/// The links themselves live in the pool's side table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationList {
    pub head: Option<Addr>,
    pub count: u32,
}

/// Everything needed to load a module.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub code_start: Addr,
    pub code_size: u32,
    pub data_start: Addr,
    pub data_size: u32,
    /// Raw property bits, see [`ModuleProperties`]
    pub properties: u32,
    /// Start routine, inside the code region
    pub start_entry: Addr,
    /// Optional stop routine, inside the code region (0 for none)
    #[serde(default)]
    pub stop_entry: Addr,
    /// Callback dispatch routine, inside the code region
    pub callback_entry: Addr,
    pub start_stop_priority: u32,
    pub callback_priority: u32,
    /// Most privileged (numerically lowest) priority module threads may use
    pub max_priority: u32,
    pub start_stop_stack_size: u32,
    pub callback_stack_size: u32,
}

/// A loaded module.
#[derive(Clone, Debug)]
pub struct ModuleInstance {
    pub id: ModuleId,
    pub name: String,
    pub state: ModuleState,
    pub code: Region,
    pub data: Region,
    pub properties: ModuleProperties,
    /// Priority/threshold floor for threads this module creates
    pub max_priority: u32,
    pub start_stop_priority: u32,
    pub callback_priority: u32,
    pub start_stop_stack_size: u32,
    pub callback_stack_size: u32,
    pub start_entry: Addr,
    pub stop_entry: Addr,
    pub callback_entry: Addr,
    /// Start/stop control thread (kernel memory), null when not started
    pub start_stop_thread: Addr,
    /// Callback dispatch thread (kernel memory)
    pub callback_thread: Addr,
    /// Callback request queue (kernel memory)
    pub callback_queue: Addr,
    /// Callback messages dropped because the queue was full
    pub callback_overflows: u32,
    pub allocations: AllocationList,
}

impl ModuleInstance {
    pub fn new(id: ModuleId, desc: &ModuleDescriptor, code: Region, data: Region, properties: ModuleProperties) -> Self {
        Self {
            id,
            name: desc.name.clone(),
            state: ModuleState::Loaded,
            code,
            data,
            properties,
            max_priority: desc.max_priority,
            start_stop_priority: desc.start_stop_priority,
            callback_priority: desc.callback_priority,
            start_stop_stack_size: desc.start_stop_stack_size,
            callback_stack_size: desc.callback_stack_size,
            start_entry: desc.start_entry,
            stop_entry: desc.stop_entry,
            callback_entry: desc.callback_entry,
            start_stop_thread: NULL,
            callback_thread: NULL,
            callback_queue: NULL,
            callback_overflows: 0,
            allocations: AllocationList::default(),
        }
    }

    pub fn memory_protected(&self) -> bool {
        self.properties.contains(ModuleProperties::MEMORY_PROTECTION)
    }

    pub fn user_mode(&self) -> bool {
        self.properties.contains(ModuleProperties::USER_MODE)
    }
}
