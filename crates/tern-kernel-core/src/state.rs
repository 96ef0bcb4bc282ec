//! Kernel state
//!
//! All mutable kernel data lives in [`KernelState`]: the address space, the
//! object registries, the module table, the shared object pool, and the
//! bookkeeping that serializes module start and stop.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use tern_axiom::CommitType;

use crate::arena::Arena;
use crate::config::{ConfigError, KernelConfig};
use crate::dispatch::Extensions;
use crate::memory::Memory;
use crate::module::ModuleInstance;
use crate::notify::{CallbackTarget, Notification};
use crate::objects::{
    BlockPool, BytePool, EventFlags, KernelObject, Mutex, ObjectHeader, Queue, Registry, Semaphore,
    Thread, Timer,
};
use crate::pool::ObjectPool;
use crate::types::{Addr, ModuleId, ObjectClass, NULL};

pub struct KernelState {
    pub config: KernelConfig,
    pub memory: Memory,
    /// Allocator for module control threads, stacks and callback queues
    pub kernel_heap: Arena,
    pub object_pool: Option<ObjectPool>,
    pub modules: BTreeMap<ModuleId, ModuleInstance>,

    pub threads: Registry<Thread>,
    pub timers: Registry<Timer>,
    pub queues: Registry<Queue>,
    pub event_flags: Registry<EventFlags>,
    pub semaphores: Registry<Semaphore>,
    pub mutexes: Registry<Mutex>,
    pub block_pools: Registry<BlockPool>,
    pub byte_pools: Registry<BytePool>,

    /// Thread on whose behalf the current call runs
    pub current_thread: Option<Addr>,
    pub ticks: u32,
    /// Nesting depth of preemption-disabled sections
    pub preempt_disable: u32,
    pub interrupt_posture: u32,
    /// Module whose start or stop currently holds the manager lock
    pub manager_lock: Option<ModuleId>,
    pub stack_error_handler: Option<CallbackTarget>,
    pub extensions: Extensions,
    pub pending_notifications: VecDeque<Notification>,

    commits: Vec<CommitType>,
    next_module_id: u32,
}

impl KernelState {
    pub fn new(config: KernelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let kernel_region = config.kernel_memory()?;
        let mut memory = Memory::new();
        memory
            .map(kernel_region)
            .map_err(|_| ConfigError::KernelMemoryLayout)?;

        Ok(Self {
            config,
            memory,
            kernel_heap: Arena::new(kernel_region),
            object_pool: None,
            modules: BTreeMap::new(),
            threads: Registry::default(),
            timers: Registry::default(),
            queues: Registry::default(),
            event_flags: Registry::default(),
            semaphores: Registry::default(),
            mutexes: Registry::default(),
            block_pools: Registry::default(),
            byte_pools: Registry::default(),
            current_thread: None,
            ticks: 0,
            preempt_disable: 0,
            interrupt_posture: 0,
            manager_lock: None,
            stack_error_handler: None,
            extensions: Extensions::default(),
            pending_notifications: VecDeque::new(),
            commits: Vec::new(),
            next_module_id: 1,
        })
    }

    /// Record a state mutation for the audit log.
    pub fn record(&mut self, commit: CommitType) {
        self.commits.push(commit);
    }

    /// Take the mutations recorded since the last call.
    pub fn take_commits(&mut self) -> Vec<CommitType> {
        core::mem::take(&mut self.commits)
    }

    pub fn alloc_module_id(&mut self) -> ModuleId {
        let id = ModuleId(self.next_module_id);
        self.next_module_id += 1;
        id
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleInstance> {
        self.modules.get(&id)
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut ModuleInstance> {
        self.modules.get_mut(&id)
    }

    /// Module associated with a thread.
    pub fn thread_module(&self, thread: Addr) -> Option<ModuleId> {
        self.threads.get(thread).and_then(|t| t.module)
    }

    /// Module a control block belongs to: its pool owner, or the module
    /// whose data region holds it.
    pub fn object_owner(&self, addr: Addr) -> Option<ModuleId> {
        if let Some(owner) = self.object_pool.as_ref().and_then(|p| p.owner_of(addr)) {
            return Some(owner);
        }
        self.modules
            .values()
            .find(|m| m.data.contains_addr(addr))
            .map(|m| m.id)
    }

    // ========================================================================
    // Per-class access
    // ========================================================================

    pub fn created(&self, class: ObjectClass) -> Vec<Addr> {
        match class {
            ObjectClass::BlockPool => self.block_pools.created().to_vec(),
            ObjectClass::BytePool => self.byte_pools.created().to_vec(),
            ObjectClass::EventFlags => self.event_flags.created().to_vec(),
            ObjectClass::Mutex => self.mutexes.created().to_vec(),
            ObjectClass::Queue => self.queues.created().to_vec(),
            ObjectClass::Semaphore => self.semaphores.created().to_vec(),
            ObjectClass::Thread => self.threads.created().to_vec(),
            ObjectClass::Timer => self.timers.created().to_vec(),
        }
    }

    pub fn count(&self, class: ObjectClass) -> u32 {
        match class {
            ObjectClass::BlockPool => self.block_pools.count(),
            ObjectClass::BytePool => self.byte_pools.count(),
            ObjectClass::EventFlags => self.event_flags.count(),
            ObjectClass::Mutex => self.mutexes.count(),
            ObjectClass::Queue => self.queues.count(),
            ObjectClass::Semaphore => self.semaphores.count(),
            ObjectClass::Thread => self.threads.count(),
            ObjectClass::Timer => self.timers.count(),
        }
    }

    pub fn version(&self, class: ObjectClass) -> u64 {
        match class {
            ObjectClass::BlockPool => self.block_pools.version(),
            ObjectClass::BytePool => self.byte_pools.version(),
            ObjectClass::EventFlags => self.event_flags.version(),
            ObjectClass::Mutex => self.mutexes.version(),
            ObjectClass::Queue => self.queues.version(),
            ObjectClass::Semaphore => self.semaphores.version(),
            ObjectClass::Thread => self.threads.version(),
            ObjectClass::Timer => self.timers.version(),
        }
    }

    pub fn header(&self, class: ObjectClass, addr: Addr) -> Option<&ObjectHeader> {
        match class {
            ObjectClass::BlockPool => self.block_pools.get(addr).map(KernelObject::header),
            ObjectClass::BytePool => self.byte_pools.get(addr).map(KernelObject::header),
            ObjectClass::EventFlags => self.event_flags.get(addr).map(KernelObject::header),
            ObjectClass::Mutex => self.mutexes.get(addr).map(KernelObject::header),
            ObjectClass::Queue => self.queues.get(addr).map(KernelObject::header),
            ObjectClass::Semaphore => self.semaphores.get(addr).map(KernelObject::header),
            ObjectClass::Thread => self.threads.get(addr).map(KernelObject::header),
            ObjectClass::Timer => self.timers.get(addr).map(KernelObject::header),
        }
    }

    pub fn header_mut(&mut self, class: ObjectClass, addr: Addr) -> Option<&mut ObjectHeader> {
        match class {
            ObjectClass::BlockPool => self.block_pools.get_mut(addr).map(KernelObject::header_mut),
            ObjectClass::BytePool => self.byte_pools.get_mut(addr).map(KernelObject::header_mut),
            ObjectClass::EventFlags => self.event_flags.get_mut(addr).map(KernelObject::header_mut),
            ObjectClass::Mutex => self.mutexes.get_mut(addr).map(KernelObject::header_mut),
            ObjectClass::Queue => self.queues.get_mut(addr).map(KernelObject::header_mut),
            ObjectClass::Semaphore => self.semaphores.get_mut(addr).map(KernelObject::header_mut),
            ObjectClass::Thread => self.threads.get_mut(addr).map(KernelObject::header_mut),
            ObjectClass::Timer => self.timers.get_mut(addr).map(KernelObject::header_mut),
        }
    }

    /// Class of a live object.
    pub fn class_of(&self, addr: Addr) -> Option<ObjectClass> {
        ObjectClass::TEARDOWN_ORDER
            .into_iter()
            .find(|c| self.header(*c, addr).is_some())
    }

    pub fn object_exists(&self, addr: Addr) -> bool {
        addr != NULL && self.class_of(addr).is_some()
    }

    pub fn find_by_name(&self, class: ObjectClass, name: &str) -> Option<Addr> {
        match class {
            ObjectClass::BlockPool => self.block_pools.find_by_name(name),
            ObjectClass::BytePool => self.byte_pools.find_by_name(name),
            ObjectClass::EventFlags => self.event_flags.find_by_name(name),
            ObjectClass::Mutex => self.mutexes.find_by_name(name),
            ObjectClass::Queue => self.queues.find_by_name(name),
            ObjectClass::Semaphore => self.semaphores.find_by_name(name),
            ObjectClass::Thread => self.threads.find_by_name(name),
            ObjectClass::Timer => self.timers.find_by_name(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_maps_kernel_memory() {
        let state = KernelState::new(KernelConfig::default()).expect("state");
        let cfg = KernelConfig::default();
        assert!(state.memory.is_mapped(cfg.kernel_memory_start, cfg.kernel_memory_size));
        assert_eq!(state.kernel_heap.available(), cfg.kernel_memory_size);
        assert!(state.object_pool.is_none());
        assert_eq!(state.count(ObjectClass::Thread), 0);
    }

    #[test]
    fn test_module_ids_are_monotonic() {
        let mut state = KernelState::new(KernelConfig::default()).expect("state");
        assert_eq!(state.alloc_module_id(), ModuleId(1));
        assert_eq!(state.alloc_module_id(), ModuleId(2));
    }

    #[test]
    fn test_commits_are_taken_once() {
        let mut state = KernelState::new(KernelConfig::default()).expect("state");
        state.record(CommitType::TimeSet { ticks: 5 });
        assert_eq!(state.take_commits().len(), 1);
        assert!(state.take_commits().is_empty());
    }
}
