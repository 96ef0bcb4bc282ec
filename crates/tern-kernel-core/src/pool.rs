//! Shared object pool
//!
//! The only place a memory-protected module may put kernel object control
//! blocks. Every allocation carries a hidden header (owner, size, next)
//! ahead of the payload; the header is kept in a side table keyed by the
//! payload address, and the links form the owning module's allocation
//! list.
//!
//! ```text
//!   pool start                                                  pool end
//!   | overhead | header | payload ... | header | payload ... | free ... |
//!                        ^ returned pointer
//! ```

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use tern_axiom::CommitType;

use crate::arena::{Arena, ArenaError};
use crate::memory::Region;
use crate::module::{AllocationList, ModuleInstance};
use crate::state::KernelState;
use crate::status::Status;
use crate::types::{Addr, ModuleId, WORD};

/// Bytes of pool bookkeeping at the start of the pool region.
pub const POOL_OVERHEAD: u32 = 2 * WORD;
/// Bytes of hidden header ahead of every payload.
pub const OBJECT_HEADER_SIZE: u32 = 3 * WORD;

/// Header of one pool allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatedObject {
    pub owner: ModuleId,
    /// Size requested by the module
    pub size: u32,
    /// Next allocation on the owner's list
    pub next: Option<Addr>,
    /// Start of the header (the arena block)
    pub base: Addr,
}

pub struct ObjectPool {
    region: Region,
    arena: Arena,
    objects: BTreeMap<Addr, AllocatedObject>,
}

impl ObjectPool {
    pub fn new(region: Region) -> Result<Self, Status> {
        if region.len() <= POOL_OVERHEAD + OBJECT_HEADER_SIZE {
            return Err(Status::SizeError);
        }
        let usable = Region::from_bounds(region.start + POOL_OVERHEAD, region.end).ok_or(Status::SizeError)?;
        Ok(Self {
            region,
            arena: Arena::new(usable),
            objects: BTreeMap::new(),
        })
    }

    /// The whole pool region, overhead included.
    pub fn region(&self) -> Region {
        self.region
    }

    /// The part of the pool that allocations are carved from.
    pub fn usable(&self) -> Region {
        self.arena.region()
    }

    /// True if `[ptr, ptr + len)` lies past the pool overhead and inside the pool.
    pub fn encloses(&self, ptr: Addr, len: u32) -> bool {
        self.usable().encloses(ptr, len)
    }

    pub fn available(&self) -> u32 {
        self.arena.available()
    }

    pub fn allocation_count(&self) -> usize {
        self.objects.len()
    }

    pub fn record(&self, ptr: Addr) -> Option<&AllocatedObject> {
        self.objects.get(&ptr)
    }

    pub fn recorded_size(&self, ptr: Addr) -> Option<u32> {
        self.objects.get(&ptr).map(|o| o.size)
    }

    pub fn owner_of(&self, ptr: Addr) -> Option<ModuleId> {
        self.objects.get(&ptr).map(|o| o.owner)
    }

    /// Carve `size` bytes for `module` and link the allocation onto its list.
    pub fn allocate(&mut self, size: u32, module: &mut ModuleInstance) -> Result<Addr, Status> {
        let total = size.checked_add(OBJECT_HEADER_SIZE).ok_or(Status::MathOverflow)?;
        let base = self.arena.allocate(total).map_err(|e| match e {
            ArenaError::SizeOverflow => Status::MathOverflow,
            _ => Status::NoMemory,
        })?;
        let payload = base + OBJECT_HEADER_SIZE;
        self.objects.insert(
            payload,
            AllocatedObject {
                owner: module.id,
                size,
                next: module.allocations.head,
                base,
            },
        );
        module.allocations.head = Some(payload);
        module.allocations.count += 1;
        Ok(payload)
    }

    /// Release an allocation. Does not unlink it from its owner's list.
    pub fn deallocate(&mut self, ptr: Addr) -> Result<AllocatedObject, Status> {
        let header = ptr.checked_sub(OBJECT_HEADER_SIZE).ok_or(Status::InvalidMemory)?;
        if !self.encloses(header, OBJECT_HEADER_SIZE) {
            return Err(Status::InvalidMemory);
        }
        let record = *self.objects.get(&ptr).ok_or(Status::PtrError)?;
        self.arena
            .release(record.base)
            .map_err(|_| Status::PtrError)?;
        self.objects.remove(&ptr);
        Ok(record)
    }

    /// True if `[header, payload end)` of a recorded allocation fits the pool.
    pub fn extent_ok(&self, ptr: Addr) -> bool {
        let Some(record) = self.objects.get(&ptr) else {
            return false;
        };
        record
            .size
            .checked_add(OBJECT_HEADER_SIZE)
            .is_some_and(|len| self.encloses(record.base, len))
    }

    /// Remove `ptr` from an allocation list.
    pub fn unlink(&mut self, list: &mut AllocationList, ptr: Addr) -> bool {
        let Some(next) = self.objects.get(&ptr).map(|o| o.next) else {
            return false;
        };
        if list.head == Some(ptr) {
            list.head = next;
            list.count = list.count.saturating_sub(1);
            return true;
        }
        let mut cursor = list.head;
        while let Some(node) = cursor {
            let node_next = self.objects.get(&node).and_then(|o| o.next);
            if node_next == Some(ptr) {
                if let Some(o) = self.objects.get_mut(&node) {
                    o.next = next;
                }
                list.count = list.count.saturating_sub(1);
                return true;
            }
            cursor = node_next;
        }
        false
    }

    /// Allocations on a list, head first.
    pub fn walk(&self, list: &AllocationList) -> Vec<Addr> {
        let mut out = Vec::new();
        let mut cursor = list.head;
        while let Some(node) = cursor {
            if out.len() > self.objects.len() {
                break;
            }
            out.push(node);
            cursor = self.objects.get(&node).and_then(|o| o.next);
        }
        out
    }
}

/// True if `ptr` lies in the module's data region, or is a pool allocation
/// owned by the module.
pub fn owned_by(state: &KernelState, module: ModuleId, ptr: Addr) -> bool {
    if state.module(module).is_some_and(|m| m.data.contains_addr(ptr)) {
        return true;
    }
    state
        .object_pool
        .as_ref()
        .is_some_and(|p| p.encloses(ptr, 1) && p.owner_of(ptr) == Some(module))
}

// ============================================================================
// Kernel-state operations
// ============================================================================

/// Create the shared pool over `region`. Only one pool may ever exist.
pub fn create(state: &mut KernelState, region: Region) -> Status {
    if state.object_pool.is_some() {
        return Status::PoolError;
    }
    let pool = match ObjectPool::new(region) {
        Ok(p) => p,
        Err(e) => return e,
    };
    if state.memory.map(region).is_err() {
        return Status::InvalidMemory;
    }
    state.object_pool = Some(pool);
    state.record(CommitType::ObjectPoolCreated {
        start: region.start,
        size: region.len(),
    });
    Status::Success
}

/// Allocate a zero-filled object for `module`.
pub fn allocate(state: &mut KernelState, module: ModuleId, size: u32) -> Result<Addr, Status> {
    let (Some(pool), Some(instance)) = (state.object_pool.as_mut(), state.modules.get_mut(&module)) else {
        return Err(Status::NoMemory);
    };
    let ptr = pool.allocate(size, instance)?;
    if size > 0 {
        state.memory.fill(ptr, size, 0).map_err(|_| Status::InvalidMemory)?;
    }
    state.record(CommitType::PoolAllocated {
        module: module.0,
        addr: ptr,
        size,
    });
    Ok(ptr)
}

/// Unlink an allocation from its owner's list and free it.
pub fn release(state: &mut KernelState, ptr: Addr) -> Status {
    let Some(pool) = state.object_pool.as_mut() else {
        return Status::NoMemory;
    };
    let Some(owner) = pool.owner_of(ptr) else {
        return Status::PtrError;
    };
    if let Some(m) = state.modules.get_mut(&owner) {
        pool.unlink(&mut m.allocations, ptr);
    }
    match pool.deallocate(ptr) {
        Ok(_) => {
            state.record(CommitType::PoolFreed { addr: ptr });
            Status::Success
        }
        Err(e) => e,
    }
}

/// Free every allocation on a module's list and empty the list.
pub fn release_all(state: &mut KernelState, module: ModuleId) -> u32 {
    let (Some(pool), Some(instance)) = (state.object_pool.as_mut(), state.modules.get_mut(&module)) else {
        return 0;
    };
    let nodes = pool.walk(&instance.allocations);
    instance.allocations = AllocationList::default();
    let mut freed = Vec::new();
    for ptr in nodes {
        if pool.deallocate(ptr).is_ok() {
            freed.push(ptr);
        }
    }
    let count = freed.len() as u32;
    for addr in freed {
        state.record(CommitType::PoolFreed { addr });
    }
    count
}
