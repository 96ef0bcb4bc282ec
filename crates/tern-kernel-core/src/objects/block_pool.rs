//! Fixed-size block pools
//!
//! Each block is preceded by one header word holding the owning pool's
//! address, written into the pool's storage at creation.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::arena::word_align;
use crate::memory::Region;
use crate::objects::{self, KernelObject, ObjectHeader, WaitList};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ObjectClass, NO_WAIT, NULL, WORD};
use crate::wait::{self, WaitReason};

pub struct BlockPool {
    pub header: ObjectHeader,
    /// Payload size of each block, word aligned
    pub block_size: u32,
    pub storage: Region,
    pub total: u32,
    pub free: Vec<Addr>,
    pub allocated: BTreeSet<Addr>,
    pub waiters: WaitList,
}

impl KernelObject for BlockPool {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

pub fn create(
    state: &mut KernelState,
    addr: Addr,
    header: ObjectHeader,
    block_size: u32,
    start: Addr,
    size: u32,
    cb_size: u32,
) -> Status {
    if let Err(e) = objects::check_new_control_block(state, ObjectClass::BlockPool, addr, cb_size, Status::PoolError) {
        return e;
    }
    let Some(storage) = Region::new(start, size).filter(|_| start != NULL) else {
        return Status::PtrError;
    };
    let Some(block_size) = word_align(block_size.max(WORD)) else {
        return Status::SizeError;
    };
    let stride = block_size + WORD;
    let total = size / stride;
    if total == 0 {
        return Status::SizeError;
    }

    // Blocks are handed out lowest address first.
    let mut free = Vec::new();
    for i in (0..total).rev() {
        let block_header = start + i * stride;
        if state.memory.write_word(block_header, addr).is_err() {
            return Status::PtrError;
        }
        free.push(block_header + WORD);
    }

    state.block_pools.insert(
        addr,
        BlockPool {
            header,
            block_size,
            storage,
            total,
            free,
            allocated: BTreeSet::new(),
            waiters: WaitList::new(),
        },
    );
    objects::record_created(state, ObjectClass::BlockPool, addr);
    Status::Success
}

pub fn delete(state: &mut KernelState, addr: Addr) -> Status {
    let Some(pool) = state.block_pools.remove(addr) else {
        return Status::PoolError;
    };
    wait::release_all(state, pool.waiters, Status::Deleted);
    objects::record_deleted(state, ObjectClass::BlockPool, addr);
    Status::Success
}

pub fn allocate(state: &mut KernelState, addr: Addr, out: Addr, wait_option: u32) -> Completion {
    let Some(pool) = state.block_pools.get(addr) else {
        return Status::PoolError.into();
    };
    if out == NULL || !state.memory.is_mapped(out, WORD) {
        return Status::PtrError.into();
    }
    if pool.free.is_empty() {
        if wait_option == NO_WAIT {
            return Status::NoMemory.into();
        }
        return wait::suspend(state, WaitReason::BlockAllocate { pool: addr, out }, wait_option);
    }
    let Some(block) = state.block_pools.get_mut(addr).and_then(|p| {
        let block = p.free.pop()?;
        p.allocated.insert(block);
        Some(block)
    }) else {
        return Status::NoMemory.into();
    };
    crate::status::flatten(objects::write_outputs(state, &[(out, block)])).into()
}

/// Return a block to the pool recorded in its header word.
pub fn release(state: &mut KernelState, block: Addr) -> Status {
    let Some(pool_addr) = block
        .checked_sub(WORD)
        .and_then(|h| state.memory.read_word(h).ok())
        .filter(|p| state.block_pools.get(*p).is_some_and(|pool| pool.allocated.contains(&block)))
    else {
        return Status::PtrError;
    };

    let waiter = state.block_pools.get_mut(pool_addr).and_then(|p| p.waiters.pop_front());
    let out = waiter.and_then(|t| match state.threads.get(t).and_then(|th| th.wait.as_ref()) {
        Some(WaitReason::BlockAllocate { out, .. }) => Some(*out),
        _ => None,
    });
    match (waiter, out) {
        (Some(thread), Some(out)) => {
            let status = crate::status::flatten(objects::write_outputs(state, &[(out, block)]));
            wait::resume(state, thread, status);
        }
        _ => {
            if let Some(p) = state.block_pools.get_mut(pool_addr) {
                p.allocated.remove(&block);
                p.free.push(block);
            }
        }
    }
    Status::Success
}

pub fn prioritize(state: &mut KernelState, addr: Addr) -> Status {
    let Some(waiters) = state.block_pools.get_mut(addr).map(|p| core::mem::take(&mut p.waiters)) else {
        return Status::PoolError;
    };
    let waiters = wait::prioritize(state, waiters);
    if let Some(p) = state.block_pools.get_mut(addr) {
        p.waiters = waiters;
    }
    Status::Success
}

/// Outputs: name, available blocks, total blocks, first suspended, suspended count, next pool.
pub fn info_get(state: &mut KernelState, addr: Addr, outs: [Addr; 6]) -> Status {
    let Some(p) = state.block_pools.get(addr) else {
        return Status::PoolError;
    };
    let values = [
        p.header.name_ptr,
        p.free.len() as u32,
        p.total,
        p.waiters.front().copied().unwrap_or(NULL),
        p.waiters.len() as u32,
        state.block_pools.next_after(addr),
    ];
    let outputs: Vec<(Addr, u32)> = outs.into_iter().zip(values).collect();
    crate::status::flatten(objects::write_outputs(state, &outputs))
}
