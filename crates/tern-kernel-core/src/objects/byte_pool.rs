//! Variable-size byte pools
//!
//! First-fit allocation over the pool's storage. Every allocation is
//! preceded by a two-word block header, so the returned pointer is never
//! the first byte of the storage area.

use alloc::vec::Vec;

use crate::arena::{Arena, ArenaError};
use crate::memory::Region;
use crate::objects::{self, KernelObject, ObjectHeader, WaitList};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ObjectClass, NO_WAIT, NULL, WORD};
use crate::wait::{self, WaitReason};

/// Smallest byte pool that may be created.
pub const MINIMUM_POOL_SIZE: u32 = 100;
/// Bytes reserved before each allocation.
pub const BLOCK_HEADER_SIZE: u32 = 2 * WORD;

pub struct BytePool {
    pub header: ObjectHeader,
    pub storage: Region,
    pub arena: Arena,
    pub waiters: WaitList,
}

impl KernelObject for BytePool {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

pub fn create(state: &mut KernelState, addr: Addr, header: ObjectHeader, start: Addr, size: u32, cb_size: u32) -> Status {
    if let Err(e) = objects::check_new_control_block(state, ObjectClass::BytePool, addr, cb_size, Status::PoolError) {
        return e;
    }
    let Some(storage) = Region::new(start, size).filter(|_| start != NULL) else {
        return Status::PtrError;
    };
    if size < MINIMUM_POOL_SIZE {
        return Status::SizeError;
    }
    state.byte_pools.insert(
        addr,
        BytePool {
            header,
            storage,
            arena: Arena::new(storage),
            waiters: WaitList::new(),
        },
    );
    objects::record_created(state, ObjectClass::BytePool, addr);
    Status::Success
}

pub fn delete(state: &mut KernelState, addr: Addr) -> Status {
    let Some(pool) = state.byte_pools.remove(addr) else {
        return Status::PoolError;
    };
    wait::release_all(state, pool.waiters, Status::Deleted);
    objects::record_deleted(state, ObjectClass::BytePool, addr);
    Status::Success
}

fn carve(pool: &mut BytePool, size: u32) -> Result<Addr, Status> {
    let total = size.checked_add(BLOCK_HEADER_SIZE).ok_or(Status::SizeError)?;
    match pool.arena.allocate(total) {
        Ok(base) => Ok(base + BLOCK_HEADER_SIZE),
        Err(ArenaError::Exhausted { .. }) => Err(Status::NoMemory),
        Err(_) => Err(Status::SizeError),
    }
}

pub fn allocate(state: &mut KernelState, addr: Addr, out: Addr, size: u32, wait_option: u32) -> Completion {
    if !state.byte_pools.contains(addr) {
        return Status::PoolError.into();
    }
    if out == NULL || !state.memory.is_mapped(out, WORD) {
        return Status::PtrError.into();
    }
    if size == 0 {
        return Status::SizeError.into();
    }
    let carved = match state.byte_pools.get_mut(addr) {
        Some(pool) => carve(pool, size),
        None => Err(Status::PoolError),
    };
    match carved {
        Ok(ptr) => crate::status::flatten(objects::write_outputs(state, &[(out, ptr)])).into(),
        Err(Status::NoMemory) if wait_option != NO_WAIT => {
            wait::suspend(state, WaitReason::ByteAllocate { pool: addr, out, size }, wait_option)
        }
        Err(e) => e.into(),
    }
}

/// Release memory back to the pool whose storage holds it, then satisfy
/// waiters in order while memory allows.
pub fn release(state: &mut KernelState, ptr: Addr) -> Status {
    let Some(base) = ptr.checked_sub(BLOCK_HEADER_SIZE) else {
        return Status::PtrError;
    };
    let Some(pool_addr) = state
        .byte_pools
        .iter()
        .find(|(_, p)| p.arena.allocated_size(base).is_some())
        .map(|(a, _)| a)
    else {
        return Status::PtrError;
    };
    if let Some(pool) = state.byte_pools.get_mut(pool_addr) {
        if pool.arena.release(base).is_err() {
            return Status::PtrError;
        }
    }

    while let Some(thread) = state.byte_pools.get(pool_addr).and_then(|p| p.waiters.front().copied()) {
        let Some(WaitReason::ByteAllocate { out, size, .. }) = state.threads.get(thread).and_then(|t| t.wait.clone()) else {
            break;
        };
        let carved = match state.byte_pools.get_mut(pool_addr) {
            Some(pool) => carve(pool, size),
            None => break,
        };
        let Ok(block) = carved else {
            break;
        };
        if let Some(pool) = state.byte_pools.get_mut(pool_addr) {
            pool.waiters.pop_front();
        }
        let status = crate::status::flatten(objects::write_outputs(state, &[(out, block)]));
        wait::resume(state, thread, status);
    }
    Status::Success
}

pub fn prioritize(state: &mut KernelState, addr: Addr) -> Status {
    let Some(waiters) = state.byte_pools.get_mut(addr).map(|p| core::mem::take(&mut p.waiters)) else {
        return Status::PoolError;
    };
    let waiters = wait::prioritize(state, waiters);
    if let Some(p) = state.byte_pools.get_mut(addr) {
        p.waiters = waiters;
    }
    Status::Success
}

/// Outputs: name, available bytes, fragments, first suspended, suspended count, next pool.
pub fn info_get(state: &mut KernelState, addr: Addr, outs: [Addr; 6]) -> Status {
    let Some(p) = state.byte_pools.get(addr) else {
        return Status::PoolError;
    };
    let values = [
        p.header.name_ptr,
        p.arena.available(),
        p.arena.fragments(),
        p.waiters.front().copied().unwrap_or(NULL),
        p.waiters.len() as u32,
        state.byte_pools.next_after(addr),
    ];
    let outputs: Vec<(Addr, u32)> = outs.into_iter().zip(values).collect();
    crate::status::flatten(objects::write_outputs(state, &outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_current, state};
    use crate::types::WAIT_FOREVER;

    const POOL: Addr = 0x0010_8000;
    const STORAGE: Addr = 0x0010_9000;
    const OUT: Addr = 0x0010_A000;
    const SIZE: u32 = 52;

    #[test]
    fn test_create_minimum_size() {
        let mut s = state();
        assert_eq!(create(&mut s, POOL, ObjectHeader::default(), STORAGE, 99, SIZE), Status::SizeError);
        assert_eq!(create(&mut s, POOL, ObjectHeader::default(), STORAGE, 128, SIZE), Status::Success);
    }

    #[test]
    fn test_allocate_leaves_header_room() {
        let mut s = state();
        create(&mut s, POOL, ObjectHeader::default(), STORAGE, 128, SIZE);
        assert_eq!(allocate(&mut s, POOL, OUT, 0, NO_WAIT), Completion::from(Status::SizeError));
        assert_eq!(allocate(&mut s, POOL, OUT, 40, NO_WAIT), Completion::from(Status::Success));
        let ptr = s.memory.read_word(OUT).expect("out");
        assert_eq!(ptr, STORAGE + BLOCK_HEADER_SIZE);
        assert_eq!(allocate(&mut s, POOL, OUT, 200, NO_WAIT), Completion::from(Status::NoMemory));
        assert_eq!(release(&mut s, ptr), Status::Success);
        assert_eq!(release(&mut s, ptr), Status::PtrError);
        assert_eq!(s.byte_pools.get(POOL).map(|p| p.arena.available()), Some(128));
    }

    #[test]
    fn test_release_satisfies_waiter() {
        let mut s = state();
        let t = spawn_current(&mut s);
        create(&mut s, POOL, ObjectHeader::default(), STORAGE, 128, SIZE);
        allocate(&mut s, POOL, OUT, 100, NO_WAIT);
        let first = s.memory.read_word(OUT).expect("out");
        assert_eq!(allocate(&mut s, POOL, OUT, 64, WAIT_FOREVER), Completion::Suspended);
        assert_eq!(release(&mut s, first), Status::Success);
        assert_eq!(s.threads.get(t).and_then(|x| x.completion), Some(Status::Success));
        assert_eq!(s.memory.read_word(OUT), Ok(first));
    }
}
