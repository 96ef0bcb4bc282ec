//! Counting semaphores

use crate::notify::{self, CallbackTarget, NotifyKind};
use crate::objects::{self, KernelObject, ObjectHeader, WaitList};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ObjectClass, NO_WAIT, NULL};
use crate::wait::{self, WaitReason};

pub struct Semaphore {
    pub header: ObjectHeader,
    pub count: u32,
    pub waiters: WaitList,
}

impl KernelObject for Semaphore {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

pub fn create(state: &mut KernelState, addr: Addr, header: ObjectHeader, initial_count: u32, cb_size: u32) -> Status {
    if let Err(e) =
        objects::check_new_control_block(state, ObjectClass::Semaphore, addr, cb_size, Status::SemaphoreError)
    {
        return e;
    }
    state.semaphores.insert(
        addr,
        Semaphore {
            header,
            count: initial_count,
            waiters: WaitList::new(),
        },
    );
    objects::record_created(state, ObjectClass::Semaphore, addr);
    Status::Success
}

pub fn delete(state: &mut KernelState, addr: Addr) -> Status {
    let Some(sem) = state.semaphores.remove(addr) else {
        return Status::SemaphoreError;
    };
    wait::release_all(state, sem.waiters, Status::Deleted);
    objects::record_deleted(state, ObjectClass::Semaphore, addr);
    Status::Success
}

pub fn get(state: &mut KernelState, addr: Addr, wait_option: u32) -> Completion {
    let Some(sem) = state.semaphores.get_mut(addr) else {
        return Status::SemaphoreError.into();
    };
    if sem.count > 0 {
        sem.count -= 1;
        return Status::Success.into();
    }
    if wait_option == NO_WAIT {
        return Status::NoInstance.into();
    }
    wait::suspend(state, WaitReason::Semaphore { semaphore: addr }, wait_option)
}

pub fn put(state: &mut KernelState, addr: Addr) -> Status {
    let Some(sem) = state.semaphores.get_mut(addr) else {
        return Status::SemaphoreError;
    };
    let waiter = sem.waiters.pop_front();
    if waiter.is_none() {
        sem.count = sem.count.wrapping_add(1);
    }
    if let Some(thread) = waiter {
        wait::resume(state, thread, Status::Success);
    }
    let target = state.semaphores.get(addr).and_then(|s| s.header.notify);
    notify::raise(state, target, NotifyKind::SemaphorePut, addr, 0);
    Status::Success
}

pub fn ceiling_put(state: &mut KernelState, addr: Addr, ceiling: u32) -> Status {
    let Some(sem) = state.semaphores.get(addr) else {
        return Status::SemaphoreError;
    };
    if ceiling == 0 {
        return Status::InvalidCeiling;
    }
    if sem.waiters.is_empty() && sem.count >= ceiling {
        return Status::CeilingExceeded;
    }
    put(state, addr)
}

pub fn prioritize(state: &mut KernelState, addr: Addr) -> Status {
    let Some(waiters) = state.semaphores.get_mut(addr).map(|s| core::mem::take(&mut s.waiters)) else {
        return Status::SemaphoreError;
    };
    let waiters = wait::prioritize(state, waiters);
    if let Some(sem) = state.semaphores.get_mut(addr) {
        sem.waiters = waiters;
    }
    Status::Success
}

/// Outputs: name, current count, first suspended, suspended count, next semaphore.
pub fn info_get(state: &mut KernelState, addr: Addr, outs: [Addr; 5]) -> Status {
    let Some(sem) = state.semaphores.get(addr) else {
        return Status::SemaphoreError;
    };
    let values = [
        sem.header.name_ptr,
        sem.count,
        sem.waiters.front().copied().unwrap_or(NULL),
        sem.waiters.len() as u32,
        state.semaphores.next_after(addr),
    ];
    let outputs: alloc::vec::Vec<(Addr, u32)> = outs.into_iter().zip(values).collect();
    crate::status::flatten(objects::write_outputs(state, &outputs))
}

pub fn put_notify(state: &mut KernelState, addr: Addr, target: Option<CallbackTarget>) -> Status {
    match state.semaphores.get_mut(addr) {
        Some(sem) => {
            sem.header.notify = target;
            Status::Success
        }
        None => Status::SemaphoreError,
    }
}
