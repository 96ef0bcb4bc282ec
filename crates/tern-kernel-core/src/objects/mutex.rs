//! Recursive mutexes
//!
//! Ownership passes directly to the first waiter on release. Priority
//! inheritance is recorded but applied by the scheduler.

use crate::objects::{self, KernelObject, ObjectHeader, WaitList};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ObjectClass, INHERIT, NO_WAIT, NULL};
use crate::wait::{self, WaitReason};

pub struct Mutex {
    pub header: ObjectHeader,
    pub owner: Option<Addr>,
    pub ownership_count: u32,
    pub inherit: bool,
    pub waiters: WaitList,
}

impl KernelObject for Mutex {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

pub fn create(state: &mut KernelState, addr: Addr, header: ObjectHeader, inherit: u32, cb_size: u32) -> Status {
    if let Err(e) = objects::check_new_control_block(state, ObjectClass::Mutex, addr, cb_size, Status::MutexError) {
        return e;
    }
    if inherit > INHERIT {
        return Status::InheritError;
    }
    state.mutexes.insert(
        addr,
        Mutex {
            header,
            owner: None,
            ownership_count: 0,
            inherit: inherit == INHERIT,
            waiters: WaitList::new(),
        },
    );
    objects::record_created(state, ObjectClass::Mutex, addr);
    Status::Success
}

pub fn delete(state: &mut KernelState, addr: Addr) -> Status {
    let Some(m) = state.mutexes.remove(addr) else {
        return Status::MutexError;
    };
    wait::release_all(state, m.waiters, Status::Deleted);
    objects::record_deleted(state, ObjectClass::Mutex, addr);
    Status::Success
}

pub fn get(state: &mut KernelState, addr: Addr, wait_option: u32) -> Completion {
    let current = state.current_thread;
    let Some(m) = state.mutexes.get_mut(addr) else {
        return Status::MutexError.into();
    };
    let Some(caller) = current else {
        return Status::CallerError.into();
    };
    let owner = m.owner;
    match owner {
        None => {
            m.owner = Some(caller);
            m.ownership_count = 1;
            Status::Success.into()
        }
        Some(owner) if owner == caller => {
            m.ownership_count += 1;
            Status::Success.into()
        }
        Some(_) if wait_option == NO_WAIT => Status::NotAvailable.into(),
        Some(_) => wait::suspend(state, WaitReason::Mutex { mutex: addr }, wait_option),
    }
}

/// Hand the mutex to its next waiter, or leave it free.
fn transfer(state: &mut KernelState, addr: Addr) {
    let Some(m) = state.mutexes.get_mut(addr) else {
        return;
    };
    let next = m.waiters.pop_front();
    m.owner = next;
    m.ownership_count = u32::from(next.is_some());
    if let Some(thread) = next {
        wait::resume(state, thread, Status::Success);
    }
}

pub fn put(state: &mut KernelState, addr: Addr) -> Status {
    let current = state.current_thread;
    let Some(m) = state.mutexes.get_mut(addr) else {
        return Status::MutexError;
    };
    if m.owner.is_none() || m.owner != current {
        return Status::NotOwned;
    }
    m.ownership_count -= 1;
    if m.ownership_count == 0 {
        transfer(state, addr);
    }
    Status::Success
}

/// Release every mutex owned by a thread that is finishing.
pub fn release_owned_by(state: &mut KernelState, thread: Addr) {
    let owned: alloc::vec::Vec<Addr> = state
        .mutexes
        .iter()
        .filter(|(_, m)| m.owner == Some(thread))
        .map(|(a, _)| a)
        .collect();
    for addr in owned {
        transfer(state, addr);
    }
}

pub fn prioritize(state: &mut KernelState, addr: Addr) -> Status {
    let Some(waiters) = state.mutexes.get_mut(addr).map(|m| core::mem::take(&mut m.waiters)) else {
        return Status::MutexError;
    };
    let waiters = wait::prioritize(state, waiters);
    if let Some(m) = state.mutexes.get_mut(addr) {
        m.waiters = waiters;
    }
    Status::Success
}

/// Outputs: name, ownership count, owner, first suspended, suspended count, next mutex.
pub fn info_get(state: &mut KernelState, addr: Addr, outs: [Addr; 6]) -> Status {
    let Some(m) = state.mutexes.get(addr) else {
        return Status::MutexError;
    };
    let values = [
        m.header.name_ptr,
        m.ownership_count,
        m.owner.unwrap_or(NULL),
        m.waiters.front().copied().unwrap_or(NULL),
        m.waiters.len() as u32,
        state.mutexes.next_after(addr),
    ];
    let outputs: alloc::vec::Vec<(Addr, u32)> = outs.into_iter().zip(values).collect();
    crate::status::flatten(objects::write_outputs(state, &outputs))
}
