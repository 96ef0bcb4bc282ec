//! Thread suspension
//!
//! A blocking primitive that cannot be satisfied records a [`WaitReason`] on
//! the calling thread and appends it to the object's wait list. The thread
//! is woken with a completion status by the object (resource handed over,
//! object deleted), by `wait_abort`, or by timeout on tick.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::objects::WaitList;
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ThreadState, WAIT_FOREVER};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitReason {
    Sleep,
    Semaphore { semaphore: Addr },
    Mutex { mutex: Addr },
    QueueReceive { queue: Addr, destination: Addr },
    QueueSend { queue: Addr, message: Vec<u32>, front: bool },
    EventFlags { group: Addr, requested: u32, option: u32, actual_out: Addr },
    BlockAllocate { pool: Addr, out: Addr },
    ByteAllocate { pool: Addr, out: Addr, size: u32 },
}

impl WaitReason {
    pub fn thread_state(&self) -> ThreadState {
        match self {
            WaitReason::Sleep => ThreadState::Sleep,
            WaitReason::Semaphore { .. } => ThreadState::SemaphoreSuspended,
            WaitReason::Mutex { .. } => ThreadState::MutexSuspended,
            WaitReason::QueueReceive { .. } | WaitReason::QueueSend { .. } => ThreadState::QueueSuspended,
            WaitReason::EventFlags { .. } => ThreadState::EventFlagsSuspended,
            WaitReason::BlockAllocate { .. } => ThreadState::BlockMemory,
            WaitReason::ByteAllocate { .. } => ThreadState::ByteMemory,
        }
    }

    /// Status the thread receives when its wait times out.
    pub fn timeout_status(&self) -> Status {
        match self {
            WaitReason::Sleep => Status::Success,
            WaitReason::Semaphore { .. } => Status::NoInstance,
            WaitReason::Mutex { .. } => Status::NotAvailable,
            WaitReason::QueueReceive { .. } => Status::QueueEmpty,
            WaitReason::QueueSend { .. } => Status::QueueFull,
            WaitReason::EventFlags { .. } => Status::NoEvents,
            WaitReason::BlockAllocate { .. } | WaitReason::ByteAllocate { .. } => Status::NoMemory,
        }
    }
}

fn wait_list<'a>(state: &'a mut KernelState, reason: &WaitReason) -> Option<&'a mut WaitList> {
    match reason {
        WaitReason::Sleep => None,
        WaitReason::Semaphore { semaphore } => state.semaphores.get_mut(*semaphore).map(|o| &mut o.waiters),
        WaitReason::Mutex { mutex } => state.mutexes.get_mut(*mutex).map(|o| &mut o.waiters),
        WaitReason::QueueReceive { queue, .. } | WaitReason::QueueSend { queue, .. } => {
            state.queues.get_mut(*queue).map(|o| &mut o.waiters)
        }
        WaitReason::EventFlags { group, .. } => state.event_flags.get_mut(*group).map(|o| &mut o.waiters),
        WaitReason::BlockAllocate { pool, .. } => state.block_pools.get_mut(*pool).map(|o| &mut o.waiters),
        WaitReason::ByteAllocate { pool, .. } => state.byte_pools.get_mut(*pool).map(|o| &mut o.waiters),
    }
}

/// Suspend the current thread for `reason`.
///
/// `wait_option` is a tick count or [`WAIT_FOREVER`]; callers handle the
/// no-wait case themselves.
pub fn suspend(state: &mut KernelState, reason: WaitReason, wait_option: u32) -> Completion {
    let Some(current) = state.current_thread else {
        return Status::WaitError.into();
    };
    if !state.threads.contains(current) {
        return Status::WaitError.into();
    }
    if let Some(list) = wait_list(state, &reason) {
        list.push_back(current);
    }
    if let Some(t) = state.threads.get_mut(current) {
        t.state = reason.thread_state();
        t.timeout = (wait_option != WAIT_FOREVER).then_some(wait_option);
        t.completion = None;
        t.wait = Some(reason);
    }
    Completion::Suspended
}

/// Wake a thread already removed from its object's wait list.
pub fn resume(state: &mut KernelState, thread: Addr, status: Status) {
    if let Some(t) = state.threads.get_mut(thread) {
        t.wait = None;
        t.timeout = None;
        t.completion = Some(status);
        t.state = if t.delayed_suspend {
            t.delayed_suspend = false;
            ThreadState::Suspended
        } else {
            ThreadState::Ready
        };
    }
}

/// Remove a waiting thread from its wait list and wake it with `status`.
///
/// Returns false if the thread was not waiting.
pub fn cancel(state: &mut KernelState, thread: Addr, status: Status) -> bool {
    let Some(reason) = state.threads.get(thread).and_then(|t| t.wait.clone()) else {
        return false;
    };
    if let Some(list) = wait_list(state, &reason) {
        list.retain(|a| *a != thread);
    }
    resume(state, thread, status);
    true
}

/// Drop a thread's wait without waking it (the thread is being terminated).
pub fn detach(state: &mut KernelState, thread: Addr) {
    let Some(reason) = state.threads.get(thread).and_then(|t| t.wait.clone()) else {
        return;
    };
    if let Some(list) = wait_list(state, &reason) {
        list.retain(|a| *a != thread);
    }
    if let Some(t) = state.threads.get_mut(thread) {
        t.wait = None;
        t.timeout = None;
    }
}

/// Wake every thread on a detached wait list.
pub fn release_all(state: &mut KernelState, waiters: WaitList, status: Status) {
    for thread in waiters {
        resume(state, thread, status);
    }
}

/// Move the highest-priority waiter to the front; the rest keep their order.
pub fn prioritize(state: &KernelState, mut waiters: WaitList) -> WaitList {
    let best = waiters
        .iter()
        .enumerate()
        .min_by_key(|(i, a)| (state.threads.get(**a).map_or(u32::MAX, |t| t.priority), *i))
        .map(|(i, _)| i);
    if let Some(i) = best {
        if let Some(thread) = waiters.remove(i) {
            waiters.push_front(thread);
        }
    }
    waiters
}

/// Count down wait timeouts by one tick; expired waits get their timeout status.
pub fn expire_timeouts(state: &mut KernelState) {
    let mut expired = VecDeque::new();
    for addr in state.threads.created().to_vec() {
        if let Some(t) = state.threads.get_mut(addr) {
            if let Some(remaining) = t.timeout.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    expired.push_back(addr);
                }
            }
        }
    }
    for addr in expired {
        let status = state
            .threads
            .get(addr)
            .and_then(|t| t.wait.as_ref())
            .map(WaitReason::timeout_status);
        if let Some(status) = status {
            cancel(state, addr, status);
        }
    }
}
