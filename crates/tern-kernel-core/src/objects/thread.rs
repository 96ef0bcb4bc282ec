//! Threads
//!
//! The scheduler itself lives outside the core; a thread here carries the
//! state the scheduler and the module manager need: priority, threshold,
//! stack range, run state, any wait in progress, and the module it belongs
//! to when it was created through the module shell.

use crate::memory::Region;
use crate::notify::{self, CallbackTarget, NotifyKind};
use crate::objects::{self, mutex, KernelObject, ObjectHeader};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ModuleId, ObjectClass, ThreadState, AUTO_START, NULL, THREAD_EXIT};
use crate::wait::{self, WaitReason};

/// Where a thread starts executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadEntry {
    /// Trusted kernel code
    Kernel(Addr),
    /// Module code, entered through the kernel-owned module shell
    ModuleShell { module: ModuleId, entry: Addr },
}

impl ThreadEntry {
    pub fn function(&self) -> Addr {
        match self {
            ThreadEntry::Kernel(f) => *f,
            ThreadEntry::ModuleShell { entry, .. } => *entry,
        }
    }

    pub fn module(&self) -> Option<ModuleId> {
        match self {
            ThreadEntry::Kernel(_) => None,
            ThreadEntry::ModuleShell { module, .. } => Some(*module),
        }
    }
}

/// Arguments to [`create`].
#[derive(Clone, Debug)]
pub struct ThreadSpec {
    pub addr: Addr,
    pub header: ObjectHeader,
    pub entry: ThreadEntry,
    pub entry_input: u32,
    pub stack_start: Addr,
    pub stack_size: u32,
    pub priority: u32,
    pub preempt_threshold: u32,
    pub time_slice: u32,
    pub auto_start: u32,
    pub cb_size: u32,
}

pub struct Thread {
    pub header: ObjectHeader,
    pub entry: ThreadEntry,
    pub entry_input: u32,
    pub stack: Region,
    pub priority: u32,
    pub preempt_threshold: u32,
    pub time_slice: u32,
    pub state: ThreadState,
    /// Module association, set when entered through the module shell
    pub module: Option<ModuleId>,
    pub wait: Option<WaitReason>,
    /// Ticks left before the current wait times out
    pub timeout: Option<u32>,
    /// Status delivered when the last wait ended
    pub completion: Option<Status>,
    /// Suspend requested while waiting; applied when the wait ends
    pub delayed_suspend: bool,
    pub run_count: u32,
}

impl KernelObject for Thread {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

pub fn create(state: &mut KernelState, spec: ThreadSpec) -> Status {
    if let Err(e) = objects::check_new_control_block(state, ObjectClass::Thread, spec.addr, spec.cb_size, Status::ThreadError)
    {
        return e;
    }
    let Some(stack) = Region::new(spec.stack_start, spec.stack_size) else {
        return Status::PtrError;
    };
    if spec.stack_start == NULL || state.threads.iter().any(|(_, t)| t.stack.overlaps(&stack)) {
        return Status::PtrError;
    }
    if spec.entry.function() == NULL {
        return Status::PtrError;
    }
    if spec.stack_size < state.config.minimum_stack {
        return Status::SizeError;
    }
    if spec.priority >= state.config.max_priorities {
        return Status::PriorityError;
    }
    if spec.preempt_threshold > spec.priority {
        return Status::ThreshError;
    }
    if spec.auto_start > AUTO_START {
        return Status::START_ERROR;
    }

    let run_state = if spec.auto_start == AUTO_START {
        ThreadState::Ready
    } else {
        ThreadState::Suspended
    };
    state.threads.insert(
        spec.addr,
        Thread {
            header: spec.header,
            entry: spec.entry,
            entry_input: spec.entry_input,
            stack,
            priority: spec.priority,
            preempt_threshold: spec.preempt_threshold,
            time_slice: spec.time_slice,
            state: run_state,
            module: spec.entry.module(),
            wait: None,
            timeout: None,
            completion: None,
            delayed_suspend: false,
            run_count: 0,
        },
    );
    objects::record_created(state, ObjectClass::Thread, spec.addr);
    Status::Success
}

/// Delete a finished thread.
pub fn delete(state: &mut KernelState, addr: Addr) -> Status {
    match state.threads.get(addr) {
        None => return Status::ThreadError,
        Some(t) if !t.state.is_finished() => return Status::DeleteError,
        Some(_) => {}
    }
    state.threads.remove(addr);
    if state.current_thread == Some(addr) {
        state.current_thread = None;
    }
    objects::record_deleted(state, ObjectClass::Thread, addr);
    Status::Success
}

fn finish(state: &mut KernelState, addr: Addr, final_state: ThreadState) {
    wait::detach(state, addr);
    mutex::release_owned_by(state, addr);
    let target = match state.threads.get_mut(addr) {
        Some(t) => {
            t.state = final_state;
            t.delayed_suspend = false;
            t.header.notify
        }
        None => None,
    };
    notify::raise(state, target, NotifyKind::ThreadEntryExit, addr, THREAD_EXIT);
}

pub fn terminate(state: &mut KernelState, addr: Addr) -> Status {
    match state.threads.get(addr) {
        None => Status::ThreadError,
        Some(t) if t.state.is_finished() => Status::Success,
        Some(_) => {
            finish(state, addr, ThreadState::Terminated);
            Status::Success
        }
    }
}

/// The thread returned from its entry function.
pub fn complete(state: &mut KernelState, addr: Addr) -> Status {
    match state.threads.get(addr) {
        None => Status::ThreadError,
        Some(t) if t.state.is_finished() => Status::Success,
        Some(_) => {
            finish(state, addr, ThreadState::Completed);
            Status::Success
        }
    }
}

pub fn suspend(state: &mut KernelState, addr: Addr) -> Status {
    let Some(t) = state.threads.get_mut(addr) else {
        return Status::ThreadError;
    };
    if t.state.is_finished() {
        return Status::SuspendError;
    }
    if t.wait.is_some() {
        t.delayed_suspend = true;
    } else {
        t.state = ThreadState::Suspended;
    }
    Status::Success
}

pub fn resume(state: &mut KernelState, addr: Addr) -> Status {
    let Some(t) = state.threads.get_mut(addr) else {
        return Status::ThreadError;
    };
    if t.state == ThreadState::Suspended {
        t.state = ThreadState::Ready;
        Status::Success
    } else if t.delayed_suspend {
        t.delayed_suspend = false;
        Status::SuspendLifted
    } else {
        Status::ResumeError
    }
}

/// Return a finished thread to its initial, suspended state.
pub fn reset(state: &mut KernelState, addr: Addr) -> Status {
    let Some(t) = state.threads.get_mut(addr) else {
        return Status::ThreadError;
    };
    if !t.state.is_finished() {
        return Status::NotDone;
    }
    t.state = ThreadState::Suspended;
    t.completion = None;
    t.timeout = None;
    Status::Success
}

pub fn sleep(state: &mut KernelState, ticks: u32) -> Completion {
    if !state.current_thread.is_some_and(|t| state.threads.contains(t)) {
        return Status::CallerError.into();
    }
    if ticks == 0 {
        return Status::Success.into();
    }
    wait::suspend(state, WaitReason::Sleep, ticks)
}

pub fn relinquish(state: &mut KernelState) -> Status {
    if let Some(t) = state.current_thread.and_then(|a| state.threads.get_mut(a)) {
        t.run_count = t.run_count.wrapping_add(1);
    }
    Status::Success
}

pub fn identify(state: &KernelState) -> Addr {
    state.current_thread.unwrap_or(NULL)
}

pub fn wait_abort(state: &mut KernelState, addr: Addr) -> Status {
    let Some(t) = state.threads.get(addr) else {
        return Status::ThreadError;
    };
    if t.wait.is_none() {
        return Status::WaitAbortError;
    }
    wait::cancel(state, addr, Status::WaitAborted);
    Status::Success
}

fn write_old(state: &mut KernelState, old_out: Addr, old: u32) -> Result<(), Status> {
    if old_out == NULL {
        return Err(Status::PtrError);
    }
    objects::write_outputs(state, &[(old_out, old)])
}

pub fn priority_change(state: &mut KernelState, addr: Addr, new_priority: u32, old_out: Addr) -> Status {
    let Some(old) = state.threads.get(addr).map(|t| t.priority) else {
        return Status::ThreadError;
    };
    if new_priority >= state.config.max_priorities {
        return Status::PriorityError;
    }
    if let Err(e) = write_old(state, old_out, old) {
        return e;
    }
    if let Some(t) = state.threads.get_mut(addr) {
        t.priority = new_priority;
        t.preempt_threshold = new_priority;
    }
    Status::Success
}

pub fn preemption_change(state: &mut KernelState, addr: Addr, new_threshold: u32, old_out: Addr) -> Status {
    let Some((old, priority)) = state.threads.get(addr).map(|t| (t.preempt_threshold, t.priority)) else {
        return Status::ThreadError;
    };
    if new_threshold > priority {
        return Status::ThreshError;
    }
    if let Err(e) = write_old(state, old_out, old) {
        return e;
    }
    if let Some(t) = state.threads.get_mut(addr) {
        t.preempt_threshold = new_threshold;
    }
    Status::Success
}

pub fn time_slice_change(state: &mut KernelState, addr: Addr, new_slice: u32, old_out: Addr) -> Status {
    let Some(old) = state.threads.get(addr).map(|t| t.time_slice) else {
        return Status::ThreadError;
    };
    if let Err(e) = write_old(state, old_out, old) {
        return e;
    }
    if let Some(t) = state.threads.get_mut(addr) {
        t.time_slice = new_slice;
    }
    Status::Success
}

/// Outputs: name, state, run count, priority, threshold, time slice,
/// next thread, next suspended thread.
pub fn info_get(state: &mut KernelState, addr: Addr, outs: [Addr; 8]) -> Status {
    let Some(t) = state.threads.get(addr) else {
        return Status::ThreadError;
    };
    let values = [
        t.header.name_ptr,
        t.state as u32,
        t.run_count,
        t.priority,
        t.preempt_threshold,
        t.time_slice,
        state.threads.next_after(addr),
        NULL,
    ];
    let outputs: alloc::vec::Vec<(Addr, u32)> = outs.into_iter().zip(values).collect();
    crate::status::flatten(objects::write_outputs(state, &outputs))
}

pub fn entry_exit_notify(state: &mut KernelState, addr: Addr, target: Option<CallbackTarget>) -> Status {
    match state.threads.get_mut(addr) {
        Some(t) => {
            t.header.notify = target;
            Status::Success
        }
        None => Status::ThreadError,
    }
}

pub fn stack_error_notify(state: &mut KernelState, target: Option<CallbackTarget>) -> Status {
    state.stack_error_handler = target;
    Status::Success
}
