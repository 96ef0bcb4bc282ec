//! Thread calls
//!
//! Module threads never start at a module address directly: the entry is
//! wrapped in the kernel-owned module shell, which also ties the thread to
//! the creating module.

use crate::dispatch::Call;
use crate::objects::thread::{self, ThreadEntry, ThreadSpec};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::ObjectClass;

use super::{delete_object, header, module_callback, outputs};

/// Extra: entry, entry input, stack start, stack size, priority, threshold,
/// time slice, auto start, control block size.
pub fn thread_create(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let spec = ThreadSpec {
        addr: call.p0(),
        header: header(state, call, call.p1()),
        entry: ThreadEntry::ModuleShell {
            module: call.module,
            entry: call.extra(0),
        },
        entry_input: call.extra(1),
        stack_start: call.extra(2),
        stack_size: call.extra(3),
        priority: call.extra(4),
        preempt_threshold: call.extra(5),
        time_slice: call.extra(6),
        auto_start: call.extra(7),
        cb_size: call.extra(8),
    };
    thread::create(state, spec).into()
}

pub fn thread_delete(state: &mut KernelState, call: &Call<'_>) -> Completion {
    delete_object(state, call, ObjectClass::Thread)
}

/// A protected module may only watch its own threads.
pub fn thread_entry_exit_notify(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let protected = state.module(call.module).is_some_and(|m| m.memory_protected());
    if protected {
        if !state.threads.contains(call.p0()) {
            return Status::ThreadError.into();
        }
        if state.thread_module(call.p0()) != Some(call.module) {
            return Status::Invalid.into();
        }
    }
    let target = module_callback(call, call.p1());
    thread::entry_exit_notify(state, call.p0(), target).into()
}

/// Returns the calling thread's address rather than a status.
pub fn thread_identify(state: &mut KernelState, _call: &Call<'_>) -> Completion {
    Completion::Return(thread::identify(state))
}

pub fn thread_info_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::info_get(state, call.p0(), outputs::<8>(call)).into()
}

/// Returns the previous posture rather than a status.
pub fn thread_interrupt_control(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let old = core::mem::replace(&mut state.interrupt_posture, call.p0());
    Completion::Return(old)
}

pub fn thread_preemption_change(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::preemption_change(state, call.p0(), call.p1(), call.p2()).into()
}

pub fn thread_priority_change(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::priority_change(state, call.p0(), call.p1(), call.p2()).into()
}

pub fn thread_relinquish(state: &mut KernelState, _call: &Call<'_>) -> Completion {
    thread::relinquish(state).into()
}

pub fn thread_reset(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::reset(state, call.p0()).into()
}

pub fn thread_resume(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::resume(state, call.p0()).into()
}

pub fn thread_sleep(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::sleep(state, call.p0())
}

pub fn thread_stack_error_notify(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let target = module_callback(call, call.p0());
    thread::stack_error_notify(state, target).into()
}

pub fn thread_suspend(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::suspend(state, call.p0()).into()
}

/// Suspend the calling thread; P0 must name it.
pub fn thread_system_suspend(state: &mut KernelState, call: &Call<'_>) -> Completion {
    if state.current_thread != Some(call.p0()) {
        return Status::InvalidMemory.into();
    }
    thread::suspend(state, call.p0()).into()
}

pub fn thread_terminate(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::terminate(state, call.p0()).into()
}

pub fn thread_time_slice_change(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::time_slice_change(state, call.p0(), call.p1(), call.p2()).into()
}

pub fn thread_wait_abort(state: &mut KernelState, call: &Call<'_>) -> Completion {
    thread::wait_abort(state, call.p0()).into()
}

#[cfg(test)]
mod tests {
    use crate::dispatch::handlers::fixture::{self, CODE, MODULE, THREAD};
    use crate::dispatch::{module_call, request};
    use crate::module::ModuleProperties;
    use crate::notify::CallbackTarget;
    use crate::status::{Completion, Status};
    use crate::test_support::spawn_other;

    #[test]
    fn test_entry_exit_notify_rejects_foreign_thread() {
        let mut s = fixture::protected();
        let kernel = spawn_other(&mut s);
        assert_eq!(
            module_call(&mut s, request::THREAD_ENTRY_EXIT_NOTIFY, [kernel, CODE + 0x40, 0]),
            Completion::from(Status::Invalid)
        );
        assert!(s.threads.get(kernel).is_some_and(|t| t.header.notify.is_none()));

        assert_eq!(
            module_call(&mut s, request::THREAD_ENTRY_EXIT_NOTIFY, [THREAD, CODE + 0x40, 0]),
            Completion::from(Status::Success)
        );
        assert!(matches!(
            s.threads.get(THREAD).and_then(|t| t.header.notify),
            Some(CallbackTarget::Module { module, callback }) if module == MODULE && callback == CODE + 0x40
        ));
    }

    #[test]
    fn test_entry_exit_notify_on_any_thread_without_protection() {
        let mut s = fixture::with_properties(ModuleProperties::empty());
        let kernel = spawn_other(&mut s);
        assert_eq!(
            module_call(&mut s, request::THREAD_ENTRY_EXIT_NOTIFY, [kernel, CODE + 0x40, 0]),
            Completion::from(Status::Success)
        );
    }
}
