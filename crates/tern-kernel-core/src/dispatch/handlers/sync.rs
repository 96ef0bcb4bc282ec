//! Event flag, mutex and semaphore calls

use crate::dispatch::Call;
use crate::objects::{event_flags, mutex, semaphore};
use crate::state::KernelState;
use crate::status::Completion;
use crate::types::ObjectClass;

use super::{delete_object, header, module_callback, outputs};

// ============================================================================
// Event flags
// ============================================================================

/// P2 is the control block size.
pub fn event_flags_create(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let header = header(state, call, call.p1());
    event_flags::create(state, call.p0(), header, call.p2()).into()
}

pub fn event_flags_delete(state: &mut KernelState, call: &Call<'_>) -> Completion {
    delete_object(state, call, ObjectClass::EventFlags)
}

/// P1 requested flags; extra: option, actual flags out, wait.
pub fn event_flags_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    event_flags::get(state, call.p0(), call.p1(), call.extra(0), call.extra(1), call.extra(2))
}

pub fn event_flags_info_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    event_flags::info_get(state, call.p0(), outputs::<5>(call)).into()
}

pub fn event_flags_set(state: &mut KernelState, call: &Call<'_>) -> Completion {
    event_flags::set(state, call.p0(), call.p1(), call.p2()).into()
}

pub fn event_flags_set_notify(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let target = module_callback(call, call.p1());
    event_flags::set_notify(state, call.p0(), target).into()
}

// ============================================================================
// Mutexes
// ============================================================================

/// Extra: inherit, control block size.
pub fn mutex_create(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let header = header(state, call, call.p1());
    mutex::create(state, call.p0(), header, call.extra(0), call.extra(1)).into()
}

pub fn mutex_delete(state: &mut KernelState, call: &Call<'_>) -> Completion {
    delete_object(state, call, ObjectClass::Mutex)
}

pub fn mutex_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    mutex::get(state, call.p0(), call.p1())
}

pub fn mutex_info_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    mutex::info_get(state, call.p0(), outputs::<6>(call)).into()
}

pub fn mutex_prioritize(state: &mut KernelState, call: &Call<'_>) -> Completion {
    mutex::prioritize(state, call.p0()).into()
}

pub fn mutex_put(state: &mut KernelState, call: &Call<'_>) -> Completion {
    mutex::put(state, call.p0()).into()
}

// ============================================================================
// Semaphores
// ============================================================================

pub fn semaphore_ceiling_put(state: &mut KernelState, call: &Call<'_>) -> Completion {
    semaphore::ceiling_put(state, call.p0(), call.p1()).into()
}

/// Extra: initial count, control block size.
pub fn semaphore_create(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let header = header(state, call, call.p1());
    semaphore::create(state, call.p0(), header, call.extra(0), call.extra(1)).into()
}

pub fn semaphore_delete(state: &mut KernelState, call: &Call<'_>) -> Completion {
    delete_object(state, call, ObjectClass::Semaphore)
}

pub fn semaphore_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    semaphore::get(state, call.p0(), call.p1())
}

pub fn semaphore_info_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    semaphore::info_get(state, call.p0(), outputs::<5>(call)).into()
}

pub fn semaphore_prioritize(state: &mut KernelState, call: &Call<'_>) -> Completion {
    semaphore::prioritize(state, call.p0()).into()
}

pub fn semaphore_put(state: &mut KernelState, call: &Call<'_>) -> Completion {
    semaphore::put(state, call.p0()).into()
}

pub fn semaphore_put_notify(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let target = module_callback(call, call.p1());
    semaphore::put_notify(state, call.p0(), target).into()
}
