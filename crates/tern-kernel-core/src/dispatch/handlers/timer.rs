//! Time and timer calls

use crate::dispatch::Call;
use crate::objects::timer;
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::time;
use crate::types::ObjectClass;

use super::{delete_object, header, module_callback, outputs};

pub fn time_get(state: &mut KernelState, _call: &Call<'_>) -> Completion {
    Completion::Return(time::get(state))
}

pub fn time_set(state: &mut KernelState, call: &Call<'_>) -> Completion {
    time::set(state, call.p0());
    Status::Success.into()
}

pub fn timer_activate(state: &mut KernelState, call: &Call<'_>) -> Completion {
    timer::activate(state, call.p0()).into()
}

/// P1 initial ticks, P2 reschedule ticks.
pub fn timer_change(state: &mut KernelState, call: &Call<'_>) -> Completion {
    timer::change(state, call.p0(), call.p1(), call.p2()).into()
}

/// Extra: expiration callback, expiration input, initial ticks, reschedule
/// ticks, auto activate, control block size.
pub fn timer_create(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let mut header = header(state, call, call.p1());
    header.notify = module_callback(call, call.extra(0));
    timer::create(
        state,
        call.p0(),
        header,
        call.extra(1),
        call.extra(2),
        call.extra(3),
        call.extra(4),
        call.extra(5),
    )
    .into()
}

pub fn timer_deactivate(state: &mut KernelState, call: &Call<'_>) -> Completion {
    timer::deactivate(state, call.p0()).into()
}

pub fn timer_delete(state: &mut KernelState, call: &Call<'_>) -> Completion {
    delete_object(state, call, ObjectClass::Timer)
}

pub fn timer_info_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    timer::info_get(state, call.p0(), outputs::<5>(call)).into()
}
