//! Queue calls
//!
//! Send and receive buffers hold exactly one message of the queue's
//! configured size.

use crate::dispatch::Call;
use crate::objects::queue;
use crate::state::KernelState;
use crate::status::Completion;
use crate::types::ObjectClass;

use super::{delete_object, header, module_callback, outputs};

/// Extra: message size in words, storage start, storage size, control block size.
pub fn queue_create(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let header = header(state, call, call.p1());
    queue::create(
        state,
        call.p0(),
        header,
        call.extra(0),
        call.extra(1),
        call.extra(2),
        call.extra(3),
    )
    .into()
}

pub fn queue_delete(state: &mut KernelState, call: &Call<'_>) -> Completion {
    delete_object(state, call, ObjectClass::Queue)
}

pub fn queue_flush(state: &mut KernelState, call: &Call<'_>) -> Completion {
    queue::flush(state, call.p0()).into()
}

pub fn queue_front_send(state: &mut KernelState, call: &Call<'_>) -> Completion {
    queue::front_send(state, call.p0(), call.p1(), call.p2())
}

pub fn queue_info_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    queue::info_get(state, call.p0(), outputs::<6>(call)).into()
}

pub fn queue_prioritize(state: &mut KernelState, call: &Call<'_>) -> Completion {
    queue::prioritize(state, call.p0()).into()
}

pub fn queue_receive(state: &mut KernelState, call: &Call<'_>) -> Completion {
    queue::receive(state, call.p0(), call.p1(), call.p2())
}

pub fn queue_send(state: &mut KernelState, call: &Call<'_>) -> Completion {
    queue::send(state, call.p0(), call.p1(), call.p2())
}

pub fn queue_send_notify(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let target = module_callback(call, call.p1());
    queue::send_notify(state, call.p0(), target).into()
}
