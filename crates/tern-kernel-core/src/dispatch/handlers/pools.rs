//! Block and byte pool calls

use crate::dispatch::Call;
use crate::objects::{block_pool, byte_pool};
use crate::state::KernelState;
use crate::status::Completion;
use crate::types::ObjectClass;

use super::{delete_object, header, outputs};

// P0 pool, P1 out, P2 wait
pub fn block_allocate(state: &mut KernelState, call: &Call<'_>) -> Completion {
    block_pool::allocate(state, call.p0(), call.p1(), call.p2())
}

/// Extra: block size, storage start, storage size, control block size.
pub fn block_pool_create(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let header = header(state, call, call.p1());
    block_pool::create(
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

pub fn block_pool_delete(state: &mut KernelState, call: &Call<'_>) -> Completion {
    delete_object(state, call, ObjectClass::BlockPool)
}

pub fn block_pool_info_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    block_pool::info_get(state, call.p0(), outputs::<6>(call)).into()
}

pub fn block_pool_prioritize(state: &mut KernelState, call: &Call<'_>) -> Completion {
    block_pool::prioritize(state, call.p0()).into()
}

pub fn block_release(state: &mut KernelState, call: &Call<'_>) -> Completion {
    block_pool::release(state, call.p0()).into()
}

/// P0 pool, P1 out; extra: size, wait.
pub fn byte_allocate(state: &mut KernelState, call: &Call<'_>) -> Completion {
    byte_pool::allocate(state, call.p0(), call.p1(), call.extra(0), call.extra(1))
}

/// Extra: storage start, storage size, control block size.
pub fn byte_pool_create(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let header = header(state, call, call.p1());
    byte_pool::create(state, call.p0(), header, call.extra(0), call.extra(1), call.extra(2)).into()
}

pub fn byte_pool_delete(state: &mut KernelState, call: &Call<'_>) -> Completion {
    delete_object(state, call, ObjectClass::BytePool)
}

pub fn byte_pool_info_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    byte_pool::info_get(state, call.p0(), outputs::<6>(call)).into()
}

pub fn byte_pool_prioritize(state: &mut KernelState, call: &Call<'_>) -> Completion {
    byte_pool::prioritize(state, call.p0()).into()
}

pub fn byte_release(state: &mut KernelState, call: &Call<'_>) -> Completion {
    byte_pool::release(state, call.p0()).into()
}
