//! Call handlers
//!
//! A handler runs after its policy has passed. It unpacks the call's
//! parameter words into the primitive's arguments, substitutes kernel-owned
//! callbacks and entry shells for module code pointers, and returns the
//! primitive's result unchanged.

pub mod pools;
pub mod queue;
pub mod sync;
pub mod system;
pub mod thread;
pub mod timer;

use alloc::string::String;

use crate::dispatch::Call;
use crate::memory::Region;
use crate::notify::CallbackTarget;
use crate::objects::{self, ObjectHeader};
use crate::pool;
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ObjectClass, NULL};

/// Read a NUL-terminated string from the caller's data or code, or from
/// anywhere mapped for unprotected callers. Unreadable names come back empty.
pub(crate) fn read_name(state: &KernelState, call: &Call<'_>, name_ptr: Addr) -> String {
    if name_ptr == NULL {
        return String::new();
    }
    let mut limits = state
        .module(call.module)
        .map(|m| [m.data, m.code])
        .into_iter()
        .flatten()
        .collect::<alloc::vec::Vec<Region>>();
    limits.extend(Region::from_bounds(name_ptr, u32::MAX));
    limits
        .iter()
        .find_map(|limit| state.memory.read_cstr(name_ptr, limit).ok())
        .unwrap_or_default()
}

/// Header for a new object, with the name read from the caller's memory.
pub(crate) fn header(state: &KernelState, call: &Call<'_>, name_ptr: Addr) -> ObjectHeader {
    if name_ptr == NULL {
        return ObjectHeader::default();
    }
    ObjectHeader::named(name_ptr, &read_name(state, call, name_ptr))
}

/// Callback target for a module callback pointer; null clears.
pub(crate) fn module_callback(call: &Call<'_>, callback: Addr) -> Option<CallbackTarget> {
    (callback != NULL).then_some(CallbackTarget::Module {
        module: call.module,
        callback,
    })
}

/// Output pointers of an info call: P1, then the extra parameters.
pub(crate) fn outputs<const N: usize>(call: &Call<'_>) -> [Addr; N] {
    let mut outs = [NULL; N];
    if let Some((first, rest)) = outs.split_first_mut() {
        *first = call.p1();
        for (out, ptr) in rest.iter_mut().zip(call.extra) {
            *out = *ptr;
        }
    }
    outs
}

/// Delete the object named by P0. A pool-resident control block owned by
/// the caller goes back to the pool.
pub(crate) fn delete_object(state: &mut KernelState, call: &Call<'_>, class: ObjectClass) -> Completion {
    let addr = call.p0();
    let status = objects::delete(state, class, addr);
    let pool_owned = state
        .object_pool
        .as_ref()
        .is_some_and(|p| p.owner_of(addr) == Some(call.module));
    if status.is_success() && pool_owned {
        pool::release(state, addr);
    }
    status.into()
}

/// Validated but not built into this kernel.
pub(crate) fn not_enabled(_state: &mut KernelState, _call: &Call<'_>) -> Completion {
    Status::FeatureNotEnabled.into()
}
