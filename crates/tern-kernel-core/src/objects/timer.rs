//! Application timers
//!
//! The expiration callback is the timer's notify target; it is invoked with
//! the expiration input given at creation.

use alloc::vec::Vec;

use crate::notify::{self, NotifyKind};
use crate::objects::{self, KernelObject, ObjectHeader};
use crate::state::KernelState;
use crate::status::Status;
use crate::types::{Addr, ObjectClass, AUTO_ACTIVATE};

pub struct Timer {
    /// `header.notify` holds the expiration callback
    pub header: ObjectHeader,
    pub expiration_input: u32,
    pub initial_ticks: u32,
    pub reschedule_ticks: u32,
    pub remaining: u32,
    pub active: bool,
}

impl KernelObject for Timer {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

#[allow(clippy::too_many_arguments)]
pub fn create(
    state: &mut KernelState,
    addr: Addr,
    header: ObjectHeader,
    expiration_input: u32,
    initial_ticks: u32,
    reschedule_ticks: u32,
    auto_activate: u32,
    cb_size: u32,
) -> Status {
    if let Err(e) = objects::check_new_control_block(state, ObjectClass::Timer, addr, cb_size, Status::TimerError) {
        return e;
    }
    if initial_ticks == 0 {
        return Status::TickError;
    }
    if auto_activate > AUTO_ACTIVATE {
        return Status::ActivateError;
    }
    state.timers.insert(
        addr,
        Timer {
            header,
            expiration_input,
            initial_ticks,
            reschedule_ticks,
            remaining: initial_ticks,
            active: auto_activate == AUTO_ACTIVATE,
        },
    );
    objects::record_created(state, ObjectClass::Timer, addr);
    Status::Success
}

pub fn delete(state: &mut KernelState, addr: Addr) -> Status {
    if state.timers.remove(addr).is_none() {
        return Status::TimerError;
    }
    objects::record_deleted(state, ObjectClass::Timer, addr);
    Status::Success
}

pub fn activate(state: &mut KernelState, addr: Addr) -> Status {
    let Some(timer) = state.timers.get_mut(addr) else {
        return Status::TimerError;
    };
    if timer.active {
        return Status::ActivateError;
    }
    if timer.remaining == 0 {
        timer.remaining = timer.initial_ticks;
    }
    timer.active = true;
    Status::Success
}

pub fn deactivate(state: &mut KernelState, addr: Addr) -> Status {
    match state.timers.get_mut(addr) {
        Some(timer) => {
            timer.active = false;
            Status::Success
        }
        None => Status::TimerError,
    }
}

/// Change the expiration of an inactive timer.
pub fn change(state: &mut KernelState, addr: Addr, initial_ticks: u32, reschedule_ticks: u32) -> Status {
    let Some(timer) = state.timers.get_mut(addr) else {
        return Status::TimerError;
    };
    if initial_ticks == 0 {
        return Status::TickError;
    }
    timer.initial_ticks = initial_ticks;
    timer.reschedule_ticks = reschedule_ticks;
    timer.remaining = initial_ticks;
    Status::Success
}

/// Outputs: name, active, remaining ticks, reschedule ticks, next timer.
pub fn info_get(state: &mut KernelState, addr: Addr, outs: [Addr; 5]) -> Status {
    let Some(t) = state.timers.get(addr) else {
        return Status::TimerError;
    };
    let values = [
        t.header.name_ptr,
        u32::from(t.active),
        t.remaining,
        t.reschedule_ticks,
        state.timers.next_after(addr),
    ];
    let outputs: Vec<(Addr, u32)> = outs.into_iter().zip(values).collect();
    crate::status::flatten(objects::write_outputs(state, &outputs))
}

/// Advance every active timer by one tick and raise expirations.
pub fn expire(state: &mut KernelState) {
    let mut fired = Vec::new();
    for addr in state.timers.created().to_vec() {
        let Some(timer) = state.timers.get_mut(addr) else {
            continue;
        };
        if !timer.active {
            continue;
        }
        timer.remaining = timer.remaining.saturating_sub(1);
        if timer.remaining == 0 {
            if timer.reschedule_ticks > 0 {
                timer.remaining = timer.reschedule_ticks;
            } else {
                timer.active = false;
            }
            fired.push((timer.header.notify, addr, timer.expiration_input));
        }
    }
    for (target, addr, input) in fired {
        notify::raise(state, target, NotifyKind::Timer, addr, input);
    }
}
