//! Event flag groups

use crate::notify::{self, CallbackTarget, NotifyKind};
use crate::objects::{self, KernelObject, ObjectHeader, WaitList};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ObjectClass, EVENT_AND, EVENT_AND_CLEAR, NO_WAIT, NULL};
use crate::wait::{self, WaitReason};

pub struct EventFlags {
    pub header: ObjectHeader,
    pub current: u32,
    pub waiters: WaitList,
}

impl KernelObject for EventFlags {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

/// Set option: OR the flags in.
pub const SET_OR: u32 = 0;
/// Set option: AND the flags in (clears bits not given).
pub const SET_AND: u32 = 2;

fn satisfied(current: u32, requested: u32, option: u32) -> bool {
    if option & EVENT_AND != 0 {
        current & requested == requested
    } else {
        current & requested != 0
    }
}

fn clears(option: u32) -> bool {
    option & 1 != 0
}

pub fn create(state: &mut KernelState, addr: Addr, header: ObjectHeader, cb_size: u32) -> Status {
    if let Err(e) = objects::check_new_control_block(state, ObjectClass::EventFlags, addr, cb_size, Status::GroupError) {
        return e;
    }
    state.event_flags.insert(
        addr,
        EventFlags {
            header,
            current: 0,
            waiters: WaitList::new(),
        },
    );
    objects::record_created(state, ObjectClass::EventFlags, addr);
    Status::Success
}

pub fn delete(state: &mut KernelState, addr: Addr) -> Status {
    let Some(group) = state.event_flags.remove(addr) else {
        return Status::GroupError;
    };
    wait::release_all(state, group.waiters, Status::Deleted);
    objects::record_deleted(state, ObjectClass::EventFlags, addr);
    Status::Success
}

pub fn get(
    state: &mut KernelState,
    addr: Addr,
    requested: u32,
    option: u32,
    actual_out: Addr,
    wait_option: u32,
) -> Completion {
    let Some(group) = state.event_flags.get(addr) else {
        return Status::GroupError.into();
    };
    if actual_out == NULL {
        return Status::PtrError.into();
    }
    if option > EVENT_AND_CLEAR {
        return Status::OptionError.into();
    }
    let current = group.current;
    if satisfied(current, requested, option) {
        if let Err(e) = objects::write_outputs(state, &[(actual_out, current)]) {
            return e.into();
        }
        if clears(option) {
            if let Some(g) = state.event_flags.get_mut(addr) {
                g.current &= !requested;
            }
        }
        return Status::Success.into();
    }
    if wait_option == NO_WAIT {
        return Status::NoEvents.into();
    }
    wait::suspend(
        state,
        WaitReason::EventFlags {
            group: addr,
            requested,
            option,
            actual_out,
        },
        wait_option,
    )
}

pub fn set(state: &mut KernelState, addr: Addr, flags: u32, option: u32) -> Status {
    let Some(group) = state.event_flags.get_mut(addr) else {
        return Status::GroupError;
    };
    match option {
        SET_OR => group.current |= flags,
        SET_AND => group.current &= flags,
        _ => return Status::OptionError,
    }

    // Satisfy waiters front to back against the evolving flag value.
    let waiters = core::mem::take(&mut group.waiters);
    let mut still_waiting = WaitList::new();
    for thread in waiters {
        let request = match state.threads.get(thread).and_then(|t| t.wait.clone()) {
            Some(WaitReason::EventFlags {
                requested,
                option,
                actual_out,
                ..
            }) => (requested, option, actual_out),
            _ => continue,
        };
        let current = state.event_flags.get(addr).map_or(0, |g| g.current);
        let (requested, wait_option, actual_out) = request;
        if !satisfied(current, requested, wait_option) {
            still_waiting.push_back(thread);
            continue;
        }
        let status = match objects::write_outputs(state, &[(actual_out, current)]) {
            Ok(()) => Status::Success,
            Err(e) => e,
        };
        if clears(wait_option) {
            if let Some(g) = state.event_flags.get_mut(addr) {
                g.current &= !requested;
            }
        }
        wait::resume(state, thread, status);
    }

    let target = match state.event_flags.get_mut(addr) {
        Some(g) => {
            g.waiters = still_waiting;
            g.header.notify
        }
        None => None,
    };
    notify::raise(state, target, NotifyKind::EventsSet, addr, flags);
    Status::Success
}

/// Outputs: name, current flags, first suspended, suspended count, next group.
pub fn info_get(state: &mut KernelState, addr: Addr, outs: [Addr; 5]) -> Status {
    let Some(group) = state.event_flags.get(addr) else {
        return Status::GroupError;
    };
    let values = [
        group.header.name_ptr,
        group.current,
        group.waiters.front().copied().unwrap_or(NULL),
        group.waiters.len() as u32,
        state.event_flags.next_after(addr),
    ];
    let outputs: alloc::vec::Vec<(Addr, u32)> = outs.into_iter().zip(values).collect();
    crate::status::flatten(objects::write_outputs(state, &outputs))
}

pub fn set_notify(state: &mut KernelState, addr: Addr, target: Option<CallbackTarget>) -> Status {
    match state.event_flags.get_mut(addr) {
        Some(group) => {
            group.header.notify = target;
            Status::Success
        }
        None => Status::GroupError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_current, state};
    use crate::types::{EVENT_OR, EVENT_OR_CLEAR};

    const GROUP: Addr = 0x0010_8000;
    const OUT: Addr = 0x0010_9000;
    const SIZE: u32 = 36;

    #[test]
    fn test_set_and_get_or_and() {
        let mut s = state();
        create(&mut s, GROUP, ObjectHeader::default(), SIZE);
        assert_eq!(set(&mut s, GROUP, 0b0101, SET_OR), Status::Success);
        assert_eq!(get(&mut s, GROUP, 0b0011, EVENT_AND, OUT, NO_WAIT), Completion::from(Status::NoEvents));
        assert_eq!(get(&mut s, GROUP, 0b0011, EVENT_OR, OUT, NO_WAIT), Completion::from(Status::Success));
        assert_eq!(s.memory.read_word(OUT), Ok(0b0101));
        assert_eq!(get(&mut s, GROUP, 0b0100, EVENT_OR_CLEAR, OUT, NO_WAIT), Completion::from(Status::Success));
        assert_eq!(s.event_flags.get(GROUP).map(|g| g.current), Some(0b0001));
        assert_eq!(set(&mut s, GROUP, 0, SET_AND), Status::Success);
        assert_eq!(s.event_flags.get(GROUP).map(|g| g.current), Some(0));
    }

    #[test]
    fn test_get_argument_checks() {
        let mut s = state();
        create(&mut s, GROUP, ObjectHeader::default(), SIZE);
        assert_eq!(get(&mut s, GROUP, 1, EVENT_OR, NULL, NO_WAIT), Completion::from(Status::PtrError));
        assert_eq!(get(&mut s, GROUP, 1, 4, OUT, NO_WAIT), Completion::from(Status::OptionError));
        assert_eq!(set(&mut s, GROUP, 1, 7), Status::OptionError);
        assert_eq!(get(&mut s, 0x1234, 1, EVENT_OR, OUT, NO_WAIT), Completion::from(Status::GroupError));
    }

    #[test]
    fn test_set_wakes_satisfied_waiter() {
        let mut s = state();
        let t = spawn_current(&mut s);
        create(&mut s, GROUP, ObjectHeader::default(), SIZE);
        assert_eq!(get(&mut s, GROUP, 0b11, EVENT_AND_CLEAR, OUT, 100), Completion::Suspended);
        set(&mut s, GROUP, 0b01, SET_OR);
        assert_eq!(s.event_flags.get(GROUP).map(|g| g.waiters.len()), Some(1));
        set(&mut s, GROUP, 0b10, SET_OR);
        assert_eq!(s.threads.get(t).and_then(|x| x.completion), Some(Status::Success));
        assert_eq!(s.memory.read_word(OUT), Ok(0b11));
        assert_eq!(s.event_flags.get(GROUP).map(|g| (g.current, g.waiters.len())), Some((0, 0)));
    }
}
