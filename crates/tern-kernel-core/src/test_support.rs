//! Fixtures shared by unit tests.

use crate::config::KernelConfig;
use crate::objects::thread::{self, ThreadEntry, ThreadSpec};
use crate::objects::ObjectHeader;
use crate::state::KernelState;
use crate::status::Status;
use crate::types::{Addr, ObjectClass, AUTO_START};

pub const STACK_SIZE: u32 = 1024;

pub fn state() -> KernelState {
    KernelState::new(KernelConfig::default()).expect("state")
}

/// Auto-started kernel thread at priority 16.
pub fn kernel_thread(addr: Addr, stack_start: Addr) -> ThreadSpec {
    ThreadSpec {
        addr,
        header: ObjectHeader::default(),
        entry: ThreadEntry::Kernel(0x0800_0000),
        entry_input: 0,
        stack_start,
        stack_size: STACK_SIZE,
        priority: 16,
        preempt_threshold: 16,
        time_slice: 0,
        auto_start: AUTO_START,
        cb_size: ObjectClass::Thread.control_block_size(),
    }
}

/// Create a kernel thread and make it the current thread.
pub fn spawn_current(state: &mut KernelState) -> Addr {
    let addr = 0x0010_0000;
    assert_eq!(thread::create(state, kernel_thread(addr, 0x0010_1000)), Status::Success);
    state.current_thread = Some(addr);
    addr
}

/// Create a second kernel thread (not current).
pub fn spawn_other(state: &mut KernelState) -> Addr {
    let addr = 0x0010_0200;
    assert_eq!(thread::create(state, kernel_thread(addr, 0x0010_2000)), Status::Success);
    addr
}
