//! System time
//!
//! The tick counter wraps at 32 bits. Each tick counts down wait timeouts,
//! advances timers and then delivers whatever notifications they raised.

use tern_axiom::CommitType;

use crate::notify;
use crate::objects::timer;
use crate::state::KernelState;
use crate::wait;

pub fn get(state: &KernelState) -> u32 {
    state.ticks
}

pub fn set(state: &mut KernelState, ticks: u32) {
    state.ticks = ticks;
    state.record(CommitType::TimeSet { ticks });
}

/// Process one timer interrupt.
pub fn tick(state: &mut KernelState) {
    state.ticks = state.ticks.wrapping_add(1);
    wait::expire_timeouts(state);
    timer::expire(state);
    notify::drain(state);
}
