//! Notify callbacks
//!
//! Kernel objects never hold a raw module function pointer. A registered
//! callback is a [`CallbackTarget`]: either a trusted kernel function that is
//! called directly, or a module callback token that is handed back to the
//! module through its callback request queue. Events raised while a call is
//! in progress are queued and delivered once the call has finished.

use crate::objects::queue;
use crate::state::KernelState;
use crate::status::Status;
use crate::types::{Addr, ModuleId, NULL};
use crate::module::ModuleState;

/// Words in one callback request message.
pub const CALLBACK_MESSAGE_WORDS: u32 = 4;

#[derive(Clone, Copy, Debug)]
pub enum CallbackTarget {
    /// Trusted kernel function, called with the object and event parameter
    Direct(fn(Addr, u32)),
    /// Module callback, re-entered through the module's callback thread
    Module { module: ModuleId, callback: Addr },
}

impl CallbackTarget {
    /// Module this target re-enters, if any.
    pub fn module(&self) -> Option<ModuleId> {
        match self {
            CallbackTarget::Direct(_) => None,
            CallbackTarget::Module { module, .. } => Some(*module),
        }
    }

    pub fn references(&self, module: ModuleId) -> bool {
        self.module() == Some(module)
    }
}

/// Event kind, carried as the first word of a callback message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum NotifyKind {
    Timer = 0,
    EventsSet = 1,
    QueueSend = 2,
    SemaphorePut = 3,
    ThreadEntryExit = 4,
    StackError = 5,
}

#[derive(Clone, Copy, Debug)]
pub struct Notification {
    pub target: CallbackTarget,
    pub kind: NotifyKind,
    pub object: Addr,
    pub param: u32,
}

/// Queue a notification if a target is registered.
pub fn raise(state: &mut KernelState, target: Option<CallbackTarget>, kind: NotifyKind, object: Addr, param: u32) {
    if let Some(target) = target {
        state.pending_notifications.push_back(Notification {
            target,
            kind,
            object,
            param,
        });
    }
}

/// Deliver every queued notification.
pub fn drain(state: &mut KernelState) {
    while let Some(n) = state.pending_notifications.pop_front() {
        match n.target {
            CallbackTarget::Direct(f) => f(n.object, n.param),
            CallbackTarget::Module { module, callback } => {
                deliver(state, module, [n.kind as u32, callback, n.object, n.param]);
            }
        }
    }
}

/// Drop queued notifications aimed at `module`.
pub fn discard_for(state: &mut KernelState, module: ModuleId) {
    state
        .pending_notifications
        .retain(|n| !n.target.references(module));
}

fn deliver(state: &mut KernelState, module: ModuleId, message: [u32; 4]) {
    let queue_addr = match state.modules.get(&module) {
        Some(m) if m.state == ModuleState::Started && m.callback_queue != NULL => m.callback_queue,
        _ => return,
    };
    if queue::post_internal(state, queue_addr, &message) != Status::Success {
        if let Some(m) = state.modules.get_mut(&module) {
            m.callback_overflows += 1;
        }
    }
}
