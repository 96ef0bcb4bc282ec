//! Core kernel types
//!
//! Addresses are 32-bit machine words. Kernel objects are identified by the
//! address of their control block; module instances by a [`ModuleId`].

use serde::{Deserialize, Serialize};

/// A machine address in the simulated address space
pub type Addr = u32;

/// Size of one machine word in bytes
pub const WORD: u32 = 4;

/// The null pointer
pub const NULL: Addr = 0;

/// Module instance identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

// ============================================================================
// Wait and option constants
// ============================================================================

/// Do not suspend when the resource is unavailable
pub const NO_WAIT: u32 = 0;
/// Suspend until the resource becomes available
pub const WAIT_FOREVER: u32 = 0xFFFF_FFFF;

/// Event flags: any requested flag satisfies
pub const EVENT_OR: u32 = 0;
/// Event flags: any requested flag satisfies, consume the satisfying flags
pub const EVENT_OR_CLEAR: u32 = 1;
/// Event flags: all requested flags required
pub const EVENT_AND: u32 = 2;
/// Event flags: all requested flags required, consume them
pub const EVENT_AND_CLEAR: u32 = 3;

/// Start the thread as soon as it is created
pub const AUTO_START: u32 = 1;
/// Leave the new thread suspended
pub const DONT_START: u32 = 0;
/// Activate the timer as soon as it is created
pub const AUTO_ACTIVATE: u32 = 1;
/// Mutex priority inheritance enabled
pub const INHERIT: u32 = 1;

/// Thread entry notification
pub const THREAD_ENTRY: u32 = 0;
/// Thread exit notification
pub const THREAD_EXIT: u32 = 1;

// ============================================================================
// Object classes
// ============================================================================

/// The eight kernel object classes.
///
/// The discriminant is the class code used by object-pointer lookups and
/// recorded in the commit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ObjectClass {
    BlockPool = 1,
    BytePool = 2,
    EventFlags = 3,
    Mutex = 4,
    Queue = 5,
    Semaphore = 6,
    Thread = 7,
    Timer = 8,
}

impl ObjectClass {
    /// All classes in teardown order.
    pub const TEARDOWN_ORDER: [ObjectClass; 8] = [
        ObjectClass::Thread,
        ObjectClass::Timer,
        ObjectClass::Queue,
        ObjectClass::EventFlags,
        ObjectClass::Semaphore,
        ObjectClass::Mutex,
        ObjectClass::BlockPool,
        ObjectClass::BytePool,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(ObjectClass::BlockPool),
            2 => Some(ObjectClass::BytePool),
            3 => Some(ObjectClass::EventFlags),
            4 => Some(ObjectClass::Mutex),
            5 => Some(ObjectClass::Queue),
            6 => Some(ObjectClass::Semaphore),
            7 => Some(ObjectClass::Thread),
            8 => Some(ObjectClass::Timer),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Size in bytes of this class's control block.
    ///
    /// Create calls must pass exactly this size, and pool allocations that
    /// hold a control block must have been requested with it.
    pub fn control_block_size(self) -> u32 {
        match self {
            ObjectClass::BlockPool => 44,
            ObjectClass::BytePool => 52,
            ObjectClass::EventFlags => 36,
            ObjectClass::Mutex => 52,
            ObjectClass::Queue => 64,
            ObjectClass::Semaphore => 28,
            ObjectClass::Thread => 176,
            ObjectClass::Timer => 44,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectClass::BlockPool => "block pool",
            ObjectClass::BytePool => "byte pool",
            ObjectClass::EventFlags => "event flags",
            ObjectClass::Mutex => "mutex",
            ObjectClass::Queue => "queue",
            ObjectClass::Semaphore => "semaphore",
            ObjectClass::Thread => "thread",
            ObjectClass::Timer => "timer",
        }
    }
}

// ============================================================================
// Thread state
// ============================================================================

/// Scheduling state of a thread, with the kernel's numeric codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ThreadState {
    Ready = 0,
    Completed = 1,
    Terminated = 2,
    Suspended = 3,
    Sleep = 4,
    QueueSuspended = 5,
    SemaphoreSuspended = 6,
    EventFlagsSuspended = 7,
    BlockMemory = 8,
    ByteMemory = 9,
    MutexSuspended = 13,
}

impl ThreadState {
    /// Terminated or completed threads never run again without a reset.
    pub fn is_finished(self) -> bool {
        matches!(self, ThreadState::Completed | ThreadState::Terminated)
    }
}
