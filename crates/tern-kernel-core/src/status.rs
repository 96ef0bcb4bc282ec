//! Result words returned across the module boundary
//!
//! Every kernel call answers with exactly one machine word. Primitive
//! results are forwarded unchanged; the module-manager codes in the
//! `0xF0` range are produced only by the isolation layer itself.

use serde::{Deserialize, Serialize};

/// Status codes, with the kernel's numeric values as discriminants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Status {
    Success = 0x00,
    Deleted = 0x01,
    PoolError = 0x02,
    PtrError = 0x03,
    WaitError = 0x04,
    SizeError = 0x05,
    GroupError = 0x06,
    NoEvents = 0x07,
    OptionError = 0x08,
    QueueError = 0x09,
    QueueEmpty = 0x0A,
    QueueFull = 0x0B,
    SemaphoreError = 0x0C,
    NoInstance = 0x0D,
    ThreadError = 0x0E,
    PriorityError = 0x0F,
    /// Also reported as the start error for bad auto-start selections
    NoMemory = 0x10,
    DeleteError = 0x11,
    ResumeError = 0x12,
    CallerError = 0x13,
    SuspendError = 0x14,
    TimerError = 0x15,
    TickError = 0x16,
    ActivateError = 0x17,
    ThreshError = 0x18,
    SuspendLifted = 0x19,
    WaitAborted = 0x1A,
    WaitAbortError = 0x1B,
    MutexError = 0x1C,
    NotAvailable = 0x1D,
    NotOwned = 0x1E,
    InheritError = 0x1F,
    NotDone = 0x20,
    CeilingExceeded = 0x21,
    InvalidCeiling = 0x22,

    // Module manager codes
    Alignment = 0xF0,
    AlreadyLoaded = 0xF1,
    Invalid = 0xF2,
    InvalidProperties = 0xF3,
    InvalidMemory = 0xF4,
    InvalidCallback = 0xF5,
    InvalidStackSize = 0xF6,
    MathOverflow = 0xF8,

    FeatureNotEnabled = 0xFF,
}

impl Status {
    /// The start error shares its code with `NoMemory`.
    pub const START_ERROR: Status = Status::NoMemory;

    const ALL: [Status; 44] = [
        Status::Success,
        Status::Deleted,
        Status::PoolError,
        Status::PtrError,
        Status::WaitError,
        Status::SizeError,
        Status::GroupError,
        Status::NoEvents,
        Status::OptionError,
        Status::QueueError,
        Status::QueueEmpty,
        Status::QueueFull,
        Status::SemaphoreError,
        Status::NoInstance,
        Status::ThreadError,
        Status::PriorityError,
        Status::NoMemory,
        Status::DeleteError,
        Status::ResumeError,
        Status::CallerError,
        Status::SuspendError,
        Status::TimerError,
        Status::TickError,
        Status::ActivateError,
        Status::ThreshError,
        Status::SuspendLifted,
        Status::WaitAborted,
        Status::WaitAbortError,
        Status::MutexError,
        Status::NotAvailable,
        Status::NotOwned,
        Status::InheritError,
        Status::NotDone,
        Status::CeilingExceeded,
        Status::InvalidCeiling,
        Status::Alignment,
        Status::AlreadyLoaded,
        Status::Invalid,
        Status::InvalidProperties,
        Status::InvalidMemory,
        Status::InvalidCallback,
        Status::InvalidStackSize,
        Status::MathOverflow,
        Status::FeatureNotEnabled,
    ];

    /// The numeric result word.
    pub fn word(self) -> u32 {
        self as u32
    }

    pub fn from_word(word: u32) -> Option<Status> {
        Self::ALL.iter().copied().find(|s| s.word() == word)
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Codes produced by the isolation layer rather than a primitive.
    pub fn is_module_error(self) -> bool {
        (0xF0..=0xF8).contains(&self.word())
    }
}

/// Outcome of a kernel call.
///
/// A call that must wait for a resource does not return to its caller; the
/// suspended thread later receives its completion status when it is woken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    Return(u32),
    Suspended,
}

impl Completion {
    /// The returned word as a status, if it is one.
    pub fn status(self) -> Option<Status> {
        match self {
            Completion::Return(word) => Status::from_word(word),
            Completion::Suspended => None,
        }
    }

    pub fn word(self) -> Option<u32> {
        match self {
            Completion::Return(word) => Some(word),
            Completion::Suspended => None,
        }
    }
}

impl From<Status> for Completion {
    fn from(status: Status) -> Self {
        Completion::Return(status.word())
    }
}

/// Convert a `Result` whose error is a status into a single status.
pub fn flatten(result: Result<(), Status>) -> Status {
    match result {
        Ok(()) => Status::Success,
        Err(s) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_words() {
        assert_eq!(Status::Success.word(), 0);
        assert_eq!(Status::NotAvailable.word(), 0x1D);
        assert_eq!(Status::InvalidMemory.word(), 0xF4);
        assert_eq!(Status::START_ERROR.word(), 0x10);
    }

    #[test]
    fn test_status_from_word() {
        for s in Status::ALL {
            assert_eq!(Status::from_word(s.word()), Some(s));
        }
        assert_eq!(Status::from_word(0xF7), None);
        assert_eq!(Status::from_word(0x23), None);
    }

    #[test]
    fn test_completion_from_status() {
        let c: Completion = Status::QueueFull.into();
        assert_eq!(c, Completion::Return(0x0B));
        assert_eq!(c.status(), Some(Status::QueueFull));
        assert_eq!(Completion::Return(1234).status(), None);
        assert_eq!(Completion::Suspended.word(), None);
    }

    #[test]
    fn test_module_error_range() {
        assert!(Status::InvalidMemory.is_module_error());
        assert!(Status::MathOverflow.is_module_error());
        assert!(!Status::PtrError.is_module_error());
        assert!(!Status::FeatureNotEnabled.is_module_error());
    }
}
