//! Identifier types shared by the audit logs

/// Monotonic SysLog event identifier
pub type EventId = u64;

/// Identifier of the caller recorded with each event.
///
/// This is the control-block address of the calling thread, or zero for
/// calls made from kernel context.
pub type CallerId = u32;

/// Hash identifying a commit in the CommitLog chain
pub type CommitId = u64;
