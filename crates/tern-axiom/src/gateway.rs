//! Axiom Gateway
//!
//! Entry point for all module calls. The gateway:
//! 1. Logs the request to SysLog
//! 2. Executes the kernel operation
//! 3. Appends any resulting commits to CommitLog
//! 4. Logs the response (or the suspension) to SysLog

use alloc::string::String;
use alloc::vec::Vec;
use serde::Serialize;

use crate::commitlog::{Commit, CommitLog, CommitType};
use crate::syslog::{SysEvent, SysLog};
use crate::types::{CallerId, CommitId};

/// Axiom gateway: entry point for all module calls.
pub struct AxiomGateway {
    /// Call audit log
    syslog: SysLog,
    /// State mutation log
    commitlog: CommitLog,
}

impl AxiomGateway {
    /// Create a new Axiom gateway.
    ///
    /// # Arguments
    /// - `timestamp`: Boot timestamp (nanos)
    pub fn new(timestamp: u64) -> Self {
        Self {
            syslog: SysLog::new(),
            commitlog: CommitLog::new(timestamp),
        }
    }

    /// Process a module call through Axiom.
    ///
    /// # Arguments
    /// - `sender`: Calling thread
    /// - `request`: Request identifier
    /// - `params`: The three parameter words
    /// - `timestamp`: Current timestamp (nanos since boot)
    /// - `kernel_fn`: Executes the call and returns `(result, commits)`,
    ///   where `result` is `None` when the caller was suspended
    ///
    /// # Returns
    /// Tuple of (result, commit_ids)
    pub fn syscall<F>(
        &mut self,
        sender: CallerId,
        request: u32,
        params: [u32; 3],
        timestamp: u64,
        mut kernel_fn: F,
    ) -> (Option<u32>, Vec<CommitId>)
    where
        F: FnMut(u32, [u32; 3]) -> (Option<u32>, Vec<CommitType>),
    {
        let request_id = self.syslog.log_request(sender, request, params, timestamp);

        let (result, commit_types) = kernel_fn(request, params);

        let commit_ids: Vec<CommitId> = commit_types
            .into_iter()
            .map(|ct| self.commitlog.append(ct, Some(request_id), timestamp))
            .collect();

        match result {
            Some(word) => self.syslog.log_response(sender, request_id, word, timestamp),
            None => self.syslog.log_suspended(sender, request_id, timestamp),
        }

        (result, commit_ids)
    }

    /// Get the SysLog (for inspection/auditing).
    pub fn syslog(&self) -> &SysLog {
        &self.syslog
    }

    /// Get the CommitLog (for inspection).
    pub fn commitlog(&self) -> &CommitLog {
        &self.commitlog
    }

    /// Append a commit directly (bypassing SysLog).
    ///
    /// Use for kernel operations that don't originate from a module call
    /// (module lifecycle, tick processing).
    pub fn append_internal_commit(&mut self, commit_type: CommitType, timestamp: u64) -> CommitId {
        self.commitlog.append(commit_type, None, timestamp)
    }

    /// Verify integrity of the commit chain.
    pub fn verify_integrity(&self) -> bool {
        self.commitlog.verify_integrity()
    }

    /// Get current state for monitoring.
    pub fn state_summary(&self) -> GatewayState {
        GatewayState {
            syslog_len: self.syslog.len(),
            syslog_next_id: self.syslog.next_id(),
            commitlog_len: self.commitlog.len(),
            commitlog_seq: self.commitlog.current_seq(),
            commitlog_head: self.commitlog.head(),
        }
    }

    /// Serialize both logs as a JSON document.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct AuditExport<'a> {
            summary: GatewayState,
            events: &'a [SysEvent],
            commits: &'a [Commit],
        }

        serde_json::to_string(&AuditExport {
            summary: self.state_summary(),
            events: self.syslog.events(),
            commits: self.commitlog.commits(),
        })
    }
}

/// Summary of gateway state (for debugging/monitoring).
#[derive(Clone, Debug, Serialize)]
pub struct GatewayState {
    /// Number of events in SysLog
    pub syslog_len: usize,
    /// Next event ID in SysLog
    pub syslog_next_id: u64,
    /// Number of commits in CommitLog
    pub commitlog_len: usize,
    /// Current sequence number in CommitLog
    pub commitlog_seq: u64,
    /// Head commit hash
    pub commitlog_head: CommitId,
}
