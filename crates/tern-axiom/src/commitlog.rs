//! Commit Log
//!
//! Append-only record of every kernel state mutation. Each commit carries
//! the hash of its predecessor, so tampering with or dropping an entry is
//! detected by [`CommitLog::verify_integrity`].

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::types::{CommitId, EventId};

/// Kernel state mutations recorded for audit and replay.
///
/// Object classes are recorded by their numeric type code and addresses
/// by their control-block address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitType {
    /// Initial commit, created with the log
    Genesis,
    /// Shared object pool created
    ObjectPoolCreated { start: u32, size: u32 },
    /// Module instance loaded
    ModuleLoaded { module: u32, name: String },
    /// Module started
    ModuleStarted { module: u32 },
    /// Module teardown finished
    ModuleStopped {
        module: u32,
        objects_deleted: u32,
        pool_objects_freed: u32,
    },
    /// Module instance removed
    ModuleUnloaded { module: u32 },
    /// Kernel object created
    ObjectCreated {
        class: u32,
        addr: u32,
        module: Option<u32>,
    },
    /// Kernel object deleted
    ObjectDeleted { class: u32, addr: u32 },
    /// Object pool allocation on behalf of a module
    PoolAllocated { module: u32, addr: u32, size: u32 },
    /// Object pool allocation released
    PoolFreed { addr: u32 },
    /// System tick counter overwritten
    TimeSet { ticks: u32 },
}

/// A commit record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Commit {
    /// Commit ID (hash over the fields below)
    pub id: CommitId,
    /// Previous commit ID
    pub prev_commit: CommitId,
    /// Sequence number
    pub seq: u64,
    /// Timestamp
    pub timestamp: u64,
    /// Type of mutation
    pub commit_type: CommitType,
    /// SysLog request that caused this commit, if any
    pub caused_by: Option<EventId>,
}

/// Hash-chained mutation log.
pub struct CommitLog {
    commits: Vec<Commit>,
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(state: u64, bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(state, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

fn compute_id(
    prev: CommitId,
    seq: u64,
    timestamp: u64,
    commit_type: &CommitType,
    caused_by: Option<EventId>,
) -> CommitId {
    let mut h = fnv1a(FNV_OFFSET, &prev.to_le_bytes());
    h = fnv1a(h, &seq.to_le_bytes());
    h = fnv1a(h, &timestamp.to_le_bytes());
    h = fnv1a(h, &serde_json::to_vec(commit_type).unwrap_or_default());
    h = fnv1a(h, &caused_by.map_or(u64::MAX, |c| c).to_le_bytes());
    h
}

impl CommitLog {
    /// Create a new log holding only the genesis commit.
    pub fn new(timestamp: u64) -> Self {
        let genesis = Commit {
            id: compute_id(0, 0, timestamp, &CommitType::Genesis, None),
            prev_commit: 0,
            seq: 0,
            timestamp,
            commit_type: CommitType::Genesis,
            caused_by: None,
        };
        Self {
            commits: alloc::vec![genesis],
        }
    }

    /// Append a commit and return its ID.
    pub fn append(
        &mut self,
        commit_type: CommitType,
        caused_by: Option<EventId>,
        timestamp: u64,
    ) -> CommitId {
        let prev_commit = self.head();
        let seq = self.current_seq() + 1;
        let id = compute_id(prev_commit, seq, timestamp, &commit_type, caused_by);
        self.commits.push(Commit {
            id,
            prev_commit,
            seq,
            timestamp,
            commit_type,
            caused_by,
        });
        id
    }

    /// Recompute every hash and check the chain links.
    pub fn verify_integrity(&self) -> bool {
        let mut prev = 0;
        for (i, c) in self.commits.iter().enumerate() {
            if c.seq != i as u64 || c.prev_commit != prev {
                return false;
            }
            if c.id != compute_id(c.prev_commit, c.seq, c.timestamp, &c.commit_type, c.caused_by) {
                return false;
            }
            prev = c.id;
        }
        true
    }

    /// All commits, genesis first.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Commits matching a predicate on their type.
    pub fn filter<F>(&self, mut f: F) -> Vec<&Commit>
    where
        F: FnMut(&CommitType) -> bool,
    {
        self.commits.iter().filter(|c| f(&c.commit_type)).collect()
    }

    /// Number of commits (including genesis).
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Always false: the genesis commit is never removed.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Sequence number of the newest commit.
    pub fn current_seq(&self) -> u64 {
        self.commits.last().map_or(0, |c| c.seq)
    }

    /// ID of the newest commit.
    pub fn head(&self) -> CommitId {
        self.commits.last().map_or(0, |c| c.id)
    }

    #[cfg(test)]
    fn commits_mut(&mut self) -> &mut Vec<Commit> {
        &mut self.commits
    }
}
