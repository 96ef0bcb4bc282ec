//! System Event Log (SysLog)
//!
//! Records every module call (request + response) for the audit trail.
//! This is separate from CommitLog: SysLog says what modules asked for,
//! CommitLog says what the kernel actually changed.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::types::{CallerId, EventId};

/// A system event (module call request or response).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SysEvent {
    /// Unique event ID (monotonic)
    pub id: EventId,
    /// Thread that made the call
    pub sender: CallerId,
    /// Timestamp (nanos since boot)
    pub timestamp: u64,
    /// Event type (request or response)
    pub event_type: SysEventType,
}

/// Type of system event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SysEventType {
    /// Request issued across the module boundary
    Request {
        /// Request identifier
        request: u32,
        /// The three parameter words
        params: [u32; 3],
    },
    /// Result word handed back to the module
    Response {
        /// ID of the request this responds to
        request_id: EventId,
        /// Result word
        result: u32,
    },
    /// The call suspended the calling thread
    Suspended {
        /// ID of the request that suspended
        request_id: EventId,
    },
}

/// Maximum number of events to keep in memory
const MAX_SYSLOG_EVENTS: usize = 10000;

/// System event log for auditing.
///
/// Events are append-only with monotonic IDs. Old events are dropped once
/// the log exceeds its capacity.
pub struct SysLog {
    /// Event entries (append-only)
    events: Vec<SysEvent>,
    /// Next event ID to assign
    next_id: EventId,
}

impl SysLog {
    /// Create a new empty SysLog.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 0,
        }
    }

    /// Log a request.
    ///
    /// Returns the event ID for correlating with the response.
    pub fn log_request(
        &mut self,
        sender: CallerId,
        request: u32,
        params: [u32; 3],
        timestamp: u64,
    ) -> EventId {
        self.push(sender, timestamp, SysEventType::Request { request, params })
    }

    /// Log a response.
    pub fn log_response(
        &mut self,
        sender: CallerId,
        request_id: EventId,
        result: u32,
        timestamp: u64,
    ) {
        self.push(sender, timestamp, SysEventType::Response { request_id, result });
    }

    /// Log that a request suspended its caller instead of returning.
    pub fn log_suspended(&mut self, sender: CallerId, request_id: EventId, timestamp: u64) {
        self.push(sender, timestamp, SysEventType::Suspended { request_id });
    }

    fn push(&mut self, sender: CallerId, timestamp: u64, event_type: SysEventType) -> EventId {
        let id = self.next_id;
        self.next_id += 1;

        self.events.push(SysEvent {
            id,
            sender,
            timestamp,
            event_type,
        });

        self.trim_if_needed();
        id
    }

    /// Get all events.
    pub fn events(&self) -> &[SysEvent] {
        &self.events
    }

    /// Get events in an ID range.
    pub fn get_range(&self, start_id: EventId, end_id: EventId) -> Vec<&SysEvent> {
        self.events
            .iter()
            .filter(|e| e.id >= start_id && e.id < end_id)
            .collect()
    }

    /// Get the most recent N events.
    pub fn get_recent(&self, count: usize) -> Vec<&SysEvent> {
        self.events.iter().rev().take(count).collect()
    }

    /// Responses carrying the given result word.
    pub fn responses_with(&self, result: u32) -> Vec<&SysEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e.event_type, SysEventType::Response { result: r, .. } if r == result))
            .collect()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the next event ID.
    pub fn next_id(&self) -> EventId {
        self.next_id
    }

    /// Trim old events if exceeding max capacity.
    fn trim_if_needed(&mut self) {
        if self.events.len() > MAX_SYSLOG_EVENTS {
            let drain_count = self.events.len() - MAX_SYSLOG_EVENTS;
            self.events.drain(0..drain_count);
        }
    }
}

impl Default for SysLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syslog_creation() {
        let log = SysLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert_eq!(log.next_id(), 0);
    }

    #[test]
    fn test_syslog_request_response() {
        let mut log = SysLog::new();

        let req_id = log.log_request(0x2000_0100, 46, [0x3000_0010, 0, 0x1000_0040], 1000);
        assert_eq!(req_id, 0);

        log.log_response(0x2000_0100, req_id, 0xF4, 1100);

        assert_eq!(log.len(), 2);

        let events = log.events();
        assert!(matches!(
            events[0].event_type,
            SysEventType::Request {
                request: 46,
                params: [0x3000_0010, 0, 0x1000_0040]
            }
        ));
        assert!(matches!(
            events[1].event_type,
            SysEventType::Response {
                request_id: 0,
                result: 0xF4
            }
        ));
        assert_eq!(log.responses_with(0xF4).len(), 1);
    }

    #[test]
    fn test_syslog_suspended_event() {
        let mut log = SysLog::new();
        let req_id = log.log_request(7, 48, [1, 0xFFFF_FFFF, 0], 10);
        log.log_suspended(7, req_id, 10);

        assert!(matches!(
            log.events()[1].event_type,
            SysEventType::Suspended { request_id: 0 }
        ));
        assert!(log.responses_with(0).is_empty());
    }

    #[test]
    fn test_syslog_get_recent() {
        let mut log = SysLog::new();

        for i in 0..10 {
            log.log_request(1, i, [0, 0, 0], i as u64 * 100);
        }

        let recent = log.get_recent(3);
        assert_eq!(recent.len(), 3);
        // Most recent first
        assert_eq!(recent[0].id, 9);
        assert_eq!(recent[1].id, 8);
        assert_eq!(recent[2].id, 7);
    }

    #[test]
    fn test_syslog_get_range() {
        let mut log = SysLog::new();

        for i in 0..10 {
            log.log_request(1, i, [0, 0, 0], i as u64 * 100);
        }

        let range = log.get_range(3, 7);
        assert_eq!(range.len(), 4);
        assert_eq!(range[0].id, 3);
        assert_eq!(range[3].id, 6);
    }

    #[test]
    fn test_syslog_trims_to_capacity() {
        let mut log = SysLog::new();
        for i in 0..(MAX_SYSLOG_EVENTS as u32 + 5) {
            log.log_request(1, i, [0, 0, 0], 0);
        }
        assert_eq!(log.len(), MAX_SYSLOG_EVENTS);
        assert_eq!(log.events()[0].id, 5);
    }
}
