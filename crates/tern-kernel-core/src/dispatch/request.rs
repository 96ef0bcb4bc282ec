//! Request identifiers (ABI)
//!
//! Core kernel calls are numbered densely from 1. Ranges above them are
//! reserved for port extensions, external components and applications.

// ============================================================================
// Block pools
// ============================================================================

pub const BLOCK_ALLOCATE: u32 = 1;
pub const BLOCK_POOL_CREATE: u32 = 2;
pub const BLOCK_POOL_DELETE: u32 = 3;
pub const BLOCK_POOL_INFO_GET: u32 = 4;
pub const BLOCK_POOL_PERFORMANCE_INFO_GET: u32 = 5;
pub const BLOCK_POOL_PERFORMANCE_SYSTEM_INFO_GET: u32 = 6;
pub const BLOCK_POOL_PRIORITIZE: u32 = 7;
pub const BLOCK_RELEASE: u32 = 8;

// ============================================================================
// Byte pools
// ============================================================================

pub const BYTE_ALLOCATE: u32 = 9;
pub const BYTE_POOL_CREATE: u32 = 10;
pub const BYTE_POOL_DELETE: u32 = 11;
pub const BYTE_POOL_INFO_GET: u32 = 12;
pub const BYTE_POOL_PERFORMANCE_INFO_GET: u32 = 13;
pub const BYTE_POOL_PERFORMANCE_SYSTEM_INFO_GET: u32 = 14;
pub const BYTE_POOL_PRIORITIZE: u32 = 15;
pub const BYTE_RELEASE: u32 = 16;

// ============================================================================
// Event flags
// ============================================================================

pub const EVENT_FLAGS_CREATE: u32 = 17;
pub const EVENT_FLAGS_DELETE: u32 = 18;
pub const EVENT_FLAGS_GET: u32 = 19;
pub const EVENT_FLAGS_INFO_GET: u32 = 20;
pub const EVENT_FLAGS_PERFORMANCE_INFO_GET: u32 = 21;
pub const EVENT_FLAGS_PERFORMANCE_SYSTEM_INFO_GET: u32 = 22;
pub const EVENT_FLAGS_SET: u32 = 23;
pub const EVENT_FLAGS_SET_NOTIFY: u32 = 24;

/// Interrupt posture change (privileged)
pub const THREAD_INTERRUPT_CONTROL: u32 = 25;

// ============================================================================
// Mutexes
// ============================================================================

pub const MUTEX_CREATE: u32 = 26;
pub const MUTEX_DELETE: u32 = 27;
pub const MUTEX_GET: u32 = 28;
pub const MUTEX_INFO_GET: u32 = 29;
pub const MUTEX_PERFORMANCE_INFO_GET: u32 = 30;
pub const MUTEX_PERFORMANCE_SYSTEM_INFO_GET: u32 = 31;
pub const MUTEX_PRIORITIZE: u32 = 32;
pub const MUTEX_PUT: u32 = 33;

// ============================================================================
// Queues
// ============================================================================

pub const QUEUE_CREATE: u32 = 34;
pub const QUEUE_DELETE: u32 = 35;
pub const QUEUE_FLUSH: u32 = 36;
pub const QUEUE_FRONT_SEND: u32 = 37;
pub const QUEUE_INFO_GET: u32 = 38;
pub const QUEUE_PERFORMANCE_INFO_GET: u32 = 39;
pub const QUEUE_PERFORMANCE_SYSTEM_INFO_GET: u32 = 40;
pub const QUEUE_PRIORITIZE: u32 = 41;
pub const QUEUE_RECEIVE: u32 = 42;
pub const QUEUE_SEND: u32 = 43;
pub const QUEUE_SEND_NOTIFY: u32 = 44;

// ============================================================================
// Semaphores
// ============================================================================

pub const SEMAPHORE_CEILING_PUT: u32 = 45;
pub const SEMAPHORE_CREATE: u32 = 46;
pub const SEMAPHORE_DELETE: u32 = 47;
pub const SEMAPHORE_GET: u32 = 48;
pub const SEMAPHORE_INFO_GET: u32 = 49;
pub const SEMAPHORE_PERFORMANCE_INFO_GET: u32 = 50;
pub const SEMAPHORE_PERFORMANCE_SYSTEM_INFO_GET: u32 = 51;
pub const SEMAPHORE_PRIORITIZE: u32 = 52;
pub const SEMAPHORE_PUT: u32 = 53;
pub const SEMAPHORE_PUT_NOTIFY: u32 = 54;

// ============================================================================
// Threads
// ============================================================================

pub const THREAD_CREATE: u32 = 55;
pub const THREAD_DELETE: u32 = 56;
pub const THREAD_ENTRY_EXIT_NOTIFY: u32 = 57;
pub const THREAD_IDENTIFY: u32 = 58;
pub const THREAD_INFO_GET: u32 = 59;
pub const THREAD_PERFORMANCE_INFO_GET: u32 = 60;
pub const THREAD_PERFORMANCE_SYSTEM_INFO_GET: u32 = 61;
pub const THREAD_PREEMPTION_CHANGE: u32 = 62;
pub const THREAD_PRIORITY_CHANGE: u32 = 63;
pub const THREAD_RELINQUISH: u32 = 64;
pub const THREAD_RESET: u32 = 65;
pub const THREAD_RESUME: u32 = 66;
pub const THREAD_SLEEP: u32 = 67;
pub const THREAD_STACK_ERROR_NOTIFY: u32 = 68;
pub const THREAD_SUSPEND: u32 = 69;
pub const THREAD_TERMINATE: u32 = 70;
pub const THREAD_TIME_SLICE_CHANGE: u32 = 71;
pub const THREAD_WAIT_ABORT: u32 = 72;

// ============================================================================
// Time and timers
// ============================================================================

pub const TIME_GET: u32 = 73;
pub const TIME_SET: u32 = 74;
pub const TIMER_ACTIVATE: u32 = 75;
pub const TIMER_CHANGE: u32 = 76;
pub const TIMER_CREATE: u32 = 77;
pub const TIMER_DEACTIVATE: u32 = 78;
pub const TIMER_DELETE: u32 = 79;
pub const TIMER_INFO_GET: u32 = 80;
pub const TIMER_PERFORMANCE_INFO_GET: u32 = 81;
pub const TIMER_PERFORMANCE_SYSTEM_INFO_GET: u32 = 82;

// ============================================================================
// Trace
// ============================================================================

pub const TRACE_ENABLE: u32 = 83;
pub const TRACE_EVENT_FILTER: u32 = 84;
pub const TRACE_EVENT_UNFILTER: u32 = 85;
pub const TRACE_DISABLE: u32 = 86;
pub const TRACE_INTERRUPT_CONTROL: u32 = 87;
pub const TRACE_ISR_ENTER_INSERT: u32 = 88;
pub const TRACE_ISR_EXIT_INSERT: u32 = 89;
pub const TRACE_BUFFER_FULL_NOTIFY: u32 = 90;
pub const TRACE_USER_EVENT_INSERT: u32 = 91;

pub const THREAD_SYSTEM_SUSPEND: u32 = 92;

// ============================================================================
// Module self-service
// ============================================================================

pub const MODULE_OBJECT_POINTER_GET: u32 = 93;
pub const MODULE_OBJECT_POINTER_GET_EXTENDED: u32 = 94;
pub const MODULE_OBJECT_ALLOCATE: u32 = 95;
pub const MODULE_OBJECT_DEALLOCATE: u32 = 96;

/// Highest core request identifier.
pub const LAST_CORE_REQUEST: u32 = MODULE_OBJECT_DEALLOCATE;

// ============================================================================
// Extension ranges
// ============================================================================

pub const PORT_EXTENSION_START: u32 = 500;
pub const PORT_EXTENSION_END: u32 = 999;
pub const FILE_SYSTEM_START: u32 = 1000;
pub const FILE_SYSTEM_END: u32 = 1999;
pub const NETWORK_START: u32 = 2000;
pub const NETWORK_END: u32 = 2999;
pub const NETWORK_DUO_START: u32 = 3000;
pub const NETWORK_DUO_END: u32 = 3999;
pub const USB_START: u32 = 4000;
pub const USB_END: u32 = 4999;
pub const GRAPHICS_START: u32 = 5000;
pub const GRAPHICS_END: u32 = 5999;

/// Requests at or above this value are application defined; the
/// application handler sees them rebased to zero.
pub const APPLICATION_REQUEST_BASE: u32 = 0x0001_0000;
