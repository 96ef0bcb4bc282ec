//! The dispatch table
//!
//! One entry per core request, indexed by `request - 1`. Each entry pairs
//! the request with the checks its parameters must pass and the handler
//! that forwards it to the primitive. Requests whose primitive is not built
//! into this kernel still validate their parameters and then report
//! `FeatureNotEnabled`.

use super::handlers::{not_enabled, pools, queue, sync, system, thread, timer};
use super::policy::{Arg, Check, Extent};
use super::request::*;
use super::Handler;
use crate::status::Status;
use crate::types::{ObjectClass, WORD};

use Check::{BlockHeader, Create, ExtraOutputs, Name, PoolExtent, PriorityFloor, Privileged, Read, Use, Write};

/// One word written through a pointer
const OUT: Extent = Extent::Bytes(WORD);

/// Bookkeeping ahead of a block pool block
const BLOCK_HEADER: u32 = WORD;
/// Bookkeeping ahead of a byte pool allocation
const BYTE_HEADER: u32 = 2 * WORD;

#[derive(Clone, Copy)]
pub struct Entry {
    pub request: u32,
    pub name: &'static str,
    pub checks: &'static [Check],
    pub handler: Handler,
}

const fn entry(request: u32, name: &'static str, checks: &'static [Check], handler: Handler) -> Entry {
    Entry {
        request,
        name,
        checks,
        handler,
    }
}

const TABLE: [Entry; LAST_CORE_REQUEST as usize] = [
    // Block pools
    entry(
        BLOCK_ALLOCATE,
        "block_allocate",
        &[Use(Arg::P0, ObjectClass::BlockPool), Write(Arg::P1, OUT)],
        pools::block_allocate,
    ),
    entry(
        BLOCK_POOL_CREATE,
        "block_pool_create",
        &[
            Create(Arg::P0, ObjectClass::BlockPool),
            Name(Arg::P1),
            Check::Extra(4),
            Write(Arg::Extra(1), Extent::Arg(Arg::Extra(2))),
        ],
        pools::block_pool_create,
    ),
    entry(
        BLOCK_POOL_DELETE,
        "block_pool_delete",
        &[Use(Arg::P0, ObjectClass::BlockPool)],
        pools::block_pool_delete,
    ),
    entry(
        BLOCK_POOL_INFO_GET,
        "block_pool_info_get",
        &[Use(Arg::P0, ObjectClass::BlockPool), Write(Arg::P1, OUT), Check::Extra(5), ExtraOutputs],
        pools::block_pool_info_get,
    ),
    entry(
        BLOCK_POOL_PERFORMANCE_INFO_GET,
        "block_pool_performance_info_get",
        &[Use(Arg::P0, ObjectClass::BlockPool), Write(Arg::P1, OUT), Check::Extra(3), ExtraOutputs],
        not_enabled,
    ),
    entry(
        BLOCK_POOL_PERFORMANCE_SYSTEM_INFO_GET,
        "block_pool_performance_system_info_get",
        &[Write(Arg::P0, OUT), Write(Arg::P1, OUT), Check::Extra(2), ExtraOutputs],
        not_enabled,
    ),
    entry(
        BLOCK_POOL_PRIORITIZE,
        "block_pool_prioritize",
        &[Use(Arg::P0, ObjectClass::BlockPool)],
        pools::block_pool_prioritize,
    ),
    entry(
        BLOCK_RELEASE,
        "block_release",
        &[BlockHeader(Arg::P0, BLOCK_HEADER)],
        pools::block_release,
    ),
    // Byte pools
    entry(
        BYTE_ALLOCATE,
        "byte_allocate",
        &[Use(Arg::P0, ObjectClass::BytePool), Write(Arg::P1, OUT), Check::Extra(2)],
        pools::byte_allocate,
    ),
    entry(
        BYTE_POOL_CREATE,
        "byte_pool_create",
        &[
            Create(Arg::P0, ObjectClass::BytePool),
            Name(Arg::P1),
            Check::Extra(3),
            Write(Arg::Extra(0), Extent::Arg(Arg::Extra(1))),
        ],
        pools::byte_pool_create,
    ),
    entry(
        BYTE_POOL_DELETE,
        "byte_pool_delete",
        &[Use(Arg::P0, ObjectClass::BytePool)],
        pools::byte_pool_delete,
    ),
    entry(
        BYTE_POOL_INFO_GET,
        "byte_pool_info_get",
        &[Use(Arg::P0, ObjectClass::BytePool), Write(Arg::P1, OUT), Check::Extra(5), ExtraOutputs],
        pools::byte_pool_info_get,
    ),
    entry(
        BYTE_POOL_PERFORMANCE_INFO_GET,
        "byte_pool_performance_info_get",
        &[Use(Arg::P0, ObjectClass::BytePool), Write(Arg::P1, OUT), Check::Extra(6), ExtraOutputs],
        not_enabled,
    ),
    entry(
        BYTE_POOL_PERFORMANCE_SYSTEM_INFO_GET,
        "byte_pool_performance_system_info_get",
        &[Write(Arg::P0, OUT), Write(Arg::P1, OUT), Check::Extra(5), ExtraOutputs],
        not_enabled,
    ),
    entry(
        BYTE_POOL_PRIORITIZE,
        "byte_pool_prioritize",
        &[Use(Arg::P0, ObjectClass::BytePool)],
        pools::byte_pool_prioritize,
    ),
    entry(
        BYTE_RELEASE,
        "byte_release",
        &[BlockHeader(Arg::P0, BYTE_HEADER)],
        pools::byte_release,
    ),
    // Event flags
    entry(
        EVENT_FLAGS_CREATE,
        "event_flags_create",
        &[Create(Arg::P0, ObjectClass::EventFlags), Name(Arg::P1)],
        sync::event_flags_create,
    ),
    entry(
        EVENT_FLAGS_DELETE,
        "event_flags_delete",
        &[Use(Arg::P0, ObjectClass::EventFlags)],
        sync::event_flags_delete,
    ),
    entry(
        EVENT_FLAGS_GET,
        "event_flags_get",
        &[Use(Arg::P0, ObjectClass::EventFlags), Check::Extra(3), Write(Arg::Extra(1), OUT)],
        sync::event_flags_get,
    ),
    entry(
        EVENT_FLAGS_INFO_GET,
        "event_flags_info_get",
        &[Use(Arg::P0, ObjectClass::EventFlags), Write(Arg::P1, OUT), Check::Extra(4), ExtraOutputs],
        sync::event_flags_info_get,
    ),
    entry(
        EVENT_FLAGS_PERFORMANCE_INFO_GET,
        "event_flags_performance_info_get",
        &[Use(Arg::P0, ObjectClass::EventFlags), Write(Arg::P1, OUT), Check::Extra(3), ExtraOutputs],
        not_enabled,
    ),
    entry(
        EVENT_FLAGS_PERFORMANCE_SYSTEM_INFO_GET,
        "event_flags_performance_system_info_get",
        &[Write(Arg::P0, OUT), Write(Arg::P1, OUT), Check::Extra(2), ExtraOutputs],
        not_enabled,
    ),
    entry(
        EVENT_FLAGS_SET,
        "event_flags_set",
        &[Use(Arg::P0, ObjectClass::EventFlags)],
        sync::event_flags_set,
    ),
    entry(
        EVENT_FLAGS_SET_NOTIFY,
        "event_flags_set_notify",
        &[Use(Arg::P0, ObjectClass::EventFlags)],
        sync::event_flags_set_notify,
    ),
    entry(
        THREAD_INTERRUPT_CONTROL,
        "thread_interrupt_control",
        &[Privileged],
        thread::thread_interrupt_control,
    ),
    // Mutexes
    entry(
        MUTEX_CREATE,
        "mutex_create",
        &[Create(Arg::P0, ObjectClass::Mutex), Name(Arg::P1), Check::Extra(2)],
        sync::mutex_create,
    ),
    entry(
        MUTEX_DELETE,
        "mutex_delete",
        &[Use(Arg::P0, ObjectClass::Mutex)],
        sync::mutex_delete,
    ),
    entry(MUTEX_GET, "mutex_get", &[Use(Arg::P0, ObjectClass::Mutex)], sync::mutex_get),
    entry(
        MUTEX_INFO_GET,
        "mutex_info_get",
        &[Use(Arg::P0, ObjectClass::Mutex), Write(Arg::P1, OUT), Check::Extra(5), ExtraOutputs],
        sync::mutex_info_get,
    ),
    entry(
        MUTEX_PERFORMANCE_INFO_GET,
        "mutex_performance_info_get",
        &[Use(Arg::P0, ObjectClass::Mutex), Write(Arg::P1, OUT), Check::Extra(5), ExtraOutputs],
        not_enabled,
    ),
    entry(
        MUTEX_PERFORMANCE_SYSTEM_INFO_GET,
        "mutex_performance_system_info_get",
        &[Write(Arg::P0, OUT), Write(Arg::P1, OUT), Check::Extra(4), ExtraOutputs],
        not_enabled,
    ),
    entry(
        MUTEX_PRIORITIZE,
        "mutex_prioritize",
        &[Use(Arg::P0, ObjectClass::Mutex)],
        sync::mutex_prioritize,
    ),
    entry(MUTEX_PUT, "mutex_put", &[Use(Arg::P0, ObjectClass::Mutex)], sync::mutex_put),
    // Queues
    entry(
        QUEUE_CREATE,
        "queue_create",
        &[
            Create(Arg::P0, ObjectClass::Queue),
            Name(Arg::P1),
            Check::Extra(4),
            Write(Arg::Extra(1), Extent::Arg(Arg::Extra(2))),
        ],
        queue::queue_create,
    ),
    entry(
        QUEUE_DELETE,
        "queue_delete",
        &[Use(Arg::P0, ObjectClass::Queue)],
        queue::queue_delete,
    ),
    entry(
        QUEUE_FLUSH,
        "queue_flush",
        &[Use(Arg::P0, ObjectClass::Queue)],
        queue::queue_flush,
    ),
    entry(
        QUEUE_FRONT_SEND,
        "queue_front_send",
        &[Use(Arg::P0, ObjectClass::Queue), Read(Arg::P1, Extent::QueueMessage(Arg::P0))],
        queue::queue_front_send,
    ),
    entry(
        QUEUE_INFO_GET,
        "queue_info_get",
        &[Use(Arg::P0, ObjectClass::Queue), Write(Arg::P1, OUT), Check::Extra(5), ExtraOutputs],
        queue::queue_info_get,
    ),
    entry(
        QUEUE_PERFORMANCE_INFO_GET,
        "queue_performance_info_get",
        &[Use(Arg::P0, ObjectClass::Queue), Write(Arg::P1, OUT), Check::Extra(5), ExtraOutputs],
        not_enabled,
    ),
    entry(
        QUEUE_PERFORMANCE_SYSTEM_INFO_GET,
        "queue_performance_system_info_get",
        &[Write(Arg::P0, OUT), Write(Arg::P1, OUT), Check::Extra(4), ExtraOutputs],
        not_enabled,
    ),
    entry(
        QUEUE_PRIORITIZE,
        "queue_prioritize",
        &[Use(Arg::P0, ObjectClass::Queue)],
        queue::queue_prioritize,
    ),
    entry(
        QUEUE_RECEIVE,
        "queue_receive",
        &[Use(Arg::P0, ObjectClass::Queue), Write(Arg::P1, Extent::QueueMessage(Arg::P0))],
        queue::queue_receive,
    ),
    entry(
        QUEUE_SEND,
        "queue_send",
        &[Use(Arg::P0, ObjectClass::Queue), Read(Arg::P1, Extent::QueueMessage(Arg::P0))],
        queue::queue_send,
    ),
    entry(
        QUEUE_SEND_NOTIFY,
        "queue_send_notify",
        &[Use(Arg::P0, ObjectClass::Queue)],
        queue::queue_send_notify,
    ),
    // Semaphores
    entry(
        SEMAPHORE_CEILING_PUT,
        "semaphore_ceiling_put",
        &[Use(Arg::P0, ObjectClass::Semaphore)],
        sync::semaphore_ceiling_put,
    ),
    entry(
        SEMAPHORE_CREATE,
        "semaphore_create",
        &[Create(Arg::P0, ObjectClass::Semaphore), Name(Arg::P1), Check::Extra(2)],
        sync::semaphore_create,
    ),
    entry(
        SEMAPHORE_DELETE,
        "semaphore_delete",
        &[Use(Arg::P0, ObjectClass::Semaphore)],
        sync::semaphore_delete,
    ),
    entry(
        SEMAPHORE_GET,
        "semaphore_get",
        &[Use(Arg::P0, ObjectClass::Semaphore)],
        sync::semaphore_get,
    ),
    entry(
        SEMAPHORE_INFO_GET,
        "semaphore_info_get",
        &[Use(Arg::P0, ObjectClass::Semaphore), Write(Arg::P1, OUT), Check::Extra(4), ExtraOutputs],
        sync::semaphore_info_get,
    ),
    entry(
        SEMAPHORE_PERFORMANCE_INFO_GET,
        "semaphore_performance_info_get",
        &[Use(Arg::P0, ObjectClass::Semaphore), Write(Arg::P1, OUT), Check::Extra(3), ExtraOutputs],
        not_enabled,
    ),
    entry(
        SEMAPHORE_PERFORMANCE_SYSTEM_INFO_GET,
        "semaphore_performance_system_info_get",
        &[Write(Arg::P0, OUT), Write(Arg::P1, OUT), Check::Extra(2), ExtraOutputs],
        not_enabled,
    ),
    entry(
        SEMAPHORE_PRIORITIZE,
        "semaphore_prioritize",
        &[Use(Arg::P0, ObjectClass::Semaphore)],
        sync::semaphore_prioritize,
    ),
    entry(
        SEMAPHORE_PUT,
        "semaphore_put",
        &[Use(Arg::P0, ObjectClass::Semaphore)],
        sync::semaphore_put,
    ),
    entry(
        SEMAPHORE_PUT_NOTIFY,
        "semaphore_put_notify",
        &[Use(Arg::P0, ObjectClass::Semaphore)],
        sync::semaphore_put_notify,
    ),
    // Threads
    entry(
        THREAD_CREATE,
        "thread_create",
        &[
            Create(Arg::P0, ObjectClass::Thread),
            Name(Arg::P1),
            Check::Extra(9),
            Write(Arg::Extra(2), Extent::Arg(Arg::Extra(3))),
            PriorityFloor(Arg::Extra(4), Status::PriorityError),
            PriorityFloor(Arg::Extra(5), Status::ThreshError),
        ],
        thread::thread_create,
    ),
    entry(
        THREAD_DELETE,
        "thread_delete",
        &[Use(Arg::P0, ObjectClass::Thread)],
        thread::thread_delete,
    ),
    entry(
        THREAD_ENTRY_EXIT_NOTIFY,
        "thread_entry_exit_notify",
        &[Use(Arg::P0, ObjectClass::Thread)],
        thread::thread_entry_exit_notify,
    ),
    entry(THREAD_IDENTIFY, "thread_identify", &[], thread::thread_identify),
    entry(
        THREAD_INFO_GET,
        "thread_info_get",
        &[Use(Arg::P0, ObjectClass::Thread), Write(Arg::P1, OUT), Check::Extra(7), ExtraOutputs],
        thread::thread_info_get,
    ),
    entry(
        THREAD_PERFORMANCE_INFO_GET,
        "thread_performance_info_get",
        &[Use(Arg::P0, ObjectClass::Thread), Write(Arg::P1, OUT), Check::Extra(9), ExtraOutputs],
        not_enabled,
    ),
    entry(
        THREAD_PERFORMANCE_SYSTEM_INFO_GET,
        "thread_performance_system_info_get",
        &[Write(Arg::P0, OUT), Write(Arg::P1, OUT), Check::Extra(9), ExtraOutputs],
        not_enabled,
    ),
    entry(
        THREAD_PREEMPTION_CHANGE,
        "thread_preemption_change",
        &[
            Use(Arg::P0, ObjectClass::Thread),
            Write(Arg::P2, OUT),
            PriorityFloor(Arg::P1, Status::ThreshError),
        ],
        thread::thread_preemption_change,
    ),
    entry(
        THREAD_PRIORITY_CHANGE,
        "thread_priority_change",
        &[
            Use(Arg::P0, ObjectClass::Thread),
            Write(Arg::P2, OUT),
            PriorityFloor(Arg::P1, Status::PriorityError),
        ],
        thread::thread_priority_change,
    ),
    entry(THREAD_RELINQUISH, "thread_relinquish", &[], thread::thread_relinquish),
    entry(
        THREAD_RESET,
        "thread_reset",
        &[Use(Arg::P0, ObjectClass::Thread)],
        thread::thread_reset,
    ),
    entry(
        THREAD_RESUME,
        "thread_resume",
        &[Use(Arg::P0, ObjectClass::Thread)],
        thread::thread_resume,
    ),
    entry(THREAD_SLEEP, "thread_sleep", &[], thread::thread_sleep),
    entry(
        THREAD_STACK_ERROR_NOTIFY,
        "thread_stack_error_notify",
        &[Privileged],
        thread::thread_stack_error_notify,
    ),
    entry(
        THREAD_SUSPEND,
        "thread_suspend",
        &[Use(Arg::P0, ObjectClass::Thread)],
        thread::thread_suspend,
    ),
    entry(
        THREAD_TERMINATE,
        "thread_terminate",
        &[Use(Arg::P0, ObjectClass::Thread)],
        thread::thread_terminate,
    ),
    entry(
        THREAD_TIME_SLICE_CHANGE,
        "thread_time_slice_change",
        &[Use(Arg::P0, ObjectClass::Thread), Write(Arg::P2, OUT)],
        thread::thread_time_slice_change,
    ),
    entry(
        THREAD_WAIT_ABORT,
        "thread_wait_abort",
        &[Use(Arg::P0, ObjectClass::Thread)],
        thread::thread_wait_abort,
    ),
    // Time and timers
    entry(TIME_GET, "time_get", &[], timer::time_get),
    entry(TIME_SET, "time_set", &[], timer::time_set),
    entry(
        TIMER_ACTIVATE,
        "timer_activate",
        &[Use(Arg::P0, ObjectClass::Timer)],
        timer::timer_activate,
    ),
    entry(
        TIMER_CHANGE,
        "timer_change",
        &[Use(Arg::P0, ObjectClass::Timer)],
        timer::timer_change,
    ),
    entry(
        TIMER_CREATE,
        "timer_create",
        &[Create(Arg::P0, ObjectClass::Timer), Name(Arg::P1), Check::Extra(6)],
        timer::timer_create,
    ),
    entry(
        TIMER_DEACTIVATE,
        "timer_deactivate",
        &[Use(Arg::P0, ObjectClass::Timer)],
        timer::timer_deactivate,
    ),
    entry(
        TIMER_DELETE,
        "timer_delete",
        &[Use(Arg::P0, ObjectClass::Timer)],
        timer::timer_delete,
    ),
    entry(
        TIMER_INFO_GET,
        "timer_info_get",
        &[Use(Arg::P0, ObjectClass::Timer), Write(Arg::P1, OUT), Check::Extra(4), ExtraOutputs],
        timer::timer_info_get,
    ),
    entry(
        TIMER_PERFORMANCE_INFO_GET,
        "timer_performance_info_get",
        &[Use(Arg::P0, ObjectClass::Timer), Write(Arg::P1, OUT), Check::Extra(4), ExtraOutputs],
        not_enabled,
    ),
    entry(
        TIMER_PERFORMANCE_SYSTEM_INFO_GET,
        "timer_performance_system_info_get",
        &[Write(Arg::P0, OUT), Write(Arg::P1, OUT), Check::Extra(3), ExtraOutputs],
        not_enabled,
    ),
    // Trace
    entry(TRACE_ENABLE, "trace_enable", &[Privileged], not_enabled),
    entry(TRACE_EVENT_FILTER, "trace_event_filter", &[], not_enabled),
    entry(TRACE_EVENT_UNFILTER, "trace_event_unfilter", &[], not_enabled),
    entry(TRACE_DISABLE, "trace_disable", &[Privileged], not_enabled),
    entry(TRACE_INTERRUPT_CONTROL, "trace_interrupt_control", &[Privileged], not_enabled),
    entry(TRACE_ISR_ENTER_INSERT, "trace_isr_enter_insert", &[Privileged], not_enabled),
    entry(TRACE_ISR_EXIT_INSERT, "trace_isr_exit_insert", &[Privileged], not_enabled),
    entry(TRACE_BUFFER_FULL_NOTIFY, "trace_buffer_full_notify", &[], not_enabled),
    entry(TRACE_USER_EVENT_INSERT, "trace_user_event_insert", &[Check::Extra(3)], not_enabled),
    entry(
        THREAD_SYSTEM_SUSPEND,
        "thread_system_suspend",
        &[Use(Arg::P0, ObjectClass::Thread)],
        thread::thread_system_suspend,
    ),
    // Module self-service
    entry(
        MODULE_OBJECT_POINTER_GET,
        "module_object_pointer_get",
        &[Name(Arg::P1), Write(Arg::P2, OUT)],
        system::object_pointer_get,
    ),
    entry(
        MODULE_OBJECT_POINTER_GET_EXTENDED,
        "module_object_pointer_get_extended",
        &[Name(Arg::P1), Check::Extra(2), Write(Arg::Extra(1), OUT)],
        system::object_pointer_get_extended,
    ),
    entry(
        MODULE_OBJECT_ALLOCATE,
        "module_object_allocate",
        &[Write(Arg::P0, OUT)],
        system::object_allocate,
    ),
    entry(
        MODULE_OBJECT_DEALLOCATE,
        "module_object_deallocate",
        &[PoolExtent(Arg::P0)],
        system::object_deallocate,
    ),
];

// Entries are dense and in request order.
const _: () = {
    let mut i = 0;
    while i < TABLE.len() {
        assert!(TABLE[i].request == i as u32 + 1);
        i += 1;
    }
};

pub static DISPATCH_TABLE: [Entry; LAST_CORE_REQUEST as usize] = TABLE;

/// Table entry for a core request.
pub fn lookup(request: u32) -> Option<&'static Entry> {
    let index = request.checked_sub(1)?;
    DISPATCH_TABLE.get(usize::try_from(index).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handlers::fixture::{self, DATA};
    use crate::dispatch::module_call;
    use crate::module::ModuleProperties;
    use crate::status::Completion;

    #[test]
    fn test_lookup_bounds() {
        assert!(lookup(0).is_none());
        assert_eq!(lookup(1).map(|e| e.name), Some("block_allocate"));
        assert_eq!(lookup(LAST_CORE_REQUEST).map(|e| e.request), Some(MODULE_OBJECT_DEALLOCATE));
        assert!(lookup(LAST_CORE_REQUEST + 1).is_none());
    }

    #[test]
    fn test_extra_references_follow_their_read() {
        for entry in DISPATCH_TABLE.iter() {
            let mut read = 0;
            for check in entry.checks {
                let args: &[Arg] = match check {
                    Check::Extra(n) => {
                        read = *n;
                        &[]
                    }
                    Create(a, _) | Use(a, _) | Name(a) | PriorityFloor(a, _) | PoolExtent(a) | BlockHeader(a, _) => {
                        core::slice::from_ref(a)
                    }
                    Read(a, _) | Write(a, _) => core::slice::from_ref(a),
                    _ => &[],
                };
                let mut referenced: alloc::vec::Vec<Arg> = args.to_vec();
                if let Read(_, Extent::Arg(b) | Extent::Words(b) | Extent::QueueMessage(b))
                | Write(_, Extent::Arg(b) | Extent::Words(b) | Extent::QueueMessage(b)) = check
                {
                    referenced.push(*b);
                }
                for arg in referenced {
                    if let Arg::Extra(i) = arg {
                        assert!(i < read, "{} reads extra {} of {}", entry.name, i, read);
                    }
                }
            }
        }
    }

    #[test]
    fn test_extra_array_is_p2_only_when_read() {
        // Calls that take P2 as a plain value never declare an extra array.
        for id in [EVENT_FLAGS_CREATE, EVENT_FLAGS_SET, THREAD_PRIORITY_CHANGE, TIMER_CHANGE] {
            let entry = lookup(id).expect("entry");
            assert!(!entry.checks.iter().any(|c| matches!(c, Check::Extra(_))), "{}", entry.name);
        }
    }

    #[test]
    fn test_privileged_calls_refused_in_user_mode() {
        let mut s = fixture::with_properties(ModuleProperties::USER_MODE | ModuleProperties::MEMORY_PROTECTION);
        for id in [THREAD_INTERRUPT_CONTROL, THREAD_STACK_ERROR_NOTIFY, TRACE_ENABLE, TRACE_ISR_EXIT_INSERT] {
            assert_eq!(module_call(&mut s, id, [0; 3]), Completion::from(Status::InvalidProperties));
        }
        let mut s = fixture::protected();
        assert_eq!(module_call(&mut s, THREAD_INTERRUPT_CONTROL, [1, 0, 0]), Completion::Return(0));
        assert_eq!(s.interrupt_posture, 1);
    }

    #[test]
    fn test_disabled_features_still_validate() {
        let mut s = fixture::protected();
        assert_eq!(
            module_call(&mut s, TIMER_PERFORMANCE_SYSTEM_INFO_GET, [fixture::CODE, 0, 0]),
            Completion::from(Status::InvalidMemory)
        );
        s.memory.write_words(DATA + 0x200, &[0, 0, 0]).expect("extra");
        assert_eq!(
            module_call(&mut s, TIMER_PERFORMANCE_SYSTEM_INFO_GET, [DATA, DATA + 4, DATA + 0x200]),
            Completion::from(Status::FeatureNotEnabled)
        );
    }

    #[test]
    fn test_thread_create_priority_floor() {
        let mut s = fixture::protected();
        let out = DATA + 0x100;
        assert_eq!(
            module_call(&mut s, MODULE_OBJECT_ALLOCATE, [out, ObjectClass::Thread.control_block_size(), 0]),
            Completion::from(Status::Success)
        );
        let cb = s.memory.read_word(out).expect("cb");
        let stack = DATA + 0x1000;
        let extra = DATA + 0x200;
        let spec = |priority: u32, threshold: u32| {
            [
                fixture::CODE + 0x40,
                0,
                stack,
                0x800,
                priority,
                threshold,
                0,
                0,
                ObjectClass::Thread.control_block_size(),
            ]
        };
        s.memory.write_words(extra, &spec(4, 4)).expect("extra");
        assert_eq!(module_call(&mut s, THREAD_CREATE, [cb, 0, extra]), Completion::from(Status::PriorityError));
        s.memory.write_words(extra, &spec(12, 4)).expect("extra");
        assert_eq!(module_call(&mut s, THREAD_CREATE, [cb, 0, extra]), Completion::from(Status::ThreshError));
        s.memory.write_words(extra, &spec(12, 12)).expect("extra");
        assert_eq!(module_call(&mut s, THREAD_CREATE, [cb, 0, extra]), Completion::from(Status::Success));
        assert_eq!(s.thread_module(cb), Some(fixture::MODULE));
        assert_eq!(
            s.threads.get(cb).map(|t| t.entry),
            Some(crate::objects::ThreadEntry::ModuleShell {
                module: fixture::MODULE,
                entry: fixture::CODE + 0x40
            })
        );
    }

    #[test]
    fn test_thread_identify_and_self_suspend() {
        let mut s = fixture::protected();
        assert_eq!(module_call(&mut s, THREAD_IDENTIFY, [0; 3]), Completion::Return(fixture::THREAD));
        assert_eq!(
            module_call(&mut s, THREAD_SYSTEM_SUSPEND, [0x0010_0200, 0, 0]),
            Completion::from(Status::InvalidMemory)
        );
        assert_eq!(
            module_call(&mut s, THREAD_SYSTEM_SUSPEND, [fixture::THREAD, 0, 0]),
            Completion::from(Status::Success)
        );
    }
}
