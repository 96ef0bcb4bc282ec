//! Module manager
//!
//! Loads, starts, stops and unloads module instances. Start and stop hold
//! the manager lock for their whole duration, so no two lifecycle changes
//! ever interleave.
//!
//! ```text
//!   load ──▶ Loaded ──start──▶ Started ──stop──▶ Stopping ──▶ Stopped ──unload──▶ (gone)
//!              │                                                 │
//!              └────────────────────── unload ◀──── start ◀──────┘
//! ```
//!
//! Control threads and the callback request queue live in kernel memory,
//! never in the module's own data.

use alloc::format;
use alloc::string::String;

use tern_axiom::CommitType;

use crate::memory::Region;
use crate::module::{ModuleDescriptor, ModuleInstance, ModuleProperties, ModuleState};
use crate::notify::{self, CALLBACK_MESSAGE_WORDS};
use crate::objects::thread::{self, ThreadEntry, ThreadSpec};
use crate::objects::{self, queue, ObjectHeader};
use crate::pool;
use crate::state::KernelState;
use crate::status::Status;
use crate::types::{Addr, ModuleId, ObjectClass, AUTO_START, NULL, WORD};

/// Result of running a thread for one time slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The thread returned from its entry function
    Completed,
    /// The thread is still running or blocked
    Running,
}

/// Executes module code on behalf of the manager.
///
/// The manager only needs this to give a module's stop routine a bounded
/// number of time slices.
pub trait ThreadRunner {
    fn run_slice(&mut self, state: &mut KernelState, thread: Addr) -> RunOutcome;
}

impl<F> ThreadRunner for F
where
    F: FnMut(&mut KernelState, Addr) -> RunOutcome,
{
    fn run_slice(&mut self, state: &mut KernelState, thread: Addr) -> RunOutcome {
        self(state, thread)
    }
}

/// What a stop reclaimed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Kernel objects deleted by the teardown walk
    pub objects_deleted: u32,
    /// Shared-pool allocations returned
    pub pool_objects_freed: u32,
    /// The stop routine returned within its time slices
    pub stop_routine_completed: bool,
}

/// Create the shared object pool. Only one may ever exist.
pub fn object_pool_create(state: &mut KernelState, region: Region) -> Status {
    pool::create(state, region)
}

// ============================================================================
// Load / unload
// ============================================================================

fn priority_ok(state: &KernelState, priority: u32, floor: u32) -> bool {
    priority >= floor && priority < state.config.max_priorities
}

/// Validate a descriptor and map the module's memory.
pub fn load(state: &mut KernelState, desc: &ModuleDescriptor) -> Result<ModuleId, Status> {
    if state.modules.values().any(|m| m.name == desc.name) {
        return Err(Status::AlreadyLoaded);
    }
    if desc.code_start % WORD != 0 || desc.data_start % WORD != 0 {
        return Err(Status::Alignment);
    }

    let code = Region::new(desc.code_start, desc.code_size)
        .filter(|r| !r.is_empty())
        .ok_or(Status::InvalidMemory)?;
    let data = Region::new(desc.data_start, desc.data_size)
        .filter(|r| !r.is_empty())
        .ok_or(Status::InvalidMemory)?;
    let kernel = state.kernel_heap.region();
    let pool = state.object_pool.as_ref().map(|p| p.region());
    let collides = |r: &Region| {
        r.overlaps(&kernel)
            || pool.is_some_and(|p| r.overlaps(&p))
            || state.modules.values().any(|m| r.overlaps(&m.code) || r.overlaps(&m.data))
    };
    if code.overlaps(&data) || collides(&code) || collides(&data) {
        return Err(Status::InvalidMemory);
    }

    let in_code = |entry: Addr| code.contains_addr(entry);
    if !in_code(desc.start_entry) || !in_code(desc.callback_entry) {
        return Err(Status::InvalidCallback);
    }
    if desc.stop_entry != NULL && !in_code(desc.stop_entry) {
        return Err(Status::InvalidCallback);
    }

    let properties = ModuleProperties::from_bits(desc.properties).ok_or(Status::InvalidProperties)?;
    if desc.max_priority >= state.config.max_priorities
        || !priority_ok(state, desc.start_stop_priority, desc.max_priority)
        || !priority_ok(state, desc.callback_priority, desc.max_priority)
    {
        return Err(Status::InvalidProperties);
    }
    let minimum = state.config.minimum_stack;
    if desc.start_stop_stack_size < minimum || desc.callback_stack_size < minimum {
        return Err(Status::InvalidStackSize);
    }

    state.memory.map(code).map_err(|_| Status::InvalidMemory)?;
    if state.memory.map(data).is_err() {
        let _ = state.memory.unmap(code.start);
        return Err(Status::InvalidMemory);
    }

    let id = state.alloc_module_id();
    state
        .modules
        .insert(id, ModuleInstance::new(id, desc, code, data, properties));
    state.record(CommitType::ModuleLoaded {
        module: id.0,
        name: desc.name.clone(),
    });
    Ok(id)
}

/// Remove a module that is not running and unmap its memory.
pub fn unload(state: &mut KernelState, module: ModuleId) -> Status {
    let Some(instance) = state.module(module) else {
        return Status::PtrError;
    };
    if !matches!(instance.state, ModuleState::Loaded | ModuleState::Stopped) {
        return Status::NotDone;
    }
    let (code, data) = (instance.code.start, instance.data.start);
    let _ = state.memory.unmap(code);
    let _ = state.memory.unmap(data);
    state.modules.remove(&module);
    state.record(CommitType::ModuleUnloaded { module: module.0 });
    Status::Success
}

// ============================================================================
// Control threads
// ============================================================================

fn heap_allocate(state: &mut KernelState, size: u32) -> Result<Addr, Status> {
    state.kernel_heap.allocate(size).map_err(|_| Status::NoMemory)
}

/// Create a module control thread in kernel memory.
fn spawn_control_thread(
    state: &mut KernelState,
    module: ModuleId,
    name: String,
    entry: Addr,
    priority: u32,
    stack_size: u32,
) -> Result<Addr, Status> {
    let cb_size = ObjectClass::Thread.control_block_size();
    let cb = heap_allocate(state, cb_size)?;
    let stack = match heap_allocate(state, stack_size) {
        Ok(stack) => stack,
        Err(e) => {
            let _ = state.kernel_heap.release(cb);
            return Err(e);
        }
    };
    let spec = ThreadSpec {
        addr: cb,
        header: ObjectHeader::named(NULL, &name),
        entry: ThreadEntry::ModuleShell { module, entry },
        entry_input: module.0,
        stack_start: stack,
        stack_size,
        priority,
        preempt_threshold: priority,
        time_slice: state.config.control_time_slice,
        auto_start: AUTO_START,
        cb_size,
    };
    match thread::create(state, spec) {
        Status::Success => Ok(cb),
        status => {
            let _ = state.kernel_heap.release(stack);
            let _ = state.kernel_heap.release(cb);
            Err(status)
        }
    }
}

/// Terminate and delete a control thread and return its memory.
fn reap_control_thread(state: &mut KernelState, addr: Addr) {
    if addr == NULL {
        return;
    }
    let Some(stack) = state.threads.get(addr).map(|t| t.stack.start) else {
        return;
    };
    thread::terminate(state, addr);
    if thread::delete(state, addr).is_success() {
        let _ = state.kernel_heap.release(stack);
        let _ = state.kernel_heap.release(addr);
    }
}

fn create_callback_queue(state: &mut KernelState, name: String) -> Result<Addr, Status> {
    let cb_size = ObjectClass::Queue.control_block_size();
    let storage_size = state
        .config
        .callback_queue_depth
        .checked_mul(CALLBACK_MESSAGE_WORDS * WORD)
        .ok_or(Status::MathOverflow)?;
    let cb = heap_allocate(state, cb_size)?;
    let storage = match heap_allocate(state, storage_size) {
        Ok(storage) => storage,
        Err(e) => {
            let _ = state.kernel_heap.release(cb);
            return Err(e);
        }
    };
    let header = ObjectHeader::named(NULL, &name);
    match queue::create(state, cb, header, CALLBACK_MESSAGE_WORDS, storage, storage_size, cb_size) {
        Status::Success => Ok(cb),
        status => {
            let _ = state.kernel_heap.release(storage);
            let _ = state.kernel_heap.release(cb);
            Err(status)
        }
    }
}

fn delete_callback_queue(state: &mut KernelState, addr: Addr) {
    let Some(storage) = state.queues.get(addr).map(|q| q.storage.start) else {
        return;
    };
    if queue::delete(state, addr).is_success() {
        let _ = state.kernel_heap.release(storage);
        let _ = state.kernel_heap.release(addr);
    }
}

// ============================================================================
// Start
// ============================================================================

/// Start a loaded or stopped module: create its callback queue, callback
/// thread and start thread.
pub fn start(state: &mut KernelState, module: ModuleId) -> Status {
    let Some(instance) = state.module(module) else {
        return Status::PtrError;
    };
    if !matches!(instance.state, ModuleState::Loaded | ModuleState::Stopped) {
        return Status::START_ERROR;
    }
    if state.manager_lock.is_some() {
        return Status::NotAvailable;
    }
    let name = instance.name.clone();
    let (start_entry, callback_entry) = (instance.start_entry, instance.callback_entry);
    let (start_priority, callback_priority) = (instance.start_stop_priority, instance.callback_priority);
    let (start_stack, callback_stack) = (instance.start_stop_stack_size, instance.callback_stack_size);

    state.manager_lock = Some(module);
    let result = (|| {
        let queue = create_callback_queue(state, format!("{name} callback queue"))?;
        let callback = match spawn_control_thread(
            state,
            module,
            format!("{name} callback"),
            callback_entry,
            callback_priority,
            callback_stack,
        ) {
            Ok(t) => t,
            Err(e) => {
                delete_callback_queue(state, queue);
                return Err(e);
            }
        };
        match spawn_control_thread(state, module, format!("{name} start"), start_entry, start_priority, start_stack) {
            Ok(t) => Ok((queue, callback, t)),
            Err(e) => {
                reap_control_thread(state, callback);
                delete_callback_queue(state, queue);
                Err(e)
            }
        }
    })();
    state.manager_lock = None;

    let (queue, callback, start_thread) = match result {
        Ok(created) => created,
        Err(e) => return e,
    };
    if let Some(m) = state.module_mut(module) {
        m.callback_queue = queue;
        m.callback_thread = callback;
        m.start_stop_thread = start_thread;
        m.callback_overflows = 0;
        m.state = ModuleState::Started;
    }
    state.record(CommitType::ModuleStarted { module: module.0 });
    Status::Success
}

// ============================================================================
// Stop
// ============================================================================

/// True if the teardown walk must delete this object for `module`.
fn owned_for_teardown(state: &KernelState, module: ModuleId, class: ObjectClass, addr: Addr) -> bool {
    pool::owned_by(state, module, addr) || (class == ObjectClass::Thread && state.thread_module(addr) == Some(module))
}

/// Clear every notify callback that would re-enter `module`.
fn clear_stashes(state: &mut KernelState, module: ModuleId) {
    for class in ObjectClass::TEARDOWN_ORDER {
        for addr in state.created(class) {
            if let Some(header) = state.header_mut(class, addr) {
                if header.notify.is_some_and(|t| t.references(module)) {
                    header.notify = None;
                }
            }
        }
    }
    if state.stack_error_handler.is_some_and(|t| t.references(module)) {
        state.stack_error_handler = None;
    }
}

/// Run the module's stop routine for at most the configured number of time
/// slices, then remove its thread whatever happened.
fn run_stop_routine(state: &mut KernelState, module: ModuleId, runner: &mut dyn ThreadRunner) -> bool {
    let Some(instance) = state.module(module) else {
        return false;
    };
    if instance.stop_entry == NULL {
        return true;
    }
    let name = format!("{} stop", instance.name);
    let (entry, priority, stack) = (instance.stop_entry, instance.start_stop_priority, instance.start_stop_stack_size);
    let Ok(stop_thread) = spawn_control_thread(state, module, name, entry, priority, stack) else {
        return false;
    };
    if let Some(m) = state.module_mut(module) {
        m.start_stop_thread = stop_thread;
    }

    let caller = state.current_thread;
    let mut completed = false;
    for _ in 0..state.config.stop_poll_limit {
        state.current_thread = Some(stop_thread);
        let outcome = runner.run_slice(state, stop_thread);
        notify::drain(state);
        let finished = state
            .threads
            .get(stop_thread)
            .map_or(true, |t| t.state.is_finished());
        if outcome == RunOutcome::Completed {
            thread::complete(state, stop_thread);
            completed = true;
            break;
        }
        if finished {
            break;
        }
    }
    state.current_thread = caller.filter(|t| state.threads.contains(*t));

    reap_control_thread(state, stop_thread);
    if let Some(m) = state.module_mut(module) {
        m.start_stop_thread = NULL;
    }
    completed
}

/// Stop a started module and reclaim everything it owns.
///
/// Fails with no side effects unless the module exists and is started.
pub fn stop(state: &mut KernelState, module: ModuleId, runner: &mut dyn ThreadRunner) -> Result<StopReport, Status> {
    let Some(instance) = state.module(module) else {
        return Err(Status::PtrError);
    };
    if instance.state != ModuleState::Started {
        return Err(Status::START_ERROR);
    }
    if state.manager_lock.is_some() {
        return Err(Status::NotAvailable);
    }
    let start_thread = instance.start_stop_thread;
    state.manager_lock = Some(module);
    if let Some(m) = state.module_mut(module) {
        m.state = ModuleState::Stopping;
    }

    reap_control_thread(state, start_thread);
    if let Some(m) = state.module_mut(module) {
        m.start_stop_thread = NULL;
    }

    let stop_routine_completed = run_stop_routine(state, module, runner);

    let (callback_thread, callback_queue) = match state.module(module) {
        Some(m) => (m.callback_thread, m.callback_queue),
        None => (NULL, NULL),
    };
    reap_control_thread(state, callback_thread);
    delete_callback_queue(state, callback_queue);
    if let Some(m) = state.module_mut(module) {
        m.callback_thread = NULL;
        m.callback_queue = NULL;
    }

    state.preempt_disable += 1;
    let mut objects_deleted = 0;
    for class in ObjectClass::TEARDOWN_ORDER {
        for addr in state.created(class) {
            if !owned_for_teardown(state, module, class, addr) {
                continue;
            }
            if let Some(header) = state.header_mut(class, addr) {
                header.notify = None;
            }
            if class == ObjectClass::Thread {
                thread::terminate(state, addr);
            }
            if objects::delete(state, class, addr).is_success() {
                objects_deleted += 1;
            }
        }
    }
    clear_stashes(state, module);
    notify::discard_for(state, module);
    state.extensions.stop_all(module);

    let pool_objects_freed = pool::release_all(state, module);
    state.preempt_disable = state.preempt_disable.saturating_sub(1);

    if let Some(m) = state.module_mut(module) {
        m.state = ModuleState::Stopped;
    }
    state.manager_lock = None;
    state.record(CommitType::ModuleStopped {
        module: module.0,
        objects_deleted,
        pool_objects_freed,
    });
    Ok(StopReport {
        objects_deleted,
        pool_objects_freed,
        stop_routine_completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::notify::{CallbackTarget, NotifyKind};
    use crate::objects::semaphore;
    use crate::test_support::state;
    use alloc::vec::Vec;

    const CODE: Addr = 0x2000_0000;
    const DATA: Addr = 0x2001_0000;
    const POOL: Addr = 0x3000_0000;

    fn descriptor(name: &str) -> ModuleDescriptor {
        ModuleDescriptor {
            name: String::from(name),
            code_start: CODE,
            code_size: 0x1000,
            data_start: DATA,
            data_size: 0x4000,
            properties: ModuleProperties::MEMORY_PROTECTION.bits(),
            start_entry: CODE,
            stop_entry: NULL,
            callback_entry: CODE + 0x10,
            start_stop_priority: 10,
            callback_priority: 10,
            max_priority: 8,
            start_stop_stack_size: 1024,
            callback_stack_size: 1024,
        }
    }

    fn with_pool() -> KernelState {
        let mut s = state();
        assert_eq!(object_pool_create(&mut s, Region::new(POOL, 0x2000).expect("pool")), Status::Success);
        s
    }

    fn started(desc: &ModuleDescriptor) -> (KernelState, ModuleId) {
        let mut s = with_pool();
        let id = load(&mut s, desc).expect("load");
        assert_eq!(start(&mut s, id), Status::Success);
        (s, id)
    }

    fn completes(_: &mut KernelState, _: Addr) -> RunOutcome {
        RunOutcome::Completed
    }

    fn pool_semaphore(s: &mut KernelState, id: ModuleId) -> Addr {
        let size = ObjectClass::Semaphore.control_block_size();
        let cb = pool::allocate(s, id, size).expect("allocate");
        assert_eq!(semaphore::create(s, cb, ObjectHeader::named(NULL, "sem"), 0, size), Status::Success);
        cb
    }

    #[test]
    fn test_load_validates_descriptor() {
        let mut s = with_pool();
        let bad = |f: fn(&mut ModuleDescriptor)| {
            let mut d = descriptor("app");
            f(&mut d);
            d
        };
        let cases: [(ModuleDescriptor, Status); 8] = [
            (bad(|d| d.code_start += 2), Status::Alignment),
            (bad(|d| d.data_size = 0), Status::InvalidMemory),
            (bad(|d| d.data_start = 0x0010_0000), Status::InvalidMemory),
            (bad(|d| d.data_start = POOL), Status::InvalidMemory),
            (bad(|d| d.start_entry = DATA), Status::InvalidCallback),
            (bad(|d| d.stop_entry = DATA), Status::InvalidCallback),
            (bad(|d| d.callback_priority = 4), Status::InvalidProperties),
            (bad(|d| d.callback_stack_size = 100), Status::InvalidStackSize),
        ];
        for (desc, expected) in cases {
            assert_eq!(load(&mut s, &desc), Err(expected), "{desc:?}");
        }
        assert_eq!(
            load(&mut s, &bad(|d| d.properties = 0x80)),
            Err(Status::InvalidProperties)
        );
        assert!(s.modules.is_empty());
        assert!(!s.memory.is_mapped(CODE, WORD));

        let id = load(&mut s, &descriptor("app")).expect("load");
        assert!(s.memory.is_mapped(DATA, WORD));
        assert_eq!(load(&mut s, &descriptor("app")), Err(Status::AlreadyLoaded));
        let overlapping = descriptor("other");
        assert_eq!(load(&mut s, &overlapping), Err(Status::InvalidMemory));
        assert_eq!(s.module(id).map(|m| m.state), Some(ModuleState::Loaded));
    }

    #[test]
    fn test_start_creates_control_threads_in_kernel_memory() {
        let (mut s, id) = started(&descriptor("app"));
        let m = s.module(id).expect("module");
        assert_eq!(m.state, ModuleState::Started);
        let kernel = s.kernel_heap.region();
        for addr in [m.callback_thread, m.start_stop_thread, m.callback_queue] {
            assert!(kernel.contains_addr(addr));
        }
        assert_eq!(s.thread_module(m.start_stop_thread), Some(id));
        assert_eq!(s.count(ObjectClass::Thread), 2);
        assert_eq!(s.count(ObjectClass::Queue), 1);
        assert_eq!(start(&mut s, id), Status::START_ERROR);
        assert!(s.take_commits().contains(&CommitType::ModuleStarted { module: id.0 }));
    }

    #[test]
    fn test_start_rolls_back_when_kernel_memory_runs_out() {
        let config = KernelConfig {
            kernel_memory_size: 0x600,
            ..KernelConfig::default()
        };
        let mut s = KernelState::new(config).expect("state");
        let id = load(&mut s, &descriptor("app")).expect("load");
        let available = s.kernel_heap.available();
        assert_eq!(start(&mut s, id), Status::NoMemory);
        assert_eq!(s.kernel_heap.available(), available);
        assert_eq!(s.count(ObjectClass::Thread), 0);
        assert_eq!(s.count(ObjectClass::Queue), 0);
        assert_eq!(s.module(id).map(|m| m.state), Some(ModuleState::Loaded));
        assert_eq!(s.manager_lock, None);
    }

    #[test]
    fn test_start_refused_while_manager_locked() {
        let mut s = with_pool();
        let id = load(&mut s, &descriptor("app")).expect("load");
        s.manager_lock = Some(ModuleId(99));
        assert_eq!(start(&mut s, id), Status::NotAvailable);
        assert_eq!(stop(&mut s, id, &mut completes), Err(Status::START_ERROR));
    }

    #[test]
    fn test_callbacks_reach_the_module_queue() {
        let (mut s, id) = started(&descriptor("app"));
        let target = CallbackTarget::Module {
            module: id,
            callback: CODE + 0x40,
        };
        notify::raise(&mut s, Some(target), NotifyKind::SemaphorePut, 0x1234, 0);
        notify::drain(&mut s);
        let queue = s.module(id).expect("module").callback_queue;
        assert_eq!(s.queues.get(queue).map(|q| q.messages.len()), Some(1));
    }

    #[test]
    fn test_stop_reclaims_everything_the_module_owns() {
        let (mut s, id) = started(&descriptor("app"));
        let pool_before = s.object_pool.as_ref().expect("pool").available();
        let heap_before = {
            let fresh = state();
            fresh.kernel_heap.available()
        };

        let sem = pool_semaphore(&mut s, id);
        let size = ObjectClass::Thread.control_block_size();
        let cb = pool::allocate(&mut s, id, size).expect("thread cb");
        let spec = ThreadSpec {
            addr: cb,
            header: ObjectHeader::default(),
            entry: ThreadEntry::ModuleShell { module: id, entry: CODE + 0x20 },
            entry_input: 0,
            stack_start: DATA + 0x1000,
            stack_size: 1024,
            priority: 12,
            preempt_threshold: 12,
            time_slice: 0,
            auto_start: AUTO_START,
            cb_size: size,
        };
        assert_eq!(thread::create(&mut s, spec), Status::Success);
        let scratch = pool::allocate(&mut s, id, 64).expect("scratch");

        let kernel_sem = 0x5000_0000;
        assert_eq!(
            semaphore::create(&mut s, kernel_sem, ObjectHeader::default(), 0, ObjectClass::Semaphore.control_block_size()),
            Status::Success
        );
        if let Some(h) = s.header_mut(ObjectClass::Semaphore, kernel_sem) {
            h.notify = Some(CallbackTarget::Module { module: id, callback: CODE + 0x40 });
        }
        s.take_commits();

        let report = stop(&mut s, id, &mut completes).expect("stop");
        assert_eq!(report.objects_deleted, 2);
        assert_eq!(report.pool_objects_freed, 3);
        assert!(report.stop_routine_completed);

        assert!(!s.semaphores.contains(sem));
        assert!(!s.threads.contains(cb));
        assert!(s.semaphores.contains(kernel_sem));
        assert!(s.header(ObjectClass::Semaphore, kernel_sem).is_some_and(|h| h.notify.is_none()));
        assert_eq!(s.count(ObjectClass::Thread), 0);
        assert_eq!(s.count(ObjectClass::Queue), 0);
        assert_eq!(s.object_pool.as_ref().expect("pool").owner_of(scratch), None);
        assert_eq!(s.object_pool.as_ref().expect("pool").available(), pool_before);
        assert_eq!(s.kernel_heap.available(), heap_before);

        let m = s.module(id).expect("module");
        assert_eq!(m.state, ModuleState::Stopped);
        assert_eq!(m.allocations.count, 0);
        assert_eq!(s.manager_lock, None);
        assert_eq!(s.preempt_disable, 0);
        assert!(s.take_commits().contains(&CommitType::ModuleStopped {
            module: id.0,
            objects_deleted: 2,
            pool_objects_freed: 3,
        }));
    }

    #[test]
    fn test_stop_leaves_other_modules_alone() {
        let (mut s, a) = started(&descriptor("a"));
        let other = ModuleDescriptor {
            code_start: 0x2200_0000,
            data_start: 0x2201_0000,
            start_entry: 0x2200_0000,
            callback_entry: 0x2200_0010,
            ..descriptor("b")
        };
        let b = load(&mut s, &other).expect("load b");
        assert_eq!(start(&mut s, b), Status::Success);
        let theirs = pool_semaphore(&mut s, b);
        pool_semaphore(&mut s, a);

        stop(&mut s, a, &mut completes).expect("stop");
        assert!(s.semaphores.contains(theirs));
        assert_eq!(s.object_pool.as_ref().expect("pool").owner_of(theirs), Some(b));
        assert_eq!(s.count(ObjectClass::Thread), 2);
        assert_eq!(s.module(b).map(|m| m.state), Some(ModuleState::Started));
    }

    #[test]
    fn test_second_stop_is_refused_without_effect() {
        let (mut s, id) = started(&descriptor("app"));
        stop(&mut s, id, &mut completes).expect("stop");
        s.take_commits();
        assert_eq!(stop(&mut s, id, &mut completes), Err(Status::START_ERROR));
        assert!(s.take_commits().is_empty());
        assert_eq!(stop(&mut s, ModuleId(42), &mut completes), Err(Status::PtrError));
    }

    #[test]
    fn test_hung_stop_routine_is_terminated() {
        let desc = ModuleDescriptor {
            stop_entry: CODE + 0x30,
            ..descriptor("app")
        };
        let (mut s, id) = started(&desc);
        let mut slices = Vec::new();
        let mut hangs = |s: &mut KernelState, t: Addr| {
            slices.push((t, s.current_thread));
            RunOutcome::Running
        };
        let report = stop(&mut s, id, &mut hangs).expect("stop");
        assert!(!report.stop_routine_completed);
        assert_eq!(slices.len(), KernelConfig::default().stop_poll_limit as usize);
        assert!(slices.iter().all(|(t, current)| *current == Some(*t)));
        assert_eq!(s.count(ObjectClass::Thread), 0);
        assert_eq!(s.current_thread, None);
    }

    #[test]
    fn test_stop_routine_runs_in_module_context() {
        let desc = ModuleDescriptor {
            stop_entry: CODE + 0x30,
            ..descriptor("app")
        };
        let (mut s, id) = started(&desc);
        let mut seen = None;
        let mut runner = |s: &mut KernelState, t: Addr| {
            seen = s.thread_module(t);
            RunOutcome::Completed
        };
        let report = stop(&mut s, id, &mut runner).expect("stop");
        assert!(report.stop_routine_completed);
        assert_eq!(seen, Some(id));
    }

    #[test]
    fn test_restart_and_unload() {
        let (mut s, id) = started(&descriptor("app"));
        assert_eq!(unload(&mut s, id), Status::NotDone);
        stop(&mut s, id, &mut completes).expect("stop");
        assert_eq!(start(&mut s, id), Status::Success);
        stop(&mut s, id, &mut completes).expect("stop again");

        assert_eq!(unload(&mut s, id), Status::Success);
        assert!(s.module(id).is_none());
        assert!(!s.memory.is_mapped(CODE, WORD));
        assert_eq!(unload(&mut s, id), Status::PtrError);
        assert!(load(&mut s, &descriptor("app")).is_ok());
    }
}
