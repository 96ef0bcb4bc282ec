//! Runtime-checkable kernel invariants
//!
//! Used by tests after every lifecycle step, and by the runtime's audit.
//!
//! # Invariants
//!
//! 1. **Disjoint regions**: module code and data never overlap each other,
//!    kernel memory or the object pool
//! 2. **Live callbacks**: every stored module callback names a module that is
//!    started or stopping
//! 3. **Pool bookkeeping**: each module's allocation list matches the pool's
//!    ownership records
//! 4. **Nothing survives a stop**: a module that is not running owns no
//!    kernel object and no pool allocation
//! 5. **Kernel-resident control**: control threads and callback queues live
//!    in kernel memory
//! 6. **Registry consistency**: each class's created list matches its count
//!    and names only live objects

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::memory::Region;
use crate::module::ModuleState;
use crate::notify::CallbackTarget;
use crate::state::KernelState;
use crate::types::{ModuleId, ObjectClass, NULL};

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all kernel invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_all_invariants(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_disjoint_regions(state));
    violations.extend(check_live_callbacks(state));
    violations.extend(check_pool_bookkeeping(state));
    violations.extend(check_nothing_survives_stop(state));
    violations.extend(check_kernel_resident_control(state));
    violations.extend(check_registry_consistency(state));

    violations
}

fn running(state: &KernelState, module: ModuleId) -> bool {
    state
        .module(module)
        .is_some_and(|m| matches!(m.state, ModuleState::Started | ModuleState::Stopping))
}

/// Invariant 1
fn check_disjoint_regions(state: &KernelState) -> Vec<InvariantViolation> {
    let mut named: Vec<(String, Region)> = Vec::new();
    named.push((String::from("kernel memory"), state.kernel_heap.region()));
    if let Some(pool) = &state.object_pool {
        named.push((String::from("object pool"), pool.region()));
    }
    for m in state.modules.values() {
        named.push((format!("module {} code", m.id.0), m.code));
        named.push((format!("module {} data", m.id.0), m.data));
    }

    let mut violations = Vec::new();
    for (i, (a_name, a)) in named.iter().enumerate() {
        for (b_name, b) in named.iter().skip(i + 1) {
            if a.overlaps(b) {
                violations.push(InvariantViolation {
                    invariant: "disjoint_regions",
                    description: format!("{a_name} overlaps {b_name}"),
                });
            }
        }
    }
    violations
}

/// Invariant 2
fn check_live_callbacks(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut check = |what: String, target: Option<CallbackTarget>| {
        if let Some(CallbackTarget::Module { module, callback }) = target {
            if callback == NULL {
                violations.push(InvariantViolation {
                    invariant: "live_callbacks",
                    description: format!("{what} has a null callback for module {}", module.0),
                });
            }
            if !running(state, module) {
                violations.push(InvariantViolation {
                    invariant: "live_callbacks",
                    description: format!("{what} calls back into module {} which is not running", module.0),
                });
            }
        }
    };

    for class in ObjectClass::TEARDOWN_ORDER {
        for addr in state.created(class) {
            let notify = state.header(class, addr).and_then(|h| h.notify);
            check(format!("{} {addr:#010x}", class.name()), notify);
        }
    }
    check(String::from("stack error handler"), state.stack_error_handler);
    for n in &state.pending_notifications {
        check(format!("pending notification for {:#010x}", n.object), Some(n.target));
    }
    violations
}

/// Invariant 3
fn check_pool_bookkeeping(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let Some(pool) = &state.object_pool else {
        for m in state.modules.values().filter(|m| m.allocations.count != 0) {
            violations.push(InvariantViolation {
                invariant: "pool_bookkeeping",
                description: format!("module {} lists allocations but no pool exists", m.id.0),
            });
        }
        return violations;
    };

    let mut listed = 0usize;
    for m in state.modules.values() {
        let nodes = pool.walk(&m.allocations);
        listed += nodes.len();
        if nodes.len() != m.allocations.count as usize {
            violations.push(InvariantViolation {
                invariant: "pool_bookkeeping",
                description: format!(
                    "module {} counts {} allocations but its list has {}",
                    m.id.0,
                    m.allocations.count,
                    nodes.len()
                ),
            });
        }
        for ptr in nodes.into_iter().filter(|p| pool.owner_of(*p) != Some(m.id)) {
            violations.push(InvariantViolation {
                invariant: "pool_bookkeeping",
                description: format!("{ptr:#010x} is on module {}'s list but not owned by it", m.id.0),
            });
        }
    }
    if listed != pool.allocation_count() {
        violations.push(InvariantViolation {
            invariant: "pool_bookkeeping",
            description: format!(
                "pool records {} allocations, module lists hold {listed}",
                pool.allocation_count()
            ),
        });
    }
    violations
}

/// Invariant 4
fn check_nothing_survives_stop(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    for m in state.modules.values().filter(|m| !running(state, m.id)) {
        if m.allocations.count != 0 {
            violations.push(InvariantViolation {
                invariant: "nothing_survives_stop",
                description: format!("module {} is {:?} but holds {} pool objects", m.id.0, m.state, m.allocations.count),
            });
        }
        for class in ObjectClass::TEARDOWN_ORDER {
            for addr in state.created(class) {
                let owned = state.object_owner(addr) == Some(m.id)
                    || (class == ObjectClass::Thread && state.thread_module(addr) == Some(m.id));
                if owned {
                    violations.push(InvariantViolation {
                        invariant: "nothing_survives_stop",
                        description: format!("module {} is {:?} but owns {} {addr:#010x}", m.id.0, m.state, class.name()),
                    });
                }
            }
        }
    }
    violations
}

/// Invariant 5
fn check_kernel_resident_control(state: &KernelState) -> Vec<InvariantViolation> {
    let kernel = state.kernel_heap.region();
    let mut violations = Vec::new();
    for m in state.modules.values() {
        for (what, addr) in [
            ("start/stop thread", m.start_stop_thread),
            ("callback thread", m.callback_thread),
            ("callback queue", m.callback_queue),
        ] {
            if addr != NULL && !kernel.contains_addr(addr) {
                violations.push(InvariantViolation {
                    invariant: "kernel_resident_control",
                    description: format!("module {} {what} at {addr:#010x} is outside kernel memory", m.id.0),
                });
            }
        }
    }
    violations
}

/// Invariant 6
fn check_registry_consistency(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    for class in ObjectClass::TEARDOWN_ORDER {
        let created = state.created(class);
        if created.len() != state.count(class) as usize {
            violations.push(InvariantViolation {
                invariant: "registry_consistency",
                description: format!(
                    "{} count is {} but {} are on the created list",
                    class.name(),
                    state.count(class),
                    created.len()
                ),
            });
        }
        for addr in created.into_iter().filter(|a| state.header(class, *a).is_none()) {
            violations.push(InvariantViolation {
                invariant: "registry_consistency",
                description: format!("{} {addr:#010x} is listed but does not exist", class.name()),
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{self, RunOutcome};
    use crate::module::{ModuleDescriptor, ModuleProperties};
    use crate::objects::semaphore;
    use crate::objects::ObjectHeader;
    use crate::pool;
    use crate::test_support::state;
    use crate::types::Addr;

    fn descriptor() -> ModuleDescriptor {
        ModuleDescriptor {
            name: String::from("app"),
            code_start: 0x2000_0000,
            code_size: 0x1000,
            data_start: 0x2001_0000,
            data_size: 0x4000,
            properties: ModuleProperties::MEMORY_PROTECTION.bits(),
            start_entry: 0x2000_0000,
            stop_entry: NULL,
            callback_entry: 0x2000_0010,
            start_stop_priority: 10,
            callback_priority: 10,
            max_priority: 8,
            start_stop_stack_size: 1024,
            callback_stack_size: 1024,
        }
    }

    fn names(violations: &[InvariantViolation]) -> Vec<&'static str> {
        violations.iter().map(|v| v.invariant).collect()
    }

    #[test]
    fn test_invariants_hold_across_lifecycle() {
        let mut s = state();
        assert!(check_all_invariants(&s).is_empty());
        let pool_region = Region::new(0x3000_0000, 0x2000).expect("pool");
        assert_eq!(manager::object_pool_create(&mut s, pool_region), crate::status::Status::Success);
        let id = manager::load(&mut s, &descriptor()).expect("load");
        assert!(check_all_invariants(&s).is_empty());

        manager::start(&mut s, id);
        let size = ObjectClass::Semaphore.control_block_size();
        let cb = pool::allocate(&mut s, id, size).expect("allocate");
        semaphore::create(&mut s, cb, ObjectHeader::named(NULL, "sem"), 0, size);
        assert!(check_all_invariants(&s).is_empty());

        let mut done = |_: &mut KernelState, _: Addr| RunOutcome::Completed;
        manager::stop(&mut s, id, &mut done).expect("stop");
        assert!(check_all_invariants(&s).is_empty());
    }

    #[test]
    fn test_detects_leftovers_of_stopped_module() {
        let mut s = state();
        let pool_region = Region::new(0x3000_0000, 0x2000).expect("pool");
        manager::object_pool_create(&mut s, pool_region);
        let id = manager::load(&mut s, &descriptor()).expect("load");
        let cb = pool::allocate(&mut s, id, 28).expect("allocate");
        semaphore::create(&mut s, cb, ObjectHeader::default(), 0, 28);
        if let Some(h) = s.header_mut(ObjectClass::Semaphore, cb) {
            h.notify = Some(CallbackTarget::Module {
                module: id,
                callback: 0x2000_0040,
            });
        }
        let found = names(&check_all_invariants(&s));
        assert!(found.contains(&"nothing_survives_stop"));
        assert!(found.contains(&"live_callbacks"));
    }

    #[test]
    fn test_detects_broken_pool_bookkeeping() {
        let mut s = state();
        manager::object_pool_create(&mut s, Region::new(0x3000_0000, 0x2000).expect("pool"));
        let id = manager::load(&mut s, &descriptor()).expect("load");
        if let Some(m) = s.module_mut(id) {
            m.allocations.count = 3;
        }
        assert_eq!(names(&check_all_invariants(&s)), ["pool_bookkeeping", "nothing_survives_stop"]);
    }
}
