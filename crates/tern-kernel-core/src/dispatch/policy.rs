//! Validation policies
//!
//! Each dispatch table entry describes the checks its parameters must pass
//! as a list of [`Check`]s. [`validate`] runs them in order against the
//! calling module and stops at the first failure, before the handler runs.
//!
//! Only [`Check::Privileged`] and [`Check::Extra`] apply to every module;
//! the rest are range checks and apply only to memory-protected modules.

use alloc::vec::Vec;

use crate::memory::Region;
use crate::module::ModuleInstance;
use crate::pool::OBJECT_HEADER_SIZE;
use crate::predicates;
use crate::state::KernelState;
use crate::status::Status;
use crate::types::{Addr, ObjectClass, NULL, WORD};

/// A call argument: one of the three parameter words, or an element of the
/// extra parameter array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arg {
    P0,
    P1,
    P2,
    Extra(usize),
}

/// Length of a buffer being checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extent {
    Bytes(u32),
    /// Byte count given by an argument
    Arg(Arg),
    /// Word count given by an argument
    Words(Arg),
    /// One message of the queue named by the argument
    QueueMessage(Arg),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Check {
    /// Refused for user-mode modules
    Privileged,
    /// P2 points at this many extra parameter words in module data
    Extra(usize),
    /// Every extra parameter is a one-word output pointer
    ExtraOutputs,
    /// Control block being created: a pool allocation of the class's size
    /// owned by the caller
    Create(Arg, ObjectClass),
    /// Existing object being used: outside the caller's memory
    Use(Arg, ObjectClass),
    /// NUL-terminated name inside the caller's data or code
    Name(Arg),
    Read(Arg, Extent),
    Write(Arg, Extent),
    /// Priority value no more privileged than the module's floor
    PriorityFloor(Arg, Status),
    /// Pool object being freed: header and recorded extent inside the pool
    PoolExtent(Arg),
    /// Memory block being released: null, or its header of this many bytes
    /// ahead of the pointer lies inside the caller's data
    BlockHeader(Arg, u32),
}

fn resolve(arg: Arg, params: &[u32; 3], extra: &[u32]) -> Result<u32, Status> {
    match arg {
        Arg::P0 => Ok(params[0]),
        Arg::P1 => Ok(params[1]),
        Arg::P2 => Ok(params[2]),
        Arg::Extra(i) => extra.get(i).copied().ok_or(Status::InvalidMemory),
    }
}

fn extent_len(state: &KernelState, extent: Extent, params: &[u32; 3], extra: &[u32]) -> Result<u32, Status> {
    match extent {
        Extent::Bytes(n) => Ok(n),
        Extent::Arg(arg) => resolve(arg, params, extra),
        Extent::Words(arg) => resolve(arg, params, extra)?
            .checked_mul(WORD)
            .ok_or(Status::InvalidMemory),
        Extent::QueueMessage(arg) => {
            let queue = resolve(arg, params, extra)?;
            state
                .queues
                .get(queue)
                .map(|q| q.message_bytes())
                .ok_or(Status::QueueError)
        }
    }
}

fn read_extra(state: &KernelState, module: &ModuleInstance, ptr: Addr, count: usize) -> Result<Vec<u32>, Status> {
    let count = u32::try_from(count).map_err(|_| Status::InvalidMemory)?;
    let bytes = count.checked_mul(WORD).ok_or(Status::InvalidMemory)?;
    if module.memory_protected() && !predicates::inside_data(module, ptr, bytes) {
        return Err(Status::InvalidMemory);
    }
    state
        .memory
        .read_words(ptr, count)
        .map_err(|_| Status::InvalidMemory)
}

/// True if the string at `ptr` is null or terminates inside the module's
/// data or code.
pub fn name_ok(state: &KernelState, module: &ModuleInstance, ptr: Addr) -> bool {
    ptr == NULL
        || [module.data, module.code]
            .iter()
            .any(|region| state.memory.read_cstr(ptr, region).is_ok())
}

fn creation_ok(state: &KernelState, module: &ModuleInstance, ptr: Addr, class: ObjectClass) -> bool {
    let pool = state.object_pool.as_ref();
    if !predicates::object_for_creation_ok(pool, ptr, class.control_block_size()) {
        return false;
    }
    ptr == NULL || pool.and_then(|p| p.owner_of(ptr)) == Some(module.id)
}

fn pool_extent_ok(state: &KernelState, ptr: Addr) -> bool {
    let Some(pool) = state.object_pool.as_ref() else {
        return true;
    };
    let Some(header) = ptr.checked_sub(OBJECT_HEADER_SIZE) else {
        return false;
    };
    let region: Region = pool.region();
    region.contains_addr(header) && pool.extent_ok(ptr)
}

/// Run `checks` for a call from `module`.
///
/// Returns the extra parameter words read along the way, or the status the
/// call must fail with.
pub fn validate(
    state: &KernelState,
    module: &ModuleInstance,
    checks: &[Check],
    params: [u32; 3],
) -> Result<Vec<u32>, Status> {
    let protected = module.memory_protected();
    let mut extra = Vec::new();

    for check in checks {
        match *check {
            Check::Privileged => {
                if module.user_mode() {
                    return Err(Status::InvalidProperties);
                }
            }
            Check::Extra(count) => {
                extra = read_extra(state, module, params[2], count)?;
            }
            _ if !protected => {}
            Check::ExtraOutputs => {
                if !extra.iter().all(|p| predicates::buffer_write_ok(module, *p, WORD)) {
                    return Err(Status::InvalidMemory);
                }
            }
            Check::Create(arg, class) => {
                if !creation_ok(state, module, resolve(arg, &params, &extra)?, class) {
                    return Err(Status::InvalidMemory);
                }
            }
            Check::Use(arg, class) => {
                let ptr = resolve(arg, &params, &extra)?;
                if !predicates::object_for_use_ok(module, ptr, class.control_block_size()) {
                    return Err(Status::InvalidMemory);
                }
            }
            Check::Name(arg) => {
                if !name_ok(state, module, resolve(arg, &params, &extra)?) {
                    return Err(Status::InvalidMemory);
                }
            }
            Check::Read(arg, extent) => {
                let ptr = resolve(arg, &params, &extra)?;
                let len = extent_len(state, extent, &params, &extra)?;
                if !predicates::buffer_read_ok(module, ptr, len) {
                    return Err(Status::InvalidMemory);
                }
            }
            Check::Write(arg, extent) => {
                let ptr = resolve(arg, &params, &extra)?;
                let len = extent_len(state, extent, &params, &extra)?;
                if !predicates::buffer_write_ok(module, ptr, len) {
                    return Err(Status::InvalidMemory);
                }
            }
            Check::PriorityFloor(arg, error) => {
                if resolve(arg, &params, &extra)? < module.max_priority {
                    return Err(error);
                }
            }
            Check::PoolExtent(arg) => {
                if !pool_extent_ok(state, resolve(arg, &params, &extra)?) {
                    return Err(Status::InvalidMemory);
                }
            }
            Check::BlockHeader(arg, len) => {
                let ptr = resolve(arg, &params, &extra)?;
                let ok = ptr == NULL
                    || ptr
                        .checked_sub(len)
                        .is_some_and(|header| predicates::inside_data(module, header, len));
                if !ok {
                    return Err(Status::InvalidMemory);
                }
            }
        }
    }
    Ok(extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleDescriptor, ModuleProperties};
    use crate::objects::{queue, ObjectHeader};
    use crate::test_support::state;
    use crate::types::ModuleId;
    use alloc::string::String;

    const CODE: Addr = 0x2000_0000;
    const DATA: Addr = 0x2001_0000;

    fn module(properties: ModuleProperties) -> ModuleInstance {
        let desc = ModuleDescriptor {
            name: String::from("m"),
            code_start: CODE,
            code_size: 0x1000,
            data_start: DATA,
            data_size: 0x1000,
            properties: properties.bits(),
            start_entry: CODE,
            stop_entry: NULL,
            callback_entry: CODE + 0x10,
            start_stop_priority: 10,
            callback_priority: 10,
            max_priority: 8,
            start_stop_stack_size: 1024,
            callback_stack_size: 1024,
        };
        let code = Region::new(CODE, 0x1000).expect("code");
        let data = Region::new(DATA, 0x1000).expect("data");
        ModuleInstance::new(ModuleId(1), &desc, code, data, properties)
    }

    fn mapped_state(m: &ModuleInstance) -> KernelState {
        let mut s = state();
        s.memory.map(m.code).expect("code");
        s.memory.map(m.data).expect("data");
        s
    }

    #[test]
    fn test_privileged_applies_without_protection() {
        let m = module(ModuleProperties::USER_MODE);
        let s = mapped_state(&m);
        assert_eq!(
            validate(&s, &m, &[Check::Privileged], [0; 3]),
            Err(Status::InvalidProperties)
        );
        let m = module(ModuleProperties::empty());
        assert_eq!(validate(&s, &m, &[Check::Privileged], [0; 3]), Ok(Vec::new()));
    }

    #[test]
    fn test_range_checks_skipped_without_protection() {
        let m = module(ModuleProperties::empty());
        let s = mapped_state(&m);
        let checks = [Check::Use(Arg::P0, ObjectClass::Semaphore), Check::Write(Arg::P1, Extent::Bytes(4))];
        assert!(validate(&s, &m, &checks, [DATA, CODE, 0]).is_ok());
    }

    #[test]
    fn test_extra_must_be_inside_data() {
        let m = module(ModuleProperties::MEMORY_PROTECTION);
        let mut s = mapped_state(&m);
        s.memory.write_words(DATA + 0x100, &[7, 8, 9]).expect("write");

        assert_eq!(validate(&s, &m, &[Check::Extra(3)], [0, 0, DATA + 0x100]), Ok(alloc::vec![7, 8, 9]));
        assert_eq!(validate(&s, &m, &[Check::Extra(3)], [0, 0, CODE]), Err(Status::InvalidMemory));
        assert_eq!(validate(&s, &m, &[Check::Extra(3)], [0, 0, DATA + 0xFFC]), Err(Status::InvalidMemory));
    }

    #[test]
    fn test_extra_outputs_reject_code() {
        let m = module(ModuleProperties::MEMORY_PROTECTION);
        let mut s = mapped_state(&m);
        s.memory.write_words(DATA, &[DATA + 0x40, CODE + 0x40]).expect("write");
        assert_eq!(
            validate(&s, &m, &[Check::Extra(2), Check::ExtraOutputs], [0, 0, DATA]),
            Err(Status::InvalidMemory)
        );
        s.memory.write_words(DATA, &[DATA + 0x40, NULL]).expect("write");
        assert!(validate(&s, &m, &[Check::Extra(2), Check::ExtraOutputs], [0, 0, DATA]).is_ok());
    }

    #[test]
    fn test_name_must_terminate_inside_module() {
        let m = module(ModuleProperties::MEMORY_PROTECTION);
        let mut s = mapped_state(&m);
        s.memory.write_bytes(DATA + 0x10, b"sem\0").expect("write");
        s.memory.fill(DATA + 0xFF0, 16, b'x').expect("fill");

        assert!(validate(&s, &m, &[Check::Name(Arg::P1)], [0, DATA + 0x10, 0]).is_ok());
        assert!(validate(&s, &m, &[Check::Name(Arg::P1)], [0, NULL, 0]).is_ok());
        assert_eq!(
            validate(&s, &m, &[Check::Name(Arg::P1)], [0, DATA + 0xFF0, 0]),
            Err(Status::InvalidMemory)
        );
    }

    #[test]
    fn test_queue_message_extent() {
        let m = module(ModuleProperties::MEMORY_PROTECTION);
        let mut s = mapped_state(&m);
        let q = 0x0010_8000;
        let cb = ObjectClass::Queue.control_block_size();
        assert_eq!(queue::create(&mut s, q, ObjectHeader::default(), 4, 0x0010_9000, 64, cb), Status::Success);

        let checks = [Check::Read(Arg::P1, Extent::QueueMessage(Arg::P0))];
        assert!(validate(&s, &m, &checks, [q, DATA + 0xFF0, 0]).is_ok());
        assert_eq!(validate(&s, &m, &checks, [q, DATA + 0xFF4, 0]), Err(Status::InvalidMemory));
        assert_eq!(validate(&s, &m, &checks, [0x0010_8100, DATA, 0]), Err(Status::QueueError));
    }

    #[test]
    fn test_block_header_inside_data() {
        let m = module(ModuleProperties::MEMORY_PROTECTION);
        let s = mapped_state(&m);
        let checks = [Check::BlockHeader(Arg::P0, 8)];
        assert!(validate(&s, &m, &checks, [DATA + 8, 0, 0]).is_ok());
        assert!(validate(&s, &m, &checks, [NULL, 0, 0]).is_ok());
        assert_eq!(validate(&s, &m, &checks, [DATA + 4, 0, 0]), Err(Status::InvalidMemory));
        assert_eq!(validate(&s, &m, &checks, [4, 0, 0]), Err(Status::InvalidMemory));
    }

    #[test]
    fn test_priority_floor() {
        let m = module(ModuleProperties::MEMORY_PROTECTION);
        let mut s = mapped_state(&m);
        s.memory.write_words(DATA, &[7, 9]).expect("write");
        let checks = [
            Check::Extra(2),
            Check::PriorityFloor(Arg::Extra(0), Status::PriorityError),
            Check::PriorityFloor(Arg::Extra(1), Status::ThreshError),
        ];
        assert_eq!(validate(&s, &m, &checks, [0, 0, DATA]), Err(Status::PriorityError));
        s.memory.write_words(DATA, &[9, 7]).expect("write");
        assert_eq!(validate(&s, &m, &checks, [0, 0, DATA]), Err(Status::ThreshError));
        s.memory.write_words(DATA, &[8, 8]).expect("write");
        assert!(validate(&s, &m, &checks, [0, 0, DATA]).is_ok());
    }
}
