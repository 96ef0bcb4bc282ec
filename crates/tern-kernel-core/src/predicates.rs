//! Memory-protection predicates
//!
//! Pure range checks over a module's regions and the shared object pool.
//! Every check builds its range with overflow-checked arithmetic, so a
//! forged length that would wrap the address space is always rejected.

use crate::memory::Region;
use crate::module::ModuleInstance;
use crate::pool::ObjectPool;
use crate::types::{Addr, NULL};

pub fn inside_data(module: &ModuleInstance, ptr: Addr, len: u32) -> bool {
    module.data.encloses(ptr, len)
}

pub fn inside_code(module: &ModuleInstance, ptr: Addr, len: u32) -> bool {
    module.code.encloses(ptr, len)
}

/// True if the pool exists and the range lies past its overhead, inside it.
pub fn inside_pool(pool: Option<&ObjectPool>, ptr: Addr, len: u32) -> bool {
    pool.is_some_and(|p| p.encloses(ptr, len))
}

/// True if the range is representable and shares no byte with the
/// module's data or code.
pub fn outside_module(module: &ModuleInstance, ptr: Addr, len: u32) -> bool {
    Region::new(ptr, len).is_some_and(|r| !r.overlaps(&module.data) && !r.overlaps(&module.code))
}

/// Readable by the module: its data, its code, or null.
pub fn buffer_read_ok(module: &ModuleInstance, ptr: Addr, len: u32) -> bool {
    ptr == NULL || inside_data(module, ptr, len) || inside_code(module, ptr, len)
}

/// Writable by the module: its data, or null. Code is never writable.
pub fn buffer_write_ok(module: &ModuleInstance, ptr: Addr, len: u32) -> bool {
    ptr == NULL || inside_data(module, ptr, len)
}

/// A kernel object a module uses can never live in that module's memory.
pub fn object_for_use_ok(module: &ModuleInstance, ptr: Addr, len: u32) -> bool {
    ptr == NULL || outside_module(module, ptr, len)
}

/// A control block a module creates must be a pool allocation of exactly
/// the control block's size.
pub fn object_for_creation_ok(pool: Option<&ObjectPool>, ptr: Addr, size: u32) -> bool {
    if ptr == NULL {
        return true;
    }
    inside_pool(pool, ptr, size) && pool.and_then(|p| p.recorded_size(ptr)) == Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleDescriptor, ModuleProperties};
    use crate::types::ModuleId;
    use alloc::string::String;

    const CODE: Addr = 0x1000_0000;
    const DATA: Addr = 0x2000_0000;
    const POOL: Addr = 0x3000_0000;

    fn module() -> ModuleInstance {
        let desc = ModuleDescriptor {
            name: String::from("m"),
            code_start: CODE,
            code_size: 0x1000,
            data_start: DATA,
            data_size: 0x1000,
            properties: 0x2,
            start_entry: CODE,
            stop_entry: NULL,
            callback_entry: CODE + 0x10,
            start_stop_priority: 10,
            callback_priority: 10,
            max_priority: 4,
            start_stop_stack_size: 1024,
            callback_stack_size: 1024,
        };
        let code = Region::new(CODE, 0x1000).expect("code");
        let data = Region::new(DATA, 0x1000).expect("data");
        ModuleInstance::new(ModuleId(1), &desc, code, data, ModuleProperties::MEMORY_PROTECTION)
    }

    fn pool() -> ObjectPool {
        ObjectPool::new(Region::new(POOL, 0x1000).expect("region")).expect("pool")
    }

    #[test]
    fn test_overflow_never_passes() {
        let m = module();
        let p = pool();
        let cases = [(DATA, u32::MAX), (DATA + 0x10, u32::MAX - 0x8), (0xFFFF_FFF0, 0x20), (CODE, u32::MAX)];
        for (ptr, len) in cases {
            assert!(!inside_data(&m, ptr, len));
            assert!(!inside_code(&m, ptr, len));
            assert!(!inside_pool(Some(&p), ptr, len));
            assert!(!buffer_read_ok(&m, ptr, len));
            assert!(!buffer_write_ok(&m, ptr, len));
            assert!(!outside_module(&m, ptr, len));
            assert!(!object_for_use_ok(&m, ptr, len));
            assert!(!object_for_creation_ok(Some(&p), ptr, len));
        }
    }

    #[test]
    fn test_write_rejects_code() {
        let m = module();
        assert!(buffer_read_ok(&m, CODE + 0x10, 16));
        assert!(!buffer_write_ok(&m, CODE + 0x10, 16));
        assert!(buffer_write_ok(&m, DATA + 0x10, 16));
        assert!(buffer_write_ok(&m, NULL, 16));
        assert!(!buffer_write_ok(&m, DATA + 0xFF8, 16));
    }

    #[test]
    fn test_creation_requires_pool_allocation() {
        let mut m = module();
        let mut p = pool();
        assert!(!object_for_creation_ok(Some(&p), DATA + 0x100, 28));
        assert!(!object_for_creation_ok(None, DATA + 0x100, 28));

        let obj = p.allocate(28, &mut m).expect("alloc");
        assert!(object_for_creation_ok(Some(&p), obj, 28));
        assert!(!object_for_creation_ok(Some(&p), obj, 32));
        assert!(!object_for_creation_ok(Some(&p), obj + 4, 24));
        assert!(object_for_creation_ok(Some(&p), NULL, 28));
    }

    #[test]
    fn test_use_rejects_module_memory() {
        let m = module();
        assert!(!object_for_use_ok(&m, DATA + 0x40, 28));
        assert!(!object_for_use_ok(&m, CODE + 0x40, 28));
        assert!(object_for_use_ok(&m, POOL + 0x40, 28));
        assert!(object_for_use_ok(&m, NULL, 28));
        // Straddling the end of the data region is not outside it.
        assert!(!object_for_use_ok(&m, DATA + 0xFF0, 28));
    }

    #[test]
    fn test_pool_overhead_is_excluded() {
        let p = pool();
        assert!(!inside_pool(Some(&p), POOL, 4));
        assert!(inside_pool(Some(&p), POOL + 8, 4));
        assert!(!inside_pool(None, POOL + 8, 4));
    }
}
