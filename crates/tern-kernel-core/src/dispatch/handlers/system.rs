//! Module self-service calls: object lookup by name and shared-pool
//! allocation.

use crate::dispatch::Call;
use crate::objects;
use crate::pool::{self, OBJECT_HEADER_SIZE};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ObjectClass, NULL, WORD};

use super::read_name;

fn lookup(state: &mut KernelState, class_code: u32, name: &str, out: Addr) -> Status {
    let Some(class) = ObjectClass::from_code(class_code) else {
        return Status::OptionError;
    };
    if out == NULL {
        return Status::PtrError;
    }
    let Some(addr) = state.find_by_name(class, name) else {
        return Status::NoInstance;
    };
    match objects::write_outputs(state, &[(out, addr)]) {
        Ok(()) => Status::Success,
        Err(e) => e,
    }
}

/// P0 class code, P1 name, P2 out.
pub fn object_pointer_get(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let name = read_name(state, call, call.p1());
    lookup(state, call.p0(), &name, call.p2()).into()
}

/// P0 class code, P1 name; extra: name length, out. Only the first
/// `name length` characters of the name are compared.
pub fn object_pointer_get_extended(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let name = read_name(state, call, call.p1());
    let len = usize::try_from(call.extra(0)).unwrap_or(usize::MAX);
    let name: &str = match name.char_indices().nth(len) {
        Some((cut, _)) => &name[..cut],
        None => &name,
    };
    lookup(state, call.p0(), name, call.extra(1)).into()
}

/// P0 out, P1 size.
pub fn object_allocate(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let out = call.p0();
    if out == NULL || !state.memory.is_mapped(out, WORD) {
        return Status::PtrError.into();
    }
    let ptr = match pool::allocate(state, call.module, call.p1()) {
        Ok(ptr) => ptr,
        Err(e) => return e.into(),
    };
    match objects::write_outputs(state, &[(out, ptr)]) {
        Ok(()) => Status::Success.into(),
        Err(e) => {
            pool::release(state, ptr);
            e.into()
        }
    }
}

/// P0 object. Only the owner may free it, and never while it still holds a
/// live control block.
pub fn object_deallocate(state: &mut KernelState, call: &Call<'_>) -> Completion {
    let ptr = call.p0();
    let Some(pool) = state.object_pool.as_ref() else {
        return Status::NoMemory.into();
    };
    match pool.owner_of(ptr) {
        None => {
            let issued = ptr
                .checked_sub(OBJECT_HEADER_SIZE)
                .is_some_and(|header| pool.encloses(header, OBJECT_HEADER_SIZE));
            let status = if issued { Status::PtrError } else { Status::InvalidMemory };
            return status.into();
        }
        Some(owner) if owner != call.module => return Status::Invalid.into(),
        Some(_) => {}
    }
    if state.object_exists(ptr) {
        return Status::Invalid.into();
    }
    pool::release(state, ptr).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handlers::fixture::{self, DATA, MODULE, POOL};
    use crate::dispatch::{module_call, request};
    use crate::memory::Region;
    use crate::module::{ModuleDescriptor, ModuleInstance, ModuleProperties, ModuleState};
    use crate::types::ModuleId;

    const OUT: Addr = DATA + 0x100;
    const EXTRA: Addr = DATA + 0x200;
    const NAME: Addr = DATA + 0x300;
    const STACK_OBJECT: Addr = DATA + 0x800;

    fn allocate(s: &mut KernelState, size: u32) -> Addr {
        let status = module_call(s, request::MODULE_OBJECT_ALLOCATE, [OUT, size, 0]);
        assert_eq!(status, Completion::from(Status::Success));
        s.memory.read_word(OUT).expect("out")
    }

    fn create_semaphore(s: &mut KernelState, addr: Addr) -> Completion {
        s.memory.write_bytes(NAME, b"sem\0").expect("name");
        s.memory
            .write_words(EXTRA, &[1, ObjectClass::Semaphore.control_block_size()])
            .expect("extra");
        module_call(s, request::SEMAPHORE_CREATE, [addr, NAME, EXTRA])
    }

    #[test]
    fn test_semaphore_must_live_in_the_pool() {
        let mut s = fixture::protected();
        assert_eq!(create_semaphore(&mut s, STACK_OBJECT), Completion::from(Status::InvalidMemory));
        assert_eq!(s.count(ObjectClass::Semaphore), 0);

        let cb = allocate(&mut s, ObjectClass::Semaphore.control_block_size());
        assert!(s.object_pool.as_ref().expect("pool").encloses(cb, 28));
        assert_eq!(create_semaphore(&mut s, cb), Completion::from(Status::Success));
        assert_eq!(s.count(ObjectClass::Semaphore), 1);
        assert_eq!(s.semaphores.get(cb).map(|x| x.header.name.as_str()), Some("sem"));

        assert_eq!(module_call(&mut s, request::SEMAPHORE_GET, [cb, 0, 0]), Completion::from(Status::Success));
        assert_eq!(module_call(&mut s, request::SEMAPHORE_GET, [cb, 0, 0]), Completion::from(Status::NoInstance));
    }

    #[test]
    fn test_semaphore_on_stack_allowed_without_protection() {
        let mut s = fixture::with_properties(ModuleProperties::empty());
        assert_eq!(create_semaphore(&mut s, STACK_OBJECT), Completion::from(Status::Success));
        assert!(s.semaphores.contains(STACK_OBJECT));
    }

    #[test]
    fn test_creation_rejects_wrong_size_allocation() {
        let mut s = fixture::protected();
        let cb = allocate(&mut s, 16);
        assert_eq!(create_semaphore(&mut s, cb), Completion::from(Status::InvalidMemory));
    }

    #[test]
    fn test_delete_returns_control_block_to_pool() {
        let mut s = fixture::protected();
        let before = s.object_pool.as_ref().expect("pool").available();
        let cb = allocate(&mut s, 28);
        assert_eq!(create_semaphore(&mut s, cb), Completion::from(Status::Success));
        assert_eq!(module_call(&mut s, request::SEMAPHORE_DELETE, [cb, 0, 0]), Completion::from(Status::Success));
        assert_eq!(s.object_pool.as_ref().expect("pool").available(), before);
        assert_eq!(s.module(MODULE).expect("module").allocations.count, 0);
    }

    #[test]
    fn test_use_rejects_object_in_module_memory() {
        let mut s = fixture::protected();
        assert_eq!(
            module_call(&mut s, request::SEMAPHORE_PUT, [STACK_OBJECT, 0, 0]),
            Completion::from(Status::InvalidMemory)
        );
    }

    #[test]
    fn test_allocate_checks_output_pointer() {
        let mut s = fixture::protected();
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_ALLOCATE, [fixture::CODE, 28, 0]),
            Completion::from(Status::InvalidMemory)
        );
        let mut s = fixture::with_properties(ModuleProperties::empty());
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_ALLOCATE, [NULL, 28, 0]),
            Completion::from(Status::PtrError)
        );
        assert_eq!(s.object_pool.as_ref().expect("pool").allocation_count(), 0);
    }

    #[test]
    fn test_deallocate_rejects_forged_pointers() {
        let mut s = fixture::protected();
        let cb = allocate(&mut s, 28);
        let before = s.object_pool.as_ref().expect("pool").available();
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_DEALLOCATE, [cb + 4, 0, 0]),
            Completion::from(Status::InvalidMemory)
        );
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_DEALLOCATE, [POOL + 4, 0, 0]),
            Completion::from(Status::InvalidMemory)
        );
        assert_eq!(s.object_pool.as_ref().expect("pool").available(), before);
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_DEALLOCATE, [cb, 0, 0]),
            Completion::from(Status::Success)
        );
    }

    #[test]
    fn test_deallocate_refuses_foreign_or_live_objects() {
        let mut s = fixture::protected();
        let cb = allocate(&mut s, 28);
        assert_eq!(create_semaphore(&mut s, cb), Completion::from(Status::Success));
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_DEALLOCATE, [cb, 0, 0]),
            Completion::from(Status::Invalid)
        );

        let desc = ModuleDescriptor {
            name: alloc::string::String::from("other"),
            data_start: 0x2100_0000,
            ..fixture::descriptor(ModuleProperties::MEMORY_PROTECTION)
        };
        let data = Region::new(desc.data_start, desc.data_size).expect("data");
        let code = Region::new(desc.code_start, desc.code_size).expect("code");
        let mut other = ModuleInstance::new(ModuleId(2), &desc, code, data, ModuleProperties::MEMORY_PROTECTION);
        other.state = ModuleState::Started;
        s.modules.insert(ModuleId(2), other);
        let foreign = pool::allocate(&mut s, ModuleId(2), 28).expect("foreign");
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_DEALLOCATE, [foreign, 0, 0]),
            Completion::from(Status::Invalid)
        );
        assert_eq!(s.object_pool.as_ref().expect("pool").owner_of(foreign), Some(ModuleId(2)));
    }

    #[test]
    fn test_object_pointer_get() {
        let mut s = fixture::protected();
        let cb = allocate(&mut s, 28);
        assert_eq!(create_semaphore(&mut s, cb), Completion::from(Status::Success));

        let class = ObjectClass::Semaphore.code();
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_POINTER_GET, [class, NAME, OUT]),
            Completion::from(Status::Success)
        );
        assert_eq!(s.memory.read_word(OUT), Ok(cb));

        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_POINTER_GET, [ObjectClass::Queue.code(), NAME, OUT]),
            Completion::from(Status::NoInstance)
        );
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_POINTER_GET, [42, NAME, OUT]),
            Completion::from(Status::OptionError)
        );
        assert_eq!(
            module_call(&mut s, request::MODULE_OBJECT_POINTER_GET, [class, NAME, fixture::CODE]),
            Completion::from(Status::InvalidMemory)
        );
    }

    #[test]
    fn test_object_pointer_get_extended_compares_prefix() {
        let mut s = fixture::protected();
        let cb = allocate(&mut s, 28);
        assert_eq!(create_semaphore(&mut s, cb), Completion::from(Status::Success));

        let lookup = NAME + 0x40;
        s.memory.write_bytes(lookup, b"semaphore\0").expect("lookup name");
        s.memory.write_words(EXTRA, &[3, OUT + WORD]).expect("extra");
        assert_eq!(
            module_call(
                &mut s,
                request::MODULE_OBJECT_POINTER_GET_EXTENDED,
                [ObjectClass::Semaphore.code(), lookup, EXTRA]
            ),
            Completion::from(Status::Success)
        );
        assert_eq!(s.memory.read_word(OUT + WORD), Ok(cb));

        s.memory.write_words(EXTRA, &[9, OUT + WORD]).expect("extra");
        assert_eq!(
            module_call(
                &mut s,
                request::MODULE_OBJECT_POINTER_GET_EXTENDED,
                [ObjectClass::Semaphore.code(), lookup, EXTRA]
            ),
            Completion::from(Status::NoInstance)
        );
    }
}
