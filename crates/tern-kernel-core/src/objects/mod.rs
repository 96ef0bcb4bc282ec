//! Kernel object model
//!
//! Each of the eight object classes lives in a [`Registry`] keyed by the
//! address of its control block. The registry keeps the class's created
//! list in creation order and a version counter that changes on every
//! insert or remove, so callers can tell whether a walk mutated anything.

pub mod block_pool;
pub mod byte_pool;
pub mod event_flags;
pub mod mutex;
pub mod queue;
pub mod semaphore;
pub mod thread;
pub mod timer;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;

use tern_axiom::CommitType;

use crate::notify::CallbackTarget;
use crate::state::KernelState;
use crate::status::Status;
use crate::types::{Addr, ObjectClass, NULL, WORD};

pub use block_pool::BlockPool;
pub use byte_pool::BytePool;
pub use event_flags::EventFlags;
pub use mutex::Mutex;
pub use queue::Queue;
pub use semaphore::Semaphore;
pub use thread::{Thread, ThreadEntry, ThreadSpec};
pub use timer::Timer;

/// Threads suspended on an object, front first.
pub type WaitList = VecDeque<Addr>;

/// Fields shared by every kernel object.
#[derive(Clone, Debug, Default)]
pub struct ObjectHeader {
    /// Address of the name string as passed at creation
    pub name_ptr: Addr,
    /// Name captured at creation (empty when unreadable)
    pub name: String,
    /// Notify callback; absent when none is registered
    pub notify: Option<CallbackTarget>,
}

impl ObjectHeader {
    pub fn named(name_ptr: Addr, name: &str) -> Self {
        Self {
            name_ptr,
            name: String::from(name),
            notify: None,
        }
    }
}

pub trait KernelObject {
    fn header(&self) -> &ObjectHeader;
    fn header_mut(&mut self) -> &mut ObjectHeader;
}

/// Registry of one object class.
pub struct Registry<T> {
    entries: BTreeMap<Addr, T>,
    created: Vec<Addr>,
    version: u64,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            created: Vec::new(),
            version: 0,
        }
    }
}

impl<T: KernelObject> Registry<T> {
    /// Add an object; refuses a duplicate control block.
    pub fn insert(&mut self, addr: Addr, object: T) -> bool {
        if self.entries.contains_key(&addr) {
            return false;
        }
        self.entries.insert(addr, object);
        self.created.push(addr);
        self.version += 1;
        true
    }

    pub fn remove(&mut self, addr: Addr) -> Option<T> {
        let object = self.entries.remove(&addr)?;
        self.created.retain(|a| *a != addr);
        self.version += 1;
        Some(object)
    }

    pub fn get(&self, addr: Addr) -> Option<&T> {
        self.entries.get(&addr)
    }

    pub fn get_mut(&mut self, addr: Addr) -> Option<&mut T> {
        self.entries.get_mut(&addr)
    }

    pub fn contains(&self, addr: Addr) -> bool {
        self.entries.contains_key(&addr)
    }

    pub fn count(&self) -> u32 {
        self.created.len() as u32
    }

    /// Control blocks in creation order.
    pub fn created(&self) -> &[Addr] {
        &self.created
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Next object on the created list, or null after the last one.
    pub fn next_after(&self, addr: Addr) -> Addr {
        self.created
            .iter()
            .position(|a| *a == addr)
            .and_then(|i| self.created.get(i + 1))
            .copied()
            .unwrap_or(NULL)
    }

    pub fn find_by_name(&self, name: &str) -> Option<Addr> {
        self.created
            .iter()
            .copied()
            .find(|a| self.entries.get(a).is_some_and(|o| o.header().name == name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Addr, &T)> + '_ {
        self.created
            .iter()
            .filter_map(move |a| self.entries.get(a).map(|o| (*a, o)))
    }
}

/// Write every `(pointer, value)` pair, skipping null pointers.
///
/// Nothing is written unless every target is mapped.
pub(crate) fn write_outputs(state: &mut KernelState, outputs: &[(Addr, u32)]) -> Result<(), Status> {
    if outputs
        .iter()
        .any(|(ptr, _)| *ptr != NULL && !state.memory.is_mapped(*ptr, WORD))
    {
        return Err(Status::PtrError);
    }
    for (ptr, value) in outputs.iter().filter(|(ptr, _)| *ptr != NULL) {
        state
            .memory
            .write_word(*ptr, *value)
            .map_err(|_| Status::PtrError)?;
    }
    Ok(())
}

/// Checks every create primitive makes on its control block.
pub(crate) fn check_new_control_block(
    state: &KernelState,
    class: ObjectClass,
    addr: Addr,
    cb_size: u32,
    class_error: Status,
) -> Result<(), Status> {
    if addr == NULL || cb_size != class.control_block_size() || state.object_exists(addr) {
        return Err(class_error);
    }
    Ok(())
}

pub(crate) fn record_created(state: &mut KernelState, class: ObjectClass, addr: Addr) {
    let module = state.object_owner(addr).map(|m| m.0);
    state.record(CommitType::ObjectCreated {
        class: class.code(),
        addr,
        module,
    });
}

pub(crate) fn record_deleted(state: &mut KernelState, class: ObjectClass, addr: Addr) {
    state.record(CommitType::ObjectDeleted {
        class: class.code(),
        addr,
    });
}

/// Run the class's delete primitive.
pub fn delete(state: &mut KernelState, class: ObjectClass, addr: Addr) -> Status {
    match class {
        ObjectClass::BlockPool => block_pool::delete(state, addr),
        ObjectClass::BytePool => byte_pool::delete(state, addr),
        ObjectClass::EventFlags => event_flags::delete(state, addr),
        ObjectClass::Mutex => mutex::delete(state, addr),
        ObjectClass::Queue => queue::delete(state, addr),
        ObjectClass::Semaphore => semaphore::delete(state, addr),
        ObjectClass::Thread => thread::delete(state, addr),
        ObjectClass::Timer => timer::delete(state, addr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(ObjectHeader);

    impl KernelObject for Dummy {
        fn header(&self) -> &ObjectHeader {
            &self.0
        }
        fn header_mut(&mut self) -> &mut ObjectHeader {
            &mut self.0
        }
    }

    fn dummy(name: &str) -> Dummy {
        Dummy(ObjectHeader::named(NULL, name))
    }

    #[test]
    fn test_registry_insert_remove() {
        let mut reg = Registry::default();
        assert!(reg.insert(0x100, dummy("a")));
        assert!(!reg.insert(0x100, dummy("dup")));
        assert!(reg.insert(0x200, dummy("b")));
        assert_eq!(reg.count(), 2);
        assert_eq!(reg.version(), 2);
        assert_eq!(reg.created(), &[0x100, 0x200]);

        assert!(reg.remove(0x100).is_some());
        assert!(reg.remove(0x100).is_none());
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.version(), 3);
    }

    #[test]
    fn test_registry_next_and_name_lookup() {
        let mut reg = Registry::default();
        reg.insert(0x300, dummy("first"));
        reg.insert(0x100, dummy("second"));
        assert_eq!(reg.next_after(0x300), 0x100);
        assert_eq!(reg.next_after(0x100), NULL);
        assert_eq!(reg.find_by_name("second"), Some(0x100));
        assert_eq!(reg.find_by_name("third"), None);
        let order: Vec<Addr> = reg.iter().map(|(a, _)| a).collect();
        assert_eq!(order, alloc::vec![0x300, 0x100]);
    }
}
