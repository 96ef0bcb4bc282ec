//! Message queues
//!
//! Messages are fixed-size, 1 to 16 words. The storage area given at
//! creation bounds the capacity; message contents are copied between the
//! caller's buffers and the queue.

use alloc::vec::Vec;

use crate::memory::Region;
use crate::notify::{self, CallbackTarget, NotifyKind};
use crate::objects::{self, KernelObject, ObjectHeader, WaitList};
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::{Addr, ObjectClass, NO_WAIT, NULL, WORD};
use crate::wait::{self, WaitReason};

use alloc::collections::VecDeque;

/// Largest message, in words.
pub const MAX_MESSAGE_WORDS: u32 = 16;

pub struct Queue {
    pub header: ObjectHeader,
    /// Message size in words
    pub message_size: u32,
    pub capacity: u32,
    pub storage: Region,
    pub messages: VecDeque<Vec<u32>>,
    /// Receivers while empty, senders while full
    pub waiters: WaitList,
}

impl KernelObject for Queue {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }
    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

impl Queue {
    pub fn message_bytes(&self) -> u32 {
        self.message_size * WORD
    }
}

pub fn create(
    state: &mut KernelState,
    addr: Addr,
    header: ObjectHeader,
    message_size: u32,
    start: Addr,
    size: u32,
    cb_size: u32,
) -> Status {
    if let Err(e) = objects::check_new_control_block(state, ObjectClass::Queue, addr, cb_size, Status::QueueError) {
        return e;
    }
    let Some(storage) = Region::new(start, size).filter(|_| start != NULL) else {
        return Status::PtrError;
    };
    if message_size == 0 || message_size > MAX_MESSAGE_WORDS {
        return Status::SizeError;
    }
    let capacity = size / (message_size * WORD);
    if capacity == 0 {
        return Status::SizeError;
    }
    state.queues.insert(
        addr,
        Queue {
            header,
            message_size,
            capacity,
            storage,
            messages: VecDeque::new(),
            waiters: WaitList::new(),
        },
    );
    objects::record_created(state, ObjectClass::Queue, addr);
    Status::Success
}

pub fn delete(state: &mut KernelState, addr: Addr) -> Status {
    let Some(queue) = state.queues.remove(addr) else {
        return Status::QueueError;
    };
    wait::release_all(state, queue.waiters, Status::Deleted);
    objects::record_deleted(state, ObjectClass::Queue, addr);
    Status::Success
}

/// Hand a message to the first waiting receiver, if any.
fn deliver_to_receiver(state: &mut KernelState, addr: Addr, message: &[u32]) -> bool {
    let receiver = state.queues.get(addr).and_then(|q| {
        q.waiters.front().copied().filter(|t| {
            matches!(
                state.threads.get(*t).and_then(|th| th.wait.as_ref()),
                Some(WaitReason::QueueReceive { .. })
            )
        })
    });
    let Some(thread) = receiver else {
        return false;
    };
    let destination = match state.threads.get(thread).and_then(|t| t.wait.as_ref()) {
        Some(WaitReason::QueueReceive { destination, .. }) => *destination,
        _ => return false,
    };
    if let Some(q) = state.queues.get_mut(addr) {
        q.waiters.pop_front();
    }
    let status = match state.memory.write_words(destination, message) {
        Ok(()) => Status::Success,
        Err(_) => Status::PtrError,
    };
    wait::resume(state, thread, status);
    true
}

/// Enqueue `message` without blocking.
fn enqueue(state: &mut KernelState, addr: Addr, message: Vec<u32>, front: bool) -> Status {
    if deliver_to_receiver(state, addr, &message) {
        return Status::Success;
    }
    let Some(q) = state.queues.get_mut(addr) else {
        return Status::QueueError;
    };
    if q.messages.len() as u32 >= q.capacity {
        return Status::QueueFull;
    }
    if front {
        q.messages.push_front(message);
    } else {
        q.messages.push_back(message);
    }
    Status::Success
}

fn send_common(state: &mut KernelState, addr: Addr, source: Addr, wait_option: u32, front: bool) -> Completion {
    let Some(words) = state.queues.get(addr).map(|q| q.message_size) else {
        return Status::QueueError.into();
    };
    let message = match state.memory.read_words(source, words) {
        Ok(m) => m,
        Err(_) => return Status::PtrError.into(),
    };
    match enqueue(state, addr, message.clone(), front) {
        Status::Success => {
            let target = state.queues.get(addr).and_then(|q| q.header.notify);
            notify::raise(state, target, NotifyKind::QueueSend, addr, 0);
            Status::Success.into()
        }
        Status::QueueFull if wait_option != NO_WAIT => wait::suspend(
            state,
            WaitReason::QueueSend {
                queue: addr,
                message,
                front,
            },
            wait_option,
        ),
        other => other.into(),
    }
}

pub fn send(state: &mut KernelState, addr: Addr, source: Addr, wait_option: u32) -> Completion {
    send_common(state, addr, source, wait_option, false)
}

pub fn front_send(state: &mut KernelState, addr: Addr, source: Addr, wait_option: u32) -> Completion {
    send_common(state, addr, source, wait_option, true)
}

/// Post a message from kernel code; never blocks.
pub fn post_internal(state: &mut KernelState, addr: Addr, message: &[u32]) -> Status {
    let Some(words) = state.queues.get(addr).map(|q| q.message_size as usize) else {
        return Status::QueueError;
    };
    let mut message = message.to_vec();
    message.resize(words, 0);
    enqueue(state, addr, message, false)
}

pub fn receive(state: &mut KernelState, addr: Addr, destination: Addr, wait_option: u32) -> Completion {
    let Some(q) = state.queues.get(addr) else {
        return Status::QueueError.into();
    };
    if !state.memory.is_mapped(destination, q.message_bytes()) {
        return Status::PtrError.into();
    }
    if q.messages.is_empty() {
        if wait_option == NO_WAIT {
            return Status::QueueEmpty.into();
        }
        return wait::suspend(state, WaitReason::QueueReceive { queue: addr, destination }, wait_option);
    }

    let message = state
        .queues
        .get_mut(addr)
        .and_then(|q| q.messages.pop_front())
        .unwrap_or_default();
    if state.memory.write_words(destination, &message).is_err() {
        return Status::PtrError.into();
    }

    // Space freed: admit the first blocked sender.
    let sender = state.queues.get(addr).and_then(|q| q.waiters.front().copied());
    if let Some(thread) = sender {
        if let Some(WaitReason::QueueSend { message, front, .. }) = state.threads.get(thread).and_then(|t| t.wait.clone()) {
            if let Some(q) = state.queues.get_mut(addr) {
                q.waiters.pop_front();
                if front {
                    q.messages.push_front(message);
                } else {
                    q.messages.push_back(message);
                }
            }
            wait::resume(state, thread, Status::Success);
        }
    }
    Status::Success.into()
}

/// Discard all messages; blocked senders complete successfully.
pub fn flush(state: &mut KernelState, addr: Addr) -> Status {
    let Some(q) = state.queues.get_mut(addr) else {
        return Status::QueueError;
    };
    q.messages.clear();
    let has_senders = q.waiters.front().is_some_and(|t| {
        matches!(
            state.threads.get(*t).and_then(|th| th.wait.as_ref()),
            Some(WaitReason::QueueSend { .. })
        )
    });
    if has_senders {
        let senders = state.queues.get_mut(addr).map(|q| core::mem::take(&mut q.waiters)).unwrap_or_default();
        wait::release_all(state, senders, Status::Success);
    }
    Status::Success
}

pub fn prioritize(state: &mut KernelState, addr: Addr) -> Status {
    let Some(waiters) = state.queues.get_mut(addr).map(|q| core::mem::take(&mut q.waiters)) else {
        return Status::QueueError;
    };
    let waiters = wait::prioritize(state, waiters);
    if let Some(q) = state.queues.get_mut(addr) {
        q.waiters = waiters;
    }
    Status::Success
}

/// Outputs: name, enqueued, available slots, first suspended, suspended count, next queue.
pub fn info_get(state: &mut KernelState, addr: Addr, outs: [Addr; 6]) -> Status {
    let Some(q) = state.queues.get(addr) else {
        return Status::QueueError;
    };
    let enqueued = q.messages.len() as u32;
    let values = [
        q.header.name_ptr,
        enqueued,
        q.capacity - enqueued,
        q.waiters.front().copied().unwrap_or(NULL),
        q.waiters.len() as u32,
        state.queues.next_after(addr),
    ];
    let outputs: Vec<(Addr, u32)> = outs.into_iter().zip(values).collect();
    crate::status::flatten(objects::write_outputs(state, &outputs))
}

pub fn send_notify(state: &mut KernelState, addr: Addr, target: Option<CallbackTarget>) -> Status {
    match state.queues.get_mut(addr) {
        Some(q) => {
            q.header.notify = target;
            Status::Success
        }
        None => Status::QueueError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_current, state};

    const QUEUE: Addr = 0x0010_8000;
    const STORAGE: Addr = 0x0010_9000;
    const BUF: Addr = 0x0010_A000;
    const SIZE: u32 = 64;

    fn two_slot_queue(s: &mut KernelState) {
        assert_eq!(create(s, QUEUE, ObjectHeader::default(), 2, STORAGE, 16, SIZE), Status::Success);
    }

    #[test]
    fn test_create_checks_sizes() {
        let mut s = state();
        assert_eq!(create(&mut s, QUEUE, ObjectHeader::default(), 0, STORAGE, 64, SIZE), Status::SizeError);
        assert_eq!(create(&mut s, QUEUE, ObjectHeader::default(), 17, STORAGE, 256, SIZE), Status::SizeError);
        assert_eq!(create(&mut s, QUEUE, ObjectHeader::default(), 4, STORAGE, 8, SIZE), Status::SizeError);
        assert_eq!(create(&mut s, QUEUE, ObjectHeader::default(), 4, NULL, 64, SIZE), Status::PtrError);
        assert_eq!(create(&mut s, QUEUE, ObjectHeader::default(), 4, STORAGE, 64, SIZE), Status::Success);
        assert_eq!(s.queues.get(QUEUE).map(|q| q.capacity), Some(4));
    }

    #[test]
    fn test_fifo_and_front_send() {
        let mut s = state();
        two_slot_queue(&mut s);
        s.memory.write_words(BUF, &[1, 2]).expect("write");
        assert_eq!(send(&mut s, QUEUE, BUF, NO_WAIT), Completion::from(Status::Success));
        s.memory.write_words(BUF, &[3, 4]).expect("write");
        assert_eq!(front_send(&mut s, QUEUE, BUF, NO_WAIT), Completion::from(Status::Success));
        assert_eq!(send(&mut s, QUEUE, BUF, NO_WAIT), Completion::from(Status::QueueFull));

        assert_eq!(receive(&mut s, QUEUE, BUF, NO_WAIT), Completion::from(Status::Success));
        assert_eq!(s.memory.read_words(BUF, 2), Ok(alloc::vec![3, 4]));
        assert_eq!(receive(&mut s, QUEUE, BUF, NO_WAIT), Completion::from(Status::Success));
        assert_eq!(s.memory.read_words(BUF, 2), Ok(alloc::vec![1, 2]));
        assert_eq!(receive(&mut s, QUEUE, BUF, NO_WAIT), Completion::from(Status::QueueEmpty));
    }

    #[test]
    fn test_blocked_receiver_gets_message_directly() {
        let mut s = state();
        let t = spawn_current(&mut s);
        two_slot_queue(&mut s);
        assert_eq!(receive(&mut s, QUEUE, BUF, 100), Completion::Suspended);
        assert_eq!(post_internal(&mut s, QUEUE, &[9]), Status::Success);
        assert_eq!(s.threads.get(t).and_then(|x| x.completion), Some(Status::Success));
        assert_eq!(s.memory.read_words(BUF, 2), Ok(alloc::vec![9, 0]));
        assert_eq!(s.queues.get(QUEUE).map(|q| q.messages.len()), Some(0));
    }

    #[test]
    fn test_blocked_sender_admitted_on_receive() {
        let mut s = state();
        let t = spawn_current(&mut s);
        two_slot_queue(&mut s);
        post_internal(&mut s, QUEUE, &[1, 1]);
        post_internal(&mut s, QUEUE, &[2, 2]);
        s.memory.write_words(BUF, &[3, 3]).expect("write");
        assert_eq!(send(&mut s, QUEUE, BUF, 100), Completion::Suspended);
        assert_eq!(receive(&mut s, QUEUE, BUF, NO_WAIT), Completion::from(Status::Success));
        assert_eq!(s.threads.get(t).and_then(|x| x.completion), Some(Status::Success));
        let q = s.queues.get(QUEUE).expect("queue");
        assert_eq!(q.messages.back(), Some(&alloc::vec![3, 3]));
        assert!(q.waiters.is_empty());
    }

    #[test]
    fn test_flush_and_info() {
        let mut s = state();
        two_slot_queue(&mut s);
        post_internal(&mut s, QUEUE, &[1, 1]);
        let outs = [NULL, BUF, BUF + 4, NULL, NULL, NULL];
        assert_eq!(info_get(&mut s, QUEUE, outs), Status::Success);
        assert_eq!(s.memory.read_words(BUF, 2), Ok(alloc::vec![1, 1]));
        assert_eq!(flush(&mut s, QUEUE), Status::Success);
        assert_eq!(info_get(&mut s, QUEUE, outs), Status::Success);
        assert_eq!(s.memory.read_words(BUF, 2), Ok(alloc::vec![0, 2]));
        assert_eq!(info_get(&mut s, QUEUE, [0xDEAD_0000, NULL, NULL, NULL, NULL, NULL]), Status::PtrError);
    }
}
