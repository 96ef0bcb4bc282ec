//! First-fit byte arena
//!
//! Backs byte pools, the shared object pool and kernel memory. Allocations
//! are word-aligned; released blocks are coalesced with their neighbours.

use alloc::collections::BTreeMap;

use crate::memory::Region;
use crate::types::{Addr, WORD};

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("zero-sized allocation")]
    ZeroSize,
    #[error("allocation size overflows")]
    SizeOverflow,
    #[error("no free block of {requested} bytes")]
    Exhausted { requested: u32 },
    #[error("{addr:#010x} is not an allocated block")]
    NotAllocated { addr: Addr },
}

/// Round `size` up to a whole number of words.
pub fn word_align(size: u32) -> Option<u32> {
    size.checked_add(WORD - 1).map(|s| s & !(WORD - 1))
}

pub struct Arena {
    region: Region,
    free: BTreeMap<Addr, u32>,
    used: BTreeMap<Addr, u32>,
}

impl Arena {
    /// Arena over `region`, trimmed inward to word alignment.
    pub fn new(region: Region) -> Self {
        let start = word_align(region.start).unwrap_or(region.end).min(region.end);
        let end = region.end & !(WORD - 1);
        let region = Region::from_bounds(start, end.max(start)).unwrap_or(region);
        let mut free = BTreeMap::new();
        if !region.is_empty() {
            free.insert(region.start, region.len());
        }
        Self {
            region,
            free,
            used: BTreeMap::new(),
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn allocate(&mut self, size: u32) -> Result<Addr, ArenaError> {
        if size == 0 {
            return Err(ArenaError::ZeroSize);
        }
        let size = word_align(size).ok_or(ArenaError::SizeOverflow)?;
        let (addr, len) = self
            .free
            .iter()
            .find(|(_, len)| **len >= size)
            .map(|(a, l)| (*a, *l))
            .ok_or(ArenaError::Exhausted { requested: size })?;

        self.free.remove(&addr);
        if len > size {
            self.free.insert(addr + size, len - size);
        }
        self.used.insert(addr, size);
        Ok(addr)
    }

    /// Release a block, returning its size.
    pub fn release(&mut self, addr: Addr) -> Result<u32, ArenaError> {
        let size = self
            .used
            .remove(&addr)
            .ok_or(ArenaError::NotAllocated { addr })?;

        let mut start = addr;
        let mut len = size;

        if let Some((&prev, &prev_len)) = self.free.range(..addr).next_back() {
            if prev + prev_len == addr {
                self.free.remove(&prev);
                start = prev;
                len += prev_len;
            }
        }
        if let Some(next_len) = self.free.remove(&(addr + size)) {
            len += next_len;
        }
        self.free.insert(start, len);
        Ok(size)
    }

    pub fn allocated_size(&self, addr: Addr) -> Option<u32> {
        self.used.get(&addr).copied()
    }

    /// Total free bytes.
    pub fn available(&self) -> u32 {
        self.free.values().sum()
    }

    /// Number of free fragments.
    pub fn fragments(&self) -> u32 {
        self.free.len() as u32
    }

    pub fn allocation_count(&self) -> usize {
        self.used.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(start: Addr, len: u32) -> Arena {
        Arena::new(Region::new(start, len).expect("region"))
    }

    #[test]
    fn test_arena_allocate_aligns() {
        let mut a = arena(0x1000, 0x100);
        let p = a.allocate(5).expect("alloc");
        assert_eq!(p, 0x1000);
        assert_eq!(a.allocated_size(p), Some(8));
        assert_eq!(a.allocate(4), Ok(0x1008));
        assert_eq!(a.available(), 0x100 - 12);
    }

    #[test]
    fn test_arena_release_coalesces() {
        let mut a = arena(0x1000, 0x40);
        let p1 = a.allocate(0x10).expect("p1");
        let p2 = a.allocate(0x10).expect("p2");
        let p3 = a.allocate(0x10).expect("p3");
        assert_eq!(a.release(p1), Ok(0x10));
        assert_eq!(a.release(p3), Ok(0x10));
        assert_eq!(a.fragments(), 2);
        assert_eq!(a.release(p2), Ok(0x10));
        assert_eq!(a.fragments(), 1);
        assert_eq!(a.available(), 0x40);
    }

    #[test]
    fn test_arena_rejects_unknown_release() {
        let mut a = arena(0x1000, 0x40);
        let p = a.allocate(8).expect("alloc");
        assert_eq!(a.release(p + 4), Err(ArenaError::NotAllocated { addr: p + 4 }));
        assert_eq!(a.release(p), Ok(8));
        assert_eq!(a.release(p), Err(ArenaError::NotAllocated { addr: p }));
    }

    #[test]
    fn test_arena_exhaustion_and_overflow() {
        let mut a = arena(0x1000, 0x20);
        assert_eq!(a.allocate(0), Err(ArenaError::ZeroSize));
        assert_eq!(a.allocate(u32::MAX), Err(ArenaError::SizeOverflow));
        assert_eq!(a.allocate(0x24), Err(ArenaError::Exhausted { requested: 0x24 }));
    }

    #[test]
    fn test_arena_trims_unaligned_region() {
        let a = arena(0x1001, 0x20);
        assert_eq!(a.region().start, 0x1004);
        assert_eq!(a.region().end, 0x1020);
    }
}
