//! Address ranges and the simulated address space
//!
//! [`Region`] is a half-open byte range whose construction rejects any
//! range that would wrap past the top of the 32-bit address space.
//! [`Memory`] backs the mapped parts of that space (module code and data,
//! kernel memory, the object pool) so primitives can read parameter arrays
//! and write results without ever touching host memory.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::types::{Addr, WORD};

/// Half-open byte range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start: Addr,
    pub end: Addr,
}

impl Region {
    /// Region of `len` bytes at `start`, or `None` if it would wrap.
    pub fn new(start: Addr, len: u32) -> Option<Region> {
        start.checked_add(len).map(|end| Region { start, end })
    }

    /// Region from explicit bounds, or `None` if `end < start`.
    pub fn from_bounds(start: Addr, end: Addr) -> Option<Region> {
        (start <= end).then_some(Region { start, end })
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `other` lies entirely inside this region.
    pub fn contains(&self, other: &Region) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn contains_addr(&self, addr: Addr) -> bool {
        addr >= self.start && addr < self.end
    }

    /// True if the two regions share at least one byte.
    pub fn overlaps(&self, other: &Region) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// True if `[ptr, ptr + len)` is representable and inside this region.
    pub fn encloses(&self, ptr: Addr, len: u32) -> bool {
        Region::new(ptr, len).is_some_and(|r| self.contains(&r))
    }
}

/// Faults raised by the simulated address space.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MemoryFault {
    #[error("access of {len} bytes at {addr:#010x} is not mapped")]
    Unmapped { addr: Addr, len: u32 },
    #[error("range at {addr:#010x} of {len} bytes wraps the address space")]
    Wraps { addr: Addr, len: u32 },
    #[error("segment at {start:#010x} overlaps an existing mapping")]
    Overlap { start: Addr },
    #[error("cannot map an empty segment at {start:#010x}")]
    Empty { start: Addr },
    #[error("string at {addr:#010x} is not terminated inside its region")]
    Unterminated { addr: Addr },
}

struct Segment {
    region: Region,
    bytes: Vec<u8>,
}

/// Sparse, segment-mapped address space.
#[derive(Default)]
pub struct Memory {
    segments: BTreeMap<Addr, Segment>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a zero-filled segment.
    pub fn map(&mut self, region: Region) -> Result<(), MemoryFault> {
        if region.is_empty() {
            return Err(MemoryFault::Empty {
                start: region.start,
            });
        }
        if self.segments.values().any(|s| s.region.overlaps(&region)) {
            return Err(MemoryFault::Overlap {
                start: region.start,
            });
        }
        self.segments.insert(
            region.start,
            Segment {
                region,
                bytes: vec![0; region.len() as usize],
            },
        );
        Ok(())
    }

    /// Remove the segment starting at `start`.
    pub fn unmap(&mut self, start: Addr) -> Result<Region, MemoryFault> {
        self.segments
            .remove(&start)
            .map(|s| s.region)
            .ok_or(MemoryFault::Unmapped { addr: start, len: 0 })
    }

    /// True if `[ptr, ptr + len)` lies inside one mapped segment.
    pub fn is_mapped(&self, ptr: Addr, len: u32) -> bool {
        self.locate(ptr, len).is_ok()
    }

    /// Mapped regions, lowest first.
    pub fn regions(&self) -> Vec<Region> {
        self.segments.values().map(|s| s.region).collect()
    }

    fn locate(&self, ptr: Addr, len: u32) -> Result<(Addr, usize), MemoryFault> {
        let want = Region::new(ptr, len).ok_or(MemoryFault::Wraps { addr: ptr, len })?;
        let (start, seg) = self
            .segments
            .range(..=ptr)
            .next_back()
            .ok_or(MemoryFault::Unmapped { addr: ptr, len })?;
        if !seg.region.contains(&want) {
            return Err(MemoryFault::Unmapped { addr: ptr, len });
        }
        Ok((*start, (ptr - seg.region.start) as usize))
    }

    pub fn read_bytes(&self, ptr: Addr, len: u32) -> Result<Vec<u8>, MemoryFault> {
        let (start, off) = self.locate(ptr, len)?;
        let seg = &self.segments[&start];
        Ok(seg.bytes[off..off + len as usize].to_vec())
    }

    pub fn write_bytes(&mut self, ptr: Addr, data: &[u8]) -> Result<(), MemoryFault> {
        let len = u32::try_from(data.len()).map_err(|_| MemoryFault::Wraps { addr: ptr, len: u32::MAX })?;
        let (start, off) = self.locate(ptr, len)?;
        if let Some(seg) = self.segments.get_mut(&start) {
            seg.bytes[off..off + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    pub fn fill(&mut self, ptr: Addr, len: u32, byte: u8) -> Result<(), MemoryFault> {
        let (start, off) = self.locate(ptr, len)?;
        if let Some(seg) = self.segments.get_mut(&start) {
            seg.bytes[off..off + len as usize].fill(byte);
        }
        Ok(())
    }

    pub fn read_word(&self, ptr: Addr) -> Result<u32, MemoryFault> {
        let b = self.read_bytes(ptr, WORD)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_word(&mut self, ptr: Addr, value: u32) -> Result<(), MemoryFault> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    pub fn read_words(&self, ptr: Addr, count: u32) -> Result<Vec<u32>, MemoryFault> {
        let len = count
            .checked_mul(WORD)
            .ok_or(MemoryFault::Wraps { addr: ptr, len: u32::MAX })?;
        let b = self.read_bytes(ptr, len)?;
        Ok(b.chunks_exact(WORD as usize)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn write_words(&mut self, ptr: Addr, words: &[u32]) -> Result<(), MemoryFault> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.write_bytes(ptr, &bytes)
    }

    /// Read a NUL-terminated string that must end inside `limit`.
    pub fn read_cstr(&self, ptr: Addr, limit: &Region) -> Result<String, MemoryFault> {
        if !limit.contains_addr(ptr) {
            return Err(MemoryFault::Unterminated { addr: ptr });
        }
        let (start, off) = self.locate(ptr, 1)?;
        let seg = &self.segments[&start];
        let seg_limit = (limit.end.min(seg.region.end) - seg.region.start) as usize;
        let tail = &seg.bytes[off..seg_limit];
        let nul = tail
            .iter()
            .position(|b| *b == 0)
            .ok_or(MemoryFault::Unterminated { addr: ptr })?;
        Ok(String::from_utf8_lossy(&tail[..nul]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(start: Addr, len: u32) -> Region {
        Region::new(start, len).expect("region")
    }

    #[test]
    fn test_region_rejects_wrap() {
        assert!(Region::new(0xFFFF_FFF0, 0x20).is_none());
        assert!(Region::new(0xFFFF_FFF0, 0x0F).is_some());
        assert!(!region(0, 0x1000).encloses(0x10, u32::MAX));
    }

    #[test]
    fn test_region_contains_and_overlaps() {
        let r = region(0x1000, 0x100);
        assert!(r.encloses(0x1000, 0x100));
        assert!(!r.encloses(0x1000, 0x101));
        assert!(r.contains_addr(0x10FF));
        assert!(!r.contains_addr(0x1100));
        assert!(r.overlaps(&region(0x10F0, 0x20)));
        assert!(!r.overlaps(&region(0x1100, 0x20)));
        assert!(!r.overlaps(&region(0x1010, 0)));
    }

    #[test]
    fn test_memory_map_rejects_overlap() {
        let mut mem = Memory::new();
        mem.map(region(0x1000, 0x100)).expect("map");
        assert_eq!(
            mem.map(region(0x1080, 0x100)),
            Err(MemoryFault::Overlap { start: 0x1080 })
        );
        assert!(mem.map(region(0x1100, 0x100)).is_ok());
        assert_eq!(mem.regions().len(), 2);
    }

    #[test]
    fn test_memory_words() {
        let mut mem = Memory::new();
        mem.map(region(0x1000, 0x100)).expect("map");
        mem.write_words(0x1010, &[1, 2, 3]).expect("write");
        assert_eq!(mem.read_word(0x1014), Ok(2));
        assert_eq!(mem.read_words(0x1010, 3), Ok(alloc::vec![1, 2, 3]));
        assert!(matches!(mem.read_word(0x10FE), Err(MemoryFault::Unmapped { .. })));
        assert!(matches!(mem.read_word(0x2000), Err(MemoryFault::Unmapped { .. })));
    }

    #[test]
    fn test_memory_cstr() {
        let mut mem = Memory::new();
        let data = region(0x1000, 0x20);
        mem.map(data).expect("map");
        mem.write_bytes(0x1004, b"sem\0").expect("write");
        assert_eq!(mem.read_cstr(0x1004, &data).as_deref(), Ok("sem"));

        mem.fill(0x1000, 0x20, b'x').expect("fill");
        assert_eq!(
            mem.read_cstr(0x1004, &data),
            Err(MemoryFault::Unterminated { addr: 0x1004 })
        );
    }

    #[test]
    fn test_memory_unmap() {
        let mut mem = Memory::new();
        mem.map(region(0x1000, 0x10)).expect("map");
        assert_eq!(mem.unmap(0x1000), Ok(region(0x1000, 0x10)));
        assert!(!mem.is_mapped(0x1000, 4));
    }
}
