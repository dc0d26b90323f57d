// Mon Oct 19 2026 - Alex

use std::fmt;

/// Half-open `[start, end)` window of target addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryRange {
    start: u64,
    end: u64,
}

impl MemoryRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end: end.max(start) }
    }

    /// Saturates at the top of the address space.
    pub fn from_start_size(start: u64, size: u64) -> Self {
        Self::new(start, start.saturating_add(size))
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Splits the range into consecutive chunks of at most `block_size` bytes.
    pub fn blocks(&self, block_size: u64) -> impl Iterator<Item = MemoryRange> + '_ {
        assert!(block_size > 0, "block size must be non-zero");
        let end = self.end;
        (0..)
            .map(move |i: u64| self.start.saturating_add(i.saturating_mul(block_size)))
            .take_while(move |&s| s < end)
            .map(move |s| MemoryRange::new(s, s.saturating_add(block_size).min(end)))
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}-{:#x}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect() {
        let a = MemoryRange::new(0x1000, 0x3000);
        let b = MemoryRange::new(0x2000, 0x4000);
        assert_eq!(a.intersect(&b), Some(MemoryRange::new(0x2000, 0x3000)));
        assert!(a.intersect(&MemoryRange::new(0x3000, 0x4000)).is_none());
    }

    #[test]
    fn test_blocks() {
        let r = MemoryRange::new(0x1000, 0x1000 + 250);
        let blocks: Vec<_> = r.blocks(100).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2], MemoryRange::new(0x1000 + 200, 0x1000 + 250));
    }

    #[test]
    fn test_saturating_size() {
        let r = MemoryRange::from_start_size(u64::MAX - 10, 100);
        assert_eq!(r.end(), u64::MAX);
        assert_eq!(r.size(), 10);
    }
}
