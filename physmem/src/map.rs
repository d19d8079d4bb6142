//! The authoritative table of physical memory regions.

/// Upper bound on the number of entries the table can hold. Firmware maps
/// in the field stay well below this, even after splitting.
pub const MAX_ENTRIES: usize = 32;

/// The type of a memory region.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum RegionKind {
    /// Usable RAM.
    Ram,
    /// Reserved, either by firmware or by this subsystem.
    Reserved,
    /// Any other firmware type code, preserved verbatim.
    Other(u32),
}

impl RegionKind {
    /// Decode the raw firmware type code (1 = RAM, 2 = reserved).
    pub fn from_raw(raw: u32) -> RegionKind {
        match raw {
            1 => RegionKind::Ram,
            2 => RegionKind::Reserved,
            other => RegionKind::Other(other),
        }
    }

    pub fn is_ram(self) -> bool {
        self == RegionKind::Ram
    }
}

/// One region of the physical memory map.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub struct MapEntry {
    pub base: u64,
    pub length: u64,
    pub kind: RegionKind,
}

impl MapEntry {
    pub(crate) const fn zeroed() -> MapEntry {
        MapEntry {
            base: 0,
            length: 0,
            kind: RegionKind::Reserved,
        }
    }

    /// First address past the region.
    pub fn end(&self) -> u64 {
        self.base + self.length
    }
}

/// Summary statistics derived from the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySummary {
    /// Lowest base address of any entry; `u64::MAX` for an empty table.
    pub lowest_base: u64,
    /// Highest end address of any entry.
    pub highest_extent: u64,
    /// Bytes covered by RAM typed entries.
    pub total_ram_bytes: u64,
}

impl MemorySummary {
    pub(crate) const fn empty() -> MemorySummary {
        MemorySummary {
            lowest_base: u64::max_value(),
            highest_extent: 0,
            total_ram_bytes: 0,
        }
    }
}

/// The memory map: fixed storage indexed by an explicit entry count.
///
/// Entries at indices `[0, count)` are valid and pairwise non-overlapping
/// once the builder has run. They are not necessarily sorted by base
/// address; firmware order plus appended splits is preserved. After
/// construction the only mutation is [`MemoryMap::allocate_low`], which may
/// shrink one entry and append at most one, never removing or reordering.
#[derive(Debug)]
pub struct MemoryMap {
    pub(crate) entries: [MapEntry; MAX_ENTRIES],
    pub(crate) count: usize,
    pub(crate) summary: MemorySummary,
}

impl MemoryMap {
    pub(crate) fn empty() -> MemoryMap {
        MemoryMap {
            entries: [MapEntry::zeroed(); MAX_ENTRIES],
            count: 0,
            summary: MemorySummary::empty(),
        }
    }

    /// Append an entry, returning `false` when the table is full.
    pub(crate) fn push(&mut self, entry: MapEntry) -> bool {
        debug_assert!(entry.length > 0, "zero-length entries must be elided");
        if self.count == MAX_ENTRIES {
            false
        } else {
            self.entries[self.count] = entry;
            self.count += 1;
            true
        }
    }

    pub fn entry_count(&self) -> u32 {
        self.count as u32
    }

    /// Read-only view of the valid entries.
    pub fn entries(&self) -> &[MapEntry] {
        &self.entries[..self.count]
    }

    pub fn summary(&self) -> MemorySummary {
        self.summary
    }

    /// Recompute the summary with a full scan over the table.
    ///
    /// Idempotent. The allocator keeps `total_ram_bytes` in sync
    /// incrementally instead of calling this, and must never drift from
    /// what a fresh scan would yield.
    pub fn recompute_summary(&mut self) {
        let mut summary = MemorySummary::empty();
        for entry in self.entries() {
            if entry.base < summary.lowest_base {
                summary.lowest_base = entry.base;
            }
            if entry.end() > summary.highest_extent {
                summary.highest_extent = entry.end();
            }
            if entry.kind.is_ram() {
                summary.total_ram_bytes += entry.length;
            }
        }
        self.summary = summary;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ram(base: u64, length: u64) -> MapEntry {
        MapEntry {
            base,
            length,
            kind: RegionKind::Ram,
        }
    }

    #[test]
    fn summary_full_scan() {
        let mut map = MemoryMap::empty();
        map.push(ram(0x0, 0x9F000));
        map.push(MapEntry {
            base: 0x9F000,
            length: 0x61000,
            kind: RegionKind::Reserved,
        });
        map.push(ram(0x100000, 0x3FF00000));
        map.recompute_summary();

        let summary = map.summary();
        assert_eq!(summary.lowest_base, 0x0);
        assert_eq!(summary.highest_extent, 0x40000000);
        assert_eq!(summary.total_ram_bytes, 0x9F000 + 0x3FF00000);
    }

    #[test]
    fn summary_is_idempotent() {
        let mut map = MemoryMap::empty();
        map.push(ram(0x100000, 0x200000));
        map.push(MapEntry {
            base: 0xFEC00000,
            length: 0x1000,
            kind: RegionKind::Other(3),
        });
        map.recompute_summary();
        let first = map.summary();
        map.recompute_summary();
        assert_eq!(map.summary(), first);
    }

    #[test]
    fn summary_of_empty_map() {
        let mut map = MemoryMap::empty();
        map.recompute_summary();
        let summary = map.summary();
        assert_eq!(summary.lowest_base, u64::max_value());
        assert_eq!(summary.highest_extent, 0);
        assert_eq!(summary.total_ram_bytes, 0);
    }

    #[test]
    fn push_refuses_overflow() {
        let mut map = MemoryMap::empty();
        for i in 0..MAX_ENTRIES {
            assert!(map.push(ram(i as u64 * 0x1000, 0x1000)));
        }
        assert!(!map.push(ram(0x1000000, 0x1000)));
        assert_eq!(map.entry_count() as usize, MAX_ENTRIES);
    }

    #[test]
    fn raw_type_codes() {
        assert_eq!(RegionKind::from_raw(1), RegionKind::Ram);
        assert_eq!(RegionKind::from_raw(2), RegionKind::Reserved);
        assert_eq!(RegionKind::from_raw(4), RegionKind::Other(4));
    }
}
