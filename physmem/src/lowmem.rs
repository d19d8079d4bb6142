//! Carving small buffers out of RAM below 1 MiB.
//!
//! Legacy real-mode bring-up (AP trampolines, BIOS data shadows) needs a
//! handful of fixed-purpose buffers in the first megabyte. They are carved
//! out of the memory map directly so later consumers never see that memory
//! as usable RAM.

use crate::map::{MapEntry, MemoryMap, RegionKind, MAX_ENTRIES};
use crate::PAGE_SIZE;

use bare_metal::Alignable;

use core::fmt;

/// Boundary below which real-mode structures must live.
pub const LOWMEM_LIMIT: u64 = 0x10_0000;

/// No RAM entry below 1 MiB can satisfy the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfLowMemory;

impl fmt::Display for OutOfLowMemory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "cannot allocate memory below 1 MiB")
    }
}

impl MemoryMap {
    /// Reserve `size` bytes (rounded up to whole pages) of RAM below 1 MiB
    /// and return the page aligned base address of the reservation.
    ///
    /// Entries are scanned in table order and the first fit wins; callers
    /// request small fixed-purpose buffers a handful of times at boot, so
    /// allocation pattern sensitivity does not matter. The allocation is
    /// taken from the tail of the candidate's page aligned usable span. On
    /// success the carved range is typed `Reserved` and `total_ram_bytes`
    /// drops by exactly what a fresh summary recompute would no longer see.
    ///
    /// Whether a failed allocation is fatal is the caller's decision; the
    /// table is left untouched either way.
    pub fn allocate_low(&mut self, size: u32) -> Result<u64, OutOfLowMemory> {
        let size = u64::from(size.max(1)).align_up(PAGE_SIZE);

        for i in 0..self.count {
            let entry = self.entries[i];
            let usable_start = entry.base.align_up(PAGE_SIZE);
            let usable_end = entry.end().align_down(PAGE_SIZE);
            let usable_len = if usable_end > usable_start {
                usable_end - usable_start
            } else {
                0
            };

            // The allocation comes from the tail of the usable span, so the
            // span must end at or below the low-memory boundary.
            if !entry.kind.is_ram() || usable_len < size || usable_end > LOWMEM_LIMIT {
                continue;
            }

            // Exact fit: the whole entry changes type. The second condition
            // catches a carve that would leave the original entry with no
            // length, which has to be handled the same way.
            if usable_len == size || usable_end - size <= entry.base {
                self.entries[i].kind = RegionKind::Reserved;
                self.summary.total_ram_bytes -= entry.length;
                return Ok(usable_start);
            }

            // A carve appends one entry; with a full table only an exact
            // fit could still succeed.
            if self.count == MAX_ENTRIES {
                continue;
            }

            // Compute everything from the captured entry before mutating
            // the table. The new reserved entry runs to the original
            // (possibly unaligned) end so no sub-page slack is lost.
            let new_base = usable_end - size;
            let new_length = entry.end() - new_base;

            self.entries[i].length -= new_length;
            let appended = self.push(MapEntry {
                base: new_base,
                length: new_length,
                kind: RegionKind::Reserved,
            });
            debug_assert!(appended);
            self.summary.total_ram_bytes -= new_length;
            return Ok(new_base);
        }

        Err(OutOfLowMemory)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::MemorySummary;

    fn ram(base: u64, length: u64) -> MapEntry {
        MapEntry {
            base,
            length,
            kind: RegionKind::Ram,
        }
    }

    fn map_of(entries: &[MapEntry]) -> MemoryMap {
        let mut map = MemoryMap::empty();
        for e in entries {
            assert!(map.push(*e));
        }
        map.recompute_summary();
        map
    }

    /// Independent recompute of the RAM byte total.
    fn ram_total(map: &MemoryMap) -> u64 {
        map.entries()
            .iter()
            .filter(|e| e.kind.is_ram())
            .map(|e| e.length)
            .sum()
    }

    #[test]
    fn exact_fit_retypes_whole_entry() {
        let mut map = map_of(&[ram(0x0, 0x1000)]);
        let total_before = map.summary().total_ram_bytes;

        // 0x800 rounds up to one page, exactly the entry length
        let base = map.allocate_low(0x800).unwrap();
        assert_eq!(base, 0x0);
        assert_eq!(map.entry_count(), 1);
        assert_eq!(map.entries()[0].kind, RegionKind::Reserved);
        assert_eq!(map.summary().total_ram_bytes, total_before - 0x1000);
        assert_eq!(map.summary().total_ram_bytes, ram_total(&map));
    }

    #[test]
    fn carve_comes_from_the_tail() {
        let mut map = map_of(&[ram(0x0, 0x4000)]);

        let base = map.allocate_low(0x1000).unwrap();
        assert_eq!(base, 0x3000);
        assert_eq!(
            map.entries(),
            &[
                ram(0x0, 0x3000),
                MapEntry {
                    base: 0x3000,
                    length: 0x1000,
                    kind: RegionKind::Reserved
                },
            ]
        );
        assert_eq!(map.summary().total_ram_bytes, ram_total(&map));
    }

    #[test]
    fn allocation_stays_below_one_megabyte() {
        // the tail of this entry is above 1 MiB, so it must be skipped
        // even though its usable length would fit the request
        let mut map = map_of(&[ram(0xFF000, 0x10000), ram(0x8000, 0x2000)]);

        let base = map.allocate_low(0x1000).unwrap();
        assert_eq!(base, 0x9000);
        assert!(base + 0x1000 <= LOWMEM_LIMIT);
    }

    #[test]
    fn first_match_wins() {
        let mut map = map_of(&[ram(0x10000, 0x4000), ram(0x50000, 0x20000)]);

        let base = map.allocate_low(0x1000).unwrap();
        assert_eq!(base, 0x13000);
    }

    #[test]
    fn request_is_rounded_to_pages() {
        let mut map = map_of(&[ram(0x0, 0x10000)]);
        let total_before = map.summary().total_ram_bytes;

        let base = map.allocate_low(1).unwrap();
        assert_eq!(base, 0xF000);
        assert_eq!(map.summary().total_ram_bytes, total_before - 0x1000);
    }

    #[test]
    fn unaligned_entry_is_trimmed_to_pages() {
        let mut map = map_of(&[ram(0x7FF0, 0x3020)]);

        // usable span is [0x8000, 0xB000)
        let base = map.allocate_low(0x1000).unwrap();
        assert_eq!(base, 0xA000);
        // the carved entry absorbs the unaligned tail and the summary
        // matches an independent recompute
        assert_eq!(map.entries()[1].end(), 0xB010);
        assert_eq!(map.summary().total_ram_bytes, ram_total(&map));
    }

    #[test]
    fn failure_leaves_table_untouched() {
        let entries = [
            ram(0x200000, 0x100000),
            MapEntry {
                base: 0x1000,
                length: 0x8000,
                kind: RegionKind::Reserved,
            },
        ];
        let mut map = map_of(&entries);
        let summary_before = map.summary();

        assert_eq!(map.allocate_low(0x1000), Err(OutOfLowMemory));
        assert_eq!(map.entries(), &entries[..]);
        assert_eq!(map.summary(), summary_before);
    }

    #[test]
    fn too_large_request_fails() {
        let mut map = map_of(&[ram(0x0, 0x2000)]);
        assert_eq!(map.allocate_low(0x4000), Err(OutOfLowMemory));
    }

    #[test]
    fn repeated_allocations_never_drift_from_recompute() {
        let mut map = map_of(&[ram(0x0, 0x9F000)]);

        for _ in 0..4 {
            map.allocate_low(0x2000).unwrap();
            let incremental = map.summary().total_ram_bytes;
            let mut expected = MemorySummary::empty();
            for e in map.entries() {
                if e.kind.is_ram() {
                    expected.total_ram_bytes += e.length;
                }
            }
            assert_eq!(incremental, expected.total_ram_bytes);
        }
    }
}
