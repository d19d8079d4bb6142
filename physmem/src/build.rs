//! Construction of the memory map from the bootloader handover.
//!
//! The raw firmware map may type the very memory the bootloader parked its
//! own structures in as RAM. Before anything else trusts the map, those
//! spans are carved out of the intersecting RAM entries so nothing ever
//! hands them out as usable memory.

use crate::map::{MapEntry, MemoryMap, RegionKind, MAX_ENTRIES};
use crate::PAGE_SIZE;

use bare_metal::{Alignable, PhysAddr};
use multiboot::{BootInfo, Module};

use core::fmt;
use core::mem;

/// A bootloader-owned address range that must not surface as RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedRegion {
    pub base: u64,
    pub length: u64,
}

impl ReservedRegion {
    pub(crate) const fn empty() -> ReservedRegion {
        ReservedRegion { base: 0, length: 0 }
    }

    /// First address past the region.
    pub fn end(&self) -> u64 {
        self.base + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// The three spans the bootloader occupies: its info structure, the module
/// descriptor array and the first module image. A slot stays zero-length
/// when the corresponding feature is absent.
pub struct ReservedSet {
    regions: [ReservedRegion; 3],
    /// Indices into `regions`, ascending by base address.
    order: [usize; 3],
}

impl ReservedSet {
    pub fn new(regions: [ReservedRegion; 3]) -> ReservedSet {
        let mut order = [0, 1, 2];
        // Stable bubble pass over three elements; equal bases keep their
        // slot order.
        for i in (1..3).rev() {
            for j in 0..i {
                if regions[order[j]].base > regions[order[j + 1]].base {
                    order.swap(j, j + 1);
                }
            }
        }
        ReservedSet { regions, order }
    }

    /// Derive the reserved spans from the boot info located at `info_addr`.
    /// Bases are aligned down to a page, lengths rounded up to whole pages.
    pub fn from_boot_info(info: &BootInfo, info_addr: PhysAddr) -> ReservedSet {
        let mut regions = [ReservedRegion::empty(); 3];

        regions[0] = ReservedRegion {
            base: info_addr.align_down(PAGE_SIZE).0,
            length: (mem::size_of::<BootInfo>() as u64).align_up(PAGE_SIZE),
        };

        if let Some(mods_addr) = info.modules_addr() {
            let modules = info.modules();
            regions[1] = ReservedRegion {
                base: mods_addr.align_down(PAGE_SIZE).0,
                length: ((modules.len() * mem::size_of::<Module>()) as u64).align_up(PAGE_SIZE),
            };
            if let Some(first) = modules.first() {
                regions[2] = ReservedRegion {
                    base: first.start().align_down(PAGE_SIZE).0,
                    length: (first.end() - first.start()).align_up(PAGE_SIZE),
                };
            }
        }

        ReservedSet::new(regions)
    }

    /// The non-empty regions in ascending base order.
    fn in_order(&self) -> impl Iterator<Item = ReservedRegion> + '_ {
        self.order
            .iter()
            .map(move |&i| self.regions[i])
            .filter(|r| !r.is_empty())
    }
}

/// Errors that abort map construction. All of them leave the system
/// without a usable memory map, so callers treat them as fatal for boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The bootloader signature is missing; there is no boot info at all.
    MissingBootInfo,
    /// The boot info carries no memory map.
    MissingMemoryMap,
    /// A reserved region crosses the boundary of a raw map entry. The
    /// splitting pass cannot resolve this without corrupting the map.
    ReservedRegionStraddles { base: u64, length: u64 },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::MissingBootInfo => write!(f, "no multiboot info found"),
            BuildError::MissingMemoryMap => write!(f, "boot info carries no memory map"),
            BuildError::ReservedRegionStraddles { base, length } => write!(
                f,
                "bootloader region 0x{:x}+0x{:x} straddles a map entry boundary",
                base, length
            ),
        }
    }
}

/// Build the final map from the raw firmware entries, carving the reserved
/// regions out of any RAM entry that contains them.
///
/// Non-RAM entries are copied verbatim. When the input exceeds the table
/// capacity the map is truncated with a diagnostic and construction
/// continues; a straddling reserved region is fatal.
pub fn build_map<I>(raw: I, reserved: &ReservedSet) -> Result<MemoryMap, BuildError>
where
    I: IntoIterator<Item = MapEntry>,
{
    let mut map = MemoryMap::empty();
    let mut truncated = false;

    'raw: for raw_entry in raw {
        if raw_entry.length == 0 {
            continue;
        }
        if !raw_entry.kind.is_ram() {
            if !map.push(raw_entry) {
                truncated = true;
                break;
            }
            continue;
        }

        // Walk the reserved regions against the remaining window of this
        // RAM entry. They are visited in ascending base order, so once one
        // starts past the window none of the rest can intersect it.
        let mut base = raw_entry.base;
        let mut length = raw_entry.length;
        for region in reserved.in_order() {
            if region.end() <= base {
                continue;
            } else if region.base >= base && region.end() <= base + length {
                let gap = region.base - base;
                if gap > 0 {
                    if !map.push(MapEntry {
                        base,
                        length: gap,
                        kind: RegionKind::Ram,
                    }) {
                        truncated = true;
                        break 'raw;
                    }
                    base += gap;
                    length -= gap;
                }
                if !map.push(MapEntry {
                    base,
                    length: region.length,
                    kind: RegionKind::Reserved,
                }) {
                    truncated = true;
                    break 'raw;
                }
                base += region.length;
                length -= region.length;
            } else if region.base >= base + length {
                break;
            } else {
                return Err(BuildError::ReservedRegionStraddles {
                    base: region.base,
                    length: region.length,
                });
            }
        }
        if length > 0 {
            if !map.push(MapEntry {
                base,
                length,
                kind: RegionKind::Ram,
            }) {
                truncated = true;
                break;
            }
        }
    }

    if truncated {
        error!(
            "firmware memory map exceeds {} entries, continuing with a truncated map",
            MAX_ENTRIES
        );
    }

    map.recompute_summary();
    Ok(map)
}

/// Entry point at boot: validate the bootloader signature, parse the info
/// structure through the identity mapping and build the memory map.
///
/// # Safety
///
/// `info_addr` must be the physical address the bootloader handed over in
/// `EBX`, and the boot-time identity mapping must still be active.
pub unsafe fn from_boot_registers(magic: u32, info_addr: PhysAddr) -> Result<MemoryMap, BuildError> {
    let info = BootInfo::from_phys(magic, info_addr).ok_or(BuildError::MissingBootInfo)?;
    info!("multiboot info detected at {:p}", info_addr);

    let mmap = info.memory_map().ok_or(BuildError::MissingMemoryMap)?;
    let reserved = ReservedSet::from_boot_info(info, info_addr);

    let raw = mmap.map(|e| MapEntry {
        base: e.base(),
        length: e.length(),
        kind: RegionKind::from_raw(e.entry_type()),
    });
    let map = build_map(raw, &reserved)?;

    for (i, entry) in map.entries().iter().enumerate() {
        debug!(
            "map entry {}: base 0x{:016x} length 0x{:016x} {:?}",
            i, entry.base, entry.length, entry.kind
        );
    }
    Ok(map)
}
