//! Newtype wrapper for host physical addresses.
//!
//! Physical addresses are kept as `u64` independent of the host pointer
//! width, because the firmware memory map describes them as 64 bit values.

use core::fmt;
use core::ops;

use super::align::Alignable;

/// A host physical address. Whether it can be dereferenced depends on the
/// currently active page mapping.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
#[repr(transparent)]
pub struct PhysAddr(pub u64);

impl Alignable for PhysAddr {
    type Alignment = u64;

    fn align_up(self, alignment: u64) -> Self {
        PhysAddr(self.0.align_up(alignment))
    }

    fn align_down(self, alignment: u64) -> Self {
        PhysAddr(self.0.align_down(alignment))
    }

    fn is_aligned(self, alignment: u64) -> bool {
        self.0.is_aligned(alignment)
    }
}

impl ops::Add<u64> for PhysAddr {
    type Output = PhysAddr;

    fn add(self, offset: u64) -> PhysAddr {
        PhysAddr(self.0 + offset)
    }
}

impl ops::Sub<PhysAddr> for PhysAddr {
    type Output = u64;

    fn sub(self, other: PhysAddr) -> u64 {
        self.0 - other.0
    }
}

impl fmt::Pointer for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PHYS_0x{:016x}", self.0)
    }
}
