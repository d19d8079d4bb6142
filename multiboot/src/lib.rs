#![cfg_attr(not(test), no_std)]
//! Parser for the Multiboot (version 1) information structure handed over
//! by the bootloader.
//!
//! The references returned here are `'static` because the data was placed
//! in memory before any of our code ran and is never dropped. They are only
//! valid while the boot-time identity mapping is active: once paging
//! replaces the 1:1 mapping of physical memory, all references obtained
//! from this crate must have been dropped.
//!
//! The safety of this parser rests on the bootloader being Multiboot
//! compliant. Bogus addresses or lengths in the info structure cannot be
//! detected and will lead to wild reads.

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate static_assertions;

use bare_metal::PhysAddr;

use core::iter::{FusedIterator, Iterator};
use core::mem;
use core::slice;
use core::str;

/// Value the bootloader leaves in `EAX` when it hands over control.
pub const BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

bitflags! {
    /// Validity bits of the [`BootInfo`] fields.
    pub struct InfoFlags: u32 {
        const MEMORY = 1 << 0;
        const BOOT_DEVICE = 1 << 1;
        const CMDLINE = 1 << 2;
        const MODULES = 1 << 3;
        const AOUT_SYMS = 1 << 4;
        const ELF_SECTIONS = 1 << 5;
        const MEMORY_MAP = 1 << 6;
        const DRIVES = 1 << 7;
        const CONFIG_TABLE = 1 << 8;
        const LOADER_NAME = 1 << 9;
        const APM_TABLE = 1 << 10;
        const VBE = 1 << 11;
        const FRAMEBUFFER = 1 << 12;
    }
}

/// Dereference a physical address. Only callable while the boot-time 1:1
/// mapping of physical memory is in place; this is the single spot where a
/// physical address is treated as a pointer.
unsafe fn deref_identity_mapped<T>(addr: PhysAddr) -> &'static T {
    &*(addr.0 as usize as *const T)
}

/// The Multiboot v1 information structure, exactly as laid out by the
/// bootloader (field order and widths follow the 0.6.96 specification).
// rustc doesn't see that instances are conjured from raw pointers, so the
// unread ABI fields would otherwise count as dead code
#[allow(dead_code)]
#[repr(C, packed)]
pub struct BootInfo {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
    syms: [u32; 4],
    mmap_length: u32,
    mmap_addr: u32,
    drives_length: u32,
    drives_addr: u32,
    config_table: u32,
    loader_name: u32,
    apm_table: u32,
    vbe_control_info: u32,
    vbe_mode_info: u32,
    vbe_mode: u16,
    vbe_interface_seg: u16,
    vbe_interface_off: u16,
    vbe_interface_len: u16,
    framebuffer_addr: u64,
    framebuffer_pitch: u32,
    framebuffer_width: u32,
    framebuffer_height: u32,
    framebuffer_bpp: u8,
    framebuffer_type: u8,
    color_info: [u8; 6],
}

assert_eq_size!(boot_info_size; BootInfo, [u8; 116]);

impl BootInfo {
    /// Interpret the structure at `addr`, provided `magic` is the value the
    /// bootloader left behind. Returns `None` if the magic does not match,
    /// i.e. we were not started by a Multiboot compliant loader.
    ///
    /// # Safety
    ///
    /// `addr` must be the physical address handed over by the bootloader
    /// and the identity mapping must still be active.
    pub unsafe fn from_phys(magic: u32, addr: PhysAddr) -> Option<&'static BootInfo> {
        if magic == BOOTLOADER_MAGIC {
            Some(deref_identity_mapped(addr))
        } else {
            None
        }
    }

    pub fn flags(&self) -> InfoFlags {
        InfoFlags::from_bits_truncate(self.flags)
    }

    pub fn has_memory_map(&self) -> bool {
        self.flags().contains(InfoFlags::MEMORY_MAP)
    }

    pub fn has_modules(&self) -> bool {
        self.flags().contains(InfoFlags::MODULES)
    }

    /// Physical address of the module descriptor array, if one is present.
    pub fn modules_addr(&self) -> Option<PhysAddr> {
        if self.has_modules() {
            Some(PhysAddr(u64::from(self.mods_addr)))
        } else {
            None
        }
    }

    /// The modules loaded alongside the kernel image. Empty when the
    /// bootloader did not pass any.
    pub fn modules(&self) -> &'static [Module] {
        if self.has_modules() && self.mods_count > 0 {
            unsafe {
                slice::from_raw_parts(
                    self.mods_addr as usize as *const Module,
                    self.mods_count as usize,
                )
            }
        } else {
            &[]
        }
    }

    /// An iterator over the firmware memory map, or `None` when the
    /// bootloader did not supply one.
    pub fn memory_map(&self) -> Option<MmapIter> {
        if self.has_memory_map() {
            Some(MmapIter {
                current: self.mmap_addr as usize as *const MmapEntry,
                remaining: self.mmap_length as usize / mem::size_of::<MmapEntry>(),
            })
        } else {
            None
        }
    }
}

/// Descriptor of one bootloader-loaded module.
#[allow(dead_code)]
#[repr(C)]
pub struct Module {
    mod_start: u32,
    mod_end: u32,
    string: u32,
    reserved: u32,
}

assert_eq_size!(module_size; Module, [u8; 16]);

impl Module {
    /// Physical address of the first byte of the module image.
    pub fn start(&self) -> PhysAddr {
        PhysAddr(u64::from(self.mod_start))
    }

    /// Physical address just past the module image.
    pub fn end(&self) -> PhysAddr {
        PhysAddr(u64::from(self.mod_end))
    }

    /// The module command line, if the bootloader attached one.
    ///
    /// # Panics
    ///
    /// Panics when the string is not valid UTF-8, which the specification
    /// forbids.
    pub fn cmdline(&self) -> Option<&'static str> {
        if self.string == 0 {
            return None;
        }
        unsafe {
            let start = self.string as usize as *const u8;
            let mut len = 0;
            while *start.add(len) != 0 {
                len += 1;
            }
            let bytes = slice::from_raw_parts(start, len);
            Some(str::from_utf8(bytes).expect("invalid UTF-8 in module command line"))
        }
    }
}

/// One record of the firmware memory map.
///
/// The bootloader describes these as variable-sized, but like every
/// firmware in the field it emits a fixed 24 byte layout, which is what
/// the stride of [`MmapIter`] assumes.
#[allow(dead_code)]
#[repr(C, packed)]
pub struct MmapEntry {
    size: u32,
    base: u64,
    length: u64,
    entry_type: u32,
}

assert_eq_size!(mmap_entry_size; MmapEntry, [u8; 24]);

impl MmapEntry {
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Raw firmware type code of this range.
    pub fn entry_type(&self) -> u32 {
        self.entry_type
    }
}

/// Iterator over the entries of the firmware memory map.
/// Construct using [`BootInfo::memory_map`].
pub struct MmapIter {
    current: *const MmapEntry,
    remaining: usize,
}

impl Iterator for MmapIter {
    type Item = &'static MmapEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            None
        } else {
            unsafe {
                let entry = &*self.current;
                self.current = self.current.add(1);
                self.remaining -= 1;
                Some(entry)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl FusedIterator for MmapIter {}
