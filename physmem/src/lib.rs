#![cfg_attr(not(test), no_std)]
//! The boot-time physical memory map of the hypervisor.
//!
//! At early boot, before paging and any heap exist, the raw firmware memory
//! map is reconciled with the ranges the bootloader itself occupies,
//! yielding an authoritative non-overlapping table of typed regions. Later
//! boot stages consume the table read-only; the only mutation after
//! construction is the low-memory allocator carving out real-mode
//! bring-up buffers.

#[macro_use]
extern crate log;

pub mod build;
pub mod lowmem;
pub mod map;

/// Number of trailing zeros in a page aligned address.
pub const PAGE_ALIGN_BITS: u32 = 12;

/// Size of a physical page, 4096 bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_ALIGN_BITS;
