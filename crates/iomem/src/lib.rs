#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # Region memory (iomem)
//!
//! Low-level memory primitives for drivers that expose register windows to userspace.
//! It provides:
//!
//! - A physical address newtype with page alignment helpers.
//! - Page-size arithmetic with overflow checking.
//! - Contiguous physical ranges ([`MemoryRegion`]).
//! - A memblock-style [`BackingPool`] that hands out zeroed, page-aligned, physically
//!   contiguous blocks, owned through the RAII [`BackingBuffer`].

extern crate alloc;

mod address;
mod page;
mod pool;
mod region;

pub use address::PhysicalAddress;
pub use page::{PAGE_SHIFT, PAGE_SIZE, page_count, page_round_up};
pub use pool::{AllocError, BackingBuffer, BackingPool};
pub use region::MemoryRegion;
