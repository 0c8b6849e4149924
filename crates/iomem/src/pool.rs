//! Backing pool for register windows that have no fixed physical location.
//!
//! The pool is modeled on Linux's memblock allocator: it tracks the physical window it
//! manages and the ranges currently reserved inside it, and hands out page-aligned blocks
//! with a first-fit search. Every block is zeroed before it is returned, and the pool
//! keeps the bytes behind the window so callers can inspect what userspace would see
//! through the mapping.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use crate::region::RegionSet;
use crate::{MemoryRegion, PAGE_SIZE, PhysicalAddress, page_round_up};

/// Errors that can occur during backing pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free range in the window is large enough.
    OutOfMemory,
    /// The requested size is zero or cannot be rounded to a page multiple.
    InvalidSize,
    /// The address range lies outside the pool's window.
    OutOfWindow,
    /// The range being freed was never handed out by this pool.
    NotAllocated,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory => write!(f, "out of backing memory"),
            AllocError::InvalidSize => write!(f, "invalid allocation size"),
            AllocError::OutOfWindow => write!(f, "address outside the pool window"),
            AllocError::NotAllocated => write!(f, "range was not allocated from this pool"),
        }
    }
}

/// A memblock-style allocator over one physical window.
///
/// # Thread Safety
///
/// All state sits behind `spin::Mutex`es so the pool can be shared through an `Arc` and
/// used from `&self`. Locks are always taken in the order reserved, store.
pub struct BackingPool {
    /// Blocks currently handed out.
    reserved: spin::Mutex<RegionSet>,
    /// The bytes behind the window, indexed by offset from the window base.
    store: spin::Mutex<Vec<u8>>,
    window: MemoryRegion,
}

impl BackingPool {
    /// Creates a pool over `size` bytes of physical memory starting at `base`.
    ///
    /// The base is aligned up and the size down to page boundaries, so the usable window
    /// may be smaller than requested.
    pub fn new(base: PhysicalAddress, size: usize) -> Self {
        let aligned_base = base.align_up(PAGE_SIZE);
        let end = base.as_usize().saturating_add(size);
        let aligned_size = end.saturating_sub(aligned_base.as_usize()) & !(PAGE_SIZE - 1);
        let window = MemoryRegion::new(aligned_base, aligned_size);

        log::debug!(
            "backing pool window {}..{} ({} bytes)",
            window.base(),
            window.end(),
            window.size()
        );

        Self {
            reserved: spin::Mutex::new(RegionSet::new()),
            store: spin::Mutex::new(vec![0u8; aligned_size]),
            window,
        }
    }

    /// Returns the physical window this pool manages.
    pub fn window(&self) -> MemoryRegion {
        self.window
    }

    /// Claims a zeroed, page-aligned block of at least `size` bytes.
    ///
    /// The returned region's size is `size` rounded up to a page multiple.
    fn allocate_zeroed(&self, size: usize) -> Result<MemoryRegion, AllocError> {
        let aligned_size = page_round_up(size)
            .filter(|s| *s != 0)
            .ok_or(AllocError::InvalidSize)?;

        let mut reserved = self.reserved.lock();
        let Some(region) = reserved.claim_first_fit(self.window, aligned_size) else {
            log::warn!(
                "backing pool exhausted: {} bytes requested, {} available",
                aligned_size,
                self.window.size().saturating_sub(reserved.total_size())
            );
            return Err(AllocError::OutOfMemory);
        };

        let offsets = self.offsets(region.base(), aligned_size)?;
        self.store.lock()[offsets].fill(0);
        log::trace!(
            "backing pool allocated {} bytes at {}",
            aligned_size,
            region.base()
        );
        Ok(region)
    }

    /// Allocates a zeroed block owned by the returned [`BackingBuffer`].
    ///
    /// The block goes back to the pool when the buffer is dropped.
    pub fn allocate(self: &Arc<Self>, size: usize) -> Result<BackingBuffer, AllocError> {
        let region = self.allocate_zeroed(size)?;
        Ok(BackingBuffer {
            pool: Arc::clone(self),
            region,
        })
    }

    /// Returns a block claimed by [`allocate_zeroed`](Self::allocate_zeroed).
    fn free(&self, region: MemoryRegion) -> Result<(), AllocError> {
        if !self.reserved.lock().release(region) {
            return Err(AllocError::NotAllocated);
        }
        log::trace!(
            "backing pool freed {} bytes at {}",
            region.size(),
            region.base()
        );
        Ok(())
    }

    /// Copies bytes out of the window starting at `addr`.
    pub fn read(&self, addr: PhysicalAddress, buf: &mut [u8]) -> Result<(), AllocError> {
        let offsets = self.offsets(addr, buf.len())?;
        buf.copy_from_slice(&self.store.lock()[offsets]);
        Ok(())
    }

    /// Copies bytes into the window starting at `addr`.
    pub fn write(&self, addr: PhysicalAddress, data: &[u8]) -> Result<(), AllocError> {
        let offsets = self.offsets(addr, data.len())?;
        self.store.lock()[offsets].copy_from_slice(data);
        Ok(())
    }

    /// Reads a native-endian 32-bit word at `addr`.
    pub fn read_u32(&self, addr: PhysicalAddress) -> Result<u32, AllocError> {
        let mut word = [0u8; 4];
        self.read(addr, &mut word)?;
        Ok(u32::from_ne_bytes(word))
    }

    /// Writes a native-endian 32-bit word at `addr`.
    pub fn write_u32(&self, addr: PhysicalAddress, value: u32) -> Result<(), AllocError> {
        self.write(addr, &value.to_ne_bytes())
    }

    /// Returns the size of the window in bytes.
    pub fn total_memory(&self) -> usize {
        self.window.size()
    }

    /// Returns the number of bytes currently reserved or handed out.
    pub fn reserved_memory(&self) -> usize {
        self.reserved.lock().total_size()
    }

    /// Returns the number of bytes still available.
    pub fn available_memory(&self) -> usize {
        self.total_memory().saturating_sub(self.reserved_memory())
    }

    fn offsets(&self, addr: PhysicalAddress, len: usize) -> Result<Range<usize>, AllocError> {
        let start = addr
            .as_usize()
            .checked_sub(self.window.base().as_usize())
            .ok_or(AllocError::OutOfWindow)?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.window.size())
            .ok_or(AllocError::OutOfWindow)?;
        Ok(start..end)
    }
}

/// An owned block of backing memory.
///
/// Dropping the buffer returns its block to the pool it came from.
pub struct BackingBuffer {
    pool: Arc<BackingPool>,
    region: MemoryRegion,
}

impl BackingBuffer {
    /// Returns the physical address of the first byte of the block.
    pub fn physical_address(&self) -> PhysicalAddress {
        self.region.base()
    }

    /// Returns the size of the block in bytes (always a page multiple).
    pub fn size(&self) -> usize {
        self.region.size()
    }

    /// Returns the physical range covered by the block.
    pub fn region(&self) -> MemoryRegion {
        self.region
    }

    /// Reads a 32-bit word at byte `offset` into the block.
    pub fn read_u32(&self, offset: usize) -> Result<u32, AllocError> {
        self.check_offset(offset, 4)?;
        self.pool.read_u32(self.region.base() + offset)
    }

    /// Writes a 32-bit word at byte `offset` into the block.
    pub fn write_u32(&self, offset: usize, value: u32) -> Result<(), AllocError> {
        self.check_offset(offset, 4)?;
        self.pool.write_u32(self.region.base() + offset, value)
    }

    fn check_offset(&self, offset: usize, len: usize) -> Result<(), AllocError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.region.size() => Ok(()),
            _ => Err(AllocError::OutOfWindow),
        }
    }
}

impl fmt::Debug for BackingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingBuffer")
            .field("base", &self.region.base())
            .field("size", &self.region.size())
            .finish()
    }
}

impl Drop for BackingBuffer {
    fn drop(&mut self) {
        // The buffer is the only handle to its block, so the block is always claimed.
        let freed = self.pool.free(self.region);
        debug_assert_eq!(freed, Ok(()));
        if let Err(err) = freed {
            log::error!(
                "failed to return {} bytes at {} to backing pool: {}",
                self.region.size(),
                self.region.base(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x10_0000;

    fn pool(pages: usize) -> Arc<BackingPool> {
        Arc::new(BackingPool::new(PhysicalAddress::new(BASE), pages * PAGE_SIZE))
    }

    #[test]
    fn pool_starts_empty() {
        let pool = pool(4);
        assert_eq!(pool.total_memory(), 4 * PAGE_SIZE);
        assert_eq!(pool.reserved_memory(), 0);
        assert_eq!(pool.available_memory(), 4 * PAGE_SIZE);
    }

    #[test]
    fn window_is_page_aligned() {
        let pool = BackingPool::new(PhysicalAddress::new(BASE + 0x10), 3 * PAGE_SIZE);
        assert_eq!(pool.window().base(), PhysicalAddress::new(BASE + PAGE_SIZE));
        assert_eq!(pool.window().size(), 2 * PAGE_SIZE);
    }

    #[test]
    fn allocation_rounds_to_pages() {
        let pool = pool(4);
        let region = pool.allocate_zeroed(100).unwrap();
        assert_eq!(region.base(), PhysicalAddress::new(BASE));
        assert_eq!(region.size(), PAGE_SIZE);
        assert!(region.base().is_page_aligned());
        assert_eq!(pool.reserved_memory(), PAGE_SIZE);

        let next = pool.allocate_zeroed(PAGE_SIZE + 1).unwrap();
        assert_eq!(next.base(), PhysicalAddress::new(BASE + PAGE_SIZE));
        assert_eq!(next.size(), 2 * PAGE_SIZE);
    }

    #[test]
    fn zero_size_is_rejected() {
        let pool = pool(1);
        assert_eq!(pool.allocate_zeroed(0), Err(AllocError::InvalidSize));
        assert_eq!(pool.allocate_zeroed(usize::MAX), Err(AllocError::InvalidSize));
    }

    #[test]
    fn out_of_memory() {
        let pool = pool(2);
        pool.allocate_zeroed(2 * PAGE_SIZE).unwrap();
        assert_eq!(pool.allocate_zeroed(1), Err(AllocError::OutOfMemory));
    }

    #[test]
    fn first_fit_reuses_holes() {
        let pool = pool(4);
        let first = pool.allocate_zeroed(PAGE_SIZE).unwrap();
        let middle = pool.allocate_zeroed(PAGE_SIZE).unwrap();
        pool.allocate_zeroed(PAGE_SIZE).unwrap();
        pool.free(middle).unwrap();
        assert_eq!(first.base(), PhysicalAddress::new(BASE));

        // Two pages do not fit in the hole.
        let wide = pool.allocate_zeroed(2 * PAGE_SIZE);
        assert_eq!(wide, Err(AllocError::OutOfMemory));
        let wide = pool.allocate_zeroed(PAGE_SIZE + 1);
        assert_eq!(wide, Err(AllocError::OutOfMemory));

        assert_eq!(pool.allocate_zeroed(PAGE_SIZE), Ok(middle));
        assert_eq!(
            pool.allocate_zeroed(PAGE_SIZE).unwrap().base(),
            PhysicalAddress::new(BASE + 3 * PAGE_SIZE)
        );
    }

    #[test]
    fn live_buffers_never_share_pages_after_fragmentation() {
        let pool = pool(400);
        let mut live: Vec<_> = (0..260).map(|_| pool.allocate(PAGE_SIZE).unwrap()).collect();
        // Leaves 129 separate holes.
        let mut index = 1;
        for _ in 0..129 {
            drop(live.remove(index));
            index += 1;
        }
        assert_eq!(pool.reserved_memory(), 131 * PAGE_SIZE);

        live.extend((0..130).map(|_| pool.allocate(PAGE_SIZE).unwrap()));
        assert_eq!(pool.reserved_memory(), 261 * PAGE_SIZE);

        let mut bases: Vec<_> = live.iter().map(|b| b.physical_address()).collect();
        bases.sort_unstable();
        bases.dedup();
        assert_eq!(bases.len(), live.len());

        drop(live);
        assert_eq!(pool.reserved_memory(), 0);
    }

    #[test]
    fn buffers_are_zeroed_on_reuse() {
        let pool = pool(1);
        let buffer = pool.allocate(64).unwrap();
        buffer.write_u32(0, 0xDEAD_BEEF).unwrap();
        buffer.write_u32(PAGE_SIZE - 4, 0x1234_5678).unwrap();
        assert_eq!(buffer.read_u32(0).unwrap(), 0xDEAD_BEEF);
        let base = buffer.physical_address();
        drop(buffer);

        let again = pool.allocate(PAGE_SIZE).unwrap();
        assert_eq!(again.physical_address(), base);
        assert_eq!(again.read_u32(0).unwrap(), 0);
        assert_eq!(again.read_u32(PAGE_SIZE - 4).unwrap(), 0);
    }

    #[test]
    fn dropping_buffer_frees_block() {
        let pool = pool(2);
        let a = pool.allocate(PAGE_SIZE).unwrap();
        let b = pool.allocate(PAGE_SIZE).unwrap();
        assert_eq!(pool.available_memory(), 0);

        drop(a);
        assert_eq!(pool.available_memory(), PAGE_SIZE);
        drop(b);
        assert_eq!(pool.available_memory(), 2 * PAGE_SIZE);
        assert_eq!(Arc::strong_count(&pool), 1);
    }

    #[test]
    fn buffer_access_is_bounds_checked() {
        let pool = pool(2);
        let buffer = pool.allocate(PAGE_SIZE).unwrap();
        assert_eq!(buffer.read_u32(PAGE_SIZE - 2), Err(AllocError::OutOfWindow));
        assert_eq!(buffer.write_u32(usize::MAX, 1), Err(AllocError::OutOfWindow));
    }

    #[test]
    fn freeing_unknown_range_fails() {
        let pool = pool(2);
        let stray = MemoryRegion::new(PhysicalAddress::new(BASE), PAGE_SIZE);
        assert_eq!(pool.free(stray), Err(AllocError::NotAllocated));

        let outside = MemoryRegion::new(PhysicalAddress::new(0x1000), PAGE_SIZE);
        assert_eq!(pool.free(outside), Err(AllocError::NotAllocated));

        let block = pool.allocate_zeroed(2 * PAGE_SIZE).unwrap();
        let half = MemoryRegion::new(block.base(), PAGE_SIZE);
        assert_eq!(pool.free(half), Err(AllocError::NotAllocated));
        assert_eq!(pool.reserved_memory(), 2 * PAGE_SIZE);
        assert_eq!(pool.free(block), Ok(()));
    }

    #[test]
    fn raw_access_outside_window_fails() {
        let pool = pool(1);
        assert_eq!(
            pool.read_u32(PhysicalAddress::new(0x1000)),
            Err(AllocError::OutOfWindow)
        );
        assert_eq!(
            pool.write_u32(PhysicalAddress::new(BASE + PAGE_SIZE), 0),
            Err(AllocError::OutOfWindow)
        );
    }
}
