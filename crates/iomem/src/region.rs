//! Contiguous physical ranges and the set of ranges handed out by the backing pool.

use alloc::collections::BTreeMap;

use crate::PhysicalAddress;

/// A contiguous range of physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    base: PhysicalAddress,
    size: usize,
}

impl MemoryRegion {
    pub const fn new(base: PhysicalAddress, size: usize) -> Self {
        Self { base, size }
    }

    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// Returns the size of this region in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns the end address (exclusive) of this region.
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_usize() + self.size)
    }
}

/// Disjoint ranges claimed inside a window, keyed by base address.
///
/// Every claim is tracked as its own entry and must be released whole, so releasing one
/// block never touches the bookkeeping of its neighbors.
#[derive(Debug)]
pub(crate) struct RegionSet {
    claimed: BTreeMap<PhysicalAddress, usize>,
    total: usize,
}

impl RegionSet {
    pub(crate) const fn new() -> Self {
        Self {
            claimed: BTreeMap::new(),
            total: 0,
        }
    }

    /// Claims the lowest gap in `window` that holds `size` bytes.
    ///
    /// Gaps start at the window base or at the end of a claimed range, so they keep the
    /// alignment of the window and of the sizes claimed so far.
    pub(crate) fn claim_first_fit(
        &mut self,
        window: MemoryRegion,
        size: usize,
    ) -> Option<MemoryRegion> {
        let mut cursor = window.base().as_usize();
        for (base, len) in &self.claimed {
            let base = base.as_usize();
            if base.checked_sub(cursor).is_some_and(|gap| gap >= size) {
                break;
            }
            cursor = cursor.max(base.saturating_add(*len));
        }
        cursor
            .checked_add(size)
            .filter(|end| *end <= window.end().as_usize())?;

        let region = MemoryRegion::new(PhysicalAddress::new(cursor), size);
        self.claimed.insert(region.base(), size);
        self.total += size;
        Some(region)
    }

    /// Releases a range returned by [`claim_first_fit`](Self::claim_first_fit).
    ///
    /// Returns false, changing nothing, unless `region` matches a claim exactly.
    pub(crate) fn release(&mut self, region: MemoryRegion) -> bool {
        match self.claimed.get(&region.base()) {
            Some(&size) if size == region.size() => {
                self.claimed.remove(&region.base());
                self.total -= size;
                true
            }
            _ => false,
        }
    }

    /// Returns the number of bytes currently claimed.
    pub(crate) fn total_size(&self) -> usize {
        self.total
    }
}
