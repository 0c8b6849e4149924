//! Physical address type.
//!
//! Register windows are described by the physical address userspace will map, so this
//! module keeps that value in a newtype with the alignment operations the driver needs.

use core::fmt;
use core::ops::{Add, Sub};

use crate::PAGE_SIZE;

/// A physical memory address.
///
/// The zero address is meaningful to callers: a region whose start is zero has no fixed
/// location and is backed by allocated memory instead.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysicalAddress(usize);

impl PhysicalAddress {
    /// The zero address.
    pub const ZERO: Self = Self(0);

    /// Creates a new physical address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns true if this is the zero address.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checks if the address is aligned to the given alignment.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    #[inline]
    pub const fn is_aligned(self, align: usize) -> bool {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        self.0 & (align - 1) == 0
    }

    /// Checks if the address sits on a page boundary.
    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        self.is_aligned(PAGE_SIZE)
    }

    /// Aligns the address down to the given alignment.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    #[inline]
    pub const fn align_down(self, align: usize) -> Self {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        Self(self.0 & !(align - 1))
    }

    /// Aligns the address up to the given alignment.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    #[inline]
    pub const fn align_up(self, align: usize) -> Self {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        Self((self.0 + align - 1) & !(align - 1))
    }

    /// Returns the offset of this address within its page.
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalAddress({:#x})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<usize> for PhysicalAddress {
    #[inline]
    fn from(addr: usize) -> Self {
        Self::new(addr)
    }
}

impl Add<usize> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self::new(self.0 + rhs)
    }
}

impl Sub<usize> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: usize) -> Self::Output {
        Self::new(self.0 - rhs)
    }
}

impl Sub<PhysicalAddress> for PhysicalAddress {
    type Output = usize;

    #[inline]
    fn sub(self, rhs: PhysicalAddress) -> Self::Output {
        self.0 - rhs.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_alignment() {
        assert!(PhysicalAddress::new(0).is_page_aligned());
        assert!(PhysicalAddress::new(0x1000).is_page_aligned());
        assert!(PhysicalAddress::new(0x8000_0000).is_page_aligned());
        assert!(!PhysicalAddress::new(0x1800).is_page_aligned());
        assert!(!PhysicalAddress::new(0x1001).is_page_aligned());
    }

    #[test]
    fn align_down_and_up() {
        let addr = PhysicalAddress::new(0x1234);
        assert_eq!(addr.align_down(PAGE_SIZE), PhysicalAddress::new(0x1000));
        assert_eq!(addr.align_up(PAGE_SIZE), PhysicalAddress::new(0x2000));
        assert_eq!(addr.page_offset(), 0x234);

        let aligned = PhysicalAddress::new(0x3000);
        assert_eq!(aligned.align_up(PAGE_SIZE), aligned);
        assert_eq!(aligned.page_offset(), 0);
    }

    #[test]
    #[should_panic(expected = "alignment must be a power of two")]
    fn non_power_of_two_alignment_panics() {
        PhysicalAddress::new(0x1000).is_aligned(3);
    }

    #[test]
    fn arithmetic() {
        let base = PhysicalAddress::new(0x4000);
        assert_eq!(base + 0x1000, PhysicalAddress::new(0x5000));
        assert_eq!(base - 0x1000, PhysicalAddress::new(0x3000));
        assert_eq!(PhysicalAddress::new(0x5000) - base, 0x1000);
    }

    #[test]
    fn formatting() {
        let addr = PhysicalAddress::new(0x8000_0000);
        assert_eq!(format!("{}", addr), "0x80000000");
        assert_eq!(format!("{:?}", addr), "PhysicalAddress(0x80000000)");
        assert_eq!(format!("{:x}", addr), "80000000");
        assert_eq!(format!("{:x}", PhysicalAddress::ZERO), "0");
    }
}
