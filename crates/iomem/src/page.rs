//! Page-size arithmetic.

/// Number of bits in a page offset.
pub const PAGE_SHIFT: usize = 12;

/// Page size in bytes (4 KiB).
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Rounds `size` up to the next multiple of [`PAGE_SIZE`].
///
/// Returns `None` if the rounded value does not fit in a `usize`.
#[inline]
pub const fn page_round_up(size: usize) -> Option<usize> {
    match size.checked_add(PAGE_SIZE - 1) {
        Some(padded) => Some(padded & !(PAGE_SIZE - 1)),
        None => None,
    }
}

/// Returns the number of pages needed to hold `size` bytes.
#[inline]
pub const fn page_count(size: usize) -> usize {
    (size >> PAGE_SHIFT) + if size & (PAGE_SIZE - 1) != 0 { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_small_sizes() {
        assert_eq!(page_round_up(0), Some(0));
        assert_eq!(page_round_up(1), Some(PAGE_SIZE));
        assert_eq!(page_round_up(100), Some(4096));
        assert_eq!(page_round_up(4096), Some(4096));
        assert_eq!(page_round_up(4097), Some(8192));
    }

    #[test]
    fn round_up_overflow() {
        assert_eq!(page_round_up(usize::MAX), None);
        assert_eq!(page_round_up(usize::MAX - PAGE_SIZE + 2), None);
        assert_eq!(
            page_round_up(usize::MAX - PAGE_SIZE + 1),
            Some(usize::MAX - PAGE_SIZE + 1)
        );
    }

    #[test]
    fn page_counts() {
        assert_eq!(page_count(0), 0);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(PAGE_SIZE), 1);
        assert_eq!(page_count(PAGE_SIZE * 3 + 7), 4);
    }
}
