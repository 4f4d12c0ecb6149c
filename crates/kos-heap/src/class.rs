//! Size-class index
//!
//! Free chunks are grouped into logarithmic classes: class `k` holds sizes in
//! `[2^k, 2^(k+1) - 1]`. A request is admitted at the smallest class whose
//! minimum size already covers it, so any chunk found at or above that class
//! fits without looking at its exact size.

/// Number of size classes (one per bit of `usize`)
pub const BIN_COUNT: usize = usize::BITS as usize;

/// Returns `floor(log2(n))` for `n >= 1`.
///
/// `n == 0` has no class and maps to 0; callers never pass it.
#[inline]
pub const fn class_of(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    (usize::BITS - 1 - n.leading_zeros()) as usize
}

/// Smallest class whose every chunk holds at least `need` bytes.
///
/// Returns `None` when no class is large enough.
#[inline]
pub const fn admission_class(need: usize) -> Option<usize> {
    if need <= 1 {
        return Some(0);
    }
    let class = class_of(need - 1) + 1;
    if class < BIN_COUNT {
        Some(class)
    } else {
        None
    }
}

/// Inclusive size range `(min, max)` of class `k`.
#[inline]
pub const fn class_range(k: usize) -> (usize, usize) {
    let min = 1usize << k;
    let max = min.wrapping_sub(1).wrapping_add(min);
    (min, max)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every chunk in the admission class is large enough
        #[test]
        fn admission_class_fits(need in 1usize..(1 << 40)) {
            let k = admission_class(need).unwrap();
            let (min, _) = class_range(k);
            prop_assert!(min >= need, "class {} min {} < need {}", k, min, need);
            // and the class below would not be
            if k > 0 {
                let (below, _) = class_range(k - 1);
                prop_assert!(below < need);
            }
        }

        /// Sizes land inside their own class range
        #[test]
        fn class_of_in_range(n in 1usize..usize::MAX) {
            let (min, max) = class_range(class_of(n));
            prop_assert!(min <= n && n <= max);
        }
    }
}
