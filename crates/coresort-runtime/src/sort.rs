//! Indirect bubble sort.
//!
//! The value array is never moved: only the index array is permuted, so that
//! afterwards `values[indices[0]] <= values[indices[1]] <= ...`. Adjacent
//! entries are swapped only on a strict `>`, which keeps equal keys in their
//! original relative order.
//!
//! Two entry points share the same pass structure:
//! - [`indirect_sort`] over ordinary slices
//! - [`sort_in_region`] over `i64` arrays that live in a `SharedRegion`, with
//!   the swap temporary held in the core's stack partition
//!
//! Both validate every index before the first comparison, so an index array
//! that does not address the value array is a trap rather than an
//! out-of-bounds read.

use crate::layout::BoundArrays;
use crate::{CoreResult, CoreStack, CoreTrap, SharedRegion, WORD_SIZE};

/// Work done by one sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    pub passes: u64,
    pub comparisons: u64,
    pub swaps: u64,
}

/// Sort `indices` so that `values[indices[k]]` is non-decreasing in `k`.
///
/// `len` is `indices.len()`. `values` may be longer than `indices`, but every
/// entry of `indices` must be `< values.len()`.
///
/// # Errors
/// `CoreTrap::IndexOutOfRange` for the first entry that does not address
/// `values`; `indices` is left untouched in that case.
pub fn indirect_sort<T: PartialOrd>(indices: &mut [usize], values: &[T]) -> CoreResult<SortStats> {
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|&(_, &index)| index >= values.len())
    {
        return Err(CoreTrap::IndexOutOfRange {
            position,
            index: index as i64,
        });
    }

    let len = indices.len();
    let mut stats = SortStats::default();
    // `saturating_sub` keeps `len == 0` from wrapping into a huge pass count.
    for i in 0..len.saturating_sub(1) {
        stats.passes += 1;
        for j in 0..len - i - 1 {
            stats.comparisons += 1;
            // Indices were validated above.
            if values[indices[j]] > values[indices[j + 1]] {
                indices.swap(j, j + 1);
                stats.swaps += 1;
            }
        }
    }
    Ok(stats)
}

/// Address of word `k` of the array starting at `base`.
#[inline(always)]
fn word_addr(base: u64, k: u64) -> CoreResult<u64> {
    k.checked_mul(WORD_SIZE as u64)
        .and_then(|off| base.checked_add(off))
        .ok_or(CoreTrap::OutOfBounds)
}

#[inline(always)]
fn load_value<const SIZE: usize>(
    region: &SharedRegion<SIZE>,
    arrays: &BoundArrays,
    index: i64,
) -> CoreResult<i64> {
    region.load_i64(word_addr(arrays.values, index as u64)?)
}

/// Sort the region-resident arrays described by `arrays`.
///
/// Index and value words are signed 64-bit little-endian. The swap goes
/// through `stack.scratch_slot()`.
///
/// # Errors
/// - `CoreTrap::IndexOutOfRange` if an index is negative or `>= len`
/// - `CoreTrap::OutOfBounds` if either array leaves the region
pub fn sort_in_region<const SIZE: usize>(
    region: &mut SharedRegion<SIZE>,
    arrays: &BoundArrays,
    stack: &CoreStack,
) -> CoreResult<SortStats> {
    let len = arrays.len;
    for k in 0..len {
        let index = region.load_i64(word_addr(arrays.indices, k)?)?;
        if index < 0 || index as u64 >= len {
            log::warn!("index array entry {k} holds {index}, len is {len}");
            return Err(CoreTrap::IndexOutOfRange {
                position: k as usize,
                index,
            });
        }
    }

    let scratch = stack.scratch_slot();
    let mut stats = SortStats::default();
    for i in 0..len.saturating_sub(1) {
        stats.passes += 1;
        let mut pass_swaps = 0u64;
        for j in 0..len - i - 1 {
            let left_addr = word_addr(arrays.indices, j)?;
            let right_addr = word_addr(arrays.indices, j + 1)?;
            let left = region.load_i64(left_addr)?;
            let right = region.load_i64(right_addr)?;
            stats.comparisons += 1;
            if load_value(region, arrays, left)? > load_value(region, arrays, right)? {
                region.store_i64(scratch, left)?;
                region.store_i64(left_addr, right)?;
                let tmp = region.load_i64(scratch)?;
                region.store_i64(right_addr, tmp)?;
                pass_swaps += 1;
            }
        }
        log::trace!("pass {i}: {pass_swaps} swaps");
        stats.swaps += pass_swaps;
    }
    Ok(stats)
}


#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: for any three values the result is ordered and a permutation.
    #[kani::proof]
    #[kani::unwind(4)]
    fn three_element_sort_is_ordered() {
        let values: [i8; 3] = kani::any();
        let mut indices = [0usize, 1, 2];
        let stats = indirect_sort(&mut indices, &values);
        kani::assert(stats.is_ok(), "valid permutation never traps");
        kani::assert(
            values[indices[0]] <= values[indices[1]] && values[indices[1]] <= values[indices[2]],
            "indices order the values",
        );
        kani::assert(
            indices[0] + indices[1] + indices[2] == 3 && indices[0] != indices[1],
            "indices remain a permutation",
        );
    }
}
