//! One core's invocation: identify, partition, sort.

use crate::layout::{self, BoundArrays, CoreStack, RegionPartition, MAX_SUPPORTED_CORES};
use crate::sort::{sort_in_region, SortStats};
use crate::{CoreIdSource, CoreIdentity, CoreLocator, CoreResult, IdEncoding, SharedRegion};

/// Configuration for [`run_indirect_sort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOptions {
    /// How the identification word is decoded.
    pub encoding: IdEncoding,
    /// Number of partitions the caller reserved. Capped at `MAX_SUPPORTED_CORES`.
    pub max_cores: usize,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            encoding: IdEncoding::PlainIndex,
            max_cores: MAX_SUPPORTED_CORES,
        }
    }
}

/// What one invocation resolved and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortReport {
    pub identity: CoreIdentity,
    pub partition: RegionPartition,
    pub arrays: BoundArrays,
    pub stats: SortStats,
}

/// Run the indirect sort for whichever core `source` identifies.
///
/// The identification primitive is called exactly once, before anything
/// touches the region. The core's stack partition is established next, then
/// the length and array pointers are read and checked, and the sort runs to
/// completion.
///
/// # Errors
/// Any `CoreTrap` raised by the precondition checks or by a region access.
/// Precondition traps are raised before the index array is written.
pub fn run_indirect_sort<const SIZE: usize, S: CoreIdSource + ?Sized>(
    region: &mut SharedRegion<SIZE>,
    source: &mut S,
    options: &SortOptions,
) -> CoreResult<SortReport> {
    let identity = CoreLocator::new(options.encoding).resolve(source);
    layout::ensure_supported(identity, options.max_cores)?;

    let partition = layout::compute_layout(identity);
    let stack = CoreStack::establish(&partition, region)?;
    log::debug!(
        "core {}: stack {:#x}..{:#x}, pointer entry {:#x}",
        identity.index,
        stack.limit(),
        stack.base(),
        partition.indices_slot
    );

    let arrays = partition.bind(region)?;
    arrays.validate(&partition, &stack, options.max_cores, region)?;

    let stats = sort_in_region(region, &arrays, &stack)?;
    log::debug!(
        "core {}: sorted {} entries with {} swaps",
        identity.index,
        arrays.len,
        stats.swaps
    );

    Ok(SortReport {
        identity,
        partition,
        arrays,
        stats,
    })
}
