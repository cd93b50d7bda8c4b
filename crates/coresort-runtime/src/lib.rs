//! `coresort-runtime` — per-core indirect sort over a shared memory region.
//!
//! This crate is `#![no_std]`. It provides:
//! - `SharedRegion<const SIZE: usize>`, the fixed-layout byte region every core addresses
//! - `CoreLocator` / `CoreIdentity` for decoding the core-identification word
//! - `RegionPartition` and `CoreStack`, the per-core slice of the region
//! - the indirect bubble sort, over slices and over region-resident arrays
//! - `CoreTrap` / `CoreResult<T>` for precondition faults
//! - the XOR byte-cipher utility that shares the region conventions

#![no_std]

use core::fmt;

mod region;
pub use region::SharedRegion;

mod locator;
pub use locator::{CoreIdSource, CoreIdentity, CoreLocator, FixedCoreId, IdEncoding, INDEX_MASK};

pub mod layout;
pub use layout::{compute_layout, BoundArrays, CoreStack, RegionPartition, MAX_SUPPORTED_CORES};

pub mod sort;
pub use sort::{indirect_sort, sort_in_region, SortStats};

mod invoke;
pub use invoke::{run_indirect_sort, SortOptions, SortReport};

pub mod cipher;
pub use cipher::{xor_in_place, xor_region, XorFrame};

/// Width of one machine word in the shared region (little-endian `i64`/`u64`).
pub const WORD_SIZE: usize = 8;

/// Precondition faults detected while running on a shared region.
///
/// Every fault the bare routine would have turned into undefined behaviour
/// is surfaced here instead. None of these are raised for valid input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreTrap {
    /// Region access out of bounds (unset pointer, truncated region).
    OutOfBounds,
    /// Resolved core index has no reserved stack/pointer-table partition.
    CoreIndexOutOfRange { index: u64, max: usize },
    /// The shared length scalar holds a negative value.
    NegativeLength(i64),
    /// An index-array entry does not address the value array.
    IndexOutOfRange { position: usize, index: i64 },
    /// A working array overlaps the core's stack partition or the region header.
    PartitionOverlap,
    /// XOR cipher invoked with an empty key.
    EmptyKey,
}

/// Result type for region operations: `Result<T, CoreTrap>`.
pub type CoreResult<T> = Result<T, CoreTrap>;

impl fmt::Display for CoreTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreTrap::OutOfBounds => f.write_str("shared region access out of bounds"),
            CoreTrap::CoreIndexOutOfRange { index, max } => {
                write!(f, "core index {index} exceeds the {max} reserved partitions")
            }
            CoreTrap::NegativeLength(len) => write!(f, "negative array length {len}"),
            CoreTrap::IndexOutOfRange { position, index } => {
                write!(f, "index array entry {position} holds {index}, outside the value array")
            }
            CoreTrap::PartitionOverlap => {
                f.write_str("working array overlaps the core stack partition or region header")
            }
            CoreTrap::EmptyKey => f.write_str("xor key must not be empty"),
        }
    }
}

impl core::error::Error for CoreTrap {}

/// Errors that occur while constructing a region.
///
/// These are caller errors in image preparation, not runtime traps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionError {
    /// Image is larger than the region's fixed `SIZE`.
    ImageExceedsRegion { image: usize, size: usize },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::ImageExceedsRegion { image, size } => {
                write!(f, "image of {image} bytes exceeds region size {size}")
            }
        }
    }
}

impl core::error::Error for ConstructionError {}

impl From<ConstructionError> for CoreTrap {
    fn from(_: ConstructionError) -> Self {
        CoreTrap::OutOfBounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_trap_is_copy() {
        let trap = CoreTrap::OutOfBounds;
        let trap2 = trap; // Copy
        assert_eq!(trap, trap2);
    }

    #[test]
    fn core_result_err() {
        let result: CoreResult<u64> = Err(CoreTrap::NegativeLength(-3));
        assert_eq!(result, Err(CoreTrap::NegativeLength(-3)));
    }

    #[test]
    fn construction_error_maps_to_out_of_bounds() {
        let err = ConstructionError::ImageExceedsRegion { image: 10, size: 8 };
        assert_eq!(CoreTrap::from(err), CoreTrap::OutOfBounds);
    }
}
