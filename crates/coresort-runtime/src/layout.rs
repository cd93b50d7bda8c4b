//! Per-core partition of the shared region.
//!
//! ```text
//!  0x00 ┌──────────────────────────────┐
//!  0x08 │ len (shared by every core)   │
//!  0x10 │ core 0: indices ptr          │
//!  0x18 │ core 0: values ptr           │
//!  0x20 │ core 1: indices ptr          │
//!   ... │ ... 16 bytes per core        │
//!       │                              │
//!       │ core n-1 stack               │
//!   ... │ ...                          │
//! 0x1E00│ core 1 stack   (grows down)  │
//! 0x1F00│ core 0 stack   (grows down)  │
//! 0x2000└──────────────────────────────┘ STACK_TOP
//! ```
//!
//! Everything here is pure address arithmetic; reading the pointer table
//! happens in `RegionPartition::bind`.

use crate::{CoreIdentity, CoreResult, CoreTrap, SharedRegion, WORD_SIZE};

/// Highest stack address; core 0's stack starts here and grows down.
pub const STACK_TOP: u64 = 0x2000;
/// Bytes of stack reserved per core.
pub const STACK_STRIDE: u64 = 0x100;
/// Absolute address of the array length shared by every core.
pub const LENGTH_OFFSET: u64 = 0x08;
/// First byte of the per-core pointer table.
pub const PTR_TABLE_BASE: u64 = 0x10;
/// Width of one pointer-table entry (indices ptr + values ptr).
pub const PTR_ENTRY_SIZE: u64 = 2 * WORD_SIZE as u64;

/// Number of cores whose stack partition stays clear of the pointer table.
///
/// Core `n - 1` owns `[STACK_TOP - n * STACK_STRIDE, ...)` and the table
/// ends at `PTR_TABLE_BASE + n * PTR_ENTRY_SIZE`; the largest `n` for which
/// the two do not meet.
pub const MAX_SUPPORTED_CORES: usize =
    ((STACK_TOP - PTR_TABLE_BASE) / (STACK_STRIDE + PTR_ENTRY_SIZE)) as usize;

/// Addresses owned by one core, derived only from its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionPartition {
    /// Top of the core's private stack (exclusive).
    pub stack_base: u64,
    /// Address of the shared length scalar.
    pub length_ptr: u64,
    /// Address of the slot holding the index-array pointer.
    pub indices_slot: u64,
    /// Address of the slot holding the value-array pointer.
    pub values_slot: u64,
}

/// Compute the partition for `identity`.
///
/// Performs no range check; an index past `MAX_SUPPORTED_CORES` yields
/// addresses that collide with other partitions (or wrap). Callers validate
/// with `ensure_supported` first.
pub const fn compute_layout(identity: CoreIdentity) -> RegionPartition {
    let index = identity.index;
    let core_offset = index.wrapping_shl(3);
    let displacement = core_offset.wrapping_shl(1);
    RegionPartition {
        stack_base: STACK_TOP.wrapping_sub(index.wrapping_mul(STACK_STRIDE)),
        length_ptr: LENGTH_OFFSET,
        indices_slot: PTR_TABLE_BASE.wrapping_add(displacement),
        values_slot: PTR_TABLE_BASE
            .wrapping_add(WORD_SIZE as u64)
            .wrapping_add(displacement),
    }
}

/// Reject an identity that has no reserved partition.
pub fn ensure_supported(identity: CoreIdentity, max_cores: usize) -> CoreResult<()> {
    let max = max_cores.min(MAX_SUPPORTED_CORES);
    if identity.index >= max as u64 {
        log::warn!("core index {} has no reserved partition (max {max})", identity.index);
        return Err(CoreTrap::CoreIndexOutOfRange {
            index: identity.index,
            max,
        });
    }
    Ok(())
}

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub(crate) fn words(start: u64, count: u64) -> CoreResult<Self> {
        let bytes = count
            .checked_mul(WORD_SIZE as u64)
            .ok_or(CoreTrap::OutOfBounds)?;
        let end = start.checked_add(bytes).ok_or(CoreTrap::OutOfBounds)?;
        Ok(Self { start, end })
    }

    pub(crate) fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The core's private stack partition, carved out of the region.
///
/// Holds the sort's scratch slot. Established once per invocation, before
/// any other stack-using work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreStack {
    base: u64,
    limit: u64,
}

impl CoreStack {
    /// Claim `[stack_base - STACK_STRIDE, stack_base)` inside `region`.
    pub fn establish<const SIZE: usize>(
        partition: &RegionPartition,
        region: &SharedRegion<SIZE>,
    ) -> CoreResult<Self> {
        let limit = partition
            .stack_base
            .checked_sub(STACK_STRIDE)
            .ok_or(CoreTrap::OutOfBounds)?;
        // The whole partition must be addressable, not just the top word.
        region.bytes(limit, STACK_STRIDE as usize)?;
        Ok(Self {
            base: partition.stack_base,
            limit,
        })
    }

    /// Top of the stack (exclusive).
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Lowest address owned by this stack.
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// The first word below the base, used as the swap slot.
    pub const fn scratch_slot(&self) -> u64 {
        self.base - WORD_SIZE as u64
    }

    pub(crate) fn span(&self) -> Span {
        Span {
            start: self.limit,
            end: self.base,
        }
    }
}

/// Arrays a core works on, read out of its pointer-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundArrays {
    pub len: u64,
    pub indices: u64,
    pub values: u64,
}

impl RegionPartition {
    /// Read the length scalar and the two pointers from `region`.
    ///
    /// A negative length traps instead of being treated as an empty array.
    pub fn bind<const SIZE: usize>(&self, region: &SharedRegion<SIZE>) -> CoreResult<BoundArrays> {
        let len = region.load_i64(self.length_ptr)?;
        if len < 0 {
            log::warn!("shared length is negative ({len})");
            return Err(CoreTrap::NegativeLength(len));
        }
        Ok(BoundArrays {
            len: len as u64,
            indices: region.load_u64(self.indices_slot)?,
            values: region.load_u64(self.values_slot)?,
        })
    }

    /// Bytes of the region header this core reads: the length scalar and
    /// its own pointer-table entry.
    fn header_spans(&self) -> [Span; 2] {
        [
            Span {
                start: self.length_ptr,
                end: self.length_ptr.saturating_add(WORD_SIZE as u64),
            },
            Span {
                start: self.indices_slot,
                end: self.values_slot.saturating_add(WORD_SIZE as u64),
            },
        ]
    }
}

/// Pointer-table entries and stack partitions of the first `max_cores` cores.
fn reserved_bands(max_cores: usize) -> [Span; 2] {
    let cores = max_cores.min(MAX_SUPPORTED_CORES) as u64;
    [
        Span {
            start: PTR_TABLE_BASE,
            end: PTR_TABLE_BASE + cores * PTR_ENTRY_SIZE,
        },
        Span {
            start: STACK_TOP - cores * STACK_STRIDE,
            end: STACK_TOP,
        },
    ]
}

impl BoundArrays {
    /// Check that both arrays lie inside the region and neither touches the
    /// stack partition or the header words the core reads. The index array
    /// must also not alias the value array, since it is written during the
    /// sort.
    ///
    /// The index array is additionally kept out of every reserved pointer
    /// entry and stack partition of the first `max_cores` cores.
    pub fn validate<const SIZE: usize>(
        &self,
        partition: &RegionPartition,
        stack: &CoreStack,
        max_cores: usize,
        region: &SharedRegion<SIZE>,
    ) -> CoreResult<()> {
        let indices = Span::words(self.indices, self.len)?;
        let values = Span::words(self.values, self.len)?;
        if indices.is_empty() {
            return Ok(());
        }
        for span in [indices, values] {
            region.bytes(span.start, (span.end - span.start) as usize)?;
        }

        let stack = stack.span();
        let [length, entry] = partition.header_spans();
        let reserved = [stack, length, entry];
        let clashes = reserved
            .iter()
            .any(|r| indices.overlaps(r) || values.overlaps(r))
            || indices.overlaps(&values)
            || reserved_bands(max_cores).iter().any(|band| indices.overlaps(band));
        if clashes {
            log::warn!(
                "arrays at {:#x}/{:#x} (len {}) overlap a reserved partition (own stack {:#x})",
                self.indices,
                self.values,
                self.len,
                stack.end
            );
            return Err(CoreTrap::PartitionOverlap);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdEncoding;

    fn plain(index: u64) -> CoreIdentity {
        CoreIdentity::decode(index, IdEncoding::PlainIndex)
    }

    #[test]
    fn core_zero_layout() {
        let p = compute_layout(plain(0));
        assert_eq!(p.stack_base, 0x2000);
        assert_eq!(p.length_ptr, 0x08);
        assert_eq!(p.indices_slot, 0x10);
        assert_eq!(p.values_slot, 0x18);
    }

    #[test]
    fn core_two_layout() {
        let p = compute_layout(plain(2));
        assert_eq!(p.stack_base, 0x1E00);
        assert_eq!(p.indices_slot, 0x30);
        assert_eq!(p.values_slot, 0x38);
    }

    #[test]
    fn packed_and_plain_agree() {
        let packed = CoreIdentity::decode(0x0003_0002, IdEncoding::PackedIndexAndCount);
        assert_eq!(compute_layout(packed), compute_layout(plain(2)));
    }

    #[test]
    fn max_supported_cores_is_thirty() {
        assert_eq!(MAX_SUPPORTED_CORES, 30);
        let last = compute_layout(plain(MAX_SUPPORTED_CORES as u64 - 1));
        let table_end = PTR_TABLE_BASE + MAX_SUPPORTED_CORES as u64 * PTR_ENTRY_SIZE;
        assert!(last.stack_base - STACK_STRIDE >= table_end);
    }

    #[test]
    fn partitions_are_pairwise_disjoint() {
        for a in 0..MAX_SUPPORTED_CORES as u64 {
            for b in 0..MAX_SUPPORTED_CORES as u64 {
                if a == b {
                    continue;
                }
                let pa = compute_layout(plain(a));
                let pb = compute_layout(plain(b));
                let sa = Span {
                    start: pa.stack_base - STACK_STRIDE,
                    end: pa.stack_base,
                };
                let sb = Span {
                    start: pb.stack_base - STACK_STRIDE,
                    end: pb.stack_base,
                };
                assert!(!sa.overlaps(&sb), "stacks {a} and {b} overlap");
                assert!(!pa.header_spans()[1].overlaps(&pb.header_spans()[1]));
                assert!(!sa.overlaps(&pb.header_spans()[1]));
            }
        }
    }

    #[test]
    fn ensure_supported_bounds() {
        assert!(ensure_supported(plain(3), 4).is_ok());
        assert_eq!(
            ensure_supported(plain(4), 4),
            Err(CoreTrap::CoreIndexOutOfRange { index: 4, max: 4 })
        );
        // The structural limit caps a larger configured count.
        assert_eq!(
            ensure_supported(plain(30), 64),
            Err(CoreTrap::CoreIndexOutOfRange { index: 30, max: 30 })
        );
    }

    #[test]
    fn stack_establish_and_scratch() {
        let region = SharedRegion::<0x2000>::new();
        let stack = CoreStack::establish(&compute_layout(plain(2)), &region).unwrap();
        assert_eq!(stack.base(), 0x1E00);
        assert_eq!(stack.limit(), 0x1D00);
        assert_eq!(stack.scratch_slot(), 0x1DF8);
    }

    #[test]
    fn stack_outside_region_traps() {
        let region = SharedRegion::<0x1000>::new();
        assert_eq!(
            CoreStack::establish(&compute_layout(plain(0)), &region),
            Err(CoreTrap::OutOfBounds)
        );
    }

    #[test]
    fn bind_reads_pointer_entry() {
        let mut region = SharedRegion::<0x2100>::new();
        region.store_i64(LENGTH_OFFSET, 4).unwrap();
        region.store_u64(0x30, 0x2000).unwrap();
        region.store_u64(0x38, 0x2040).unwrap();
        let arrays = compute_layout(plain(2)).bind(&region).unwrap();
        assert_eq!(
            arrays,
            BoundArrays {
                len: 4,
                indices: 0x2000,
                values: 0x2040
            }
        );
    }

    #[test]
    fn bind_rejects_negative_length() {
        let mut region = SharedRegion::<0x2000>::new();
        region.store_i64(LENGTH_OFFSET, -1).unwrap();
        assert_eq!(
            compute_layout(plain(0)).bind(&region),
            Err(CoreTrap::NegativeLength(-1))
        );
    }

    #[test]
    fn validate_rejects_array_in_stack() {
        let region = SharedRegion::<0x2100>::new();
        let partition = compute_layout(plain(0));
        let stack = CoreStack::establish(&partition, &region).unwrap();
        let arrays = BoundArrays {
            len: 4,
            indices: 0x1FF0,
            values: 0x2040,
        };
        assert_eq!(
            arrays.validate(&partition, &stack, MAX_SUPPORTED_CORES, &region),
            Err(CoreTrap::PartitionOverlap)
        );
    }

    #[test]
    fn validate_rejects_aliased_arrays() {
        let region = SharedRegion::<0x2100>::new();
        let partition = compute_layout(plain(0));
        let stack = CoreStack::establish(&partition, &region).unwrap();
        let arrays = BoundArrays {
            len: 4,
            indices: 0x2000,
            values: 0x2010,
        };
        assert_eq!(
            arrays.validate(&partition, &stack, MAX_SUPPORTED_CORES, &region),
            Err(CoreTrap::PartitionOverlap)
        );
    }

    #[test]
    fn validate_rejects_array_past_region() {
        let region = SharedRegion::<0x2100>::new();
        let partition = compute_layout(plain(0));
        let stack = CoreStack::establish(&partition, &region).unwrap();
        let arrays = BoundArrays {
            len: 4,
            indices: 0x2000,
            values: 0x20F0,
        };
        assert_eq!(
            arrays.validate(&partition, &stack, MAX_SUPPORTED_CORES, &region),
            Err(CoreTrap::OutOfBounds)
        );
    }

    #[test]
    fn validate_keeps_indices_out_of_other_cores_partitions() {
        let region = SharedRegion::<0x2100>::new();
        let partition = compute_layout(plain(0));
        let stack = CoreStack::establish(&partition, &region).unwrap();
        let in_table = BoundArrays {
            len: 1,
            indices: 0x20,
            values: 0x2000,
        };
        let in_stack = BoundArrays {
            len: 1,
            indices: 0x1EF0,
            values: 0x2000,
        };
        for arrays in [in_table, in_stack] {
            assert_eq!(
                arrays.validate(&partition, &stack, MAX_SUPPORTED_CORES, &region),
                Err(CoreTrap::PartitionOverlap)
            );
        }
        // Only reserved partitions are protected.
        assert!(in_stack.validate(&partition, &stack, 1, &region).is_ok());
    }

    #[test]
    fn reserved_bands_follow_max_cores() {
        let [table, stacks] = reserved_bands(2);
        assert_eq!((table.start, table.end), (0x10, 0x30));
        assert_eq!((stacks.start, stacks.end), (0x1E00, 0x2000));
        let [table, _] = reserved_bands(usize::MAX);
        assert_eq!(table.end, PTR_TABLE_BASE + MAX_SUPPORTED_CORES as u64 * PTR_ENTRY_SIZE);
    }

    #[test]
    fn validate_accepts_empty_arrays_with_unset_pointers() {
        let region = SharedRegion::<0x2000>::new();
        let partition = compute_layout(plain(0));
        let stack = CoreStack::establish(&partition, &region).unwrap();
        let arrays = BoundArrays {
            len: 0,
            indices: 0,
            values: 0,
        };
        assert!(arrays.validate(&partition, &stack, MAX_SUPPORTED_CORES, &region).is_ok());
    }
}

#[cfg(kani)]
mod proofs {
    use super::*;
    use crate::IdEncoding;

    fn stack_span(p: &RegionPartition) -> Span {
        Span {
            start: p.stack_base - STACK_STRIDE,
            end: p.stack_base,
        }
    }

    fn entry_span(p: &RegionPartition) -> Span {
        Span {
            start: p.indices_slot,
            end: p.values_slot + WORD_SIZE as u64,
        }
    }

    #[kani::proof]
    #[kani::unwind(1)]
    fn supported_partitions_are_disjoint() {
        let a: u64 = kani::any();
        let b: u64 = kani::any();
        kani::assume(a < MAX_SUPPORTED_CORES as u64);
        kani::assume(b < MAX_SUPPORTED_CORES as u64);
        kani::assume(a != b);
        let pa = compute_layout(CoreIdentity::decode(a, IdEncoding::PlainIndex));
        let pb = compute_layout(CoreIdentity::decode(b, IdEncoding::PlainIndex));

        kani::assert(!stack_span(&pa).overlaps(&stack_span(&pb)), "stacks disjoint");
        kani::assert(!entry_span(&pa).overlaps(&entry_span(&pb)), "entries disjoint");
        kani::assert(!stack_span(&pa).overlaps(&entry_span(&pb)), "stack clear of table");
        kani::assert(pa.length_ptr == pb.length_ptr, "length is shared");
    }
}
