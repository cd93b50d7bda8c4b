//! Region image builders.
//!
//! The environment's loader writes the length scalar, the pointer table and
//! every core's arrays before any core starts. `SortImage` reproduces that
//! layout; `XorImage` does the same for the XOR argument frame.
//!
//! Arrays are placed from `STACK_TOP` upward so they never meet a stack
//! partition: core `c` gets its index array followed by its value array.

use anyhow::{bail, ensure, Context, Result};
use coresort_runtime::cipher::XOR_FRAME_BASE;
use coresort_runtime::layout::{compute_layout, LENGTH_OFFSET, STACK_TOP};
use coresort_runtime::{
    CoreIdentity, IdEncoding, SharedRegion, XorFrame, MAX_SUPPORTED_CORES, WORD_SIZE,
};

/// First byte after the XOR frame; data and key are placed from here.
const XOR_DATA_BASE: u64 = XOR_FRAME_BASE + 4 * WORD_SIZE as u64;

/// Per-core value arrays to lay out in a region.
#[derive(Debug, Clone, Default)]
pub struct SortImage {
    cores: Vec<Vec<i64>>,
}

impl SortImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the value array for the next core index.
    pub fn with_core(mut self, values: Vec<i64>) -> Self {
        self.cores.push(values);
        self
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Shared array length; every core must agree on it.
    pub fn len(&self) -> Result<usize> {
        let Some(first) = self.cores.first() else {
            return Ok(0);
        };
        for (index, values) in self.cores.iter().enumerate() {
            ensure!(
                values.len() == first.len(),
                "core {index} has {} values but core 0 has {}; the length is shared",
                values.len(),
                first.len()
            );
        }
        Ok(first.len())
    }

    pub fn is_empty(&self) -> bool {
        self.cores.iter().all(Vec::is_empty)
    }

    /// Where core `index` finds its index and value arrays.
    pub fn array_addresses(&self, index: usize) -> Result<(u64, u64)> {
        let bytes = (self.len()? * WORD_SIZE) as u64;
        let indices = STACK_TOP + index as u64 * 2 * bytes;
        Ok((indices, indices + bytes))
    }

    /// Write the image into a zeroed region of `SIZE` bytes.
    pub fn build<const SIZE: usize>(&self) -> Result<SharedRegion<SIZE>> {
        if self.cores.len() > MAX_SUPPORTED_CORES {
            bail!(
                "{} cores requested, at most {} partitions fit",
                self.cores.len(),
                MAX_SUPPORTED_CORES
            );
        }
        let len = self.len()?;
        let mut region = SharedRegion::<SIZE>::new();
        region
            .store_i64(LENGTH_OFFSET, len as i64)
            .context("length scalar outside region")?;

        for (index, values) in self.cores.iter().enumerate() {
            let partition = compute_layout(CoreIdentity::decode(
                index as u64,
                IdEncoding::PlainIndex,
            ));
            let (indices_addr, values_addr) = self.array_addresses(index)?;
            region
                .store_u64(partition.indices_slot, indices_addr)
                .and_then(|()| region.store_u64(partition.values_slot, values_addr))
                .with_context(|| format!("pointer entry of core {index} outside region"))?;

            for (k, &value) in values.iter().enumerate() {
                let offset = (k * WORD_SIZE) as u64;
                region
                    .store_i64(indices_addr + offset, k as i64)
                    .and_then(|()| region.store_i64(values_addr + offset, value))
                    .with_context(|| {
                        format!("arrays of core {index} do not fit a {}-byte region", SIZE)
                    })?;
            }
        }
        log::debug!(
            "built image: {} cores, len {len}, data ends at {:#x}",
            self.cores.len(),
            self.array_addresses(self.cores.len())?.0
        );
        Ok(region)
    }
}

/// Read `count` consecutive `i64` words starting at `addr`.
pub fn read_words<const SIZE: usize>(
    region: &SharedRegion<SIZE>,
    addr: u64,
    count: u64,
) -> Result<Vec<i64>> {
    (0..count)
        .map(|k| {
            region
                .load_i64(addr + k * WORD_SIZE as u64)
                .with_context(|| format!("word {k} of array at {addr:#x} outside region"))
        })
        .collect()
}

/// Data and key for one region-resident XOR call.
#[derive(Debug, Clone)]
pub struct XorImage {
    pub data: Vec<u8>,
    pub key: Vec<u8>,
}

impl XorImage {
    /// The frame this image writes: data right after the frame, key after the data.
    pub fn frame(&self) -> XorFrame {
        let data_ptr = XOR_DATA_BASE;
        XorFrame {
            data_ptr,
            data_len: self.data.len() as u64,
            key_ptr: data_ptr + self.data.len() as u64,
            key_len: self.key.len() as u64,
        }
    }

    pub fn build<const SIZE: usize>(&self) -> Result<SharedRegion<SIZE>> {
        let frame = self.frame();
        let mut region = SharedRegion::<SIZE>::new();
        frame.write(&mut region).context("xor frame outside region")?;
        region
            .init_data(frame.data_ptr, &self.data)
            .and_then(|()| region.init_data(frame.key_ptr, &self.key))
            .with_context(|| format!("xor buffers do not fit a {}-byte region", SIZE))?;
        Ok(region)
    }
}
