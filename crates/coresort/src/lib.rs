//! coresort — host side of the per-core indirect sort.
//!
//! Builds shared-region images the way the environment's loader would,
//! runs cores over them with `coresort-runtime`, and reads results back.

pub mod image;
pub mod logger;

pub use anyhow::{Context, Result};
use anyhow::bail;
use coresort_runtime::{
    run_indirect_sort, xor_region, CoreIdSource, FixedCoreId, IdEncoding, SharedRegion,
    SortOptions, SortReport, XorFrame,
};
pub use image::{read_words, SortImage, XorImage};

/// Size of the regions the host tooling works with (64 KiB).
pub const REGION_SIZE: usize = 0x1_0000;

/// The region type used by the CLI and tests.
pub type Region = SharedRegion<REGION_SIZE>;

/// Load a raw little-endian image into a fresh region.
pub fn load_region(image: &[u8]) -> Result<Region> {
    Region::from_image(image).context("image does not fit the shared region")
}

/// Identification word a core would see under `encoding` when `active`
/// cores are running.
pub fn core_id_word(index: u64, active: u64, encoding: IdEncoding) -> u64 {
    match encoding {
        IdEncoding::PlainIndex => index,
        IdEncoding::PackedIndexAndCount => (active << 16) | (index & 0xFFFF),
    }
}

/// Run one core's sort over `region`.
pub fn run_core<S: CoreIdSource + ?Sized>(
    region: &mut Region,
    source: &mut S,
    options: &SortOptions,
) -> Result<SortReport> {
    let report = run_indirect_sort(region, source, options).context("indirect sort trapped")?;
    log::info!(
        "core {}: {} entries, {} passes, {} swaps",
        report.identity.index,
        report.arrays.len,
        report.stats.passes,
        report.stats.swaps
    );
    Ok(report)
}

/// Run cores `0..cores` over `region` one after another and return their reports.
///
/// Each core sees the identification word it would get in the environment,
/// so the packed encoding carries the active-core count.
pub fn run_all_cores(
    region: &mut Region,
    cores: usize,
    options: &SortOptions,
) -> Result<Vec<SortReport>> {
    if cores > options.max_cores {
        bail!(
            "{cores} cores requested but only {} partitions reserved",
            options.max_cores
        );
    }
    (0..cores as u64)
        .map(|index| {
            let word = core_id_word(index, cores as u64, options.encoding);
            run_core(region, &mut FixedCoreId(word), options)
                .with_context(|| format!("core {index} failed"))
        })
        .collect()
}

/// Apply the XOR frame stored in `region`.
pub fn run_xor(region: &mut Region) -> Result<XorFrame> {
    let frame = xor_region(region).context("xor trapped")?;
    log::info!("xor: {} bytes at {:#x}", frame.data_len, frame.data_ptr);
    Ok(frame)
}

/// Parse a lowercase or uppercase hex string, ignoring an optional `0x`.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits = text.trim().trim_start_matches("0x");
    if !digits.is_ascii() {
        bail!("hex string {text:?} contains non-ASCII characters");
    }
    if digits.len() % 2 != 0 {
        bail!("hex string {text:?} has an odd number of digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect()
}

/// Format bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
