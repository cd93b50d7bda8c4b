//! Shared memory region — `SharedRegion<const SIZE: usize>`.
//!
//! One fixed-size byte array that every core addresses by numeric offset.
//! The region is never grown, allocated or freed by the sort; callers build
//! an image, lend the region to one invocation at a time and read it back.
//!
//! Load/store operations use the outline pattern: the generic wrapper
//! delegates to a non-generic inner function so that only one copy of the
//! bounds-checking logic exists in the binary regardless of how many `SIZE`
//! instantiations are used.
//!
//! Addresses arrive as `u64` words read out of the region itself. An address
//! that does not fit `usize`, or an access that runs past `SIZE`, is
//! `CoreTrap::OutOfBounds`, never a panic.

use crate::{ConstructionError, CoreResult, CoreTrap, WORD_SIZE};

/// Shared region for all cores of one execution environment.
#[derive(Clone)]
pub struct SharedRegion<const SIZE: usize> {
    bytes: [u8; SIZE],
}

impl<const SIZE: usize> SharedRegion<SIZE> {
    /// Create a zero-filled region.
    #[inline(never)]
    pub fn new() -> Self {
        Self { bytes: [0u8; SIZE] }
    }

    /// Create a region whose leading bytes are `image`; the rest is zero.
    ///
    /// # Errors
    /// Returns `ConstructionError::ImageExceedsRegion` if `image.len() > SIZE`.
    pub fn from_image(image: &[u8]) -> Result<Self, ConstructionError> {
        if image.len() > SIZE {
            return Err(ConstructionError::ImageExceedsRegion {
                image: image.len(),
                size: SIZE,
            });
        }
        let mut region = Self::new();
        region.bytes[..image.len()].copy_from_slice(image);
        Ok(region)
    }

    /// Region size in bytes.
    #[inline(always)]
    pub const fn size(&self) -> usize {
        SIZE
    }

    /// Load a little-endian `u64` word (pointer slots).
    #[inline(always)]
    pub fn load_u64(&self, addr: u64) -> CoreResult<u64> {
        load_u64_inner(&self.bytes, addr)
    }

    /// Load a little-endian `i64` word (length scalar, array elements).
    #[inline(always)]
    pub fn load_i64(&self, addr: u64) -> CoreResult<i64> {
        load_u64_inner(&self.bytes, addr).map(|w| w as i64)
    }

    /// Load a single byte.
    #[inline(always)]
    pub fn load_u8(&self, addr: u64) -> CoreResult<u8> {
        load_u8_inner(&self.bytes, addr)
    }

    /// Store a little-endian `u64` word.
    #[inline(always)]
    pub fn store_u64(&mut self, addr: u64, value: u64) -> CoreResult<()> {
        store_u64_inner(&mut self.bytes, addr, value)
    }

    /// Store a little-endian `i64` word.
    #[inline(always)]
    pub fn store_i64(&mut self, addr: u64, value: i64) -> CoreResult<()> {
        store_u64_inner(&mut self.bytes, addr, value as u64)
    }

    /// Store a single byte.
    #[inline(always)]
    pub fn store_u8(&mut self, addr: u64, value: u8) -> CoreResult<()> {
        store_u8_inner(&mut self.bytes, addr, value)
    }

    /// Copy `data` into the region starting at `addr`.
    ///
    /// # Errors
    /// Returns `Err(CoreTrap::OutOfBounds)` if `addr + data.len()` exceeds `SIZE`.
    #[inline(always)]
    pub fn init_data(&mut self, addr: u64, data: &[u8]) -> CoreResult<()> {
        init_data_inner(&mut self.bytes, addr, data)
    }

    /// Read-only view of `len` bytes at `addr`.
    #[inline(always)]
    pub fn bytes(&self, addr: u64, len: usize) -> CoreResult<&[u8]> {
        checked_slice(&self.bytes, addr, len)
    }

    /// Mutable view of `len` bytes at `addr`.
    #[inline(always)]
    pub fn bytes_mut(&mut self, addr: u64, len: usize) -> CoreResult<&mut [u8]> {
        checked_slice_mut(&mut self.bytes, addr, len)
    }

    /// Read-only access to the whole region.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access to the whole region.
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl<const SIZE: usize> Default for SharedRegion<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Bounds-check and return `memory[addr..addr+len]`.
/// Returns `Err(OutOfBounds)` on overflow or out-of-range; never panics.
#[inline(always)]
fn checked_slice(memory: &[u8], addr: u64, len: usize) -> CoreResult<&[u8]> {
    let start = usize::try_from(addr).map_err(|_| CoreTrap::OutOfBounds)?;
    let end = start.checked_add(len).ok_or(CoreTrap::OutOfBounds)?;
    memory.get(start..end).ok_or(CoreTrap::OutOfBounds)
}

/// Mutable variant of `checked_slice`.
#[inline(always)]
fn checked_slice_mut(memory: &mut [u8], addr: u64, len: usize) -> CoreResult<&mut [u8]> {
    let start = usize::try_from(addr).map_err(|_| CoreTrap::OutOfBounds)?;
    let end = start.checked_add(len).ok_or(CoreTrap::OutOfBounds)?;
    memory.get_mut(start..end).ok_or(CoreTrap::OutOfBounds)
}

// ── Non-generic inner functions (outline pattern) ────────────────────
//
// No unwrap(), no indexing, no panic paths.

#[inline(never)]
fn load_u64_inner(memory: &[u8], addr: u64) -> CoreResult<u64> {
    let s = checked_slice(memory, addr, WORD_SIZE)?;
    let word: [u8; WORD_SIZE] = s.try_into().map_err(|_| CoreTrap::OutOfBounds)?;
    Ok(u64::from_le_bytes(word))
}

#[inline(never)]
fn load_u8_inner(memory: &[u8], addr: u64) -> CoreResult<u8> {
    let s = checked_slice(memory, addr, 1)?;
    s.first().copied().ok_or(CoreTrap::OutOfBounds)
}

#[inline(never)]
fn store_u64_inner(memory: &mut [u8], addr: u64, value: u64) -> CoreResult<()> {
    let s = checked_slice_mut(memory, addr, WORD_SIZE)?;
    s.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

#[inline(never)]
fn store_u8_inner(memory: &mut [u8], addr: u64, value: u8) -> CoreResult<()> {
    let s = checked_slice_mut(memory, addr, 1)?;
    if let Some(b) = s.first_mut() {
        *b = value;
    }
    Ok(())
}

#[inline(never)]
fn init_data_inner(memory: &mut [u8], addr: u64, data: &[u8]) -> CoreResult<()> {
    let s = checked_slice_mut(memory, addr, data.len())?;
    s.copy_from_slice(data);
    Ok(())
}


// ── Kani formal verification proofs ──────────────────────────────────
//
// Run with: cargo kani -p coresort-runtime
//
// The proofs establish that every load/store either succeeds or returns
// Err(OutOfBounds), and that a successful access lies inside the region.

#[cfg(kani)]
mod proofs {
    use super::*;

    #[kani::proof]
    #[kani::unwind(1)]
    fn load_u64_never_panics() {
        let region = SharedRegion::<64>::new();
        let addr: u64 = kani::any();
        if region.load_u64(addr).is_ok() {
            kani::assert(addr + WORD_SIZE as u64 <= 64, "load must stay in region");
        }
    }

    #[kani::proof]
    #[kani::unwind(1)]
    fn store_u64_never_panics() {
        let mut region = SharedRegion::<64>::new();
        let addr: u64 = kani::any();
        let value: u64 = kani::any();
        if region.store_u64(addr, value).is_ok() {
            kani::assert(region.load_u64(addr) == Ok(value), "store/load roundtrip");
        }
    }

    #[kani::proof]
    #[kani::unwind(1)]
    fn load_u8_never_panics() {
        let region = SharedRegion::<16>::new();
        let addr: u64 = kani::any();
        let _ = region.load_u8(addr);
    }
}
