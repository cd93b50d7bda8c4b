//! Repeating-key XOR over a byte buffer.
//!
//! Stateless: `data[i] ^= key[i % key.len()]`. Applying it twice with the
//! same key restores the input. The region form reads its arguments from a
//! frame of four words at [`XOR_FRAME_BASE`].

use crate::{CoreResult, CoreTrap, SharedRegion, WORD_SIZE};

/// Address of the XOR argument frame.
pub const XOR_FRAME_BASE: u64 = 0x10;

/// Longest key the region form accepts.
pub const MAX_KEY_LEN: usize = 256;

/// XOR `data` in place with `key`, repeating the key as needed.
///
/// # Errors
/// `CoreTrap::EmptyKey` if `key` is empty; `data` is untouched.
pub fn xor_in_place(data: &mut [u8], key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreTrap::EmptyKey);
    }
    for (byte, k) in data.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
    Ok(())
}

/// Arguments of a region-resident XOR call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorFrame {
    pub data_ptr: u64,
    pub data_len: u64,
    pub key_ptr: u64,
    pub key_len: u64,
}

impl XorFrame {
    /// Read the frame: data pointer, data length, key pointer, key length.
    pub fn read<const SIZE: usize>(region: &SharedRegion<SIZE>) -> CoreResult<Self> {
        let word = |n: u64| region.load_u64(XOR_FRAME_BASE + n * WORD_SIZE as u64);
        Ok(Self {
            data_ptr: word(0)?,
            data_len: word(1)?,
            key_ptr: word(2)?,
            key_len: word(3)?,
        })
    }

    /// Write the frame back, for image preparation.
    pub fn write<const SIZE: usize>(&self, region: &mut SharedRegion<SIZE>) -> CoreResult<()> {
        let words = [self.data_ptr, self.data_len, self.key_ptr, self.key_len];
        for (n, w) in words.into_iter().enumerate() {
            region.store_u64(XOR_FRAME_BASE + (n * WORD_SIZE) as u64, w)?;
        }
        Ok(())
    }
}

fn span_len(len: u64) -> CoreResult<usize> {
    usize::try_from(len).map_err(|_| CoreTrap::OutOfBounds)
}

/// Run the XOR described by the frame in `region`.
///
/// The key is copied out before the data is borrowed, so the two buffers
/// may overlap.
///
/// # Errors
/// `CoreTrap::EmptyKey` for a zero key length, `CoreTrap::OutOfBounds` if
/// either buffer leaves the region or the key exceeds `MAX_KEY_LEN`.
pub fn xor_region<const SIZE: usize>(region: &mut SharedRegion<SIZE>) -> CoreResult<XorFrame> {
    let frame = XorFrame::read(region)?;
    if frame.key_len == 0 {
        return Err(CoreTrap::EmptyKey);
    }
    let key_len = span_len(frame.key_len)?;
    if key_len > MAX_KEY_LEN {
        return Err(CoreTrap::OutOfBounds);
    }
    let mut key = [0u8; MAX_KEY_LEN];
    key[..key_len].copy_from_slice(region.bytes(frame.key_ptr, key_len)?);

    let data = region.bytes_mut(frame.data_ptr, span_len(frame.data_len)?)?;
    xor_in_place(data, &key[..key_len])?;
    log::debug!(
        "xor {} bytes at {:#x} with {key_len}-byte key",
        frame.data_len,
        frame.data_ptr
    );
    Ok(frame)
}
