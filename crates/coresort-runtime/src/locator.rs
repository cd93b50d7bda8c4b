//! Core identification — decoding the opaque identification word.
//!
//! The environment exposes a zero-argument primitive that returns one
//! machine word. Depending on the environment the word is either the core
//! index itself or a packed `(count << 16) | index` pair. `CoreLocator`
//! hides which encoding is in use so the partition derived from the index is
//! the same for both.

/// Mask selecting the core index out of a packed identification word.
pub const INDEX_MASK: u64 = 0xFFFF;

/// Bit position of the active-core count in a packed identification word.
const COUNT_SHIFT: u32 = 16;

/// The external core-identification primitive.
///
/// Implemented for any `FnMut() -> u64`, so a host can hand in a closure
/// around whatever call its environment provides.
pub trait CoreIdSource {
    /// Return the raw identification word for the calling core.
    fn core_id(&mut self) -> u64;
}

impl<F: FnMut() -> u64> CoreIdSource for F {
    fn core_id(&mut self) -> u64 {
        self()
    }
}

/// A source that always reports the same word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCoreId(pub u64);

impl CoreIdSource for FixedCoreId {
    fn core_id(&mut self) -> u64 {
        self.0
    }
}

/// How the identification word is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdEncoding {
    /// The word is the core index, unmasked.
    #[default]
    PlainIndex,
    /// Low 16 bits are the index, the remaining bits the active-core count.
    PackedIndexAndCount,
}

/// Which core is running, resolved once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreIdentity {
    pub index: u64,
    /// Only present for `PackedIndexAndCount`.
    pub active_count: Option<u64>,
}

impl CoreIdentity {
    /// Decode a raw word under `encoding`.
    pub const fn decode(word: u64, encoding: IdEncoding) -> Self {
        match encoding {
            IdEncoding::PlainIndex => Self {
                index: word,
                active_count: None,
            },
            IdEncoding::PackedIndexAndCount => Self {
                index: word & INDEX_MASK,
                active_count: Some(word >> COUNT_SHIFT),
            },
        }
    }
}

/// Resolves a `CoreIdentity` from a `CoreIdSource`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreLocator {
    encoding: IdEncoding,
}

impl CoreLocator {
    pub const fn new(encoding: IdEncoding) -> Self {
        Self { encoding }
    }

    pub const fn encoding(&self) -> IdEncoding {
        self.encoding
    }

    /// Call the primitive exactly once and decode its word.
    ///
    /// No range check happens here: whatever the primitive returns is
    /// authoritative. See `CoreIdentity` consumers for the partition check.
    pub fn resolve<S: CoreIdSource + ?Sized>(&self, source: &mut S) -> CoreIdentity {
        let word = source.core_id();
        let identity = CoreIdentity::decode(word, self.encoding);
        log::debug!(
            "core id word {word:#x} decoded as index {} ({:?})",
            identity.index,
            self.encoding
        );
        identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_index_is_unmasked() {
        let id = CoreIdentity::decode(0x0003_0002, IdEncoding::PlainIndex);
        assert_eq!(id.index, 0x0003_0002);
        assert_eq!(id.active_count, None);
    }

    #[test]
    fn packed_word_splits_index_and_count() {
        let id = CoreIdentity::decode(0x0003_0002, IdEncoding::PackedIndexAndCount);
        assert_eq!(id.index, 2);
        assert_eq!(id.active_count, Some(3));
    }

    #[test]
    fn packed_word_without_count() {
        let id = CoreIdentity::decode(7, IdEncoding::PackedIndexAndCount);
        assert_eq!(id.index, 7);
        assert_eq!(id.active_count, Some(0));
    }

    #[test]
    fn resolve_calls_source_once() {
        let mut calls = 0u32;
        let mut source = || {
            calls += 1;
            2u64
        };
        let id = CoreLocator::new(IdEncoding::PlainIndex).resolve(&mut source);
        assert_eq!(id.index, 2);
        assert_eq!(calls, 1);
    }

    #[test]
    fn fixed_source_and_default_encoding() {
        let locator = CoreLocator::default();
        assert_eq!(locator.encoding(), IdEncoding::PlainIndex);
        let id = locator.resolve(&mut FixedCoreId(5));
        assert_eq!(
            id,
            CoreIdentity {
                index: 5,
                active_count: None
            }
        );
    }
}
