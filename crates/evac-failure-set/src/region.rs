//! Region descriptors and the region-relative offset encoding.
//!
//! An object that failed evacuation is stored as the number of heap words
//! between the bottom of its region and the object start. Regions are at most
//! [`MAX_GRAIN_BYTES`] large, so every such offset fits in an
//! [`OffsetInRegion`].

use crate::address::{Address, HEAP_WORD_SIZE};

/// Word offset of an object from the bottom of its region.
pub type OffsetInRegion = u32;

/// Largest supported region size in bytes (`log2 < 32`).
pub const MAX_GRAIN_BYTES: usize = 1 << 31;

/// Largest supported region size in heap words.
pub const MAX_GRAIN_WORDS: usize = MAX_GRAIN_BYTES / HEAP_WORD_SIZE;

/// The two immutable facts about a heap region needed to encode offsets,
/// plus its index for diagnostics.
///
/// This is a value copy taken when the region is prepared for evacuation; it
/// does not keep the region itself alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDescriptor {
    index: u32,
    bottom: Address,
    grain_words: usize,
}

impl RegionDescriptor {
    /// Describe region `index` starting at `bottom` and spanning
    /// `grain_words` heap words.
    ///
    /// # Panics
    ///
    /// Panics if `grain_words` is zero or above [`MAX_GRAIN_WORDS`], if
    /// `bottom` is not word aligned, or if the region would wrap the address
    /// space.
    #[must_use]
    pub fn new(index: u32, bottom: Address, grain_words: usize) -> Self {
        assert!(grain_words > 0, "region must span at least one word");
        assert!(
            grain_words <= MAX_GRAIN_WORDS,
            "region of {grain_words} words exceeds the offset range ({MAX_GRAIN_WORDS} words)"
        );
        assert!(
            bottom.is_word_aligned(),
            "region bottom {bottom} is not word aligned"
        );
        assert!(
            bottom
                .as_usize()
                .checked_add(grain_words * HEAP_WORD_SIZE)
                .is_some(),
            "region at {bottom} wraps the address space"
        );
        Self {
            index,
            bottom,
            grain_words,
        }
    }

    /// Index of the region in the heap's region table.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// First address of the region.
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> Address {
        self.bottom
    }

    /// Size of the region in heap words.
    #[inline]
    #[must_use]
    pub const fn grain_words(&self) -> usize {
        self.grain_words
    }

    /// One past the last address of the region.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Address {
        self.bottom.offset_words(self.grain_words)
    }

    /// Whether `addr` lies in `[bottom, end)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.bottom && addr < self.end()
    }

    /// Encode an object start as a word offset from the region bottom.
    ///
    /// The address must be word aligned and inside the region; this is
    /// verified when `gc_assert!` is active.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_offset(&self, addr: Address) -> OffsetInRegion {
        gc_assert!(
            self.contains(addr),
            "object {} outside region {} [{}, {})",
            addr,
            self.index,
            self.bottom,
            self.end()
        );
        gc_assert!(addr.is_word_aligned(), "object {} is not word aligned", addr);
        let offset = addr.word_delta(self.bottom) as OffsetInRegion;
        gc_assert!(
            self.from_offset(offset) == addr,
            "offset encoding of {} does not round trip",
            addr
        );
        offset
    }

    /// Decode a word offset back to the object start.
    #[inline]
    #[must_use]
    pub fn from_offset(&self, offset: OffsetInRegion) -> Address {
        self.assert_is_valid_offset(offset);
        self.bottom.offset_words(offset as usize)
    }

    #[inline]
    fn assert_is_valid_offset(&self, offset: OffsetInRegion) {
        gc_assert!(
            (offset as usize) < self.grain_words,
            "offset {} out of range for region {} of {} words",
            offset,
            self.index,
            self.grain_words
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{RegionDescriptor, MAX_GRAIN_WORDS};
    use crate::address::{Address, HEAP_WORD_SIZE};

    fn region() -> RegionDescriptor {
        RegionDescriptor::new(3, Address::new(0x10_0000), 4096)
    }

    #[test]
    fn test_round_trip_every_word() {
        let r = region();
        for word in 0..r.grain_words() {
            let addr = r.bottom().offset_words(word);
            let offset = r.to_offset(addr);
            assert_eq!(offset as usize, word);
            assert_eq!(r.from_offset(offset), addr);
        }
    }

    #[test]
    fn test_bounds() {
        let r = region();
        assert!(r.contains(r.bottom()));
        assert!(r.contains(r.bottom().offset_words(4095)));
        assert!(!r.contains(r.end()));
        assert_eq!(
            r.end().as_usize(),
            0x10_0000 + 4096 * HEAP_WORD_SIZE
        );
    }

    #[test]
    #[cfg_attr(
        not(any(debug_assertions, feature = "verify")),
        ignore = "verification compiled out"
    )]
    #[should_panic(expected = "outside region")]
    fn test_to_offset_rejects_address_past_end() {
        let r = region();
        let _ = r.to_offset(r.end());
    }

    #[test]
    #[cfg_attr(
        not(any(debug_assertions, feature = "verify")),
        ignore = "verification compiled out"
    )]
    #[should_panic(expected = "outside region")]
    fn test_to_offset_rejects_address_below_bottom() {
        let r = region();
        let _ = r.to_offset(Address::new(0x10_0000 - HEAP_WORD_SIZE));
    }

    #[test]
    #[cfg_attr(
        not(any(debug_assertions, feature = "verify")),
        ignore = "verification compiled out"
    )]
    #[should_panic(expected = "not word aligned")]
    fn test_to_offset_rejects_unaligned_address() {
        let r = region();
        let _ = r.to_offset(Address::new(0x10_0001));
    }

    #[test]
    #[cfg_attr(
        not(any(debug_assertions, feature = "verify")),
        ignore = "verification compiled out"
    )]
    #[should_panic(expected = "out of range")]
    fn test_from_offset_rejects_grain_words() {
        let r = region();
        let _ = r.from_offset(4096);
    }

    #[test]
    #[should_panic(expected = "exceeds the offset range")]
    fn test_oversized_region_rejected() {
        let _ = RegionDescriptor::new(0, Address::new(0), MAX_GRAIN_WORDS + 1);
    }

    #[test]
    #[should_panic(expected = "at least one word")]
    fn test_empty_region_rejected() {
        let _ = RegionDescriptor::new(0, Address::new(0x1000), 0);
    }

    #[test]
    #[should_panic(expected = "wraps the address space")]
    fn test_wrapping_region_rejected() {
        let _ = RegionDescriptor::new(0, Address::new(usize::MAX - HEAP_WORD_SIZE + 1), 2);
    }

    #[test]
    fn test_largest_region_last_offset_fits() {
        let r = RegionDescriptor::new(0, Address::new(0), MAX_GRAIN_WORDS);
        let last = r.bottom().offset_words(MAX_GRAIN_WORDS - 1);
        assert_eq!(r.from_offset(r.to_offset(last)), last);
    }
}
