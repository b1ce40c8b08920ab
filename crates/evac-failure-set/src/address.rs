//! Heap addresses and word arithmetic.

use std::fmt;

/// Size in bytes of one heap word.
pub const HEAP_WORD_SIZE: usize = std::mem::size_of::<usize>();

/// `log2(HEAP_WORD_SIZE)`.
pub const LOG_HEAP_WORD_SIZE: u32 = HEAP_WORD_SIZE.trailing_zeros();

/// The address of an object start in the managed heap.
///
/// Addresses are never dereferenced by this crate; they are only encoded,
/// compared, and handed back to the collector.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Address(usize);

impl Address {
    /// Wrap a raw address value.
    #[inline]
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Address of a heap object given by pointer.
    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// The raw address value.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// The address as a raw pointer.
    #[inline]
    #[must_use]
    pub const fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    /// The address `words` heap words above `self`.
    ///
    /// Wraps on overflow; callers keep results inside a region.
    #[inline]
    #[must_use]
    pub const fn offset_words(self, words: usize) -> Self {
        Self(self.0.wrapping_add(words.wrapping_mul(HEAP_WORD_SIZE)))
    }

    /// Number of whole heap words from `base` up to `self`.
    ///
    /// `self` must not be below `base`.
    #[inline]
    #[must_use]
    pub const fn word_delta(self, base: Self) -> usize {
        (self.0 - base.0) >> LOG_HEAP_WORD_SIZE
    }

    /// Whether the address is aligned to a heap word.
    #[inline]
    #[must_use]
    pub const fn is_word_aligned(self) -> bool {
        self.0 & (HEAP_WORD_SIZE - 1) == 0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<usize> for Address {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}
