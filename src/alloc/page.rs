//! Page descriptors.
//!
//! A page is a power-of-two run of elements inside an allocator's arena.
//! The descriptor is plain data so it can sit in a descriptor array and be
//! reflected byte for byte.
//!
//! Layout (24 bytes on 64-bit targets):
//! ```text
//! [0..8]   size: usize      - Live elements
//! [8..16]  capacity: usize  - Power of two, 0 only for the invalid page
//! [16..24] start: usize     - Element offset into the arena
//! ```

use std::ops::Range;

/// Descriptor of one allocated run in a `PagedAllocator` arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Page {
    /// Number of live elements.
    pub size: usize,
    /// Number of reserved elements.
    pub capacity: usize,
    /// Offset of the first element in the arena.
    pub start: usize,
}

impl Page {
    /// The sentinel page. Never handed out by an allocator.
    pub const INVALID: Page = Page { size: 0, capacity: 0, start: 0 };

    #[inline]
    pub fn is_valid(&self) -> bool {
        return self.capacity != 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        return self.size;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.size == 0;
    }

    /// Arena positions of the live elements.
    #[inline]
    pub fn live(&self) -> Range<usize> {
        return self.start..self.start + self.size;
    }

    /// One past the last reserved position, `None` if that overflows.
    #[inline]
    pub fn checked_end(&self) -> Option<usize> {
        return self.start.checked_add(self.capacity);
    }

    /// Arena positions reserved by the page.
    #[inline]
    pub fn reserved(&self) -> Range<usize> {
        return self.start..self.start + self.capacity;
    }
}
