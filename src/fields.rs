//! Reflection boundary.
//!
//! Every container exposes its entire state as an ordered tuple of flat
//! backing arrays. A generic serializer walks the tuple from `fields`, and
//! `from_fields` rebuilds the container from the same arrays after checking
//! the container's invariants. Nothing else is needed to reconstruct a
//! container byte for byte.
//!
//! | container          | field tuple                          |
//! |--------------------|--------------------------------------|
//! | `PagedAllocator`   | (arena, free lists)                  |
//! | `FlatBucketIndex`  | (data, offsets)                      |
//! | `PagedBucketIndex` | (arena, free lists, descriptors)     |
//! | `NestedBucketIndex`| (offsets per level, data)            |

use crate::error::Error;
use crate::error::Result;

/// A container whose state is a tuple of raw arrays.
pub trait Fields: Sized {
    /// Borrowed field tuple.
    type Ref<'a>
    where
        Self: 'a;

    /// Owned field tuple.
    type Owned;

    fn fields(&self) -> Self::Ref<'_>;

    fn into_fields(self) -> Self::Owned;

    /// Rebuild from raw arrays, rejecting any layout that breaks an invariant.
    fn from_fields(fields: Self::Owned) -> Result<Self>;
}

/// Check one offsets array against the number of entries it delimits.
///
/// An empty array is valid only when it delimits nothing. Otherwise it must
/// start at zero, never decrease, and end at `target`.
pub(crate) fn check_offsets(offsets: &[usize], target: usize, what: &str) -> Result<()> {
    let Some((&first, _)) = offsets.split_first() else {
        if target == 0 {
            return Ok(());
        }
        return Err(Error::InvalidLayout(format!(
            "{} offsets are empty but delimit {} entries",
            what, target,
        )));
    };

    if first != 0 {
        return Err(Error::InvalidLayout(format!("{} offsets start at {}, not 0", what, first)));
    }

    if let Some(i) = offsets.windows(2).position(|w| w[0] > w[1]) {
        return Err(Error::InvalidLayout(format!(
            "{} offsets decrease at {}: {} > {}",
            what,
            i,
            offsets[i],
            offsets[i + 1],
        )));
    }

    let last = offsets[offsets.len() - 1];
    if last != target {
        return Err(Error::InvalidLayout(format!(
            "{} offsets end at {} but {} entries exist",
            what, last, target,
        )));
    }

    return Ok(());
}
