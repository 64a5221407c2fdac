//! Flat bucket index: a ragged array over one data array.
//!
//! Buckets are stored back to back in `data`. `offsets` holds one boundary
//! per bucket plus a leading zero, so bucket `i` is
//! `data[offsets[i]..offsets[i + 1]]`:
//!
//! ```text
//! data:    [1, 2, 3, 4, 5]
//! offsets: [0,       3,    5]
//!           bucket 0 bucket 1
//! ```
//!
//! Only the last bucket can grow cheaply. Growing an earlier one would shift
//! everything after it; use `PagedBucketIndex` for that.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::ops::Index;
use std::ops::IndexMut;
use std::slice::Windows;

use tracing::debug;

use crate::error::Error;
use crate::error::Result;
use crate::fields::Fields;
use crate::fields::check_offsets;
use crate::key::Key;

/// A ragged array of `T`, addressed by keys of type `K`.
pub struct FlatBucketIndex<T, K = usize> {
    data: Vec<T>,
    /// Empty until the first bucket is added, then `len() + 1` entries.
    offsets: Vec<usize>,
    _key: PhantomData<fn(K) -> K>,
}

impl<T, K: Key> FlatBucketIndex<T, K> {
    pub fn new() -> Self {
        return FlatBucketIndex {
            data: Vec::new(),
            offsets: Vec::new(),
            _key: PhantomData,
        };
    }

    /// Reserve room for `buckets` buckets holding `elements` elements total.
    pub fn with_capacity(buckets: usize, elements: usize) -> Self {
        return FlatBucketIndex {
            data: Vec::with_capacity(elements),
            offsets: Vec::with_capacity(buckets + 1),
            _key: PhantomData,
        };
    }

    /// Number of buckets.
    #[inline]
    pub fn len(&self) -> usize {
        return self.offsets.len().saturating_sub(1);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// All elements of all buckets, in order.
    #[inline]
    pub fn data(&self) -> &[T] {
        return &self.data;
    }

    /// Mutable elements. Bucket boundaries cannot change through this.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        return &mut self.data;
    }

    #[inline]
    pub fn offsets(&self) -> &[usize] {
        return &self.offsets;
    }

    /// Append a bucket holding the elements of `range`, returning its key.
    pub fn emplace_back<I: IntoIterator<Item = T>>(&mut self, range: I) -> K {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        let key = K::from_index(self.len());
        self.data.extend(range);
        self.offsets.push(self.data.len());
        return key;
    }

    /// Append elements to the last bucket.
    ///
    /// Panics if there are no buckets.
    pub fn extend_back<I: IntoIterator<Item = T>>(&mut self, range: I) {
        assert!(!self.is_empty(), "extend_back on an empty index");
        self.data.extend(range);
        let last = self.offsets.len() - 1;
        self.offsets[last] = self.data.len();
    }

    /// Append a bucket of `n` default elements and return it for filling in
    /// place.
    pub fn add_back_sized(&mut self, n: usize) -> &mut [T]
    where
        T: Default,
    {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        let start = self.data.len();
        self.data.resize_with(start + n, T::default);
        self.offsets.push(self.data.len());
        return &mut self.data[start..];
    }

    /// Bounds of a bucket in `data`, without a range check beyond debug builds.
    #[inline]
    fn bounds(&self, key: usize) -> (usize, usize) {
        debug_assert!(key < self.len(), "key {} out of range for {} buckets", key, self.len());
        return (self.offsets[key], self.offsets[key + 1]);
    }

    pub fn get(&self, key: K) -> Option<&[T]> {
        let key = key.index();
        if key >= self.len() {
            return None;
        }
        let (start, end) = self.bounds(key);
        return Some(&self.data[start..end]);
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut [T]> {
        let key = key.index();
        if key >= self.len() {
            return None;
        }
        let (start, end) = self.bounds(key);
        return Some(&mut self.data[start..end]);
    }

    /// Checked bucket access.
    pub fn at(&self, key: K) -> Result<&[T]> {
        let len = self.len();
        return self.get(key).ok_or(Error::OutOfRange { key: key.index(), len });
    }

    /// Checked mutable bucket access.
    pub fn at_mut(&mut self, key: K) -> Result<&mut [T]> {
        let len = self.len();
        return self.get_mut(key).ok_or(Error::OutOfRange { key: key.index(), len });
    }

    /// Number of elements in a bucket, without materializing it.
    #[inline]
    pub fn bucket_len(&self, key: K) -> usize {
        let (start, end) = self.bounds(key.index());
        return end - start;
    }

    /// Grow with empty buckets or shrink by dropping trailing buckets and
    /// their elements.
    pub fn resize(&mut self, new_count: usize) {
        let len = self.len();
        if new_count < len {
            self.offsets.truncate(new_count + 1);
            self.data.truncate(self.offsets[new_count]);
        } else if new_count > len {
            if self.offsets.is_empty() {
                self.offsets.push(0);
            }
            let end = self.data.len();
            self.offsets.resize(new_count + 1, end);
        }
    }

    pub fn clear(&mut self) {
        debug!(buckets = self.len(), elements = self.data.len(), "clearing flat bucket index");
        self.data.clear();
        self.offsets.clear();
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = K> + ExactSizeIterator {
        return (0..self.len()).map(K::from_index);
    }

    pub fn iter(&self) -> Buckets<'_, T> {
        return Buckets {
            data: &self.data,
            bounds: self.offsets.windows(2),
        };
    }

    pub fn iter_mut(&mut self) -> BucketsMut<'_, T> {
        return BucketsMut {
            data: &mut self.data,
            bounds: self.offsets.windows(2),
        };
    }
}

/// Iterator over the buckets of a `FlatBucketIndex`.
#[derive(Clone)]
pub struct Buckets<'a, T> {
    data: &'a [T],
    bounds: Windows<'a, usize>,
}

impl<'a, T> Iterator for Buckets<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<&'a [T]> {
        let w = self.bounds.next()?;
        return Some(&self.data[w[0]..w[1]]);
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        return self.bounds.size_hint();
    }
}

impl<T> DoubleEndedIterator for Buckets<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let w = self.bounds.next_back()?;
        return Some(&self.data[w[0]..w[1]]);
    }
}

impl<T> ExactSizeIterator for Buckets<'_, T> {}

/// Mutable iterator over the buckets of a `FlatBucketIndex`.
pub struct BucketsMut<'a, T> {
    /// Elements not yet handed out; always starts at the next bucket.
    data: &'a mut [T],
    bounds: Windows<'a, usize>,
}

impl<'a, T> Iterator for BucketsMut<'a, T> {
    type Item = &'a mut [T];

    fn next(&mut self) -> Option<&'a mut [T]> {
        let w = self.bounds.next()?;
        let rest = std::mem::take(&mut self.data);
        let (bucket, rest) = rest.split_at_mut(w[1] - w[0]);
        self.data = rest;
        return Some(bucket);
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        return self.bounds.size_hint();
    }
}

impl<T> ExactSizeIterator for BucketsMut<'_, T> {}

impl<T, K: Key> Index<K> for FlatBucketIndex<T, K> {
    type Output = [T];

    fn index(&self, key: K) -> &[T] {
        let (start, end) = self.bounds(key.index());
        return &self.data[start..end];
    }
}

impl<T, K: Key> IndexMut<K> for FlatBucketIndex<T, K> {
    fn index_mut(&mut self, key: K) -> &mut [T] {
        let (start, end) = self.bounds(key.index());
        return &mut self.data[start..end];
    }
}

impl<T, K: Key> Default for FlatBucketIndex<T, K> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<T: Clone, K> Clone for FlatBucketIndex<T, K> {
    fn clone(&self) -> Self {
        return FlatBucketIndex {
            data: self.data.clone(),
            offsets: self.offsets.clone(),
            _key: PhantomData,
        };
    }
}

impl<T: fmt::Debug, K: Key> fmt::Debug for FlatBucketIndex<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_list().entries(self.iter()).finish();
    }
}

impl<T: PartialEq, K> PartialEq for FlatBucketIndex<T, K> {
    fn eq(&self, other: &Self) -> bool {
        return self.data == other.data && self.offsets == other.offsets;
    }
}

impl<T: Eq, K> Eq for FlatBucketIndex<T, K> {}

impl<T: Hash, K> Hash for FlatBucketIndex<T, K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
        self.offsets.hash(state);
    }
}

impl<T, K: Key, I: IntoIterator<Item = T>> FromIterator<I> for FlatBucketIndex<T, K> {
    fn from_iter<B: IntoIterator<Item = I>>(buckets: B) -> Self {
        let mut index = Self::new();
        index.extend(buckets);
        return index;
    }
}

impl<T, K: Key, I: IntoIterator<Item = T>> Extend<I> for FlatBucketIndex<T, K> {
    fn extend<B: IntoIterator<Item = I>>(&mut self, buckets: B) {
        for range in buckets {
            self.emplace_back(range);
        }
    }
}

impl<'a, T, K: Key> IntoIterator for &'a FlatBucketIndex<T, K> {
    type Item = &'a [T];
    type IntoIter = Buckets<'a, T>;

    fn into_iter(self) -> Buckets<'a, T> {
        return self.iter();
    }
}

impl<T, K: Key> Fields for FlatBucketIndex<T, K> {
    type Ref<'a> = (&'a [T], &'a [usize]) where Self: 'a;
    type Owned = (Vec<T>, Vec<usize>);

    fn fields(&self) -> Self::Ref<'_> {
        return (&self.data, &self.offsets);
    }

    fn into_fields(self) -> Self::Owned {
        return (self.data, self.offsets);
    }

    fn from_fields((data, offsets): Self::Owned) -> Result<Self> {
        if let Err(err) = check_offsets(&offsets, data.len(), "data") {
            debug!(%err, "rejected flat bucket index layout");
            return Err(err);
        }
        return Ok(FlatBucketIndex { data, offsets, _key: PhantomData });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlatBucketIndex<u32> {
        let mut index = FlatBucketIndex::new();
        index.emplace_back([1, 2, 3]);
        index.emplace_back([4, 5]);
        return index;
    }

    #[test]
    fn empty_index() {
        let index: FlatBucketIndex<u32> = FlatBucketIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(index.offsets().is_empty());
        assert_eq!(index.iter().count(), 0);
    }

    #[test]
    fn emplace_back_layout() {
        let index = sample();
        assert_eq!(index.len(), 2);
        assert_eq!(&index[0], &[1, 2, 3]);
        assert_eq!(&index[1], &[4, 5]);
        assert_eq!(index.data(), &[1, 2, 3, 4, 5]);
        assert_eq!(index.offsets(), &[0, 3, 5]);
    }

    #[test]
    fn emplace_back_returns_key() {
        let mut index: FlatBucketIndex<u32> = FlatBucketIndex::new();
        assert_eq!(index.emplace_back([]), 0);
        assert_eq!(index.emplace_back([9]), 1);
        assert_eq!(index.bucket_len(0), 0);
        assert_eq!(index.bucket_len(1), 1);
    }

    #[test]
    fn checked_access() {
        let index = sample();
        assert_eq!(index.at(1), Ok(&[4, 5][..]));
        assert_eq!(index.at(2), Err(Error::OutOfRange { key: 2, len: 2 }));
        assert_eq!(index.get(7), None);
    }

    #[test]
    fn mutable_access() {
        let mut index = sample();
        index[0][1] = 20;
        index.at_mut(1).unwrap()[0] = 40;
        assert_eq!(index.data(), &[1, 20, 3, 40, 5]);
        assert!(index.at_mut(2).is_err());
    }

    #[test]
    #[should_panic]
    fn unchecked_out_of_range_panics() {
        let index = sample();
        let _ = &index[2];
    }

    #[test]
    fn resize_grow_adds_empty_buckets() {
        let mut index = sample();
        index.resize(4);
        assert_eq!(index.len(), 4);
        assert_eq!(index.offsets(), &[0, 3, 5, 5, 5]);
        assert!(index[2].is_empty());
        assert!(index[3].is_empty());
    }

    #[test]
    fn resize_grow_from_empty() {
        let mut index: FlatBucketIndex<u32> = FlatBucketIndex::new();
        index.resize(2);
        assert_eq!(index.offsets(), &[0, 0, 0]);
    }

    #[test]
    fn resize_shrink_truncates_data() {
        let mut index = sample();
        index.emplace_back([6]);
        index.resize(1);
        assert_eq!(index.len(), 1);
        assert_eq!(index.data(), &[1, 2, 3]);
        assert_eq!(index.offsets(), &[0, 3]);

        index.resize(0);
        assert!(index.is_empty());
        assert!(index.data().is_empty());
    }

    #[test]
    fn add_back_sized_fills_in_place() {
        let mut index = sample();
        let bucket = index.add_back_sized(3);
        bucket.copy_from_slice(&[7, 8, 9]);
        assert_eq!(&index[2], &[7, 8, 9]);
        assert_eq!(index.offsets(), &[0, 3, 5, 8]);
    }

    #[test]
    fn add_back_sized_defaults() {
        let mut index: FlatBucketIndex<u32> = FlatBucketIndex::new();
        index.add_back_sized(2);
        assert_eq!(&index[0], &[0, 0]);
    }

    #[test]
    fn extend_back_grows_last_bucket() {
        let mut index = sample();
        index.extend_back([6, 7]);
        assert_eq!(index.len(), 2);
        assert_eq!(&index[1], &[4, 5, 6, 7]);
    }

    #[test]
    #[should_panic(expected = "empty index")]
    fn extend_back_on_empty_panics() {
        let mut index: FlatBucketIndex<u32> = FlatBucketIndex::new();
        index.extend_back([1]);
    }

    #[test]
    fn iterate() {
        let index = sample();
        let buckets: Vec<&[u32]> = index.iter().collect();
        assert_eq!(buckets, vec![&[1, 2, 3][..], &[4, 5][..]]);
        let reversed: Vec<&[u32]> = index.iter().rev().collect();
        assert_eq!(reversed[0], &[4, 5]);
        assert_eq!(index.iter().len(), 2);
    }

    #[test]
    fn iterate_mut() {
        let mut index = sample();
        index.emplace_back([]);
        for (i, bucket) in index.iter_mut().enumerate() {
            for x in bucket {
                *x += 10 * i as u32;
            }
        }
        assert_eq!(index.data(), &[1, 2, 3, 14, 15]);
    }

    #[test]
    fn collect_from_nested_vecs() {
        let index: FlatBucketIndex<u32> = vec![vec![1], vec![], vec![2, 3]].into_iter().collect();
        assert_eq!(index.offsets(), &[0, 1, 1, 3]);
    }

    #[test]
    fn typed_keys() {
        crate::bucket_key! {
            struct Row(u32);
        }

        let mut index: FlatBucketIndex<char, Row> = FlatBucketIndex::new();
        let a = index.emplace_back("ab".chars());
        let b = index.emplace_back("c".chars());
        assert_eq!(a, Row(0));
        assert_eq!(b, Row(1));
        assert_eq!(&index[b], &['c']);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec![Row(0), Row(1)]);
    }

    #[test]
    fn fields_round_trip() {
        let index = sample();
        let (data, offsets) = index.fields();
        assert_eq!(data, &[1, 2, 3, 4, 5]);
        assert_eq!(offsets, &[0, 3, 5]);

        let rebuilt = FlatBucketIndex::<u32>::from_fields(index.clone().into_fields()).unwrap();
        assert_eq!(rebuilt, index);
    }

    #[test]
    fn from_fields_rejects_broken_offsets() {
        let result = FlatBucketIndex::<u32>::from_fields((vec![1, 2, 3], vec![0, 2]));
        assert!(matches!(result, Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn clear() {
        let mut index = sample();
        index.clear();
        assert!(index.is_empty());
        assert!(index.data().is_empty());
        index.emplace_back([1]);
        assert_eq!(index.offsets(), &[0, 1]);
    }
}
