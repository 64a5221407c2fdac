//! Nested bucket index: N-dimensional ragged arrays over one data array.
//!
//! The index keeps N offsets arrays stacked over a single leaf data array.
//! Level 0 delimits `data` exactly like `FlatBucketIndex`; level L delimits
//! the entries of level L - 1 the same way. The top level, N - 1, holds one
//! boundary per top-level bucket plus a leading zero.
//!
//! For N = 2 after `emplace_back(ragged!([1, 2], [3]))` and
//! `emplace_back(ragged!([4]))`:
//!
//! ```text
//! data:       [1, 2, 3, 4]
//! offsets[0]: [0, 2, 3, 4]   leaf buckets [1, 2] [3] [4]
//! offsets[1]: [0, 2, 3]      top buckets  {[1, 2], [3]} {[4]}
//! ```
//!
//! Every node's leaves are contiguous in `data`, so any sub-tree can be
//! handed out as one slice. Lookups descend one level per key, reading two
//! offsets per level.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::ops::Range;

use smallvec::SmallVec;
use tracing::debug;

use super::ragged::Ragged;
use crate::error::Error;
use crate::error::Result;
use crate::fields::Fields;
use crate::fields::check_offsets;
use crate::key::Key;

/// An N-level ragged array of `T`, top-level buckets addressed by `K`.
pub struct NestedBucketIndex<T, const N: usize, K = usize> {
    /// `offsets[0]` delimits `data`; `offsets[l]` delimits level `l - 1`.
    /// Either every level is empty or every level starts with a zero.
    offsets: [Vec<usize>; N],
    data: Vec<T>,
    _key: PhantomData<fn(K) -> K>,
}

/// Leaf positions spanned by level-`level` entries `lo..hi`.
#[inline]
fn leaf_span(offsets: &[Vec<usize>], level: usize, lo: usize, hi: usize) -> Range<usize> {
    let (mut lo, mut hi) = (lo, hi);
    for level in (0..=level).rev() {
        lo = offsets[level][lo];
        hi = offsets[level][hi];
    }
    return lo..hi;
}

impl<T, const N: usize, K: Key> NestedBucketIndex<T, N, K> {
    const TOP: usize = N - 1;

    pub fn new() -> Self {
        const { assert!(N >= 1, "a nested bucket index needs at least one level") };
        return NestedBucketIndex {
            offsets: std::array::from_fn(|_| Vec::new()),
            data: Vec::new(),
            _key: PhantomData,
        };
    }

    /// Number of levels.
    #[inline]
    pub const fn depth(&self) -> usize {
        return N;
    }

    /// Number of top-level buckets.
    #[inline]
    pub fn len(&self) -> usize {
        return self.level_len(Self::TOP);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Number of entries at a level. Level 0 entries are leaf buckets.
    #[inline]
    pub fn level_len(&self, level: usize) -> usize {
        return self.offsets[level].len().saturating_sub(1);
    }

    /// All leaf elements, in order.
    #[inline]
    pub fn data(&self) -> &[T] {
        return &self.data;
    }

    /// Mutable leaf elements. Bucket boundaries cannot change through this.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        return &mut self.data;
    }

    #[inline]
    pub fn offsets(&self, level: usize) -> &[usize] {
        return &self.offsets[level];
    }

    fn ensure_started(&mut self) {
        if self.offsets[0].is_empty() {
            for level in self.offsets.iter_mut() {
                level.push(0);
            }
        }
    }

    /// Append a top-level bucket from an N-deep ragged tree, returning its
    /// key. A tree of the wrong depth is rejected before anything is written.
    pub fn emplace_back(&mut self, tree: Ragged<T>) -> Result<K> {
        if let Some(found) = tree.mismatch(N) {
            return Err(Error::DepthMismatch { expected: N, found });
        }
        self.ensure_started();
        self.append(Self::TOP, tree);
        return Ok(K::from_index(self.len() - 1));
    }

    fn append(&mut self, level: usize, tree: Ragged<T>) {
        match tree {
            Ragged::Leaf(values) => {
                debug_assert_eq!(level, 0, "leaf above level 0");
                self.data.extend(values);
                self.offsets[0].push(self.data.len());
            }
            Ragged::Branch(children) => {
                debug_assert!(level > 0, "branch at level 0");
                for child in children {
                    self.append(level - 1, child);
                }
                let count = self.level_len(level - 1);
                self.offsets[level].push(count);
            }
        }
    }

    /// Follow `path` down from the top. Returns the positions of the entries
    /// one level below the addressed node: leaf positions in `data` once the
    /// path is N keys long.
    fn resolve(&self, path: &[usize]) -> Result<Range<usize>> {
        debug_assert!(path.len() <= N);
        let mut range = 0..self.len();
        for (depth, &key) in path.iter().enumerate() {
            if key >= range.len() {
                return Err(Error::OutOfRange { key, len: range.len() });
            }
            let level = Self::TOP - depth;
            let i = range.start + key;
            range = self.offsets[level][i]..self.offsets[level][i + 1];
        }
        return Ok(range);
    }

    /// Leaf bucket at a full key path.
    pub fn at(&self, keys: [usize; N]) -> Result<&[T]> {
        let range = self.resolve(&keys)?;
        return Ok(&self.data[range]);
    }

    /// Mutable leaf bucket at a full key path.
    pub fn at_mut(&mut self, keys: [usize; N]) -> Result<&mut [T]> {
        let range = self.resolve(&keys)?;
        return Ok(&mut self.data[range]);
    }

    /// Number of children of the node at `path`: top-level buckets for an
    /// empty path, elements of a leaf bucket for a path of N keys.
    ///
    /// Panics if the path is longer than N or a key is out of range.
    pub fn size(&self, path: &[usize]) -> usize {
        assert!(path.len() <= N, "path of {} keys is deeper than {} levels", path.len(), N);
        return match self.resolve(path) {
            Ok(range) => range.len(),
            Err(err) => panic!("{}", err),
        };
    }

    /// Node at a path of 1 to N keys: a meta bucket above level 0, a leaf
    /// bucket at full depth.
    ///
    /// Panics on an empty path or one longer than N.
    pub fn get(&self, path: &[usize]) -> Result<Entry<'_, T>> {
        assert!(
            (1..=N).contains(&path.len()),
            "path of {} keys does not address a node in {} levels",
            path.len(),
            N,
        );
        let (parent, key) = (&path[..path.len() - 1], path[path.len() - 1]);
        let range = self.resolve(parent)?;
        if key >= range.len() {
            return Err(Error::OutOfRange { key, len: range.len() });
        }
        let level = N - path.len();
        return Ok(Entry::new(&self.offsets, &self.data, 0, level, range.start + key));
    }

    /// Every leaf element under one top-level bucket, as one slice.
    pub fn leaves(&self, key: K) -> Result<&[T]> {
        let i = key.index();
        if i >= self.len() {
            return Err(Error::OutOfRange { key: i, len: self.len() });
        }
        let span = leaf_span(&self.offsets, Self::TOP, i, i + 1);
        return Ok(&self.data[span]);
    }

    /// Top-level entries: leaf buckets when N = 1, meta buckets otherwise.
    pub fn iter(&self) -> Entries<'_, T> {
        return Entries {
            offsets: &self.offsets,
            data: &self.data,
            base: 0,
            level: Self::TOP,
            range: 0..self.len(),
        };
    }

    pub fn iter_mut(&mut self) -> EntriesMut<'_, T> {
        let range = 0..self.len();
        return EntriesMut {
            offsets: &self.offsets,
            data: &mut self.data,
            base: 0,
            level: Self::TOP,
            range,
        };
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = K> + ExactSizeIterator {
        return (0..self.len()).map(K::from_index);
    }

    /// Grow with empty top-level buckets or shrink by dropping trailing
    /// buckets together with everything beneath them.
    pub fn resize(&mut self, new_count: usize) {
        let len = self.len();
        if new_count < len {
            let mut end = new_count;
            for level in (0..N).rev() {
                self.offsets[level].truncate(end + 1);
                end = self.offsets[level][end];
            }
            self.data.truncate(end);
        } else if new_count > len {
            self.ensure_started();
            let below = match Self::TOP {
                0 => self.data.len(),
                top => self.level_len(top - 1),
            };
            self.offsets[Self::TOP].resize(new_count + 1, below);
        }
    }

    pub fn clear(&mut self) {
        debug!(levels = N, buckets = self.len(), elements = self.data.len(), "clearing nested bucket index");
        for level in self.offsets.iter_mut() {
            level.clear();
        }
        self.data.clear();
    }
}

/// A node of a nested index: a leaf bucket or a meta bucket over lower
/// levels.
pub enum Entry<'a, T> {
    Bucket(&'a [T]),
    Meta(MetaBucket<'a, T>),
}

impl<'a, T> Entry<'a, T> {
    fn new(offsets: &'a [Vec<usize>], data: &'a [T], base: usize, level: usize, index: usize) -> Self {
        if level == 0 {
            let span = offsets[0][index] - base..offsets[0][index + 1] - base;
            return Entry::Bucket(&data[span]);
        }
        return Entry::Meta(MetaBucket { offsets, data, base, level, index });
    }

    /// Children for a meta bucket, elements for a leaf bucket.
    pub fn len(&self) -> usize {
        return match self {
            Entry::Bucket(bucket) => bucket.len(),
            Entry::Meta(meta) => meta.len(),
        };
    }

    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// All leaf elements under this node.
    pub fn data(&self) -> &'a [T] {
        return match self {
            Entry::Bucket(bucket) => bucket,
            Entry::Meta(meta) => meta.data(),
        };
    }

    pub fn as_bucket(&self) -> Option<&'a [T]> {
        return match self {
            Entry::Bucket(bucket) => Some(bucket),
            Entry::Meta(_) => None,
        };
    }

    pub fn as_meta(&self) -> Option<MetaBucket<'a, T>> {
        return match self {
            Entry::Bucket(_) => None,
            Entry::Meta(meta) => Some(*meta),
        };
    }
}

impl<T> Clone for Entry<'_, T> {
    fn clone(&self) -> Self {
        return *self;
    }
}

impl<T> Copy for Entry<'_, T> {}

impl<T: fmt::Debug> fmt::Debug for Entry<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Entry::Bucket(bucket) => bucket.fmt(f),
            Entry::Meta(meta) => meta.fmt(f),
        };
    }
}

/// Read-only view of a node above level 0.
pub struct MetaBucket<'a, T> {
    offsets: &'a [Vec<usize>],
    /// Leaf storage, starting at leaf position `base`.
    data: &'a [T],
    base: usize,
    /// Level of this node; its children live at `level - 1`.
    level: usize,
    index: usize,
}

impl<'a, T> MetaBucket<'a, T> {
    /// Levels beneath this node. Children of a depth-1 meta bucket are leaf
    /// buckets.
    #[inline]
    pub fn depth(&self) -> usize {
        return self.level;
    }

    #[inline]
    fn children(&self) -> Range<usize> {
        let level = &self.offsets[self.level];
        return level[self.index]..level[self.index + 1];
    }

    #[inline]
    pub fn len(&self) -> usize {
        return self.children().len();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    pub fn get(&self, key: usize) -> Option<Entry<'a, T>> {
        let children = self.children();
        if key >= children.len() {
            return None;
        }
        return Some(Entry::new(self.offsets, self.data, self.base, self.level - 1, children.start + key));
    }

    pub fn at(&self, key: usize) -> Result<Entry<'a, T>> {
        return self.get(key).ok_or(Error::OutOfRange { key, len: self.len() });
    }

    /// Leaf bucket child. `None` above depth 1 or out of range.
    pub fn bucket(&self, key: usize) -> Option<&'a [T]> {
        return self.get(key)?.as_bucket();
    }

    /// All leaf elements under this node.
    pub fn data(&self) -> &'a [T] {
        let span = leaf_span(self.offsets, self.level, self.index, self.index + 1);
        return &self.data[span.start - self.base..span.end - self.base];
    }

    pub fn iter(&self) -> Entries<'a, T> {
        return Entries {
            offsets: self.offsets,
            data: self.data,
            base: self.base,
            level: self.level - 1,
            range: self.children(),
        };
    }

    /// Leaf buckets under this node, in order, regardless of depth.
    pub fn buckets(&self) -> impl Iterator<Item = &'a [T]> + use<'a, T> {
        let mut range = self.index..self.index + 1;
        for level in (1..=self.level).rev() {
            range = self.offsets[level][range.start]..self.offsets[level][range.end];
        }
        let (offsets, data, base) = (self.offsets, self.data, self.base);
        return range.map(move |i| &data[offsets[0][i] - base..offsets[0][i + 1] - base]);
    }
}

impl<T> Clone for MetaBucket<'_, T> {
    fn clone(&self) -> Self {
        return *self;
    }
}

impl<T> Copy for MetaBucket<'_, T> {}

impl<T: fmt::Debug> fmt::Debug for MetaBucket<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_list().entries(self.iter()).finish();
    }
}

impl<'a, T> IntoIterator for MetaBucket<'a, T> {
    type Item = Entry<'a, T>;
    type IntoIter = Entries<'a, T>;

    fn into_iter(self) -> Entries<'a, T> {
        return self.iter();
    }
}

/// Iterator over sibling entries at one level.
pub struct Entries<'a, T> {
    offsets: &'a [Vec<usize>],
    data: &'a [T],
    base: usize,
    level: usize,
    range: Range<usize>,
}

impl<'a, T> Iterator for Entries<'a, T> {
    type Item = Entry<'a, T>;

    fn next(&mut self) -> Option<Entry<'a, T>> {
        let i = self.range.next()?;
        return Some(Entry::new(self.offsets, self.data, self.base, self.level, i));
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        return self.range.size_hint();
    }
}

impl<T> DoubleEndedIterator for Entries<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let i = self.range.next_back()?;
        return Some(Entry::new(self.offsets, self.data, self.base, self.level, i));
    }
}

impl<T> ExactSizeIterator for Entries<'_, T> {}

/// A mutable node of a nested index.
pub enum EntryMut<'a, T> {
    Bucket(&'a mut [T]),
    Meta(MetaBucketMut<'a, T>),
}

impl<'a, T> EntryMut<'a, T> {
    fn new(offsets: &'a [Vec<usize>], data: &'a mut [T], base: usize, level: usize, index: usize) -> Self {
        if level == 0 {
            return EntryMut::Bucket(data);
        }
        return EntryMut::Meta(MetaBucketMut { offsets, data, base, level, index });
    }

    pub fn len(&self) -> usize {
        return match self {
            EntryMut::Bucket(bucket) => bucket.len(),
            EntryMut::Meta(meta) => meta.len(),
        };
    }

    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// All leaf elements under this node.
    pub fn into_data(self) -> &'a mut [T] {
        return match self {
            EntryMut::Bucket(bucket) => bucket,
            EntryMut::Meta(meta) => meta.data,
        };
    }

    pub fn into_bucket(self) -> Option<&'a mut [T]> {
        return match self {
            EntryMut::Bucket(bucket) => Some(bucket),
            EntryMut::Meta(_) => None,
        };
    }

    pub fn into_meta(self) -> Option<MetaBucketMut<'a, T>> {
        return match self {
            EntryMut::Bucket(_) => None,
            EntryMut::Meta(meta) => Some(meta),
        };
    }
}

/// Mutable view of a node above level 0. Holds exactly the node's leaves.
pub struct MetaBucketMut<'a, T> {
    offsets: &'a [Vec<usize>],
    data: &'a mut [T],
    base: usize,
    level: usize,
    index: usize,
}

impl<'a, T> MetaBucketMut<'a, T> {
    #[inline]
    pub fn depth(&self) -> usize {
        return self.level;
    }

    #[inline]
    fn children(&self) -> Range<usize> {
        let level = &self.offsets[self.level];
        return level[self.index]..level[self.index + 1];
    }

    #[inline]
    pub fn len(&self) -> usize {
        return self.children().len();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Read-only view of the same node.
    pub fn as_meta(&self) -> MetaBucket<'_, T> {
        return MetaBucket {
            offsets: self.offsets,
            data: &*self.data,
            base: self.base,
            level: self.level,
            index: self.index,
        };
    }

    pub fn data(&self) -> &[T] {
        return &*self.data;
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        return &mut *self.data;
    }

    pub fn get_mut(&mut self, key: usize) -> Option<EntryMut<'_, T>> {
        let children = self.children();
        if key >= children.len() {
            return None;
        }
        let child = children.start + key;
        let span = leaf_span(self.offsets, self.level - 1, child, child + 1);
        let data = &mut self.data[span.start - self.base..span.end - self.base];
        return Some(EntryMut::new(self.offsets, data, span.start, self.level - 1, child));
    }

    /// Leaf bucket child. `None` above depth 1 or out of range.
    pub fn bucket_mut(&mut self, key: usize) -> Option<&mut [T]> {
        return self.get_mut(key)?.into_bucket();
    }

    pub fn iter_mut(&mut self) -> EntriesMut<'_, T> {
        let range = self.children();
        return EntriesMut {
            offsets: self.offsets,
            data: &mut *self.data,
            base: self.base,
            level: self.level - 1,
            range,
        };
    }
}

impl<'a, T> IntoIterator for MetaBucketMut<'a, T> {
    type Item = EntryMut<'a, T>;
    type IntoIter = EntriesMut<'a, T>;

    fn into_iter(self) -> EntriesMut<'a, T> {
        let range = self.children();
        return EntriesMut {
            offsets: self.offsets,
            data: self.data,
            base: self.base,
            level: self.level - 1,
            range,
        };
    }
}

/// Mutable iterator over sibling entries at one level. Hands out disjoint
/// slices of the remaining leaves from either end.
pub struct EntriesMut<'a, T> {
    offsets: &'a [Vec<usize>],
    /// Leaves of the entries still in `range`, starting at position `base`.
    data: &'a mut [T],
    base: usize,
    level: usize,
    range: Range<usize>,
}

impl<'a, T> Iterator for EntriesMut<'a, T> {
    type Item = EntryMut<'a, T>;

    fn next(&mut self) -> Option<EntryMut<'a, T>> {
        let i = self.range.next()?;
        let span = leaf_span(self.offsets, self.level, i, i + 1);
        debug_assert_eq!(span.start, self.base);
        let rest = std::mem::take(&mut self.data);
        let (head, rest) = rest.split_at_mut(span.len());
        self.data = rest;
        self.base = span.end;
        return Some(EntryMut::new(self.offsets, head, span.start, self.level, i));
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        return self.range.size_hint();
    }
}

impl<T> DoubleEndedIterator for EntriesMut<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let i = self.range.next_back()?;
        let span = leaf_span(self.offsets, self.level, i, i + 1);
        let rest = std::mem::take(&mut self.data);
        let (rest, tail) = rest.split_at_mut(span.start - self.base);
        self.data = rest;
        return Some(EntryMut::new(self.offsets, tail, span.start, self.level, i));
    }
}

impl<T> ExactSizeIterator for EntriesMut<'_, T> {}

impl<T, const N: usize, K: Key> Default for NestedBucketIndex<T, N, K> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<T: Clone, const N: usize, K> Clone for NestedBucketIndex<T, N, K> {
    fn clone(&self) -> Self {
        return NestedBucketIndex {
            offsets: self.offsets.clone(),
            data: self.data.clone(),
            _key: PhantomData,
        };
    }
}

impl<T: fmt::Debug, const N: usize, K: Key> fmt::Debug for NestedBucketIndex<T, N, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_list().entries(self.iter()).finish();
    }
}

impl<T: PartialEq, const N: usize, K> PartialEq for NestedBucketIndex<T, N, K> {
    fn eq(&self, other: &Self) -> bool {
        return self.offsets == other.offsets && self.data == other.data;
    }
}

impl<T: Eq, const N: usize, K> Eq for NestedBucketIndex<T, N, K> {}

impl<T: Hash, const N: usize, K> Hash for NestedBucketIndex<T, N, K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.offsets.hash(state);
        self.data.hash(state);
    }
}

impl<'a, T, const N: usize, K: Key> IntoIterator for &'a NestedBucketIndex<T, N, K> {
    type Item = Entry<'a, T>;
    type IntoIter = Entries<'a, T>;

    fn into_iter(self) -> Entries<'a, T> {
        return self.iter();
    }
}

/// Check a stack of offsets arrays against the data they delimit.
fn check_levels(offsets: &[Vec<usize>], data_len: usize) -> Result<()> {
    let started: SmallVec<[bool; 8]> = offsets.iter().map(|level| !level.is_empty()).collect();
    if started.iter().any(|&s| s != started[0]) {
        return Err(Error::InvalidLayout("levels disagree on whether the index is empty".to_string()));
    }

    check_offsets(&offsets[0], data_len, "level 0")?;
    for level in 1..offsets.len() {
        let below = offsets[level - 1].len().saturating_sub(1);
        check_offsets(&offsets[level], below, &format!("level {}", level))?;
    }
    return Ok(());
}

impl<T, const N: usize, K: Key> Fields for NestedBucketIndex<T, N, K> {
    type Ref<'a> = (&'a [Vec<usize>; N], &'a [T]) where Self: 'a;
    type Owned = ([Vec<usize>; N], Vec<T>);

    fn fields(&self) -> Self::Ref<'_> {
        return (&self.offsets, &self.data);
    }

    fn into_fields(self) -> Self::Owned {
        return (self.offsets, self.data);
    }

    fn from_fields((offsets, data): Self::Owned) -> Result<Self> {
        const { assert!(N >= 1, "a nested bucket index needs at least one level") };
        if let Err(err) = check_levels(&offsets, data.len()) {
            debug!(%err, "rejected nested bucket index layout");
            return Err(err);
        }
        return Ok(NestedBucketIndex { offsets, data, _key: PhantomData });
    }
}
