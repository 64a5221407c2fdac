//! Paged bucket index: one independently resizable page per bucket.
//!
//! Where `FlatBucketIndex` packs buckets back to back, this index gives each
//! bucket its own page from a `PagedAllocator`. Growing a bucket touches only
//! that bucket's page, and dropping buckets returns their pages to the free
//! lists for reuse.
//!
//! A bucket's identity is its position in the descriptor array. Its storage
//! location is the page start, which may move whenever that bucket grows.
//! Positions only shift through `insert`, `remove` and `swap`, which never
//! move page storage.
//!
//! Descriptor order and arena order are unrelated after inserts, removals or
//! relocations. `compact` rebuilds the arena in descriptor order.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::ops::Index;
use std::ops::IndexMut;

use tracing::debug;

use crate::alloc::Page;
use crate::alloc::PagedAllocator;
use crate::config::DEFAULT_MAX_PAGE;
use crate::config::DEFAULT_MIN_PAGE;
use crate::error::Error;
use crate::error::Result;
use crate::fields::Fields;
use crate::key::Key;

/// A ragged array whose buckets grow independently.
pub struct PagedBucketIndex<
    T,
    K = usize,
    const MIN_PAGE: usize = DEFAULT_MIN_PAGE,
    const MAX_PAGE: usize = DEFAULT_MAX_PAGE,
> {
    alloc: PagedAllocator<T, MIN_PAGE, MAX_PAGE>,
    /// One page per bucket, in key order.
    pages: Vec<Page>,
    _key: PhantomData<fn(K) -> K>,
}

impl<T, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    pub fn new() -> Self {
        return PagedBucketIndex {
            alloc: PagedAllocator::new(),
            pages: Vec::new(),
            _key: PhantomData,
        };
    }

    /// Number of buckets.
    #[inline]
    pub fn len(&self) -> usize {
        return self.pages.len();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.pages.is_empty();
    }

    /// Page descriptors, in key order.
    #[inline]
    pub fn pages(&self) -> &[Page] {
        return &self.pages;
    }

    #[inline]
    pub fn allocator(&self) -> &PagedAllocator<T, MIN_PAGE, MAX_PAGE> {
        return &self.alloc;
    }

    pub fn get(&self, key: K) -> Option<&[T]> {
        let page = self.pages.get(key.index())?;
        return Some(self.alloc.page(page));
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut [T]> {
        let page = self.pages.get(key.index())?;
        return Some(self.alloc.page_mut(page));
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

    /// Number of elements in a bucket.
    #[inline]
    pub fn bucket_len(&self, key: K) -> usize {
        return self.pages[key.index()].size;
    }

    /// Elements a bucket can hold before its page moves.
    #[inline]
    pub fn capacity(&self, key: K) -> usize {
        return self.pages[key.index()].capacity;
    }

    /// Exchange the keys of two buckets. No element moves.
    pub fn swap(&mut self, a: K, b: K) {
        self.pages.swap(a.index(), b.index());
    }

    pub fn clear(&mut self) {
        debug!(buckets = self.pages.len(), "clearing paged bucket index");
        self.alloc.clear();
        self.pages.clear();
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = K> + ExactSizeIterator {
        return (0..self.len()).map(K::from_index);
    }

    /// Buckets in key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &[T]> + ExactSizeIterator {
        return self.pages.iter().map(|page| self.alloc.page(page));
    }
}

impl<T: Clone + Default, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    /// Copy `range` into a fresh page.
    fn page_from<I>(&mut self, range: I) -> Page
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let range = range.into_iter();
        let page = self.alloc.create_page(range.len());
        let slots = self.alloc.page_mut(&page);
        let mut written = 0;
        for (slot, value) in slots.iter_mut().zip(range) {
            *slot = value;
            written += 1;
        }
        debug_assert_eq!(written, page.size, "iterator reported the wrong length");
        return page;
    }

    /// Append a bucket holding the elements of `range`, returning its key.
    pub fn emplace_back<I>(&mut self, range: I) -> K
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let page = self.page_from(range);
        self.pages.push(page);
        return K::from_index(self.pages.len() - 1);
    }

    /// Insert a bucket at `key`, shifting later keys up by one. Existing
    /// page storage does not move.
    ///
    /// Panics if `key > len()`.
    pub fn insert<I>(&mut self, key: K, range: I)
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let key = key.index();
        assert!(key <= self.pages.len(), "insert key {} past {} buckets", key, self.pages.len());
        let page = self.page_from(range);
        self.pages.insert(key, page);
    }

    /// Remove a bucket, free its page, and return its elements. Later keys
    /// shift down by one.
    ///
    /// Panics if `key >= len()`.
    pub fn remove(&mut self, key: K) -> Vec<T> {
        let page = self.pages.remove(key.index());
        let values = self.alloc.page_mut(&page).iter_mut().map(std::mem::take).collect();
        self.alloc.free_page(page);
        return values;
    }

    /// Handle for growing or shrinking one bucket in place.
    ///
    /// Panics if `key >= len()`.
    pub fn bucket_mut(&mut self, key: K) -> BucketMut<'_, T, MIN_PAGE, MAX_PAGE> {
        let len = self.pages.len();
        let Some(page) = self.pages.get_mut(key.index()) else {
            panic!("key {} out of range for {} buckets", key.index(), len);
        };
        return BucketMut { alloc: &mut self.alloc, page };
    }

    /// Grow with empty buckets or shrink by freeing trailing buckets.
    pub fn resize(&mut self, new_count: usize) {
        if new_count < self.pages.len() {
            for page in self.pages.drain(new_count..) {
                self.alloc.free_page(page);
            }
            return;
        }
        while self.pages.len() < new_count {
            let page = self.alloc.create_page(0);
            self.pages.push(page);
        }
    }

    /// Rebuild the arena with every bucket in key order and no free pages.
    pub fn compact(&mut self) {
        let mut alloc = PagedAllocator::new();
        for page in self.pages.iter_mut() {
            let moved = alloc.create_page(page.size);
            for (dst, src) in alloc.page_mut(&moved).iter_mut().zip(self.alloc.page_mut(page)) {
                *dst = std::mem::take(src);
            }
            *page = moved;
        }
        debug!(
            before = self.alloc.arena_len(),
            after = alloc.arena_len(),
            "compacted paged bucket index",
        );
        self.alloc = alloc;
    }
}

/// Mutable handle on one bucket of a `PagedBucketIndex`.
///
/// Growth may move the bucket's page; the descriptor is updated in place so
/// the key keeps addressing the same bucket.
pub struct BucketMut<'a, T, const MIN_PAGE: usize, const MAX_PAGE: usize> {
    alloc: &'a mut PagedAllocator<T, MIN_PAGE, MAX_PAGE>,
    page: &'a mut Page,
}

impl<T: Clone + Default, const MIN_PAGE: usize, const MAX_PAGE: usize> BucketMut<'_, T, MIN_PAGE, MAX_PAGE> {
    #[inline]
    pub fn len(&self) -> usize {
        return self.page.size;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.page.size == 0;
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        return self.page.capacity;
    }

    /// The bucket's current page.
    #[inline]
    pub fn page(&self) -> Page {
        return *self.page;
    }

    pub fn as_slice(&self) -> &[T] {
        return self.alloc.page(&*self.page);
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        return self.alloc.page_mut(&*self.page);
    }

    pub fn push(&mut self, value: T) {
        let size = self.page.size;
        *self.page = self.alloc.resize_page(*self.page, size + 1);
        self.alloc.page_mut(&*self.page)[size] = value;
    }

    pub fn pop(&mut self) -> Option<T> {
        let size = self.page.size.checked_sub(1)?;
        let value = std::mem::take(&mut self.alloc.page_mut(&*self.page)[size]);
        *self.page = self.alloc.resize_page(*self.page, size);
        return Some(value);
    }

    /// Resize to `new_size`, filling new slots with `T::default()`.
    pub fn resize(&mut self, new_size: usize) {
        *self.page = self.alloc.resize_page(*self.page, new_size);
    }

    pub fn truncate(&mut self, new_size: usize) {
        if new_size < self.page.size {
            self.resize(new_size);
        }
    }

    pub fn clear(&mut self) {
        self.resize(0);
    }
}

impl<T: Clone + Default, const MIN_PAGE: usize, const MAX_PAGE: usize> Extend<T> for BucketMut<'_, T, MIN_PAGE, MAX_PAGE> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, values: I) {
        let values = values.into_iter();
        let (lower, _) = values.size_hint();
        let start = self.page.size;
        *self.page = self.alloc.resize_page(*self.page, start + lower);
        let mut size = start;
        for value in values {
            if size == self.page.size {
                self.push(value);
            } else {
                self.alloc.page_mut(&*self.page)[size] = value;
            }
            size += 1;
        }
        if size < self.page.size {
            self.resize(size);
        }
    }
}

impl<T, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> Index<K> for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    type Output = [T];

    fn index(&self, key: K) -> &[T] {
        debug_assert!(key.index() < self.len(), "key {} out of range for {} buckets", key.index(), self.len());
        return self.alloc.page(&self.pages[key.index()]);
    }
}

impl<T, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> IndexMut<K> for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    fn index_mut(&mut self, key: K) -> &mut [T] {
        debug_assert!(key.index() < self.len(), "key {} out of range for {} buckets", key.index(), self.len());
        return self.alloc.page_mut(&self.pages[key.index()]);
    }
}

impl<T, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> Default for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<T: Clone, K, const MIN_PAGE: usize, const MAX_PAGE: usize> Clone for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    fn clone(&self) -> Self {
        return PagedBucketIndex {
            alloc: self.alloc.clone(),
            pages: self.pages.clone(),
            _key: PhantomData,
        };
    }
}

impl<T: fmt::Debug, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> fmt::Debug for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_list().entries(self.iter()).finish();
    }
}

impl<T: PartialEq, K, const MIN_PAGE: usize, const MAX_PAGE: usize> PartialEq for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    fn eq(&self, other: &Self) -> bool {
        return self.alloc == other.alloc && self.pages == other.pages;
    }
}

impl<T: Eq, K, const MIN_PAGE: usize, const MAX_PAGE: usize> Eq for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {}

impl<T: Hash, K, const MIN_PAGE: usize, const MAX_PAGE: usize> Hash for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.alloc.hash(state);
        self.pages.hash(state);
    }
}

/// Check that every live page is well formed and that no two reserved runs,
/// live or free, overlap.
fn check_pages<T, const MIN_PAGE: usize, const MAX_PAGE: usize>(
    alloc: &PagedAllocator<T, MIN_PAGE, MAX_PAGE>,
    pages: &[Page],
) -> Result<()> {
    for (key, page) in pages.iter().enumerate() {
        let bounded = (MIN_PAGE..=MAX_PAGE).contains(&page.capacity);
        if !page.capacity.is_power_of_two() || !bounded {
            return Err(Error::InvalidLayout(format!("bucket {} has capacity {}", key, page.capacity)));
        }
        if page.size > page.capacity {
            return Err(Error::InvalidLayout(format!(
                "bucket {} holds {} elements in capacity {}",
                key, page.size, page.capacity,
            )));
        }
    }
    return alloc.check_runs(pages);
}

impl<T, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> Fields for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE> {
    type Ref<'a> = (&'a [T], &'a [Vec<usize>], &'a [Page]) where Self: 'a;
    type Owned = (Vec<T>, Vec<Vec<usize>>, Vec<Page>);

    fn fields(&self) -> Self::Ref<'_> {
        let (arena, free_lists) = self.alloc.fields();
        return (arena, free_lists, &self.pages);
    }

    fn into_fields(self) -> Self::Owned {
        let (arena, free_lists) = self.alloc.into_fields();
        return (arena, free_lists, self.pages);
    }

    fn from_fields((arena, free_lists, pages): Self::Owned) -> Result<Self> {
        let alloc = PagedAllocator::from_fields((arena, free_lists))?;
        if let Err(err) = check_pages(&alloc, &pages) {
            debug!(%err, "rejected paged bucket index layout");
            return Err(err);
        }
        return Ok(PagedBucketIndex { alloc, pages, _key: PhantomData });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Small = PagedBucketIndex<u32, usize, 2, 16>;

    fn sample() -> Small {
        let mut index = Small::new();
        index.emplace_back(vec![1, 2, 3]);
        index.emplace_back(vec![4, 5]);
        return index;
    }

    #[test]
    fn emplace_back_and_read() {
        let index = sample();
        assert_eq!(index.len(), 2);
        assert_eq!(&index[0], &[1, 2, 3]);
        assert_eq!(&index[1], &[4, 5]);
        assert_eq!(index.pages()[0], Page { size: 3, capacity: 4, start: 0 });
        assert_eq!(index.pages()[1], Page { size: 2, capacity: 2, start: 4 });
    }

    #[test]
    fn checked_access() {
        let mut index = sample();
        assert_eq!(index.at(0), Ok(&[1, 2, 3][..]));
        assert_eq!(index.at(2), Err(Error::OutOfRange { key: 2, len: 2 }));
        assert!(index.at_mut(5).is_err());
        assert!(index.get(2).is_none());
    }

    #[test]
    fn push_in_place_keeps_start() {
        let mut index = sample();
        let before = index.pages()[0];
        index.bucket_mut(0).push(9);
        assert_eq!(index.pages()[0].start, before.start);
        assert_eq!(&index[0], &[1, 2, 3, 9]);
    }

    #[test]
    fn push_relocates_only_that_bucket() {
        let mut index = sample();
        let other = index.pages()[0];
        index.bucket_mut(1).push(6);

        assert_eq!(index.pages()[0], other);
        assert_eq!(&index[0], &[1, 2, 3]);
        assert_eq!(&index[1], &[4, 5, 6]);
        assert_eq!(index.capacity(1), 4);
        assert_eq!(index.allocator().free_count(), 1);
    }

    #[test]
    fn bucket_handle() {
        let mut index = sample();
        let mut bucket = index.bucket_mut(1);
        bucket.extend([6, 7, 8]);
        assert_eq!(bucket.as_slice(), &[4, 5, 6, 7, 8]);
        assert_eq!(bucket.pop(), Some(8));
        bucket.truncate(1);
        assert_eq!(bucket.as_slice(), &[4]);
        bucket.as_mut_slice()[0] = 40;
        bucket.clear();
        assert!(bucket.is_empty());
        assert_eq!(bucket.pop(), None);
        assert_eq!(&index[0], &[1, 2, 3]);
    }

    #[test]
    fn extend_from_unsized_iterator() {
        let mut index = sample();
        index.bucket_mut(0).extend((10..30).filter(|x| x % 5 == 0));
        assert_eq!(&index[0], &[1, 2, 3, 10, 15, 20, 25]);
    }

    #[test]
    fn insert_shifts_keys_not_storage() {
        let mut index = sample();
        let pages = index.pages().to_vec();
        index.insert(1, vec![7]);

        assert_eq!(index.len(), 3);
        assert_eq!(&index[0], &[1, 2, 3]);
        assert_eq!(&index[1], &[7]);
        assert_eq!(&index[2], &[4, 5]);
        assert_eq!(index.pages()[0], pages[0]);
        assert_eq!(index.pages()[2], pages[1]);
    }

    #[test]
    fn insert_at_end() {
        let mut index = sample();
        index.insert(2, vec![]);
        assert_eq!(index.len(), 3);
        assert!(index[2].is_empty());
    }

    #[test]
    #[should_panic(expected = "past 2 buckets")]
    fn insert_past_end_panics() {
        let mut index = sample();
        index.insert(3, vec![1]);
    }

    #[test]
    fn remove_frees_page() {
        let mut index = sample();
        let page = index.pages()[0];
        assert_eq!(index.remove(0), vec![1, 2, 3]);
        assert_eq!(index.len(), 1);
        assert_eq!(&index[0], &[4, 5]);
        assert!(index.allocator().is_free(page.start));

        index.emplace_back(vec![8, 8, 8, 8]);
        assert_eq!(index.pages()[1].start, page.start);
    }

    #[test]
    fn resize_shrink_frees_pages() {
        let mut index = sample();
        index.emplace_back(vec![6]);
        let dropped = index.pages()[1..].to_vec();
        index.resize(1);

        assert_eq!(index.len(), 1);
        assert_eq!(index.allocator().free_count(), 2);
        for page in dropped {
            assert!(index.allocator().is_free(page.start));
        }
    }

    #[test]
    fn resize_grow_adds_empty_buckets() {
        let mut index = sample();
        index.resize(4);
        assert_eq!(index.len(), 4);
        assert!(index[2].is_empty());
        assert!(index[3].is_empty());
        assert_eq!(index.capacity(3), 2);
    }

    #[test]
    fn swap_exchanges_keys() {
        let mut index = sample();
        index.swap(0, 1);
        assert_eq!(&index[0], &[4, 5]);
        assert_eq!(&index[1], &[1, 2, 3]);
    }

    #[test]
    fn compact_lays_out_in_key_order() {
        let mut index = sample();
        index.insert(0, vec![9, 9]);
        index.bucket_mut(2).push(6);
        index.compact();

        assert_eq!(index.allocator().free_count(), 0);
        let starts: Vec<usize> = index.pages().iter().map(|p| p.start).collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
        let buckets: Vec<&[u32]> = index.iter().collect();
        assert_eq!(buckets, vec![&[9, 9][..], &[1, 2, 3][..], &[4, 5, 6][..]]);
    }

    #[test]
    fn fields_round_trip() {
        let mut index = sample();
        index.bucket_mut(1).push(6);
        index.remove(0);

        let rebuilt = Small::from_fields(index.clone().into_fields()).unwrap();
        assert_eq!(rebuilt, index);
        assert_eq!(rebuilt.allocator().free_count(), index.allocator().free_count());
    }

    #[test]
    fn from_fields_rejects_overlap() {
        let index = sample();
        let (arena, free_lists, mut pages) = index.into_fields();
        pages[1].start = 2;
        let result = Small::from_fields((arena, free_lists, pages));
        assert!(matches!(result, Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn from_fields_rejects_overflowing_start() {
        let index = sample();
        let (arena, free_lists, mut pages) = index.into_fields();
        pages[1] = Page { size: 1, capacity: 2, start: usize::MAX };
        let result = Small::from_fields((arena, free_lists, pages));
        assert!(matches!(result, Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn from_fields_rejects_live_page_on_free_list() {
        let mut index = sample();
        index.emplace_back(vec![1]);
        let (arena, mut free_lists, pages) = index.into_fields();
        free_lists[0].push(pages[1].start);
        let result = Small::from_fields((arena, free_lists, pages));
        assert!(matches!(result, Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn clear() {
        let mut index = sample();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.allocator().arena_len(), 0);
    }
}
