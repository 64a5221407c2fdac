//! Paged arena allocator with size-classed free lists.
//!
//! All pages live in one `Vec<T>` arena. A request is rounded up to a power
//! of two between `MIN_PAGE` and `MAX_PAGE`; each power of two is a size
//! class with its own LIFO free list. Freed pages are recycled by later
//! requests of the same class, fresh pages are appended to the arena tail.
//!
//! Growing a page past its capacity moves it to a page of the next fitting
//! class, so pushing one element at a time costs amortized O(1), the same
//! argument as for `Vec` doubling.
//!
//! Complexity:
//! - `create_page`: O(capacity) for a fresh page, O(size) for a reused one
//! - `free_page`: O(1)
//! - `resize_page`: O(1) in place, O(size) when relocating

use std::hash::Hash;
use std::hash::Hasher;

use rustc_hash::FxHashSet;
use tracing::debug;
use tracing::trace;

use super::page::Page;
use crate::config::DEFAULT_MAX_PAGE;
use crate::config::DEFAULT_MIN_PAGE;
use crate::config::check_page_bounds;
use crate::config::class_count;
use crate::error::Error;
use crate::error::Result;
use crate::fields::Fields;

/// Counters describing the work an allocator has done since it was built
/// or last cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Elements appended to the arena for fresh pages.
    pub fresh_elements: usize,
    /// Pages handed out from a free list.
    pub reused_pages: usize,
    /// Pages moved by `resize_page`.
    pub relocations: usize,
    /// Elements copied while relocating.
    pub copied_elements: usize,
}

/// A single arena handing out independently resizable pages.
#[derive(Clone, Debug)]
pub struct PagedAllocator<T, const MIN_PAGE: usize = DEFAULT_MIN_PAGE, const MAX_PAGE: usize = DEFAULT_MAX_PAGE> {
    arena: Vec<T>,
    /// One stack of page starts per size class, smallest class first.
    free_lists: Vec<Vec<usize>>,
    /// Starts of every page currently on a free list.
    freed: FxHashSet<usize>,
    stats: AllocStats,
}

impl<T, const MIN_PAGE: usize, const MAX_PAGE: usize> PagedAllocator<T, MIN_PAGE, MAX_PAGE> {
    /// Number of size classes.
    pub const CLASSES: usize = class_count(MIN_PAGE, MAX_PAGE);

    pub fn new() -> Self {
        const { check_page_bounds(MIN_PAGE, MAX_PAGE) };
        return PagedAllocator {
            arena: Vec::new(),
            free_lists: vec![Vec::new(); Self::CLASSES],
            freed: FxHashSet::default(),
            stats: AllocStats::default(),
        };
    }

    /// Capacity of the page that would serve a request of `requested` elements.
    ///
    /// Panics if the capacity would exceed `MAX_PAGE`.
    pub fn capacity_for(requested: usize) -> usize {
        let capacity = requested.max(MIN_PAGE).checked_next_power_of_two();
        return match capacity {
            Some(capacity) if capacity <= MAX_PAGE => capacity,
            _ => panic!("page of {} elements exceeds MAX_PAGE ({})", requested, MAX_PAGE),
        };
    }

    /// Size class index of a page capacity.
    #[inline]
    pub fn class_of(capacity: usize) -> usize {
        debug_assert!(capacity.is_power_of_two(), "capacity {} is not a power of two", capacity);
        debug_assert!((MIN_PAGE..=MAX_PAGE).contains(&capacity), "capacity {} outside page bounds", capacity);
        return (capacity.trailing_zeros() - MIN_PAGE.trailing_zeros()) as usize;
    }

    /// Return a page to its free list. Its start may be handed out again by
    /// the next request of the same class.
    ///
    /// Panics on the invalid page, a page outside the arena, or a double free.
    pub fn free_page(&mut self, page: Page) {
        assert!(page.is_valid(), "cannot free the invalid page");
        assert!(
            page.checked_end().is_some_and(|end| end <= self.arena.len()),
            "page {:?} lies outside the arena of {} elements",
            page,
            self.arena.len(),
        );
        assert!(self.freed.insert(page.start), "page at {} freed twice", page.start);

        let class = Self::class_of(page.capacity);
        self.free_lists[class].push(page.start);
        trace!(start = page.start, capacity = page.capacity, class, "freed page");
    }

    /// Live elements of a page.
    #[inline]
    pub fn page(&self, page: &Page) -> &[T] {
        debug_assert!(page.size <= page.capacity, "page {:?} overflows its capacity", page);
        return &self.arena[page.live()];
    }

    /// Mutable live elements of a page.
    #[inline]
    pub fn page_mut(&mut self, page: &Page) -> &mut [T] {
        debug_assert!(page.size <= page.capacity, "page {:?} overflows its capacity", page);
        return &mut self.arena[page.live()];
    }

    /// Drop the arena and forget every free page. All pages issued so far
    /// become invalid.
    pub fn clear(&mut self) {
        debug!(arena = self.arena.len(), free = self.freed.len(), "clearing paged allocator");
        self.arena.clear();
        for list in self.free_lists.iter_mut() {
            list.clear();
        }
        self.freed.clear();
        self.stats = AllocStats::default();
    }

    /// Number of pages waiting on free lists.
    #[inline]
    pub fn free_count(&self) -> usize {
        return self.freed.len();
    }

    /// Whether a page starting at `start` is currently free.
    #[inline]
    pub fn is_free(&self, start: usize) -> bool {
        return self.freed.contains(&start);
    }

    /// Total elements reserved by the arena, live or free.
    #[inline]
    pub fn arena_len(&self) -> usize {
        return self.arena.len();
    }

    #[inline]
    pub fn arena(&self) -> &[T] {
        return &self.arena;
    }

    #[inline]
    pub fn free_lists(&self) -> &[Vec<usize>] {
        return &self.free_lists;
    }

    #[inline]
    pub fn stats(&self) -> AllocStats {
        return self.stats;
    }

    /// Check that `live` and every free page lie inside the arena and that
    /// no two of them share a reserved position.
    pub(crate) fn check_runs(&self, live: &[Page]) -> Result<()> {
        let free = self.free_lists.iter().enumerate().flat_map(|(class, list)| {
            list.iter().map(move |&start| Page { size: 0, capacity: MIN_PAGE << class, start })
        });
        let mut runs: Vec<Page> = live.iter().copied().chain(free).collect();

        for page in &runs {
            if !page.checked_end().is_some_and(|end| end <= self.arena.len()) {
                return Err(Error::InvalidLayout(format!(
                    "page at {} (capacity {}) lies outside the arena of {} elements",
                    page.start,
                    page.capacity,
                    self.arena.len(),
                )));
            }
        }

        runs.sort_unstable_by_key(|page| page.start);
        if let Some(w) = runs.windows(2).find(|w| w[0].reserved().end > w[1].start) {
            return Err(Error::InvalidLayout(format!("pages at {} and {} overlap", w[0].start, w[1].start)));
        }
        return Ok(());
    }

    /// Clone the live elements of `src` into the front of `dst`.
    /// The two pages must not overlap.
    fn copy_live(&mut self, src: &Page, dst: &Page)
    where
        T: Clone,
    {
        let len = src.size;
        debug_assert!(len <= dst.capacity);
        if src.start < dst.start {
            debug_assert!(src.reserved().end <= dst.start, "pages overlap");
            let (lo, hi) = self.arena.split_at_mut(dst.start);
            hi[..len].clone_from_slice(&lo[src.start..src.start + len]);
        } else {
            debug_assert!(dst.reserved().end <= src.start, "pages overlap");
            let (lo, hi) = self.arena.split_at_mut(src.start);
            lo[dst.start..dst.start + len].clone_from_slice(&hi[..len]);
        }
    }
}

impl<T: Clone + Default, const MIN_PAGE: usize, const MAX_PAGE: usize> PagedAllocator<T, MIN_PAGE, MAX_PAGE> {
    /// Allocate a page holding `requested_size` default elements.
    ///
    /// Reuses the most recently freed page of the matching class if there is
    /// one, otherwise grows the arena by the page capacity.
    pub fn create_page(&mut self, requested_size: usize) -> Page {
        let capacity = Self::capacity_for(requested_size);
        let class = Self::class_of(capacity);

        if let Some(start) = self.free_lists[class].pop() {
            self.freed.remove(&start);
            self.arena[start..start + requested_size].fill_with(T::default);
            self.stats.reused_pages += 1;
            trace!(start, capacity, class, "reused page");
            return Page { size: requested_size, capacity, start };
        }

        let start = self.arena.len();
        self.arena.resize_with(start + capacity, T::default);
        self.stats.fresh_elements += capacity;
        trace!(start, capacity, class, "created page");
        return Page { size: requested_size, capacity, start };
    }

    /// Change the live size of a page.
    ///
    /// Stays in place while `new_size` fits the capacity. Otherwise the live
    /// elements move to a new page, the old one is freed, and the new
    /// descriptor is returned. Slots exposed by growth hold `T::default()`.
    pub fn resize_page(&mut self, page: Page, new_size: usize) -> Page {
        assert!(page.is_valid(), "cannot resize the invalid page");
        debug_assert!(!self.is_free(page.start), "resizing freed page at {}", page.start);

        if new_size <= page.capacity {
            if new_size > page.size {
                self.arena[page.start + page.size..page.start + new_size].fill_with(T::default);
            }
            return Page { size: new_size, ..page };
        }

        let moved = self.create_page(new_size);
        self.copy_live(&page, &moved);
        self.free_page(page);
        self.stats.relocations += 1;
        self.stats.copied_elements += page.size;
        trace!(from = page.start, to = moved.start, capacity = moved.capacity, "relocated page");
        return moved;
    }
}

impl<T, const MIN_PAGE: usize, const MAX_PAGE: usize> Default for PagedAllocator<T, MIN_PAGE, MAX_PAGE> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<T: PartialEq, const MIN_PAGE: usize, const MAX_PAGE: usize> PartialEq for PagedAllocator<T, MIN_PAGE, MAX_PAGE> {
    fn eq(&self, other: &Self) -> bool {
        return self.fields() == other.fields();
    }
}

impl<T: Eq, const MIN_PAGE: usize, const MAX_PAGE: usize> Eq for PagedAllocator<T, MIN_PAGE, MAX_PAGE> {}

impl<T: Hash, const MIN_PAGE: usize, const MAX_PAGE: usize> Hash for PagedAllocator<T, MIN_PAGE, MAX_PAGE> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields().hash(state);
    }
}

impl<T, const MIN_PAGE: usize, const MAX_PAGE: usize> Fields for PagedAllocator<T, MIN_PAGE, MAX_PAGE> {
    type Ref<'a> = (&'a [T], &'a [Vec<usize>]) where Self: 'a;
    type Owned = (Vec<T>, Vec<Vec<usize>>);

    fn fields(&self) -> Self::Ref<'_> {
        return (&self.arena, &self.free_lists);
    }

    fn into_fields(self) -> Self::Owned {
        return (self.arena, self.free_lists);
    }

    fn from_fields((arena, free_lists): Self::Owned) -> Result<Self> {
        if free_lists.len() != Self::CLASSES {
            return Err(Error::InvalidLayout(format!(
                "expected {} free lists, found {}",
                Self::CLASSES,
                free_lists.len(),
            )));
        }

        let mut freed = FxHashSet::default();
        for &start in free_lists.iter().flatten() {
            if !freed.insert(start) {
                return Err(Error::InvalidLayout(format!("page at {} is freed twice", start)));
            }
        }

        let alloc = PagedAllocator {
            arena,
            free_lists,
            freed,
            stats: AllocStats::default(),
        };
        alloc.check_runs(&[])?;
        return Ok(alloc);
    }
}
