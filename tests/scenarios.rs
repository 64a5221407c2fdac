//! End-to-end scenarios for each container.

use ragged::Error;
use ragged::Fields;
use ragged::fingerprint;
use ragged::ragged;
use ragged::alloc::Page;
use ragged::alloc::PagedAllocator;
use ragged::bucket::Entry;
use ragged::bucket::FlatBucketIndex;
use ragged::bucket::NestedBucketIndex;
use ragged::bucket::PagedBucketIndex;

// =============================================================================
// Flat
// =============================================================================

#[test]
fn flat_two_buckets() {
    let mut index: FlatBucketIndex<u32> = FlatBucketIndex::new();
    index.emplace_back([1, 2, 3]);
    index.emplace_back([4, 5]);

    assert_eq!(index.offsets(), &[0, 3, 5]);
    assert_eq!(index.len(), 2);
    assert_eq!(&index[0], &[1, 2, 3]);
    assert_eq!(&index[1], &[4, 5]);
    assert_eq!(index.at(2), Err(Error::OutOfRange { key: 2, len: 2 }));
}

#[test]
fn flat_resize_truncates_data() {
    let mut index: FlatBucketIndex<u32> = [vec![1, 2, 3], vec![4, 5], vec![6]].into_iter().collect();
    index.resize(1);
    assert_eq!(index.data(), &[1, 2, 3]);
    assert_eq!(index.offsets(), &[0, 3]);

    index.resize(3);
    assert_eq!(index.len(), 3);
    assert!(index[1].is_empty());
    assert!(index[2].is_empty());
}

#[test]
fn flat_fill_in_place() {
    let mut index: FlatBucketIndex<u64> = FlatBucketIndex::new();
    for (i, slot) in index.add_back_sized(4).iter_mut().enumerate() {
        *slot = i as u64 * 10;
    }
    assert_eq!(&index[0], &[0, 10, 20, 30]);
}

// =============================================================================
// Allocator
// =============================================================================

#[test]
fn allocator_reuses_freed_start() {
    let mut alloc: PagedAllocator<u32, 2, 16> = PagedAllocator::new();
    let page = alloc.create_page(3);
    assert_eq!(page.capacity, 4);
    assert_eq!(page.size, 3);

    alloc.free_page(page);
    let reused = alloc.create_page(4);
    assert_eq!(reused.start, page.start);
    assert_eq!(reused.capacity, 4);
    assert_eq!(alloc.stats().reused_pages, 1);
}

#[test]
fn allocator_reuse_is_last_in_first_out() {
    let mut alloc: PagedAllocator<u32, 2, 16> = PagedAllocator::new();
    let a = alloc.create_page(2);
    let b = alloc.create_page(2);
    alloc.free_page(a);
    alloc.free_page(b);
    assert_eq!(alloc.create_page(1).start, b.start);
    assert_eq!(alloc.create_page(1).start, a.start);
}

#[test]
fn allocator_single_pushes_reach_next_power_of_two() {
    let mut alloc: PagedAllocator<u32, 2, 1024> = PagedAllocator::new();
    let mut page = alloc.create_page(0);
    for i in 0..100 {
        page = alloc.resize_page(page, i + 1);
        alloc.page_mut(&page)[i] = i as u32;
    }
    assert_eq!(page.capacity, 128);
    assert_eq!(alloc.page(&page), (0..100).collect::<Vec<u32>>().as_slice());
    assert!(alloc.stats().copied_elements < 2 * 100);
}

#[test]
#[should_panic(expected = "exceeds MAX_PAGE")]
fn allocator_rejects_oversized_page() {
    let mut alloc: PagedAllocator<u8, 2, 16> = PagedAllocator::new();
    alloc.create_page(17);
}

#[test]
fn invalid_page_sentinel() {
    assert!(!Page::default().is_valid());
    assert_eq!(Page::default(), Page::INVALID);
}

// =============================================================================
// Paged
// =============================================================================

#[test]
fn paged_buckets_grow_independently() {
    let mut index: PagedBucketIndex<u32, usize, 2, 64> = PagedBucketIndex::new();
    let a = index.emplace_back([1]);
    let b = index.emplace_back([2]);
    for i in 0..20 {
        index.bucket_mut(a).push(100 + i);
    }
    index.bucket_mut(b).push(3);

    assert_eq!(index[a].len(), 21);
    assert_eq!(index[a][20], 119);
    assert_eq!(&index[b], &[2, 3]);
    assert_eq!(index.capacity(a), 32);
}

#[test]
fn paged_removed_pages_are_recycled() {
    let mut index: PagedBucketIndex<u32, usize, 2, 64> = PagedBucketIndex::new();
    index.emplace_back([1, 2, 3]);
    index.emplace_back([4]);
    let arena = index.allocator().arena_len();

    assert_eq!(index.remove(0), vec![1, 2, 3]);
    index.emplace_back([7, 8, 9, 10]);
    assert_eq!(index.allocator().arena_len(), arena);
    assert_eq!(&index[0], &[4]);
    assert_eq!(&index[1], &[7, 8, 9, 10]);
}

#[test]
fn paged_insert_then_compact() {
    let mut index: PagedBucketIndex<char> = PagedBucketIndex::new();
    index.emplace_back(['a']);
    index.emplace_back(['c']);
    index.insert(1, ['b']);
    let before = fingerprint(&index.iter().collect::<Vec<_>>());

    index.compact();
    let starts: Vec<usize> = index.pages().iter().map(|page| page.start).collect();
    assert!(starts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(fingerprint(&index.iter().collect::<Vec<_>>()), before);
}

// =============================================================================
// Nested
// =============================================================================

fn two_level() -> NestedBucketIndex<u32, 2> {
    let mut index = NestedBucketIndex::new();
    index.emplace_back(ragged!([1, 2], [3])).unwrap();
    index.emplace_back(ragged!([4])).unwrap();
    return index;
}

#[test]
fn nested_sizes() {
    let index = two_level();
    assert_eq!(index.size(&[]), 2);
    assert_eq!(index.size(&[0]), 2);
    assert_eq!(index.size(&[1]), 1);

    let sub: Vec<usize> = (0..index.size(&[0])).map(|j| index.size(&[0, j])).collect();
    assert_eq!(sub, vec![2, 1]);
}

#[test]
fn nested_element_access() {
    let index = two_level();
    assert_eq!(index.at([0, 0]), Ok(&[1, 2][..]));
    assert_eq!(index.leaves(0).unwrap()[0], 1);
    assert_eq!(index.leaves(0).unwrap()[1], 2);
    assert_eq!(index.leaves(1).unwrap()[0], 4);
}

#[test]
fn nested_size_matches_top_offsets() {
    let index = two_level();
    for i in 0..index.len() {
        let top = index.offsets(1);
        assert_eq!(index.size(&[i]), top[i + 1] - top[i]);
    }
}

#[test]
fn nested_walk() {
    let index = two_level();
    let mut flattened = Vec::new();
    for top in &index {
        let Entry::Meta(meta) = top else {
            panic!("top-level entries of a two-level index are meta buckets");
        };
        for leaf in meta {
            flattened.extend_from_slice(leaf.as_bucket().unwrap());
        }
    }
    assert_eq!(flattened, index.data());
}

#[test]
fn field_tuples_round_trip() {
    let index = two_level();
    let fields = index.clone().into_fields();
    assert_eq!(fields.0[1], vec![0, 2, 3]);
    let rebuilt = NestedBucketIndex::<u32, 2>::from_fields(fields).unwrap();
    assert_eq!(fingerprint(&rebuilt), fingerprint(&index));
}
