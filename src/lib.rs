//! Ragged - bucket indices over flat arrays and a paged arena.
//!
//! A ragged array is a sequence of variable-length buckets. Every container
//! here keeps its buckets in a handful of flat arrays, so its whole state is
//! a short tuple of vectors (see `Fields`).
//!
//! # Quick Start
//!
//! ```
//! use ragged::ragged;
//! use ragged::bucket::FlatBucketIndex;
//! use ragged::bucket::NestedBucketIndex;
//! use ragged::bucket::PagedBucketIndex;
//!
//! // Append-only buckets over one data array
//! let mut flat: FlatBucketIndex<u32> = FlatBucketIndex::new();
//! flat.emplace_back([1, 2, 3]);
//! flat.emplace_back([4, 5]);
//! assert_eq!(flat.offsets(), &[0, 3, 5]);
//! assert_eq!(&flat[1], &[4, 5]);
//!
//! // Buckets that grow independently
//! let mut paged: PagedBucketIndex<u32> = PagedBucketIndex::new();
//! let a = paged.emplace_back([1]);
//! let b = paged.emplace_back([2]);
//! paged.bucket_mut(a).push(10);
//! assert_eq!(&paged[a], &[1, 10]);
//! assert_eq!(&paged[b], &[2]);
//!
//! // Two levels of nesting
//! let mut nested: NestedBucketIndex<u32, 2> = NestedBucketIndex::new();
//! nested.emplace_back(ragged!([1, 2], [3])).unwrap();
//! nested.emplace_back(ragged!([4])).unwrap();
//! assert_eq!(nested.size(&[0]), 2);
//! assert_eq!(nested.at([0, 0]).unwrap(), &[1, 2]);
//! ```

pub mod alloc;
pub mod bucket;
pub mod config;
pub mod error;
pub mod fields;
pub mod fingerprint;
pub mod key;

#[cfg(feature = "serde")]
mod serial;

pub use alloc::Page;
pub use alloc::PagedAllocator;
pub use bucket::FlatBucketIndex;
pub use bucket::NestedBucketIndex;
pub use bucket::PagedBucketIndex;
pub use bucket::Ragged;
pub use error::Error;
pub use error::Result;
pub use fields::Fields;
pub use fingerprint::Fingerprint;
pub use fingerprint::fingerprint;
pub use key::Key;
