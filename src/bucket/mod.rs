//! Bucket indices: many variable-length buckets stored contiguously.
//!
//! - `FlatBucketIndex`: one data array plus an offsets array, append-only
//! - `PagedBucketIndex`: one page per bucket in a `PagedAllocator`, so
//!   buckets grow and shrink independently
//! - `NestedBucketIndex`: N stacked offsets arrays over one data array
//!
//! Buckets are handed out as plain slices. They borrow the index, so the
//! borrow checker rules out any view outliving a structural change.

pub mod flat;
pub mod nested;
pub mod paged;
pub mod ragged;

pub use flat::Buckets;
pub use flat::BucketsMut;
pub use flat::FlatBucketIndex;
pub use nested::Entries;
pub use nested::EntriesMut;
pub use nested::Entry;
pub use nested::EntryMut;
pub use nested::MetaBucket;
pub use nested::MetaBucketMut;
pub use nested::NestedBucketIndex;
pub use paged::BucketMut;
pub use paged::PagedBucketIndex;
pub use ragged::Ragged;
