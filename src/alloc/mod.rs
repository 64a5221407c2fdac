//! Paged arena allocation.
//!
//! - `Page`: descriptor of one power-of-two run in an arena
//! - `PagedAllocator`: the arena plus one free list per size class

pub mod allocator;
pub mod page;

pub use allocator::AllocStats;
pub use allocator::PagedAllocator;
pub use page::Page;
