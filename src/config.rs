//! Compile-time configuration.
//!
//! Page sizes are const generic parameters on the allocator and the paged
//! index. These are the defaults used when a caller does not pick its own.

/// Smallest page capacity, in elements.
pub const DEFAULT_MIN_PAGE: usize = 4;

/// Largest page capacity, in elements. Requests above this panic.
pub const DEFAULT_MAX_PAGE: usize = 1 << 20;

/// Number of size classes between `min` and `max`, both powers of two.
pub const fn class_count(min: usize, max: usize) -> usize {
    return (max.trailing_zeros() - min.trailing_zeros()) as usize + 1;
}

/// Check a page configuration. Used in const context so that a bad
/// configuration fails to compile.
pub const fn check_page_bounds(min: usize, max: usize) {
    assert!(min.is_power_of_two(), "MIN_PAGE must be a power of two");
    assert!(max.is_power_of_two(), "MAX_PAGE must be a power of two");
    assert!(min <= max, "MIN_PAGE must not exceed MAX_PAGE");
}
