//! Serde bridge, behind the `serde` feature.
//!
//! Containers serialize as their field tuple and deserialize through
//! `Fields::from_fields`, so a payload that breaks an invariant is rejected
//! instead of producing a corrupt container.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;

use crate::alloc::Page;
use crate::alloc::PagedAllocator;
use crate::bucket::FlatBucketIndex;
use crate::bucket::NestedBucketIndex;
use crate::bucket::PagedBucketIndex;
use crate::fields::Fields;
use crate::key::Key;

impl<T: Serialize, const MIN_PAGE: usize, const MAX_PAGE: usize> Serialize for PagedAllocator<T, MIN_PAGE, MAX_PAGE> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        return self.fields().serialize(serializer);
    }
}

impl<'de, T, const MIN_PAGE: usize, const MAX_PAGE: usize> Deserialize<'de> for PagedAllocator<T, MIN_PAGE, MAX_PAGE>
where
    T: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = <(Vec<T>, Vec<Vec<usize>>)>::deserialize(deserializer)?;
        return Self::from_fields(fields).map_err(D::Error::custom);
    }
}

impl<T: Serialize, K: Key> Serialize for FlatBucketIndex<T, K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        return self.fields().serialize(serializer);
    }
}

impl<'de, T: Deserialize<'de>, K: Key> Deserialize<'de> for FlatBucketIndex<T, K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = <(Vec<T>, Vec<usize>)>::deserialize(deserializer)?;
        return Self::from_fields(fields).map_err(D::Error::custom);
    }
}

impl<T: Serialize, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> Serialize
    for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE>
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        return self.fields().serialize(serializer);
    }
}

impl<'de, T, K: Key, const MIN_PAGE: usize, const MAX_PAGE: usize> Deserialize<'de>
    for PagedBucketIndex<T, K, MIN_PAGE, MAX_PAGE>
where
    T: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = <(Vec<T>, Vec<Vec<usize>>, Vec<Page>)>::deserialize(deserializer)?;
        return Self::from_fields(fields).map_err(D::Error::custom);
    }
}

// serde only implements arrays up to fixed lengths, so levels travel as a
// sequence.
impl<T: Serialize, const N: usize, K: Key> Serialize for NestedBucketIndex<T, N, K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (offsets, data) = self.fields();
        return (&offsets[..], data).serialize(serializer);
    }
}

impl<'de, T: Deserialize<'de>, const N: usize, K: Key> Deserialize<'de> for NestedBucketIndex<T, N, K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (offsets, data) = <(Vec<Vec<usize>>, Vec<T>)>::deserialize(deserializer)?;
        let found = offsets.len();
        let offsets: [Vec<usize>; N] = offsets
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected {} offset levels, found {}", N, found)))?;
        return Self::from_fields((offsets, data)).map_err(D::Error::custom);
    }
}
