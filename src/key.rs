//! Typed bucket keys.
//!
//! Every index addresses buckets by position. `Key` lets call sites use a
//! domain newtype (say `NodeId`) instead of a bare `usize`, while the
//! containers only ever see the position.

/// A value that converts to and from a bucket position.
pub trait Key: Copy {
    fn index(self) -> usize;
    fn from_index(index: usize) -> Self;
}

impl Key for usize {
    #[inline]
    fn index(self) -> usize {
        return self;
    }

    #[inline]
    fn from_index(index: usize) -> Self {
        return index;
    }
}

macro_rules! impl_key_for_int {
    ($($int:ty),*) => {
        $(
            impl Key for $int {
                #[inline]
                fn index(self) -> usize {
                    return self as usize;
                }

                #[inline]
                /// Panics if `index` does not fit.
                fn from_index(index: usize) -> Self {
                    return match <$int>::try_from(index) {
                        Ok(key) => key,
                        Err(_) => panic!("key {} overflows {}", index, stringify!($int)),
                    };
                }
            }
        )*
    };
}

impl_key_for_int!(u8, u16, u32, u64);

/// Declare a newtype bucket key.
///
/// ```
/// ragged::bucket_key! {
///     /// A vertex in some graph.
///     pub struct VertexId(u32);
/// }
///
/// use ragged::key::Key;
/// assert_eq!(VertexId(7).index(), 7);
/// assert_eq!(VertexId::from_index(3), VertexId(3));
/// ```
#[macro_export]
macro_rules! bucket_key {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name(pub $inner);

        impl $crate::key::Key for $name {
            #[inline]
            fn index(self) -> usize {
                return $crate::key::Key::index(self.0);
            }

            #[inline]
            fn from_index(index: usize) -> Self {
                return $name(<$inner as $crate::key::Key>::from_index(index));
            }
        }
    };
}
