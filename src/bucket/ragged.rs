//! Ragged trees, the input to `NestedBucketIndex::emplace_back`.

/// A ragged multi-dimensional value: leaves hold elements, branches hold
/// sub-trees of any length.
///
/// Build one with the `ragged!` macro:
///
/// ```
/// use ragged::ragged;
/// use ragged::bucket::Ragged;
///
/// let tree: Ragged<u32> = ragged!([1, 2], [3]);
/// assert_eq!(tree, Ragged::Branch(vec![Ragged::Leaf(vec![1, 2]), Ragged::Leaf(vec![3])]));
/// assert_eq!(tree.depth(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ragged<T> {
    Leaf(Vec<T>),
    Branch(Vec<Ragged<T>>),
}

impl<T> Ragged<T> {
    pub fn leaf<I: IntoIterator<Item = T>>(values: I) -> Self {
        return Ragged::Leaf(values.into_iter().collect());
    }

    pub fn branch<I: IntoIterator<Item = Ragged<T>>>(children: I) -> Self {
        return Ragged::Branch(children.into_iter().collect());
    }

    /// Depth along the first path. An empty branch counts as a branch over
    /// leaves.
    pub fn depth(&self) -> usize {
        return match self {
            Ragged::Leaf(_) => 1,
            Ragged::Branch(children) => 1 + children.first().map_or(1, Ragged::depth),
        };
    }

    /// `None` if every leaf sits exactly `expected` levels down, otherwise
    /// the depth of the first offending path.
    pub(crate) fn mismatch(&self, expected: usize) -> Option<usize> {
        return match self {
            Ragged::Leaf(_) if expected == 1 => None,
            Ragged::Leaf(_) => Some(1),
            Ragged::Branch(_) if expected == 1 => Some(self.depth()),
            Ragged::Branch(children) => children
                .iter()
                .find_map(|child| child.mismatch(expected - 1))
                .map(|found| found + 1),
        };
    }
}

/// Build a `Ragged` tree from nested brackets.
///
/// Elements become leaves; a bracketed list becomes a branch. An element
/// that is itself an array literal is read as a branch, so use
/// `Ragged::leaf` for arrays of arrays.
///
/// ```
/// use ragged::ragged;
/// use ragged::bucket::Ragged;
///
/// let leaf: Ragged<u8> = ragged!(1, 2, 3);
/// assert_eq!(leaf, Ragged::Leaf(vec![1, 2, 3]));
///
/// let deep: Ragged<u8> = ragged!([[1], []], [[2, 3]]);
/// assert_eq!(deep.depth(), 3);
/// ```
#[macro_export]
macro_rules! ragged {
    ($([$($inner:tt)*]),+ $(,)?) => {
        $crate::bucket::Ragged::Branch(vec![$($crate::ragged!($($inner)*)),+])
    };
    ($($leaf:expr),* $(,)?) => {
        $crate::bucket::Ragged::Leaf(vec![$($leaf),*])
    };
}
