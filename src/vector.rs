//!
//! Fixed size vectors indexed by graph elements
//!
//! `NodeVec<T>` is indexed by `NodeIndex` (a state of the supervision) and
//! `EdgeVec<T>` by `EdgeIndex` (an arc). The arc id is the key shared by the
//! lookup indexes, the arc log-probs and the posteriors, so those values
//! never depend on the order in which arcs were visited.
//!
pub use petgraph::graph::{EdgeIndex, NodeIndex};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Abstraction of types that can be used as an index of `Vector`
pub trait Indexable: Copy {
    fn new(x: usize) -> Self;
    fn index(&self) -> usize;
}

impl Indexable for usize {
    #[inline]
    fn new(x: usize) -> Self {
        x
    }
    #[inline]
    fn index(&self) -> usize {
        *self
    }
}

impl Indexable for NodeIndex {
    #[inline]
    fn new(x: usize) -> Self {
        NodeIndex::new(x)
    }
    #[inline]
    fn index(&self) -> usize {
        NodeIndex::index(*self)
    }
}

impl Indexable for EdgeIndex {
    #[inline]
    fn new(x: usize) -> Self {
        EdgeIndex::new(x)
    }
    #[inline]
    fn index(&self) -> usize {
        EdgeIndex::index(*self)
    }
}

/// Dense vector with a typed index
#[derive(Clone, Debug, PartialEq)]
pub struct Vector<T, Ix: Indexable = usize> {
    storage: Vec<T>,
    ty: PhantomData<Ix>,
}

/// Vector over the states of a graph
pub type NodeVec<T> = Vector<T, NodeIndex>;

/// Vector over the arcs of a graph
pub type EdgeVec<T> = Vector<T, EdgeIndex>;

impl<T: Copy, Ix: Indexable> Vector<T, Ix> {
    /// Create a new Vector, with fixed size and filled by default_value.
    pub fn new(size: usize, default_value: T) -> Vector<T, Ix> {
        Vector {
            storage: vec![default_value; size],
            ty: PhantomData,
        }
    }
}

impl<T, Ix: Indexable> Vector<T, Ix> {
    /// Wrap an existing vec; `vec[i]` is the value of index `i`.
    pub fn from_vec(storage: Vec<T>) -> Vector<T, Ix> {
        Vector {
            storage,
            ty: PhantomData,
        }
    }
    pub fn len(&self) -> usize {
        self.storage.len()
    }
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
    /// Get an iterator on (index, &item).
    pub fn iter<'a>(&'a self) -> impl 'a + Iterator<Item = (Ix, &'a T)> {
        self.storage
            .iter()
            .enumerate()
            .map(|(i, v)| (Ix::new(i), v))
    }
    /// Raw values ordered by index
    pub fn as_slice(&self) -> &[T] {
        &self.storage
    }
}

impl<T, Ix: Indexable> Index<Ix> for Vector<T, Ix> {
    type Output = T;
    fn index(&self, index: Ix) -> &Self::Output {
        &self.storage[index.index()]
    }
}

impl<T, Ix: Indexable> IndexMut<Ix> for Vector<T, Ix> {
    fn index_mut(&mut self, index: Ix) -> &mut Self::Output {
        &mut self.storage[index.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ei, ni};
    use crate::prob::{p, Prob};

    #[test]
    fn nodevec() {
        let mut v: NodeVec<u32> = NodeVec::new(5, 0);
        v[ni(1)] = 100;
        assert_eq!(v.len(), 5);
        assert_eq!(v[ni(0)], 0);
        assert_eq!(v[ni(1)], 100);
        let w: Vec<(NodeIndex, u32)> = v.iter().map(|(i, &x)| (i, x)).collect();
        assert_eq!(
            w,
            vec![
                (ni(0), 0),
                (ni(1), 100),
                (ni(2), 0),
                (ni(3), 0),
                (ni(4), 0),
            ]
        );
    }
    #[test]
    fn edgevec_of_prob() {
        let mut v: EdgeVec<Prob> = EdgeVec::new(3, Prob::zero());
        v[ei(2)] += p(0.5);
        v[ei(2)] += p(0.25);
        assert!(v[ei(0)].is_zero());
        assert_abs_diff_eq!(v[ei(2)], p(0.75), epsilon = 1e-12);
    }
    #[test]
    #[should_panic]
    fn vector_outside() {
        let mut v: EdgeVec<u32> = EdgeVec::from_vec(vec![1, 2, 3]);
        v[ei(3)] = 22;
    }
}
