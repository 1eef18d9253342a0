//! # Vectors
//!
//! Dense vectors for working storage (solve right hand sides, primal values, duals) and sparse
//! vectors for quantities that stay mostly zero (matrix columns, certificate rays).
use std::slice::Iter;

use itertools::repeat_n;
use num_traits::Float;

use crate::data::linear_algebra::SparseTuple;

/// Dense storage with explicit zeros.
///
/// Used for right hand sides of factorization solves and for the per-variable work arrays of the
/// simplex and barrier cores.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseVector<F> {
    data: Vec<F>,
}

impl<F: Float> DenseVector<F> {
    /// Create a vector of the given length filled with zeros.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self { data: repeat_n(F::zero(), len).collect() }
    }

    /// Wrap an existing buffer.
    #[must_use]
    pub fn new(data: Vec<F>) -> Self {
        Self { data }
    }

    /// Number of elements, zero or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the vector has no elements at all (not: whether it is the zero vector).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reset all elements to zero, keeping the allocation.
    pub fn clear(&mut self) {
        for value in &mut self.data {
            *value = F::zero();
        }
    }

    /// Inner product with a sparse collection of tuples.
    #[must_use]
    pub fn sparse_inner_product<'a>(
        &self,
        tuples: impl Iterator<Item = &'a SparseTuple<F>>,
    ) -> F
    where
        F: 'a,
    {
        let mut total = F::zero();
        for &(i, value) in tuples {
            debug_assert!(i < self.data.len());

            total = total + self.data[i] * value;
        }
        total
    }

    /// Collect the nonzero entries, dropping everything at most `tolerance` in absolute value.
    #[must_use]
    pub fn sparsify(&self, tolerance: F) -> Vec<SparseTuple<F>> {
        self.data.iter()
            .enumerate()
            .filter(|&(_, v)| v.abs() > tolerance)
            .map(|(i, &v)| (i, v))
            .collect()
    }

    /// Iterate over all values in order.
    pub fn iter(&self) -> Iter<F> {
        self.data.iter()
    }

    /// The underlying buffer.
    #[must_use]
    pub fn inner(&self) -> &[F] {
        &self.data
    }

    /// The underlying buffer, mutably.
    pub fn inner_mut(&mut self) -> &mut [F] {
        &mut self.data
    }
}

impl<F> std::ops::Index<usize> for DenseVector<F> {
    type Output = F;

    fn index(&self, index: usize) -> &F {
        &self.data[index]
    }
}

impl<F> std::ops::IndexMut<usize> for DenseVector<F> {
    fn index_mut(&mut self, index: usize) -> &mut F {
        &mut self.data[index]
    }
}

/// Sparse storage of nonzeros sorted by index.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector<F> {
    data: Vec<SparseTuple<F>>,
    len: usize,
}

impl<F: Float> SparseVector<F> {
    /// Create a new instance from sorted tuples.
    #[must_use]
    pub fn new(data: Vec<SparseTuple<F>>, len: usize) -> Self {
        debug_assert!(data.windows(2).all(|w| w[0].0 < w[1].0));
        debug_assert!(data.last().is_none_or(|&(i, _)| i < len));

        Self { data, len }
    }

    /// The zero vector of a given length.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self { data: Vec::new(), len }
    }

    /// A standard basis vector: all zeros except a one at `index`.
    #[must_use]
    pub fn standard_basis_vector(index: usize, len: usize) -> Self {
        debug_assert!(index < len);

        Self { data: vec![(index, F::one())], len }
    }

    /// Length of the vector, counting zeros.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector has length zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The value at an index, if it is nonzero.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&F> {
        debug_assert!(index < self.len);

        self.data.binary_search_by_key(&index, |&(i, _)| i)
            .ok()
            .map(|data_index| &self.data[data_index].1)
    }

    /// Iterate over the nonzeros in index order.
    pub fn iter(&self) -> Iter<SparseTuple<F>> {
        self.data.iter()
    }

    /// Number of stored nonzeros.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Inner product with a dense vector.
    #[must_use]
    pub fn inner_product(&self, other: &DenseVector<F>) -> F {
        debug_assert_eq!(other.len(), self.len);

        other.sparse_inner_product(self.data.iter())
    }

    /// Sum of squares of all elements.
    #[must_use]
    pub fn squared_norm(&self) -> F {
        self.data.iter().fold(F::zero(), |total, &(_, v)| total + v * v)
    }

    /// Scatter into a dense vector of the same length.
    pub fn scatter_into(&self, target: &mut DenseVector<F>) {
        debug_assert_eq!(target.len(), self.len);

        target.clear();
        for &(i, v) in &self.data {
            target[i] = v;
        }
    }

    /// Consume the vector, yielding the tuples.
    #[must_use]
    pub fn into_tuples(self) -> Vec<SparseTuple<F>> {
        self.data
    }
}
