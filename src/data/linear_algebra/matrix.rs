//! # Column major sparse matrices
//!
//! The constraint matrix is stored column major: a contiguous buffer of `(row, value)` nonzeros
//! and a start offset per column. Columns are the unit of access everywhere in the solver; rows
//! are only ever touched through transpose products.
use cumsum::cumsum_owned;
use num_traits::Float;

use crate::data::linear_algebra::SparseTuple;
use crate::data::linear_algebra::vector::DenseVector;

/// A sparse matrix in compressed column form.
///
/// Invariant: within each column, row indices are strictly increasing and no explicit zeros are
/// stored.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix<F> {
    /// Start offset of each column in `data`, with one extra element equal to `data.len()`.
    starts: Vec<usize>,
    /// All nonzeros, column by column.
    data: Vec<SparseTuple<F>>,
    nr_rows: usize,
}

impl<F: Float> SparseMatrix<F> {
    /// Build from `(row, column, value)` triplets.
    ///
    /// Duplicate entries are summed; entries that are zero (or sum to zero) are dropped.
    #[must_use]
    pub fn from_triplets(
        nr_rows: usize,
        nr_columns: usize,
        triplets: impl IntoIterator<Item = (usize, usize, F)>,
    ) -> Self {
        let mut columns = vec![Vec::new(); nr_columns];
        for (i, j, v) in triplets {
            debug_assert!(i < nr_rows && j < nr_columns);

            columns[j].push((i, v));
        }

        Self::from_columns(nr_rows, columns)
    }

    /// Build from per-column tuple collections, which may be unsorted and contain duplicates.
    #[must_use]
    pub fn from_columns(nr_rows: usize, columns: Vec<Vec<SparseTuple<F>>>) -> Self {
        let mut cleaned = Vec::with_capacity(columns.len());
        for mut column in columns {
            column.sort_unstable_by_key(|&(i, _)| i);

            let mut merged: Vec<SparseTuple<F>> = Vec::with_capacity(column.len());
            for (i, v) in column {
                match merged.last_mut() {
                    Some(last) if last.0 == i => last.1 = last.1 + v,
                    _ => merged.push((i, v)),
                }
            }
            merged.retain(|&(_, v)| v != F::zero());
            cleaned.push(merged);
        }

        let counts = cleaned.iter().map(Vec::len).collect::<Vec<_>>();
        let mut starts = Vec::with_capacity(counts.len() + 1);
        starts.push(0);
        starts.extend(cumsum_owned(counts));

        let data = cleaned.into_iter().flatten().collect();

        Self { starts, data, nr_rows }
    }

    /// Matrix with no nonzeros.
    #[must_use]
    pub fn zeros(nr_rows: usize, nr_columns: usize) -> Self {
        Self {
            starts: vec![0; nr_columns + 1],
            data: Vec::new(),
            nr_rows,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    /// Number of columns.
    #[must_use]
    pub fn nr_columns(&self) -> usize {
        self.starts.len() - 1
    }

    /// Total number of stored nonzeros.
    #[must_use]
    pub fn nr_nonzeros(&self) -> usize {
        self.data.len()
    }

    /// The nonzeros of column `j`, sorted by row index.
    #[must_use]
    pub fn column(&self, j: usize) -> &[SparseTuple<F>] {
        debug_assert!(j < self.nr_columns());

        &self.data[self.starts[j]..self.starts[j + 1]]
    }

    /// Number of nonzeros in column `j`.
    #[must_use]
    pub fn column_length(&self, j: usize) -> usize {
        self.starts[j + 1] - self.starts[j]
    }

    /// The value at `(i, j)` if it is stored.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<&F> {
        self.column(j)
            .binary_search_by_key(&i, |&(row, _)| row)
            .ok()
            .map(|index| &self.column(j)[index].1)
    }

    /// Compute `A x` into a dense vector of row values.
    #[must_use]
    pub fn times(&self, x: &[F]) -> DenseVector<F> {
        debug_assert_eq!(x.len(), self.nr_columns());

        let mut result = DenseVector::zeros(self.nr_rows);
        for j in 0..self.nr_columns() {
            if x[j] != F::zero() {
                for &(i, v) in self.column(j) {
                    result[i] = result[i] + v * x[j];
                }
            }
        }
        result
    }

    /// Inner product of column `j` with a dense vector of row values, `aⱼᵀ y`.
    #[must_use]
    pub fn column_dot(&self, j: usize, y: &DenseVector<F>) -> F {
        debug_assert_eq!(y.len(), self.nr_rows);

        y.sparse_inner_product(self.column(j).iter())
    }

    /// Compute `Aᵀ y` for dense `y`, one inner product per column.
    #[must_use]
    pub fn transpose_times(&self, y: &DenseVector<F>) -> Vec<F> {
        (0..self.nr_columns()).map(|j| self.column_dot(j, y)).collect()
    }

    /// Append a column; entries may be unsorted but must not contain duplicates.
    pub fn push_column(&mut self, mut entries: Vec<SparseTuple<F>>) {
        entries.sort_unstable_by_key(|&(i, _)| i);
        entries.retain(|&(_, v)| v != F::zero());
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        debug_assert!(entries.last().is_none_or(|&(i, _)| i < self.nr_rows));

        self.data.extend(entries);
        self.starts.push(self.data.len());
    }

    /// Increase the number of rows; existing columns are unaffected.
    pub fn grow_rows(&mut self, extra: usize) {
        self.nr_rows += extra;
    }

    /// Row counts: the number of nonzeros in each row.
    #[must_use]
    pub fn row_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.nr_rows];
        for &(i, _) in &self.data {
            counts[i] += 1;
        }
        counts
    }

    /// A row major copy: per row, the `(column, value)` nonzeros sorted by column.
    ///
    /// Used where an algorithm genuinely needs row access, such as the dual pivot row computation
    /// and presolve row rules.
    #[must_use]
    pub fn to_row_major(&self) -> Vec<Vec<SparseTuple<F>>> {
        let mut rows = vec![Vec::new(); self.nr_rows];
        for j in 0..self.nr_columns() {
            for &(i, v) in self.column(j) {
                rows[i].push((j, v));
            }
        }
        rows
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn small() -> SparseMatrix<f64> {
        // [1 0 2]
        // [0 3 4]
        SparseMatrix::from_triplets(2, 3, vec![
            (0, 0, 1.0),
            (1, 1, 3.0),
            (0, 2, 2.0),
            (1, 2, 4.0),
        ])
    }

    #[test]
    fn dimensions() {
        let matrix = small();
        assert_eq!(matrix.nr_rows(), 2);
        assert_eq!(matrix.nr_columns(), 3);
        assert_eq!(matrix.nr_nonzeros(), 4);
    }

    #[test]
    fn column_access() {
        let matrix = small();
        assert_eq!(matrix.column(0), &[(0, 1.0)]);
        assert_eq!(matrix.column(2), &[(0, 2.0), (1, 4.0)]);
        assert_eq!(matrix.get(1, 2), Some(&4.0));
        assert_eq!(matrix.get(1, 0), None);
    }

    #[test]
    fn duplicates_are_summed_and_zeros_dropped() {
        let matrix = SparseMatrix::from_triplets(2, 1, vec![
            (0, 0, 1.0),
            (0, 0, 2.0),
            (1, 0, 5.0),
            (1, 0, -5.0),
        ]);
        assert_eq!(matrix.column(0), &[(0, 3.0)]);
    }

    #[test]
    fn products() {
        let matrix = small();
        let product = matrix.times(&[1.0, 1.0, 1.0]);
        assert_eq!(product.inner(), &[3.0, 7.0]);

        let transpose_product = matrix.transpose_times(&DenseVector::new(vec![1.0, -1.0]));
        assert_eq!(transpose_product, vec![1.0, -3.0, -2.0]);
    }

    #[test]
    fn row_major_copy() {
        let matrix = small();
        let rows = matrix.to_row_major();
        assert_eq!(rows[0], vec![(0, 1.0), (2, 2.0)]);
        assert_eq!(rows[1], vec![(1, 3.0), (2, 4.0)]);
    }
}
