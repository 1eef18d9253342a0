//! # Sparse Cholesky
//!
//! An up-looking sparse factorization of symmetric positive definite systems, used for the
//! barrier method's normal equations. The factorization is stored as `L D Lᵀ` with unit
//! diagonal `L` and the diagonal kept separately, which avoids square roots and lets the caller
//! detect loss of positive definiteness through the pivots.
//!
//! The symbolic analysis (elimination tree and column counts) depends only on the sparsity
//! pattern. The barrier method factorizes the same pattern once per iteration with new values,
//! so the analysis is run once and cached.
use thiserror::Error;

/// Why a factorization attempt was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum CholeskyError {
    /// A pivot fell below the positive definiteness threshold.
    #[error("matrix is not positive definite: pivot {value:e} at column {column}")]
    NotPositiveDefinite {
        /// Column whose pivot failed.
        column: usize,
        /// The offending pivot value.
        value: f64,
    },
    /// The upper triangle handed in does not match the analyzed pattern.
    #[error("sparsity pattern changed after symbolic analysis")]
    PatternChanged,
}

/// Sparse `L D Lᵀ` factorization with a cached symbolic analysis.
///
/// Input is the upper triangle of the matrix in CSC layout with sorted row indices and the
/// diagonal entry present in every column.
pub struct SparseCholesky {
    n: usize,
    /// Parent of each column in the elimination tree.
    etree: Vec<Option<usize>>,
    /// Nonzeros per column of `L`, from the symbolic pass.
    counts: Vec<usize>,
    l_starts: Vec<usize>,
    l_rows: Vec<usize>,
    l_values: Vec<f64>,
    diagonal: Vec<f64>,
    /// Pivots smaller than this reject the factorization.
    pivot_floor: f64,
    analyzed: bool,
}

impl SparseCholesky {
    /// New factorization state for an `n` by `n` system.
    #[must_use]
    pub fn new(n: usize, pivot_floor: f64) -> Self {
        Self {
            n,
            etree: vec![None; n],
            counts: vec![0; n],
            l_starts: vec![0; n + 1],
            l_rows: Vec::new(),
            l_values: Vec::new(),
            diagonal: vec![0.0; n],
            pivot_floor,
            analyzed: false,
        }
    }

    /// System dimension.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Compute the elimination tree and column counts for the pattern, and size the storage.
    ///
    /// `starts` and `rows` describe the upper triangle in CSC layout.
    fn analyze(&mut self, starts: &[usize], rows: &[usize]) {
        self.etree.fill(None);
        self.counts.fill(0);
        // Liu's elimination tree algorithm with path compression through ancestors.
        let mut ancestor: Vec<Option<usize>> = vec![None; self.n];
        for column in 0..self.n {
            for &row in &rows[starts[column]..starts[column + 1]] {
                let mut node = row;
                while node < column {
                    let next = ancestor[node];
                    ancestor[node] = Some(column);
                    match next {
                        None => {
                            self.etree[node] = Some(column);
                            node = column;
                        },
                        Some(next) => node = next,
                    }
                }
            }
        }

        // Column counts of L: walk each row's subtree path once, marking visited columns.
        let mut marker = vec![usize::MAX; self.n];
        for column in 0..self.n {
            marker[column] = column;
            for &row in &rows[starts[column]..starts[column + 1]] {
                if row >= column {
                    continue;
                }
                let mut node = row;
                while marker[node] != column {
                    marker[node] = column;
                    self.counts[node] += 1;
                    node = match self.etree[node] {
                        Some(parent) => parent,
                        None => break,
                    };
                }
            }
        }

        self.l_starts[0] = 0;
        for column in 0..self.n {
            self.l_starts[column + 1] = self.l_starts[column] + self.counts[column];
        }
        let nonzeros = self.l_starts[self.n];
        self.l_rows = vec![0; nonzeros];
        self.l_values = vec![0.0; nonzeros];
        self.analyzed = true;
    }

    /// Factorize the matrix with the given values, reusing the cached analysis when the
    /// pattern is unchanged.
    ///
    /// # Arguments
    ///
    /// * `starts` / `rows` / `values`: Upper triangle in CSC layout, row indices sorted, the
    ///   diagonal present in every column.
    pub fn factorize(
        &mut self,
        starts: &[usize],
        rows: &[usize],
        values: &[f64],
    ) -> Result<(), CholeskyError> {
        debug_assert_eq!(starts.len(), self.n + 1);
        if !self.analyzed {
            self.analyze(starts, rows);
        }

        // Up-looking numeric pass, one row of L at a time. `fill` is the next free slot per
        // column of L, `work` the scattered row being solved.
        let mut fill: Vec<usize> = self.l_starts[..self.n].to_vec();
        let mut pattern: Vec<usize> = Vec::with_capacity(self.n);
        let mut visited = vec![usize::MAX; self.n];
        let mut work = vec![0.0; self.n];

        for column in 0..self.n {
            // Scatter the strict upper part of the column; those entries form row `column` of
            // the lower triangle. The row's fill pattern is the union of elimination tree paths
            // from each entry up toward `column`.
            pattern.clear();
            visited[column] = column;
            let mut diagonal_value = 0.0;
            for position in starts[column]..starts[column + 1] {
                let row = rows[position];
                if row == column {
                    diagonal_value = values[position];
                    continue;
                }
                if row > column {
                    return Err(CholeskyError::PatternChanged);
                }
                work[row] = values[position];
                let mut node = row;
                while visited[node] != column {
                    visited[node] = column;
                    pattern.push(node);
                    node = match self.etree[node] {
                        Some(parent) if parent < column => parent,
                        _ => break,
                    };
                }
            }
            // Ascending index order is a topological order of the elimination tree, which is
            // exactly forward substitution order.
            pattern.sort_unstable();

            for &node in &pattern {
                let y = work[node];
                work[node] = 0.0;
                for position in self.l_starts[node]..fill[node] {
                    work[self.l_rows[position]] -= self.l_values[position] * y;
                }
                let l_value = y / self.diagonal[node];
                self.l_rows[fill[node]] = column;
                self.l_values[fill[node]] = l_value;
                fill[node] += 1;
                diagonal_value -= y * l_value;
            }

            if diagonal_value <= self.pivot_floor {
                return Err(CholeskyError::NotPositiveDefinite {
                    column,
                    value: diagonal_value,
                });
            }
            self.diagonal[column] = diagonal_value;
        }
        // Every column must come out with exactly its symbolically counted fill.
        debug_assert!((0..self.n).all(|j| fill[j] == self.l_starts[j + 1]));
        Ok(())
    }

    /// Solve the factorized system in place: `L D Lᵀ x = b`.
    pub fn solve(&self, rhs: &mut [f64]) {
        debug_assert_eq!(rhs.len(), self.n);

        for column in 0..self.n {
            let value = rhs[column];
            if value != 0.0 {
                for position in self.l_starts[column]..self.l_starts[column + 1] {
                    rhs[self.l_rows[position]] -= self.l_values[position] * value;
                }
            }
        }
        for column in 0..self.n {
            rhs[column] /= self.diagonal[column];
        }
        for column in (0..self.n).rev() {
            let mut value = rhs[column];
            for position in self.l_starts[column]..self.l_starts[column + 1] {
                value -= self.l_values[position] * rhs[self.l_rows[position]];
            }
            rhs[column] = value;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Upper triangle of a small SPD matrix in CSC form.
    fn small_spd() -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        // [ 4  1  0 ]
        // [ 1  5  2 ]
        // [ 0  2  6 ]
        let starts = vec![0, 1, 3, 5];
        let rows = vec![0, 0, 1, 1, 2];
        let values = vec![4.0, 1.0, 5.0, 2.0, 6.0];
        (starts, rows, values)
    }

    #[test]
    fn factorize_and_solve() {
        let (starts, rows, values) = small_spd();
        let mut cholesky = SparseCholesky::new(3, 1e-12);
        cholesky.factorize(&starts, &rows, &values).unwrap();

        // Solve against a known product: A * [1, 2, 3] = [6, 17, 22].
        let mut rhs = vec![6.0, 17.0, 22.0];
        cholesky.solve(&mut rhs);
        for (computed, expected) in rhs.iter().zip([1.0, 2.0, 3.0]) {
            assert!((computed - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn refactorize_with_new_values_reuses_analysis() {
        let (starts, rows, mut values) = small_spd();
        let mut cholesky = SparseCholesky::new(3, 1e-12);
        cholesky.factorize(&starts, &rows, &values).unwrap();

        // Scale the matrix; the pattern is identical.
        for value in &mut values {
            *value *= 2.0;
        }
        cholesky.factorize(&starts, &rows, &values).unwrap();
        let mut rhs = vec![12.0, 34.0, 44.0];
        cholesky.solve(&mut rhs);
        for (computed, expected) in rhs.iter().zip([1.0, 2.0, 3.0]) {
            assert!((computed - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn indefinite_matrix_is_rejected() {
        let starts = vec![0, 1, 2];
        let rows = vec![0, 1];
        let values = vec![1.0, -1.0];
        let mut cholesky = SparseCholesky::new(2, 1e-12);
        assert!(matches!(
            cholesky.factorize(&starts, &rows, &values),
            Err(CholeskyError::NotPositiveDefinite { column: 1, .. }),
        ));
    }
}
