//! # LU decomposition
//!
//! Decomposes the basis matrix `B` as `PB = LU` with partial pivoting:
//!
//! * `P` a row permutation, chosen pivot by pivot for the largest remaining magnitude,
//! * `L` lower triangular with an implied unit diagonal,
//! * `U` upper triangular, column major with the diagonal stored last.
//!
//! After a basis change the factors are not recomputed; an eta file is appended instead. The
//! factors go stale in accuracy as eta files accumulate, so the owner refactorizes periodically
//! and whenever an update reports poor stability.
use log::debug;

use crate::algorithm::factorization::eta_file::EtaFile;
use crate::data::linear_algebra::SparseTuple;
use crate::data::linear_algebra::vector::DenseVector;

/// Outcome of a from-scratch factorization.
#[derive(Debug, PartialEq, Eq)]
pub enum FactorizeResult {
    /// The basis is invertible; solves may proceed.
    Ok,
    /// The basis is (numerically) singular.
    ///
    /// The factors are unusable. The caller must replace the basic variables at
    /// `basis_positions` with the slacks of `missing_rows` (pairwise) and factorize again.
    Singular {
        /// Basis positions whose columns are dependent on the others.
        basis_positions: Vec<usize>,
        /// Rows that no basic column pivoted on.
        missing_rows: Vec<usize>,
    },
}

/// LU factors of the current basis plus the eta files accumulated since.
#[derive(Debug)]
pub struct Factorization {
    m: usize,
    /// Column major, entries strictly below the diagonal in permuted row space, unit diagonal
    /// implied.
    lower: Vec<Vec<SparseTuple<f64>>>,
    /// Column major in permuted row space, diagonal stored last.
    upper: Vec<Vec<SparseTuple<f64>>>,
    /// `pivot_rows[k]` is the original row that position `k` pivoted on.
    pivot_rows: Vec<usize>,
    /// Inverse of `pivot_rows`: position per original row.
    positions: Vec<usize>,
    updates: Vec<EtaFile>,
    /// Nonzeros of `L` and `U` right after the last factorization.
    base_nonzeros: usize,
    /// Pivots below this magnitude are treated as zero during factorization.
    singular_tolerance: f64,
    /// Refactorize after this many eta files regardless of accuracy.
    refactor_frequency: usize,
    factorized: bool,
}

impl Factorization {
    /// Eta entries at most this size are dropped from update files.
    const DROP_TOLERANCE: f64 = 1e-13;
    /// An update file longer than this multiple of the base factor size triggers refactorization.
    const GROWTH_LIMIT: f64 = 0.5;

    /// A factorization holder for an `m`-row basis. Unusable until `factorize` succeeds.
    #[must_use]
    pub fn new(m: usize, singular_tolerance: f64, refactor_frequency: usize) -> Self {
        Self {
            m,
            lower: Vec::new(),
            upper: Vec::new(),
            pivot_rows: Vec::new(),
            positions: vec![0; m],
            updates: Vec::new(),
            base_nonzeros: 0,
            singular_tolerance,
            refactor_frequency,
            factorized: false,
        }
    }

    /// Number of rows of the factorized basis.
    #[must_use]
    pub fn m(&self) -> usize {
        self.m
    }

    /// Eta files accumulated since the last factorization.
    #[must_use]
    pub fn nr_updates(&self) -> usize {
        self.updates.len()
    }

    /// Build the factors from scratch for the given basis columns.
    ///
    /// # Arguments
    ///
    /// * `columns`: One sparse column per basis position, row indices sorted.
    pub fn factorize(&mut self, columns: &[Vec<SparseTuple<f64>>]) -> FactorizeResult {
        debug_assert_eq!(columns.len(), self.m);

        let m = self.m;
        let mut lower_build: Vec<Vec<SparseTuple<f64>>> = Vec::with_capacity(m);
        let mut upper_build: Vec<Vec<SparseTuple<f64>>> = Vec::with_capacity(m);
        let mut pivot_rows: Vec<usize> = Vec::with_capacity(m);
        let mut pivoted = vec![false; m];
        let mut deferred = Vec::new();

        // Dense work column in original row space, plus the indices that might be nonzero.
        let mut work = vec![0.0_f64; m];
        let mut touched = Vec::with_capacity(m);

        for (k, column) in columns.iter().enumerate() {
            for &(i, v) in column {
                debug_assert!(i < m);
                work[i] = v;
                touched.push(i);
            }

            // Left-looking forward substitution through the finished columns. Deferred
            // (dependent) positions have no pivot row and contribute nothing.
            for j in 0..pivot_rows.len() {
                if pivot_rows[j] == usize::MAX {
                    continue;
                }
                let y = work[pivot_rows[j]];
                if y != 0.0 {
                    for &(i, l) in &lower_build[j] {
                        if work[i] == 0.0 {
                            touched.push(i);
                        }
                        work[i] -= l * y;
                    }
                }
            }
            touched.sort_unstable();
            touched.dedup();

            // Partial pivoting: the largest remaining magnitude.
            let pivot = touched.iter()
                .copied()
                .filter(|&i| !pivoted[i])
                .max_by(|&a, &b| work[a].abs().total_cmp(&work[b].abs()));
            let pivot = pivot.filter(|&r| work[r].abs() > self.singular_tolerance);

            match pivot {
                Some(r) => {
                    let diagonal = work[r];
                    let mut upper_column: Vec<SparseTuple<f64>> = (0..pivot_rows.len())
                        .filter(|&j| pivot_rows[j] != usize::MAX && work[pivot_rows[j]] != 0.0)
                        .map(|j| (j, work[pivot_rows[j]]))
                        .collect();
                    upper_column.push((pivot_rows.len(), diagonal));

                    let lower_column = touched.iter()
                        .copied()
                        .filter(|&i| !pivoted[i] && i != r && work[i] != 0.0)
                        .map(|i| (i, work[i] / diagonal))
                        .collect();

                    pivoted[r] = true;
                    pivot_rows.push(r);
                    upper_build.push(upper_column);
                    lower_build.push(lower_column);
                },
                None => {
                    // Dependent column; the repaired basis gets a slack here.
                    deferred.push(k);
                    // Place a unit pivot on a row chosen after the loop, so that positions and
                    // rows stay one-to-one. The factors are discarded in this case.
                    pivot_rows.push(usize::MAX);
                    upper_build.push(vec![(pivot_rows.len() - 1, 1.0)]);
                    lower_build.push(Vec::new());
                },
            }

            for &i in &touched {
                work[i] = 0.0;
            }
            touched.clear();
        }

        if !deferred.is_empty() {
            let missing_rows = (0..m).filter(|&i| !pivoted[i]).collect::<Vec<_>>();
            debug_assert_eq!(missing_rows.len(), deferred.len());
            debug!(
                "factorization found {} dependent basis columns, returning rows {:?} for repair",
                deferred.len(), missing_rows,
            );

            self.factorized = false;
            return FactorizeResult::Singular {
                basis_positions: deferred,
                missing_rows,
            };
        }

        // Remap the lower factor from original rows to permuted positions.
        let mut positions = vec![0; m];
        for (k, &row) in pivot_rows.iter().enumerate() {
            positions[row] = k;
        }
        for column in &mut lower_build {
            for entry in column.iter_mut() {
                entry.0 = positions[entry.0];
            }
            column.sort_unstable_by_key(|&(i, _)| i);
        }

        self.base_nonzeros = lower_build.iter().map(Vec::len).sum::<usize>()
            + upper_build.iter().map(Vec::len).sum::<usize>();
        self.lower = lower_build;
        self.upper = upper_build;
        self.pivot_rows = pivot_rows;
        self.positions = positions;
        self.updates.clear();
        self.factorized = true;

        FactorizeResult::Ok
    }

    /// Solve `B x = v` in place.
    ///
    /// On entry `rhs` is indexed by row; on exit it is indexed by basis position.
    pub fn ftran(&self, rhs: &mut DenseVector<f64>) {
        debug_assert!(self.factorized);
        debug_assert_eq!(rhs.len(), self.m);

        let mut work = self.pivot_rows.iter().map(|&row| rhs[row]).collect::<Vec<_>>();

        // Forward through L.
        for k in 0..self.m {
            let y = work[k];
            if y != 0.0 {
                for &(i, l) in &self.lower[k] {
                    work[i] -= l * y;
                }
            }
        }

        // Backward through U.
        for k in (0..self.m).rev() {
            let (&(_, diagonal), above) = self.upper[k].split_last().unwrap();
            let x = work[k] / diagonal;
            work[k] = x;
            if x != 0.0 {
                for &(i, u) in above {
                    work[i] -= u * x;
                }
            }
        }

        for (k, value) in work.into_iter().enumerate() {
            rhs[k] = value;
        }

        for eta in &self.updates {
            eta.apply(rhs);
        }
    }

    /// Solve `Bᵀ x = v` in place.
    ///
    /// On entry `rhs` is indexed by basis position; on exit it is indexed by row.
    pub fn btran(&self, rhs: &mut DenseVector<f64>) {
        debug_assert!(self.factorized);
        debug_assert_eq!(rhs.len(), self.m);

        for eta in self.updates.iter().rev() {
            eta.apply_transpose(rhs);
        }

        // Forward through Uᵀ, gathering per column.
        let mut work = vec![0.0_f64; self.m];
        for k in 0..self.m {
            let (&(_, diagonal), above) = self.upper[k].split_last().unwrap();
            let mut value = rhs[k];
            for &(i, u) in above {
                value -= u * work[i];
            }
            work[k] = value / diagonal;
        }

        // Backward through Lᵀ, gathering per column.
        for k in (0..self.m).rev() {
            let mut value = work[k];
            for &(i, l) in &self.lower[k] {
                value -= l * work[i];
            }
            work[k] = value;
        }

        for (k, &row) in self.pivot_rows.iter().enumerate() {
            rhs[row] = work[k];
        }
    }

    /// Record a basis change at `pivot` with the solved entering column `alpha`.
    ///
    /// # Return value
    ///
    /// A stability estimate in `(0, 1]`: the pivot magnitude relative to the largest entry of the
    /// solved column. The caller should refactorize when this is small.
    pub fn update(&mut self, pivot: usize, alpha: &DenseVector<f64>) -> f64 {
        debug_assert!(self.factorized);

        let eta = EtaFile::new(pivot, alpha, Self::DROP_TOLERANCE);
        let stability = eta.stability();
        self.updates.push(eta);
        stability
    }

    /// Whether enough updates accumulated that a fresh factorization is warranted.
    ///
    /// Triggers on the update count reaching the refactorization frequency, and earlier when the
    /// update files grow dense relative to the base factors.
    #[must_use]
    pub fn should_refactorize(&self) -> bool {
        if self.updates.len() >= self.refactor_frequency {
            return true;
        }
        let update_nonzeros = self.updates.iter().map(EtaFile::nr_nonzeros).sum::<usize>();
        update_nonzeros > (Self::GROWTH_LIMIT * self.base_nonzeros.max(self.m) as f64) as usize
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn identity_columns(m: usize) -> Vec<Vec<SparseTuple<f64>>> {
        (0..m).map(|i| vec![(i, 1.0)]).collect()
    }

    /// A well conditioned 3x3 basis with a forced row permutation.
    fn example_columns() -> Vec<Vec<SparseTuple<f64>>> {
        // B = [0 1 0; 4 0 1; 2 0 3], column major below.
        vec![
            vec![(1, 4.0), (2, 2.0)],
            vec![(0, 1.0)],
            vec![(1, 1.0), (2, 3.0)],
        ]
    }

    fn multiply(columns: &[Vec<SparseTuple<f64>>], x: &DenseVector<f64>) -> Vec<f64> {
        let m = columns.len();
        let mut result = vec![0.0; m];
        for (k, column) in columns.iter().enumerate() {
            for &(i, v) in column {
                result[i] += v * x[k];
            }
        }
        result
    }

    #[test]
    fn ftran_solves_the_basis_system() {
        let columns = example_columns();
        let mut factorization = Factorization::new(3, 1e-10, 100);
        assert_eq!(factorization.factorize(&columns), FactorizeResult::Ok);

        let b = vec![3.0, -1.0, 5.0];
        let mut x = DenseVector::new(b.clone());
        factorization.ftran(&mut x);

        let reconstructed = multiply(&columns, &x);
        for (computed, original) in reconstructed.iter().zip(&b) {
            assert!((computed - original).abs() < 1e-10);
        }
    }

    #[test]
    fn btran_solves_the_transposed_system() {
        let columns = example_columns();
        let mut factorization = Factorization::new(3, 1e-10, 100);
        assert_eq!(factorization.factorize(&columns), FactorizeResult::Ok);

        let c = vec![1.0, 2.0, 3.0];
        let mut y = DenseVector::new(c.clone());
        factorization.btran(&mut y);

        // Check Bᵀ y = c, i.e. per basis column k: columnₖ · y = cₖ.
        for (k, column) in columns.iter().enumerate() {
            let product: f64 = column.iter().map(|&(i, v)| v * y[i]).sum();
            assert!((product - c[k]).abs() < 1e-10, "column {k}: {product} != {}", c[k]);
        }
    }

    #[test]
    fn singular_basis_reports_positions_and_rows() {
        // Two identical columns; the second cannot pivot.
        let columns = vec![
            vec![(0, 1.0), (1, 1.0)],
            vec![(0, 1.0), (1, 1.0)],
            vec![(2, 1.0)],
        ];
        let mut factorization = Factorization::new(3, 1e-10, 100);
        match factorization.factorize(&columns) {
            FactorizeResult::Singular { basis_positions, missing_rows } => {
                assert_eq!(basis_positions, vec![1]);
                assert_eq!(missing_rows.len(), 1);
            },
            FactorizeResult::Ok => panic!("dependent columns went undetected"),
        }
    }

    /// Updated factors must agree with a from-scratch factorization for at least a hundred
    /// consecutive basis changes before a refactorization is forced.
    #[test]
    fn updates_track_fresh_factorization_over_many_pivots() {
        let m = 6;
        let mut columns = identity_columns(m);
        let mut factorization = Factorization::new(m, 1e-10, 200);
        assert_eq!(factorization.factorize(&columns), FactorizeResult::Ok);

        for round in 0..100 {
            // A deterministic, diagonally dominant replacement column.
            let position = round % m;
            let entering = vec![
                (position, 3.0 + (round % 5) as f64),
                ((position + 1) % m, 1.0 + (round % 3) as f64 * 0.5),
            ];
            let mut entering_column: Vec<SparseTuple<f64>> = entering.clone();
            entering_column.sort_unstable_by_key(|&(i, _)| i);

            let mut alpha = DenseVector::zeros(m);
            for &(i, v) in &entering_column {
                alpha[i] = v;
            }
            factorization.ftran(&mut alpha);
            assert!(alpha[position].abs() > 1e-8);

            factorization.update(position, &alpha);
            columns[position] = entering_column;

            // The updated factors and a fresh factorization must agree on a solve.
            let rhs = (0..m).map(|i| (i + 1) as f64).collect::<Vec<_>>();
            let mut via_update = DenseVector::new(rhs.clone());
            factorization.ftran(&mut via_update);

            let mut fresh = Factorization::new(m, 1e-10, 200);
            assert_eq!(fresh.factorize(&columns), FactorizeResult::Ok);
            let mut via_fresh = DenseVector::new(rhs);
            fresh.ftran(&mut via_fresh);

            for i in 0..m {
                assert!(
                    (via_update[i] - via_fresh[i]).abs() < 1e-8 * (1.0 + via_fresh[i].abs()),
                    "divergence at round {round}, position {i}",
                );
            }
        }
        assert_eq!(factorization.nr_updates(), 100);
    }
}
