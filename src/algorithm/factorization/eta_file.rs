//! # Eta files
//!
//! A basis change replaces one column of the basis matrix. Writing the new basis as `B' = B E`,
//! the matrix `E` is the identity except for one column: the solved entering column. Solves
//! against `B'` then only need the old factors plus a cheap pass over the stored eta column.
use crate::data::linear_algebra::SparseTuple;
use crate::data::linear_algebra::vector::DenseVector;

/// One recorded basis change.
///
/// Invariant: `pivot_value` is bounded away from zero; the caller rejects pivots below its pivot
/// tolerance before an eta file is created.
#[derive(Clone, Debug, PartialEq)]
pub struct EtaFile {
    /// Basis position whose column was replaced.
    pivot: usize,
    /// Off-pivot entries of the solved entering column, sorted by basis position.
    column: Vec<SparseTuple<f64>>,
    /// Value of the solved entering column at the pivot position.
    pivot_value: f64,
}

impl EtaFile {
    /// Record a basis change from the solved entering column.
    ///
    /// # Arguments
    ///
    /// * `pivot`: Position in the basis that changes.
    /// * `alpha`: The entering column after `ftran`, dense over basis positions.
    /// * `drop_tolerance`: Entries at most this size are not stored.
    #[must_use]
    pub fn new(pivot: usize, alpha: &DenseVector<f64>, drop_tolerance: f64) -> Self {
        debug_assert!(alpha[pivot] != 0.0);

        let column = alpha.iter()
            .enumerate()
            .filter(|&(i, v)| i != pivot && v.abs() > drop_tolerance)
            .map(|(i, &v)| (i, v))
            .collect();
        Self { pivot, column, pivot_value: alpha[pivot] }
    }

    /// The pivot magnitude relative to the largest entry of the stored column.
    ///
    /// Values near zero signal an unstable update; the factorization owner compares this against
    /// its accuracy threshold.
    #[must_use]
    pub fn stability(&self) -> f64 {
        let largest = self.column.iter()
            .map(|&(_, v)| v.abs())
            .fold(self.pivot_value.abs(), f64::max);
        self.pivot_value.abs() / largest
    }

    /// Number of stored off-pivot entries.
    #[must_use]
    pub fn nr_nonzeros(&self) -> usize {
        self.column.len()
    }

    /// Apply `E⁻¹` to a vector, the forward (ftran) direction.
    pub fn apply(&self, vector: &mut DenseVector<f64>) {
        let pivot_result = vector[self.pivot] / self.pivot_value;
        vector[self.pivot] = pivot_result;
        if pivot_result != 0.0 {
            for &(i, v) in &self.column {
                vector[i] = vector[i] - v * pivot_result;
            }
        }
    }

    /// Apply `E⁻ᵀ` to a vector, the transpose (btran) direction.
    pub fn apply_transpose(&self, vector: &mut DenseVector<f64>) {
        let mut value = vector[self.pivot];
        for &(i, v) in &self.column {
            value -= v * vector[i];
        }
        vector[self.pivot] = value / self.pivot_value;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn apply_inverts_eta_matrix() {
        // E = [[1, 2], [0, 4]]: eta column at position 1 is (2, 4).
        let alpha = DenseVector::new(vec![2.0, 4.0]);
        let eta = EtaFile::new(1, &alpha, 0.0);

        // E^-1 [2, 4]^T = [0, 1]^T
        let mut vector = DenseVector::new(vec![2.0, 4.0]);
        eta.apply(&mut vector);
        assert_eq!(vector.inner(), &[0.0, 1.0]);

        // E^-T [0, 1]^T = [0, 1/4]^T
        let mut vector = DenseVector::new(vec![0.0, 1.0]);
        eta.apply_transpose(&mut vector);
        assert_eq!(vector.inner(), &[0.0, 0.25]);
    }

    #[test]
    fn stability_is_relative_pivot_size() {
        let alpha = DenseVector::new(vec![10.0, 1.0]);
        let eta = EtaFile::new(1, &alpha, 0.0);
        assert_eq!(eta.stability(), 0.1);
    }
}
