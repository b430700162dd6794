//! Dense row-major matrix of `f64`, implemented from scratch rather than
//! wrapped over a linear algebra crate: the UKF needs the exact weighted
//! mean/covariance and resize-preserving-overlap contract described below,
//! which a general-purpose crate does not expose directly.

use crate::error::{PrognosticsError, Result};

/// A dense, row-major matrix of `f64`.
///
/// Indexing is zero-based. Dimensions are fixed after construction except
/// through the explicit `resize` method.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Builds a `rows x cols` matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds the `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Matrix::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    /// Builds a matrix from row-major data. `data.len()` must equal `rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(PrognosticsError::DimensionMismatch(format!(
                "expected {} entries for a {}x{} matrix, got {}",
                rows * cols,
                rows,
                cols,
                data.len()
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Builds a column vector (an `n x 1` matrix) from a slice.
    pub fn column_vector(values: &[f64]) -> Self {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn check_bounds(&self, r: usize, c: usize) -> Result<()> {
        if r >= self.rows || c >= self.cols {
            return Err(PrognosticsError::OutOfRange);
        }
        Ok(())
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn try_get(&self, r: usize, c: usize) -> Result<f64> {
        self.check_bounds(r, c)?;
        Ok(self.get(r, c))
    }

    pub fn set(&mut self, r: usize, c: usize, v: f64) {
        self.data[r * self.cols + c] = v;
    }

    pub fn try_set(&mut self, r: usize, c: usize, v: f64) -> Result<()> {
        self.check_bounds(r, c)?;
        self.set(r, c, v);
        Ok(())
    }

    /// Returns row `r` as a length-`cols` vector.
    pub fn row(&self, r: usize) -> Result<Vec<f64>> {
        if r >= self.rows {
            return Err(PrognosticsError::OutOfRange);
        }
        Ok(self.data[r * self.cols..(r + 1) * self.cols].to_vec())
    }

    /// Returns column `c` as a length-`rows` vector.
    pub fn column(&self, c: usize) -> Result<Vec<f64>> {
        if c >= self.cols {
            return Err(PrognosticsError::OutOfRange);
        }
        Ok((0..self.rows).map(|r| self.get(r, c)).collect())
    }

    /// Overwrites row `r` from a length-`cols` vector.
    pub fn set_row(&mut self, r: usize, values: &[f64]) -> Result<()> {
        if r >= self.rows || values.len() != self.cols {
            return Err(PrognosticsError::DimensionMismatch(
                "row assignment length mismatch".into(),
            ));
        }
        for (c, v) in values.iter().enumerate() {
            self.set(r, c, *v);
        }
        Ok(())
    }

    /// Overwrites column `c` from a length-`rows` vector.
    pub fn set_column(&mut self, c: usize, values: &[f64]) -> Result<()> {
        if c >= self.cols || values.len() != self.rows {
            return Err(PrognosticsError::DimensionMismatch(
                "column assignment length mismatch".into(),
            ));
        }
        for (r, v) in values.iter().enumerate() {
            self.set(r, c, *v);
        }
        Ok(())
    }

    /// Extracts the `r0..r0+nr`, `c0..c0+nc` submatrix.
    pub fn submatrix(&self, r0: usize, c0: usize, nr: usize, nc: usize) -> Result<Matrix> {
        if r0 + nr > self.rows || c0 + nc > self.cols {
            return Err(PrognosticsError::OutOfRange);
        }
        let mut out = Matrix::zeros(nr, nc);
        for i in 0..nr {
            for j in 0..nc {
                out.set(i, j, self.get(r0 + i, c0 + j));
            }
        }
        Ok(out)
    }

    /// Resizes in place to `new_rows x new_cols`, preserving the overlap of
    /// the old and new upper-left corners; newly exposed cells are zero.
    pub fn resize(&mut self, new_rows: usize, new_cols: usize) {
        let mut out = Matrix::zeros(new_rows, new_cols);
        let common_rows = self.rows.min(new_rows);
        let common_cols = self.cols.min(new_cols);
        for r in 0..common_rows {
            for c in 0..common_cols {
                out.set(r, c, self.get(r, c));
            }
        }
        *self = out;
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    fn elementwise(&self, other: &Matrix, op: impl Fn(f64, f64) -> f64) -> Result<Matrix> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(PrognosticsError::DimensionMismatch(format!(
                "{}x{} vs {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| op(*a, *b))
            .collect();
        Matrix::from_row_major(self.rows, self.cols, data)
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.elementwise(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        self.elementwise(other, |a, b| a - b)
    }

    pub fn add_scalar(&self, s: f64) -> Matrix {
        Matrix::from_row_major(self.rows, self.cols, self.data.iter().map(|v| v + s).collect())
            .expect("shape preserved")
    }

    pub fn scale(&self, s: f64) -> Matrix {
        Matrix::from_row_major(self.rows, self.cols, self.data.iter().map(|v| v * s).collect())
            .expect("shape preserved")
    }

    /// Matrix product; fails if inner dimensions disagree.
    pub fn mul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(PrognosticsError::DimensionMismatch(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out.data[i * out.cols + j] += a * other.get(k, j);
                }
            }
        }
        Ok(out)
    }

    /// Determinant via Laplace (cofactor) expansion. `O(n!)`, fine for the
    /// small state sizes the pipeline deals with.
    pub fn determinant(&self) -> Result<f64> {
        if self.rows != self.cols {
            return Err(PrognosticsError::DimensionMismatch(
                "determinant requires a square matrix".into(),
            ));
        }
        Ok(self.det_recursive())
    }

    fn det_recursive(&self) -> f64 {
        let n = self.rows;
        match n {
            0 => 1.0,
            1 => self.get(0, 0),
            2 => self.get(0, 0) * self.get(1, 1) - self.get(0, 1) * self.get(1, 0),
            _ => {
                let mut det = 0.0;
                let mut sign = 1.0;
                for col in 0..n {
                    let a0col = self.get(0, col);
                    if a0col != 0.0 {
                        let minor = self.minor(0, col);
                        det += sign * a0col * minor.det_recursive();
                    }
                    sign = -sign;
                }
                det
            }
        }
    }

    fn minor(&self, skip_row: usize, skip_col: usize) -> Matrix {
        let mut out = Matrix::zeros(self.rows - 1, self.cols - 1);
        let mut oi = 0;
        for i in 0..self.rows {
            if i == skip_row {
                continue;
            }
            let mut oj = 0;
            for j in 0..self.cols {
                if j == skip_col {
                    continue;
                }
                out.set(oi, oj, self.get(i, j));
                oj += 1;
            }
            oi += 1;
        }
        out
    }

    /// Matrix inverse. Uses the adjoint/determinant formula for small
    /// (`<= 3x3`) matrices and Gauss-Jordan with partial pivoting otherwise.
    pub fn inverse(&self) -> Result<Matrix> {
        if self.rows != self.cols {
            return Err(PrognosticsError::DimensionMismatch(
                "inverse requires a square matrix".into(),
            ));
        }
        let n = self.rows;
        if n <= 3 {
            let det = self.determinant()?;
            if det.abs() < 1e-12 {
                return Err(PrognosticsError::Singular);
            }
            let mut adj = Matrix::zeros(n, n);
            for i in 0..n {
                for j in 0..n {
                    let cofactor = self.minor(i, j).det_recursive();
                    let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
                    // adjugate is the transpose of the cofactor matrix
                    adj.set(j, i, sign * cofactor);
                }
            }
            return Ok(adj.scale(1.0 / det));
        }
        self.gauss_jordan_inverse()
    }

    fn gauss_jordan_inverse(&self) -> Result<Matrix> {
        let n = self.rows;
        let mut aug = Matrix::zeros(n, 2 * n);
        for i in 0..n {
            for j in 0..n {
                aug.set(i, j, self.get(i, j));
            }
            aug.set(i, n + i, 1.0);
        }

        for pivot in 0..n {
            // Partial pivoting: find the largest magnitude entry in this column.
            let mut best_row = pivot;
            let mut best_val = aug.get(pivot, pivot).abs();
            for r in (pivot + 1)..n {
                let v = aug.get(r, pivot).abs();
                if v > best_val {
                    best_val = v;
                    best_row = r;
                }
            }
            if best_val < 1e-12 {
                return Err(PrognosticsError::Singular);
            }
            if best_row != pivot {
                for c in 0..2 * n {
                    let tmp = aug.get(pivot, c);
                    aug.set(pivot, c, aug.get(best_row, c));
                    aug.set(best_row, c, tmp);
                }
            }

            let pivot_val = aug.get(pivot, pivot);
            for c in 0..2 * n {
                aug.data[pivot * aug.cols + c] /= pivot_val;
            }

            for r in 0..n {
                if r == pivot {
                    continue;
                }
                let factor = aug.get(r, pivot);
                if factor == 0.0 {
                    continue;
                }
                for c in 0..2 * n {
                    let v = aug.get(pivot, c);
                    aug.data[r * aug.cols + c] -= factor * v;
                }
            }
        }

        aug.submatrix(0, n, n, n)
    }

    /// Lower-triangular Cholesky factor `L` such that `L * L^T == self`.
    /// `self` must be symmetric positive definite.
    pub fn cholesky(&self) -> Result<Matrix> {
        if self.rows != self.cols {
            return Err(PrognosticsError::DimensionMismatch(
                "cholesky requires a square matrix".into(),
            ));
        }
        let n = self.rows;
        let mut l = Matrix::zeros(n, n);
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.get(i, j);
                for k in 0..j {
                    sum -= l.get(i, k) * l.get(j, k);
                }
                if i == j {
                    if sum <= 0.0 {
                        return Err(PrognosticsError::NotSpd);
                    }
                    l.set(i, j, sum.sqrt());
                } else {
                    l.set(i, j, sum / l.get(j, j));
                }
            }
        }
        Ok(l)
    }

    /// Weighted mean of the columns of `self` (an `r x c` matrix), given
    /// `c` (not necessarily normalized) weights. Returns an `r x 1` column.
    pub fn weighted_mean(&self, weights: &[f64]) -> Result<Matrix> {
        if weights.len() != self.cols {
            return Err(PrognosticsError::DimensionMismatch(
                "weight vector length must equal column count".into(),
            ));
        }
        let mut out = vec![0.0; self.rows];
        for (j, w) in weights.iter().enumerate() {
            for i in 0..self.rows {
                out[i] += w * self.get(i, j);
            }
        }
        Ok(Matrix::column_vector(&out))
    }

    /// Weighted covariance of the columns of `self` about `mean` (an `r x 1`
    /// column), with the caller-supplied bias-correction factor applied as
    /// `1 / (1 - bias_correction * sum(w_j^2))`.
    pub fn weighted_covariance(
        &self,
        weights: &[f64],
        mean: &Matrix,
        bias_correction: f64,
    ) -> Result<Matrix> {
        if weights.len() != self.cols {
            return Err(PrognosticsError::DimensionMismatch(
                "weight vector length must equal column count".into(),
            ));
        }
        if mean.rows != self.rows || mean.cols != 1 {
            return Err(PrognosticsError::DimensionMismatch(
                "mean must be an r x 1 column matching the data row count".into(),
            ));
        }
        let mut cov = Matrix::zeros(self.rows, self.rows);
        for (j, w) in weights.iter().enumerate() {
            let mut diff = vec![0.0; self.rows];
            for i in 0..self.rows {
                diff[i] = self.get(i, j) - mean.get(i, 0);
            }
            for a in 0..self.rows {
                for b in 0..self.rows {
                    cov.data[a * cov.cols + b] += w * diff[a] * diff[b];
                }
            }
        }
        let sum_w_sq: f64 = weights.iter().map(|w| w * w).sum();
        let denom = 1.0 - bias_correction * sum_w_sq;
        if denom.abs() < 1e-15 {
            return Err(PrognosticsError::Singular);
        }
        Ok(cov.scale(1.0 / denom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_roundtrips_inverse() {
        let m = Matrix::from_row_major(2, 2, vec![4.0, 7.0, 2.0, 6.0]).unwrap();
        let inv = m.inverse().unwrap();
        let prod = m.mul(&inv).unwrap();
        let id = Matrix::identity(2);
        for r in 0..2 {
            for c in 0..2 {
                assert_relative_eq!(prod.get(r, c), id.get(r, c), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn cholesky_reconstructs_spd_matrix() {
        let m = Matrix::from_row_major(3, 3, vec![4.0, 2.0, 2.0, 2.0, 5.0, 1.0, 2.0, 1.0, 6.0])
            .unwrap();
        let l = m.cholesky().unwrap();
        let recon = l.mul(&l.transpose()).unwrap();
        for r in 0..3 {
            for c in 0..3 {
                assert_relative_eq!(recon.get(r, c), m.get(r, c), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn cholesky_rejects_non_spd() {
        let m = Matrix::from_row_major(2, 2, vec![1.0, 2.0, 2.0, 1.0]).unwrap();
        assert_eq!(m.cholesky().unwrap_err(), PrognosticsError::NotSpd);
    }

    #[test]
    fn determinant_on_non_square_fails() {
        let m = Matrix::zeros(2, 3);
        assert!(matches!(
            m.determinant(),
            Err(PrognosticsError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn inverse_of_singular_matrix_fails() {
        let m = Matrix::from_row_major(2, 2, vec![1.0, 2.0, 2.0, 4.0]).unwrap();
        assert_eq!(m.inverse().unwrap_err(), PrognosticsError::Singular);
    }

    #[test]
    fn gauss_jordan_path_matches_adjoint_for_4x4() {
        // A simple diagonally-dominant 4x4 matrix so both code paths can be
        // sanity-checked against each other via M * inv(M) == I.
        let m = Matrix::from_row_major(
            4,
            4,
            vec![
                10.0, 1.0, 0.0, 0.0, 1.0, 9.0, 2.0, 0.0, 0.0, 2.0, 8.0, 1.0, 0.0, 0.0, 1.0, 7.0,
            ],
        )
        .unwrap();
        let inv = m.inverse().unwrap();
        let prod = m.mul(&inv).unwrap();
        let id = Matrix::identity(4);
        for r in 0..4 {
            for c in 0..4 {
                assert_relative_eq!(prod.get(r, c), id.get(r, c), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn resize_preserves_upper_left_overlap() {
        let mut m = Matrix::from_row_major(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        m.resize(3, 3);
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(1, 1), 4.0);
        assert_eq!(m.get(2, 2), 0.0);
        m.resize(1, 1);
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.rows(), 1);
        assert_eq!(m.cols(), 1);
    }

    #[test]
    fn weighted_mean_is_column_weighted_sum() {
        let m = Matrix::from_row_major(2, 2, vec![1.0, 3.0, 2.0, 4.0]).unwrap();
        let mean = m.weighted_mean(&[0.5, 0.5]).unwrap();
        assert_relative_eq!(mean.get(0, 0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(mean.get(1, 0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn weighted_covariance_zero_bias_correction_is_plain_second_moment() {
        let m = Matrix::from_row_major(1, 3, vec![-1.0, 0.0, 1.0]).unwrap();
        let weights = vec![1.0 / 3.0; 3];
        let mean = m.weighted_mean(&weights).unwrap();
        let cov = m.weighted_covariance(&weights, &mean, 0.0).unwrap();
        assert_relative_eq!(cov.get(0, 0), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn mul_checks_inner_dimension() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        assert!(matches!(
            a.mul(&b),
            Err(PrognosticsError::DimensionMismatch(_))
        ));
    }
}
