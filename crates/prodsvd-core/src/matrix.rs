use crate::dtype::Float;
use crate::error::{LinalgError, LinalgResult};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Dense real matrix stored as a flat row-major `Vec<T>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Matrix<T: Float> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Float> Matrix<T> {
    /// Create a matrix from row-major data.
    pub fn new(data: Vec<T>, rows: usize, cols: usize) -> LinalgResult<Self> {
        if data.len() != rows * cols {
            return Err(LinalgError::DimensionMismatch(format!(
                "{} elements cannot fill a {}x{} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Matrix { data, rows, cols })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![T::ZERO; rows * cols],
            rows,
            cols,
        }
    }

    /// Identity matrix of size n×n.
    pub fn eye(n: usize) -> Self {
        let mut m = Matrix::zeros(n, n);
        m.set_identity();
        m
    }

    /// Square matrix with `diag` on the diagonal.
    pub fn from_diag(diag: &[T]) -> Self {
        let n = diag.len();
        let mut m = Matrix::zeros(n, n);
        for (i, &d) in diag.iter().enumerate() {
            m.data[i * n + i] = d;
        }
        m
    }

    /// Create a matrix from a slice of rows.
    pub fn from_vec2d(rows: &[Vec<T>]) -> LinalgResult<Self> {
        if rows.is_empty() {
            return Ok(Matrix::zeros(0, 0));
        }
        let cols = rows[0].len();
        if rows.iter().any(|r| r.len() != cols) {
            return Err(LinalgError::InvalidOperation(
                "All rows must have the same number of columns".to_string(),
            ));
        }
        let flat: Vec<T> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Matrix::new(flat, rows.len(), cols)
    }

    /// Standard normal entries (Box-Muller). A seed makes the draw reproducible.
    pub fn randn(rows: usize, cols: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let n = rows * cols;
        let mut data = Vec::with_capacity(n + 1);
        while data.len() < n {
            let u1: f64 = rng.gen::<f64>().max(1e-300);
            let u2: f64 = rng.gen::<f64>();
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f64::consts::PI * u2;
            data.push(T::from_f64(r * theta.cos()));
            data.push(T::from_f64(r * theta.sin()));
        }
        data.truncate(n);
        Matrix { data, rows, cols }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Borrow row `i` as a slice.
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Checked element read.
    pub fn get(&self, row: usize, col: usize) -> LinalgResult<T> {
        self.offset(row, col).map(|o| self.data[o])
    }

    /// Checked element write.
    pub fn set(&mut self, row: usize, col: usize, value: T) -> LinalgResult<()> {
        let o = self.offset(row, col)?;
        self.data[o] = value;
        Ok(())
    }

    fn offset(&self, row: usize, col: usize) -> LinalgResult<usize> {
        if row >= self.rows || col >= self.cols {
            return Err(LinalgError::IndexOutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    // ─── In-place Updates ───────────────────────────────────────────────────

    /// Overwrite with the identity (square) or its rectangular truncation.
    pub fn set_identity(&mut self) {
        self.data.iter_mut().for_each(|v| *v = T::ZERO);
        for i in 0..self.rows.min(self.cols) {
            self.data[i * self.cols + i] = T::ONE;
        }
    }

    /// Copy `other` into `self` without reallocating.
    pub fn copy_from(&mut self, other: &Matrix<T>) -> LinalgResult<()> {
        if self.shape() != other.shape() {
            return Err(LinalgError::ShapeMismatch {
                expected: self.shape(),
                got: other.shape(),
            });
        }
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Right-multiply by a diagonal matrix: `self ← self · diag(d)`.
    pub fn scale_columns(&mut self, d: &[T]) -> LinalgResult<()> {
        if d.len() != self.cols {
            return Err(LinalgError::DimensionMismatch(format!(
                "scale_columns: {} scale factors for {} columns",
                d.len(),
                self.cols
            )));
        }
        for row in self.data.chunks_exact_mut(self.cols) {
            for (x, &s) in row.iter_mut().zip(d) {
                *x *= s;
            }
        }
        Ok(())
    }

    /// Swap columns `i` and `j`.
    pub fn swap_columns(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        for row in self.data.chunks_exact_mut(self.cols) {
            row.swap(i, j);
        }
    }

    // ─── Products ───────────────────────────────────────────────────────────

    /// Transpose.
    pub fn t(&self) -> Matrix<T> {
        let mut data = vec![T::ZERO; self.numel()];
        for i in 0..self.rows {
            for j in 0..self.cols {
                data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        Matrix {
            data,
            rows: self.cols,
            cols: self.rows,
        }
    }

    /// Matrix multiply, allocating the result.
    pub fn matmul(&self, other: &Matrix<T>) -> LinalgResult<Matrix<T>> {
        let mut out = Matrix::zeros(self.rows, other.cols);
        self.matmul_into(other, &mut out)?;
        Ok(out)
    }

    /// Matrix multiply into a preallocated `out` of shape `(self.rows, other.cols)`.
    pub fn matmul_into(&self, other: &Matrix<T>, out: &mut Matrix<T>) -> LinalgResult<()> {
        if self.cols != other.rows {
            return Err(LinalgError::DimensionMismatch(format!(
                "matmul: inner dimensions must match, got {} and {}",
                self.cols, other.rows
            )));
        }
        if out.shape() != (self.rows, other.cols) {
            return Err(LinalgError::ShapeMismatch {
                expected: (self.rows, other.cols),
                got: out.shape(),
            });
        }
        let (k, n) = (self.cols, other.cols);
        for (i, out_row) in out.data.chunks_exact_mut(n.max(1)).enumerate().take(self.rows) {
            out_row.iter_mut().for_each(|v| *v = T::ZERO);
            for p in 0..k {
                let a = self.data[i * k + p];
                if a == T::ZERO {
                    continue;
                }
                let b_row = &other.data[p * n..(p + 1) * n];
                for (o, &b) in out_row.iter_mut().zip(b_row) {
                    *o += a * b;
                }
            }
        }
        Ok(())
    }

    // ─── Norms ──────────────────────────────────────────────────────────────

    /// Frobenius norm.
    pub fn norm(&self) -> T {
        self.data.iter().map(|&v| v * v).sum::<T>().sqrt()
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> T {
        self.data.iter().fold(T::ZERO, |m, &v| m.max(v.abs()))
    }

    /// Largest absolute entrywise difference to `other`.
    pub fn max_abs_diff(&self, other: &Matrix<T>) -> LinalgResult<T> {
        if self.shape() != other.shape() {
            return Err(LinalgError::ShapeMismatch {
                expected: self.shape(),
                got: other.shape(),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .fold(T::ZERO, |m, (&a, &b)| m.max((a - b).abs())))
    }
}

// ─── Indexing ───────────────────────────────────────────────────────────────

impl<T: Float> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of bounds for a {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl<T: Float> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of bounds for a {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &mut self.data[row * self.cols + col]
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

impl<T: Float> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "matrix([")?;
        for i in 0..self.rows.min(8) {
            write!(f, "  [")?;
            for j in 0..self.cols.min(8) {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:.4e}", self.data[i * self.cols + j].to_f64())?;
            }
            if self.cols > 8 {
                write!(f, ", ...")?;
            }
            writeln!(f, "],")?;
        }
        if self.rows > 8 {
            writeln!(f, "  ...")?;
        }
        write!(f, "], shape=({}, {}))", self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_creation() {
        let m: Matrix<f64> = Matrix::zeros(3, 4);
        assert_eq!(m.shape(), (3, 4));
        assert_eq!(m.numel(), 12);

        let i: Matrix<f64> = Matrix::eye(3);
        assert_eq!(i.data().iter().sum::<f64>(), 3.0);
        assert_eq!(i[(0, 0)], 1.0);
        assert_eq!(i[(0, 1)], 0.0);

        assert!(Matrix::<f64>::new(vec![1.0, 2.0, 3.0], 2, 2).is_err());
    }

    #[test]
    fn test_from_vec2d() {
        let m: Matrix<f64> = Matrix::from_vec2d(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
        ])
        .unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.get(1, 2).unwrap(), 6.0);
        assert!(m.get(2, 0).is_err());
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);

        let ragged = Matrix::<f64>::from_vec2d(&[vec![1.0], vec![2.0, 3.0]]);
        assert!(ragged.is_err());
    }

    #[test]
    fn test_matmul() {
        let a: Matrix<f64> = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        let b: Matrix<f64> = Matrix::new(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], 3, 2).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape(), (2, 2));
        // [1*7+2*9+3*11, 1*8+2*10+3*12] = [58, 64]
        // [4*7+5*9+6*11, 4*8+5*10+6*12] = [139, 154]
        assert_eq!(c.data(), &[58.0, 64.0, 139.0, 154.0]);

        assert!(a.matmul(&a).is_err());
    }

    #[test]
    fn test_matmul_into_overwrites_output() {
        let a: Matrix<f64> = Matrix::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let mut out = Matrix::new(vec![9.0; 4], 2, 2).unwrap();
        a.matmul_into(&Matrix::eye(2), &mut out).unwrap();
        assert_eq!(out, a);

        let mut wrong = Matrix::zeros(3, 2);
        assert!(a.matmul_into(&a, &mut wrong).is_err());
    }

    #[test]
    fn test_scale_columns_matches_diag_product() {
        let a: Matrix<f64> = Matrix::randn(3, 3, Some(7));
        let d = [2.0, -0.5, 10.0];
        let expected = a.matmul(&Matrix::from_diag(&d)).unwrap();
        let mut scaled = a.clone();
        scaled.scale_columns(&d).unwrap();
        assert_abs_diff_eq!(scaled.max_abs_diff(&expected).unwrap(), 0.0, epsilon = 1e-14);

        assert!(scaled.scale_columns(&[1.0]).is_err());
    }

    #[test]
    fn test_transpose_and_swap() {
        let a: Matrix<f64> = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        let t = a.t();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t[(1, 0)], 2.0);
        assert_eq!(t[(2, 1)], 6.0);

        let mut s = a.clone();
        s.swap_columns(0, 2);
        assert_eq!(s.data(), &[3.0, 2.0, 1.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn test_copy_from_checks_shape() {
        let src: Matrix<f64> = Matrix::randn(2, 2, Some(1));
        let mut dst = Matrix::zeros(2, 2);
        dst.copy_from(&src).unwrap();
        assert_eq!(dst, src);
        assert!(Matrix::zeros(2, 3).copy_from(&src).is_err());
    }

    #[test]
    fn test_randn_is_reproducible() {
        let a: Matrix<f64> = Matrix::randn(4, 5, Some(42));
        let b: Matrix<f64> = Matrix::randn(4, 5, Some(42));
        assert_eq!(a, b);
        assert_eq!(a.numel(), 20);
        assert!(a.is_finite());
    }

    #[test]
    fn test_norms() {
        let a: Matrix<f64> = Matrix::new(vec![3.0, 0.0, 0.0, -4.0], 2, 2).unwrap();
        assert_abs_diff_eq!(a.norm(), 5.0, epsilon = 1e-12);
        assert_eq!(a.max_abs(), 4.0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_index_out_of_bounds_panics() {
        let a: Matrix<f64> = Matrix::eye(2);
        let _ = a[(2, 0)];
    }

    #[test]
    fn test_display_truncates_large_matrices() {
        let small: Matrix<f64> = Matrix::from_diag(&[1.0, 0.5]);
        assert_eq!(
            small.to_string(),
            "matrix([\n  [1.0000e0, 0.0000e0],\n  [0.0000e0, 5.0000e-1],\n], shape=(2, 2))"
        );

        let big: Matrix<f64> = Matrix::zeros(10, 9);
        let text = big.to_string();
        assert_eq!(text.lines().count(), 11);
        assert!(text.contains(", ...],"));
        assert!(text.contains("\n  ...\n"));
        assert!(text.ends_with("shape=(10, 9))"));
    }
}
