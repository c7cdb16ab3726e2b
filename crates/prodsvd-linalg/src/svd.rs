use prodsvd_core::{Float, LinalgError, LinalgResult, Matrix};
use serde::{Deserialize, Serialize};

/// SVD result: A = U · diag(s) · Vᵀ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct SvdDecomposition<T: Float> {
    /// Left singular vectors, one per column.
    pub u: Matrix<T>,
    /// Singular values, non-negative and descending.
    pub s: Vec<T>,
    /// Right singular vectors, one per column (not transposed).
    pub v: Matrix<T>,
}

impl<T: Float> SvdDecomposition<T> {
    /// Zero-filled storage for the decomposition of an n×n matrix.
    pub fn zeros(n: usize) -> Self {
        SvdDecomposition {
            u: Matrix::zeros(n, n),
            s: vec![T::ZERO; n],
            v: Matrix::zeros(n, n),
        }
    }

    /// Rebuild U · diag(s) · Vᵀ.
    pub fn reconstruct(&self) -> LinalgResult<Matrix<T>> {
        let mut us = self.u.clone();
        us.scale_columns(&self.s)?;
        us.matmul(&self.v.t())
    }

    /// σ_max / σ_min, infinite for a singular matrix.
    pub fn condition_number(&self) -> T {
        match (self.s.first(), self.s.last()) {
            (Some(&max), Some(&min)) if min > T::ZERO => max / min,
            (Some(_), Some(_)) => T::INFINITY,
            _ => T::ONE,
        }
    }
}

/// Tuning knobs for the Jacobi iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvdConfig {
    /// Sweeps over all column pairs before giving up.
    pub max_sweeps: usize,
    /// Relative orthogonality threshold. `None` uses `16 · m · ε` of the scalar type.
    pub tol: Option<f64>,
}

impl Default for SvdConfig {
    fn default() -> Self {
        SvdConfig {
            max_sweeps: 60,
            tol: None,
        }
    }
}

impl SvdConfig {
    fn threshold<T: Float>(&self, m: usize) -> T {
        match self.tol {
            Some(tol) => T::from_f64(tol),
            None => T::EPSILON * T::from_usize(16 * m.max(1)),
        }
    }
}

/// Singular Value Decomposition using one-sided (Hestenes) Jacobi rotations.
///
/// Decomposes A = U Σ Vᵀ where, with k = min(m, n):
/// - U: [m, k] left singular vectors
/// - Σ: [k] singular values (descending)
/// - V: [n, k] right singular vectors
pub fn svd<T: Float>(a: &Matrix<T>) -> LinalgResult<SvdDecomposition<T>> {
    svd_with(a, &SvdConfig::default())
}

/// [`svd`] with an explicit configuration.
pub fn svd_with<T: Float>(a: &Matrix<T>, config: &SvdConfig) -> LinalgResult<SvdDecomposition<T>> {
    let (m, n) = a.shape();
    if m < n {
        // Aᵀ = V Σ Uᵀ
        let at = svd_with(&a.t(), config)?;
        return Ok(SvdDecomposition {
            u: at.v,
            s: at.s,
            v: at.u,
        });
    }
    let mut work = a.clone();
    let mut s = vec![T::ZERO; n];
    let mut v = Matrix::zeros(n, n);
    svd_in_place(&mut work, &mut s, &mut v, config)?;
    Ok(SvdDecomposition { u: work, s, v })
}

/// Allocation-free SVD of a tall or square `work` (m×n, m ≥ n).
///
/// On success `work` holds U (m×n), `s` the singular values in descending
/// order and `v` the n×n right singular vectors. Returns the number of sweeps
/// performed. A column whose norm does not fit in `T` yields
/// [`LinalgError::NonFinite`]. On error the contents of all three buffers are
/// unspecified.
pub fn svd_in_place<T: Float>(
    work: &mut Matrix<T>,
    s: &mut [T],
    v: &mut Matrix<T>,
    config: &SvdConfig,
) -> LinalgResult<usize> {
    let (m, n) = work.shape();
    if m < n {
        return Err(LinalgError::DimensionMismatch(format!(
            "svd_in_place: needs rows >= cols, got {}x{}",
            m, n
        )));
    }
    if s.len() != n {
        return Err(LinalgError::DimensionMismatch(format!(
            "svd_in_place: {} singular value slots for {} columns",
            s.len(),
            n
        )));
    }
    if v.shape() != (n, n) {
        return Err(LinalgError::ShapeMismatch {
            expected: (n, n),
            got: v.shape(),
        });
    }
    if !work.is_finite() {
        return Err(LinalgError::NonFinite);
    }

    v.set_identity();
    let sweeps = orthogonalize_columns(work, v, config.threshold(m), config.max_sweeps)?;

    // Column norms are the singular values; normalized columns are U.
    for (j, sj) in s.iter_mut().enumerate() {
        let norm = column_norm(work, j);
        *sj = norm;
        if norm > T::ZERO {
            for i in 0..m {
                work[(i, j)] /= norm;
            }
        }
    }
    // A norm past the range of T, or anything it touched, is not a result.
    if !s.iter().all(|x| x.is_finite()) || !work.is_finite() || !v.is_finite() {
        return Err(LinalgError::NonFinite);
    }

    sort_descending(work, s, v);
    complete_null_columns(work, s);
    Ok(sweeps)
}

/// Cyclic Jacobi sweeps until every column pair is numerically orthogonal.
fn orthogonalize_columns<T: Float>(
    work: &mut Matrix<T>,
    v: &mut Matrix<T>,
    tol: T,
    max_sweeps: usize,
) -> LinalgResult<usize> {
    let (m, n) = work.shape();
    for sweep in 0..max_sweeps {
        let mut rotated = false;
        for p in 0..n {
            for q in (p + 1)..n {
                let np = column_norm(work, p);
                let nq = column_norm(work, q);
                if !(np.is_finite() && nq.is_finite()) {
                    return Err(LinalgError::NonFinite);
                }
                if np == T::ZERO || nq == T::ZERO {
                    continue;
                }
                // Cosine of the angle between columns p and q, computed on
                // normalized entries so squares never overflow.
                let mut cos = T::ZERO;
                for i in 0..m {
                    cos += (work[(i, p)] / np) * (work[(i, q)] / nq);
                }
                let (small, big) = (np.min(nq), np.max(nq));
                // A subnormal column only carries absolute precision.
                let pair_tol = if small < T::MIN_POSITIVE {
                    tol * (T::MIN_POSITIVE / small)
                } else {
                    tol
                };
                if cos.abs() <= pair_tol {
                    continue;
                }

                // t = sign(ζ) / (|ζ| + √(1 + ζ²)) with
                // ζ = (‖b_q‖² − ‖b_p‖²) / (2⟨b_p, b_q⟩), rewritten in terms of
                // ρ = min/max of the two norms. With g = 2|cos|·ρ and
                // w = 1 − ρ², t = ±g / (w + √(g² + w²)), which stays finite
                // however far apart the norms are.
                let rho = small / big;
                let g = T::TWO * cos.abs() * rho;
                let w = (T::ONE - rho) * (T::ONE + rho);
                let den = w + (g * g + w * w).sqrt();
                let sign = if (nq >= np) == (cos >= T::ZERO) { T::ONE } else { -T::ONE };
                let t = sign * g / den;
                let c = hypot_one(t).recip();
                let sn = t * c;

                // t times the larger norm, formed without the underflowing ρ.
                let t_big = sign * T::TWO * cos.abs() * small / den;
                if t_big == T::ZERO {
                    // The correction sits below the smaller column's precision.
                    continue;
                }
                let (tp, tq) = if nq >= np { (t * np, t_big) } else { (t_big, t * nq) };
                rotated = true;

                rotate_scaled_columns(work, p, q, [c * np, c * tq, c * tp, c * nq], (np, nq));
                rotate_columns(v, p, q, c, sn);
            }
        }
        if !rotated {
            return Ok(sweep + 1);
        }
    }
    log::warn!(
        "Jacobi SVD of a {}x{} matrix did not converge in {} sweeps",
        m,
        n,
        max_sweeps
    );
    Err(LinalgError::NoConvergence { sweeps: max_sweeps })
}

/// √(1 + x²) without overflow for large |x|.
fn hypot_one<T: Float>(x: T) -> T {
    let ax = x.abs();
    if ax > T::ONE {
        let r = ax.recip();
        ax * (T::ONE + r * r).sqrt()
    } else {
        (T::ONE + ax * ax).sqrt()
    }
}

/// Scaled 2-norm of column `j`.
fn column_norm<T: Float>(a: &Matrix<T>, j: usize) -> T {
    let mut scale = T::ZERO;
    for i in 0..a.rows() {
        scale = scale.max(a[(i, j)].abs());
    }
    if scale == T::ZERO {
        return T::ZERO;
    }
    // Divide rather than multiply by the reciprocal: 1/scale overflows
    // when scale is subnormal.
    let mut sum = T::ZERO;
    for i in 0..a.rows() {
        let x = a[(i, j)] / scale;
        sum += x * x;
    }
    scale * sum.sqrt()
}

/// b_p ← c·b_p − s·b_q,  b_q ← s·b_p + c·b_q
fn rotate_columns<T: Float>(a: &mut Matrix<T>, p: usize, q: usize, c: T, s: T) {
    for i in 0..a.rows() {
        let bp = a[(i, p)];
        let bq = a[(i, q)];
        a[(i, p)] = c * bp - s * bq;
        a[(i, q)] = s * bp + c * bq;
    }
}

/// The rotation of [`rotate_columns`] applied to the unit columns
/// `x = b_p / n_p`, `y = b_q / n_q`:
/// `b_p ← k[0]·x − k[1]·y`,  `b_q ← k[2]·x + k[3]·y`.
///
/// Folding the norms into the coefficients keeps the cross terms
/// representable when `s·n_q` is ordinary but `s` itself underflows.
fn rotate_scaled_columns<T: Float>(
    a: &mut Matrix<T>,
    p: usize,
    q: usize,
    k: [T; 4],
    norms: (T, T),
) {
    let (np, nq) = norms;
    for i in 0..a.rows() {
        let x = a[(i, p)] / np;
        let y = a[(i, q)] / nq;
        a[(i, p)] = k[0] * x - k[1] * y;
        a[(i, q)] = k[2] * x + k[3] * y;
    }
}

fn sort_descending<T: Float>(u: &mut Matrix<T>, s: &mut [T], v: &mut Matrix<T>) {
    let n = s.len();
    for i in 0..n {
        let mut best = i;
        for j in (i + 1)..n {
            if s[j] > s[best] {
                best = j;
            }
        }
        if best != i {
            s.swap(i, best);
            u.swap_columns(i, best);
            v.swap_columns(i, best);
        }
    }
}

/// Replace the U columns of zero singular values with unit vectors orthogonal
/// to every preceding column. Expects `s` sorted descending.
fn complete_null_columns<T: Float>(u: &mut Matrix<T>, s: &[T]) {
    let m = u.rows();
    let Some(first_null) = s.iter().position(|&x| x == T::ZERO) else {
        return;
    };
    let mut candidate = 0;
    for j in first_null..s.len() {
        while candidate < m {
            for i in 0..m {
                u[(i, j)] = if i == candidate { T::ONE } else { T::ZERO };
            }
            candidate += 1;
            // Two Gram-Schmidt passes.
            for _ in 0..2 {
                for k in 0..j {
                    let mut dot = T::ZERO;
                    for i in 0..m {
                        dot += u[(i, k)] * u[(i, j)];
                    }
                    for i in 0..m {
                        let uik = u[(i, k)];
                        u[(i, j)] -= dot * uik;
                    }
                }
            }
            let norm = column_norm(u, j);
            // A canonical vector nearly inside the span is rejected.
            if norm > T::HALF {
                let inv = norm.recip();
                for i in 0..m {
                    u[(i, j)] *= inv;
                }
                break;
            }
        }
    }
}

/// Frobenius norm.
pub fn frobenius_norm<T: Float>(a: &Matrix<T>) -> f64 {
    a.data().iter().map(|&v| v.to_f64() * v.to_f64()).sum::<f64>().sqrt()
}

/// Condition number σ_max / σ_min from the singular values.
pub fn condition_number<T: Float>(a: &Matrix<T>) -> LinalgResult<f64> {
    Ok(svd(a)?.condition_number().to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orthogonal::{orthogonality_error, random_orthogonal};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn reconstruction_error(a: &Matrix<f64>, d: &SvdDecomposition<f64>) -> f64 {
        d.reconstruct().unwrap().max_abs_diff(a).unwrap()
    }

    #[test]
    fn test_svd_diagonal() {
        let a: Matrix<f64> = Matrix::from_vec2d(&[
            vec![3.0, 0.0],
            vec![0.0, 4.0],
        ]).unwrap();

        let d = svd(&a).unwrap();
        assert_abs_diff_eq!(d.s[0], 4.0, epsilon = 1e-14);
        assert_abs_diff_eq!(d.s[1], 3.0, epsilon = 1e-14);
        assert!(reconstruction_error(&a, &d) < 1e-14);
    }

    #[test]
    fn test_svd_random_square() {
        let a: Matrix<f64> = Matrix::randn(6, 6, Some(3));
        let d = svd(&a).unwrap();

        assert!(reconstruction_error(&a, &d) < 1e-12);
        assert!(orthogonality_error(&d.u) < 1e-12);
        assert!(orthogonality_error(&d.v) < 1e-12);
        assert!(d.s.windows(2).all(|w| w[0] >= w[1]));
        assert!(d.s.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_svd_tall_and_wide() {
        let tall: Matrix<f64> = Matrix::randn(5, 3, Some(11));
        let d = svd(&tall).unwrap();
        assert_eq!(d.u.shape(), (5, 3));
        assert_eq!(d.v.shape(), (3, 3));
        assert!(reconstruction_error(&tall, &d) < 1e-12);

        let wide = tall.t();
        let w = svd(&wide).unwrap();
        assert_eq!(w.u.shape(), (3, 3));
        assert_eq!(w.v.shape(), (5, 3));
        assert!(reconstruction_error(&wide, &w) < 1e-12);
        for (a, b) in d.s.iter().zip(&w.s) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_svd_rank_deficient_has_orthogonal_u() {
        // Rank one: every row is a multiple of [1, 2, 3].
        let a: Matrix<f64> = Matrix::from_vec2d(&[
            vec![1.0, 2.0, 3.0],
            vec![2.0, 4.0, 6.0],
            vec![-1.0, -2.0, -3.0],
        ]).unwrap();
        let d = svd(&a).unwrap();
        // σ₁ = ‖[1, 2, -1]‖ · ‖[1, 2, 3]‖
        assert_relative_eq!(d.s[0], 84f64.sqrt(), max_relative = 1e-12);
        assert!(d.s[1] < 1e-12);
        assert!(orthogonality_error(&d.u) < 1e-12);
        assert!(reconstruction_error(&a, &d) < 1e-12);

        let z: Matrix<f64> = Matrix::zeros(3, 3);
        let dz = svd(&z).unwrap();
        assert!(dz.s.iter().all(|&x| x == 0.0));
        assert!(orthogonality_error(&dz.u) < 1e-14);
    }

    #[test]
    fn test_svd_graded_columns_keeps_relative_accuracy() {
        // Q · diag(1e12, 1, 1e-12): a well-conditioned factor times a
        // wildly graded diagonal.
        let q = random_orthogonal::<f64>(3, 5).unwrap();
        let mut b = q.clone();
        b.scale_columns(&[1e12, 1.0, 1e-12]).unwrap();
        let d = svd(&b).unwrap();
        assert_relative_eq!(d.s[0], 1e12, max_relative = 1e-12);
        assert_relative_eq!(d.s[1], 1.0, max_relative = 1e-12);
        assert_relative_eq!(d.s[2], 1e-12, max_relative = 1e-12);
    }

    #[test]
    fn test_svd_columns_beyond_double_range_apart() {
        // Columns (1e200, 0) and (1e-200, 1e-200) at 45 degrees. Their norm
        // ratio does not fit in an f64, yet σ₂ = |det| / σ₁ = 1e-200.
        let a: Matrix<f64> = Matrix::from_vec2d(&[
            vec![1e200, 1e-200],
            vec![0.0, 1e-200],
        ]).unwrap();
        let d = svd(&a).unwrap();
        assert_relative_eq!(d.s[0], 1e200, max_relative = 1e-14);
        assert_relative_eq!(d.s[1], 1e-200, max_relative = 1e-14);
        assert!(orthogonality_error(&d.u) < 1e-14);
        assert!(orthogonality_error(&d.v) < 1e-14);
    }

    #[test]
    fn test_svd_subnormal_column() {
        let a: Matrix<f64> = Matrix::from_diag(&[1.0, 1e-310]);
        let d = svd(&a).unwrap();
        assert_eq!(d.s, vec![1.0, 1e-310]);
        assert_eq!(d.u, Matrix::eye(2));
        assert_eq!(d.v, Matrix::eye(2));

        // A subnormal column that is not orthogonal to its neighbour.
        let tiny = f64::from_bits(1 << 34);
        let b: Matrix<f64> = Matrix::from_vec2d(&[
            vec![1.0, 3.0 * tiny],
            vec![0.0, 4.0 * tiny],
        ]).unwrap();
        let d = svd(&b).unwrap();
        assert!(d.u.is_finite() && d.v.is_finite());
        assert_relative_eq!(d.s[0], 1.0, max_relative = 1e-14);
        assert_relative_eq!(d.s[1], 4.0 * tiny, max_relative = 1e-12);
        assert!(orthogonality_error(&d.v) < 1e-14);
    }

    #[test]
    fn test_svd_overflowing_norm_is_non_finite() {
        let a: Matrix<f64> = Matrix::from_vec2d(&[
            vec![1e308, 0.0],
            vec![1e308, 1.0],
        ]).unwrap();
        assert_eq!(svd(&a).unwrap_err(), LinalgError::NonFinite);
    }

    #[test]
    fn test_svd_in_place_rejects_bad_buffers() {
        let mut work: Matrix<f64> = Matrix::randn(3, 3, Some(1));
        let mut v = Matrix::zeros(3, 3);
        let cfg = SvdConfig::default();
        assert!(svd_in_place(&mut work, &mut [0.0; 2], &mut v, &cfg).is_err());
        assert!(svd_in_place(&mut work, &mut [0.0; 3], &mut Matrix::zeros(2, 2), &cfg).is_err());

        let mut wide: Matrix<f64> = Matrix::zeros(2, 3);
        assert!(svd_in_place(&mut wide, &mut [0.0; 3], &mut v, &cfg).is_err());
    }

    #[test]
    fn test_svd_non_finite_input() {
        let a: Matrix<f64> = Matrix::new(vec![1.0, f64::NAN, 0.0, 1.0], 2, 2).unwrap();
        assert_eq!(svd(&a).unwrap_err(), LinalgError::NonFinite);
    }

    #[test]
    fn test_svd_reports_no_convergence() {
        let a: Matrix<f64> = Matrix::randn(4, 4, Some(9));
        let cfg = SvdConfig { max_sweeps: 1, tol: None };
        assert_eq!(
            svd_with(&a, &cfg).unwrap_err(),
            LinalgError::NoConvergence { sweeps: 1 }
        );
    }

    #[test]
    fn test_condition_number() {
        let a: Matrix<f64> = Matrix::from_diag(&[10.0, 2.0, 0.5]);
        assert_relative_eq!(condition_number(&a).unwrap(), 20.0, max_relative = 1e-12);
        assert_abs_diff_eq!(frobenius_norm(&a), (104.25f64).sqrt(), epsilon = 1e-12);
        let singular: Matrix<f64> = Matrix::from_diag(&[1.0, 0.0]);
        assert!(condition_number(&singular).unwrap().is_infinite());
    }
}
