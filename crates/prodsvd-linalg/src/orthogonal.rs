use prodsvd_core::{Float, LinalgResult, Matrix};

/// QR decomposition result: A = Q * R
pub struct QrDecomposition<T: Float> {
    /// m×k with orthonormal columns, k = min(m, n).
    pub q: Matrix<T>,
    /// k×n upper triangular.
    pub r: Matrix<T>,
}

/// QR decomposition via Householder reflections.
pub fn qr<T: Float>(a: &Matrix<T>) -> LinalgResult<QrDecomposition<T>> {
    let (m, n) = a.shape();
    let k = m.min(n);

    let mut r = a.clone();
    let mut q = Matrix::eye(m);
    let mut x = vec![T::ZERO; m];

    for j in 0..k {
        // Householder vector for column j below the diagonal
        let len = m - j;
        for i in j..m {
            x[i - j] = r[(i, j)];
        }
        let norm_x = x[..len].iter().map(|&v| v * v).sum::<T>().sqrt();
        if norm_x == T::ZERO {
            continue;
        }
        let alpha = if x[0] >= T::ZERO { norm_x } else { -norm_x };
        x[0] += alpha;
        let norm_v = x[..len].iter().map(|&v| v * v).sum::<T>().sqrt();
        if norm_v == T::ZERO {
            continue;
        }
        x[..len].iter_mut().for_each(|v| *v /= norm_v);

        // R ← H R on columns j..n
        for col in j..n {
            let dot: T = (j..m).map(|i| x[i - j] * r[(i, col)]).sum();
            for i in j..m {
                r[(i, col)] -= T::TWO * x[i - j] * dot;
            }
        }

        // Q ← Q H
        for row in 0..m {
            let dot: T = (j..m).map(|i| q[(row, i)] * x[i - j]).sum();
            for i in j..m {
                q[(row, i)] -= T::TWO * dot * x[i - j];
            }
        }
    }

    let mut q_thin = Matrix::zeros(m, k);
    for i in 0..m {
        for j in 0..k {
            q_thin[(i, j)] = q[(i, j)];
        }
    }
    let mut r_top = Matrix::zeros(k, n);
    for i in 0..k {
        for j in i..n {
            r_top[(i, j)] = r[(i, j)];
        }
    }
    Ok(QrDecomposition { q: q_thin, r: r_top })
}

/// Random n×n orthogonal matrix, Haar distributed: the Q factor of a Gaussian
/// matrix with column signs fixed so that diag(R) > 0.
pub fn random_orthogonal<T: Float>(n: usize, seed: u64) -> LinalgResult<Matrix<T>> {
    let g: Matrix<T> = Matrix::randn(n, n, Some(seed));
    let QrDecomposition { mut q, r } = qr(&g)?;
    let signs: Vec<T> = (0..n)
        .map(|i| if r[(i, i)] < T::ZERO { -T::ONE } else { T::ONE })
        .collect();
    q.scale_columns(&signs)?;
    Ok(q)
}

/// ‖QᵀQ − I‖_F, zero for a matrix with orthonormal columns.
pub fn orthogonality_error<T: Float>(q: &Matrix<T>) -> f64 {
    let (m, k) = q.shape();
    let mut err = 0.0;
    for a in 0..k {
        for b in 0..k {
            let dot: f64 = (0..m).map(|i| q[(i, a)].to_f64() * q[(i, b)].to_f64()).sum();
            let target = if a == b { 1.0 } else { 0.0 };
            err += (dot - target) * (dot - target);
        }
    }
    err.sqrt()
}
