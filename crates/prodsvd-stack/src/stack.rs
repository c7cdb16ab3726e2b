use prodsvd_core::{Float, LinalgError, LinalgResult, Matrix};
use prodsvd_linalg::{svd_in_place, SvdConfig, SvdDecomposition};

/// One stack slot: the factorization U · diag(S) · Vᵀ of a single step.
pub type Decomposition<T> = SvdDecomposition<T>;

/// Incremental SVD of a running product of n×n matrices.
///
/// After pushing `A₁, A₂, …, A_k` the stack represents
/// `A_k · … · A₂ · A₁ = U · diag(S) · Vᵀ`, where U and S are read from the
/// top slot and V is the product `V₀ · V₁ · … · V_{k-1}` of every slot's
/// right factor. Each push multiplies the new factor only into `U · diag(S)`
/// of the current top and refactorizes immediately; the rotations in V are
/// accumulated separately, so no step ever forms the full product.
///
/// All storage is allocated by [`SvdStack::new`] and [`SvdStack::resize`].
/// `push`, `pop`, `clear` and [`SvdStack::matrix_v_into`] do not allocate.
///
/// Misuse (pushing past capacity, pushing a matrix of the wrong shape,
/// querying or popping an empty stack) panics.
#[derive(Debug, Clone)]
pub struct SvdStack<T: Float> {
    n: usize,
    len: usize,
    slots: Vec<Decomposition<T>>,
    /// Holds `A · U · diag(S)` during a push.
    scratch: Matrix<T>,
    pub config: SvdConfig,
}

impl<T: Float> SvdStack<T> {
    /// Stack of `l` slots for n×n factors.
    ///
    /// # Panics
    /// If `n == 0`.
    pub fn new(n: usize, l: usize) -> Self {
        Self::with_config(n, l, SvdConfig::default())
    }

    /// [`SvdStack::new`] with an explicit SVD configuration.
    pub fn with_config(n: usize, l: usize, config: SvdConfig) -> Self {
        assert!(n > 0, "SvdStack: matrix dimension must be positive");
        log::debug!("allocating SVD stack: {} slots of {}x{}", l, n, n);
        SvdStack {
            n,
            len: 0,
            slots: (0..l).map(|_| Decomposition::zeros(n)).collect(),
            scratch: Matrix::zeros(n, n),
            config,
        }
    }

    /// Rebuild with new dimensions. Accumulated decompositions are discarded.
    pub fn resize(&mut self, n: usize, l: usize) {
        *self = Self::with_config(n, l, self.config);
    }

    pub fn empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_empty(&self) -> bool {
        self.empty()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Dimension n of the factors.
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Forget every decomposition. Slot contents are left in place.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Multiply `a` onto the left of the running product.
    ///
    /// # Panics
    /// If `a` is not n×n, if the stack is full, or if the factorization
    /// does not converge.
    pub fn push(&mut self, a: &Matrix<T>) {
        if let Err(e) = self.try_push(a) {
            panic!("SvdStack::push: {}", e);
        }
    }

    /// Like [`SvdStack::push`], but a failed factorization is returned
    /// instead of panicking. On error the stack is unchanged.
    ///
    /// # Panics
    /// If `a` is not n×n or the stack is full.
    pub fn try_push(&mut self, a: &Matrix<T>) -> LinalgResult<()> {
        let n = self.n;
        if a.shape() != (n, n) {
            panic!(
                "SvdStack::push: {}",
                LinalgError::ShapeMismatch {
                    expected: (n, n),
                    got: a.shape(),
                }
            );
        }
        assert!(
            self.len < self.slots.len(),
            "SvdStack::push: capacity of {} exceeded",
            self.slots.len()
        );

        let (done, rest) = self.slots.split_at_mut(self.len);
        let slot = &mut rest[0];
        match done.last() {
            None => self.scratch.copy_from(a)?,
            Some(top) => {
                // Only U·diag(S) of the top enters the product. Folding in
                // Vᵀ here would expose the full range of S to `a` again.
                a.matmul_into(&top.u, &mut self.scratch)?;
                self.scratch.scale_columns(&top.s)?;
            }
        }

        // Slot `len` is outside the valid range until the increment below,
        // so a failure here leaves nothing observable behind.
        let sweeps = svd_in_place(&mut self.scratch, &mut slot.s, &mut slot.v, &self.config)?;
        std::mem::swap(&mut self.scratch, &mut slot.u);
        self.len += 1;

        log::trace!(
            "push: len={} sweeps={} sigma=[{:e}, {:e}]",
            self.len,
            sweeps,
            slot.s[0].to_f64(),
            slot.s[n - 1].to_f64()
        );
        Ok(())
    }

    /// Drop the most recent factor.
    ///
    /// # Panics
    /// If the stack is empty.
    pub fn pop(&mut self) {
        assert!(self.len > 0, "SvdStack::pop: stack is empty");
        self.len -= 1;
        log::trace!("pop: len={}", self.len);
    }

    /// Decomposition stored at logical index `i`.
    ///
    /// # Panics
    /// If `i >= len()`.
    pub fn slot(&self, i: usize) -> &Decomposition<T> {
        assert!(
            i < self.len,
            "SvdStack::slot: index {} out of range for length {}",
            i,
            self.len
        );
        &self.slots[i]
    }

    /// Top decomposition.
    ///
    /// # Panics
    /// If the stack is empty.
    pub fn top(&self) -> &Decomposition<T> {
        assert!(self.len > 0, "SvdStack: stack is empty");
        &self.slots[self.len - 1]
    }

    /// Singular values of the full product, descending.
    pub fn singular_values(&self) -> &[T] {
        &self.top().s
    }

    /// Left singular vectors of the full product.
    pub fn matrix_u(&self) -> &Matrix<T> {
        &self.top().u
    }

    /// Right singular vectors of the full product: `V₀ · V₁ · … · V_{len-1}`.
    pub fn matrix_v(&self) -> Matrix<T> {
        let first = &self.bottom().v;
        let mut r = first.clone();
        for slot in &self.slots[1..self.len] {
            r = match r.matmul(&slot.v) {
                Ok(m) => m,
                Err(e) => unreachable!("slot shapes are fixed at construction: {}", e),
            };
        }
        r
    }

    /// Allocation-free [`SvdStack::matrix_v`]; `out` must be n×n.
    ///
    /// Uses the internal scratch buffer, hence `&mut self`.
    ///
    /// # Panics
    /// If the stack is empty or `out` has the wrong shape.
    pub fn matrix_v_into(&mut self, out: &mut Matrix<T>) {
        if let Err(e) = self.try_matrix_v_into(out) {
            panic!("SvdStack::matrix_v_into: {}", e);
        }
    }

    fn try_matrix_v_into(&mut self, out: &mut Matrix<T>) -> LinalgResult<()> {
        out.copy_from(&self.bottom().v)?;
        for i in 1..self.len {
            out.matmul_into(&self.slots[i].v, &mut self.scratch)?;
            std::mem::swap(out, &mut self.scratch);
        }
        Ok(())
    }

    /// `matrix_u() · diag(singular_values()) · matrix_v()ᵀ`.
    ///
    /// This materializes the full dynamic range of the product and is meant
    /// for diagnostics, not for further multiplication.
    pub fn reconstruct(&self) -> Matrix<T> {
        let mut us = self.matrix_u().clone();
        let v = self.matrix_v();
        let product = us
            .scale_columns(self.singular_values())
            .and_then(|_| us.matmul(&v.t()));
        match product {
            Ok(m) => m,
            Err(e) => unreachable!("slot shapes are fixed at construction: {}", e),
        }
    }

    /// σ_max / σ_min of the full product.
    pub fn condition_number(&self) -> T {
        self.top().condition_number()
    }

    /// Slot 0, checked against an empty stack.
    fn bottom(&self) -> &Decomposition<T> {
        assert!(self.len > 0, "SvdStack: stack is empty");
        &self.slots[0]
    }
}
