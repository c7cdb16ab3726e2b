//! # prodsvd
//!
//! Numerically stable products of long chains of square matrices.
//!
//! ## Modules
//!
//! - **core** — Dense row-major `Matrix`, the `Float` scalar trait, `LinalgError`
//! - **linalg** — One-sided Jacobi SVD (allocating and in-place), Householder QR, random orthogonal matrices
//! - **stack** — `SvdStack`: incremental SVD of a running product, one decomposition per factor

/// Dense matrix engine.
pub use prodsvd_core as core;

/// Linear algebra operations.
pub use prodsvd_linalg as linalg;

/// Incremental SVD stack.
pub use prodsvd_stack as stack;

pub use prodsvd_core::{Float, LinalgError, LinalgResult, Matrix};
pub use prodsvd_stack::{Decomposition, SvdStack};
