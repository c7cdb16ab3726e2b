//! Incremental SVD stack for numerically stable products of long chains of
//! square matrices.
//!
//! ```
//! use prodsvd_core::Matrix;
//! use prodsvd_stack::SvdStack;
//!
//! let mut stack = SvdStack::<f64>::new(2, 8);
//! stack.push(&Matrix::from_diag(&[10.0, 0.1]));
//! stack.push(&Matrix::from_diag(&[10.0, 0.1]));
//! let s = stack.singular_values();
//! assert!((s[0] - 100.0).abs() < 1e-10);
//! assert!((s[1] - 0.01).abs() < 1e-14);
//! ```

pub mod stack;

pub use stack::{Decomposition, SvdStack};
