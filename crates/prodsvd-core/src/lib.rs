pub mod dtype;
pub mod error;
pub mod matrix;

pub use dtype::Float;
pub use error::{LinalgError, LinalgResult};
pub use matrix::Matrix;
