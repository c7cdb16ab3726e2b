pub mod orthogonal;
pub mod svd;

pub use orthogonal::*;
pub use svd::*;
