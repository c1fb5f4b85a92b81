pub mod base;
pub mod linear;

pub use base::Basis;
pub use linear::{LinearBasis, LinearBoundaryBasis};
