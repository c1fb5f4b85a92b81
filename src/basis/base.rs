use crate::storage::{IndexType, LevelType};

///
/// One-dimensional hierarchical basis on the unit interval.
///
pub trait Basis : Sync
{
    fn eval(&self, level: LevelType, index: IndexType, x: f64) -> f64;
    ///
    /// Integral of the basis function over [0, 1].
    ///
    fn integral(&self, level: LevelType, index: IndexType) -> f64;
}
