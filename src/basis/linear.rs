use crate::storage::{IndexType, LevelType};

use super::base::Basis;

///
/// Piecewise linear hat functions. Level zero does not exist without
/// boundaries and evaluates to zero.
///
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearBasis;

#[inline]
fn hat(level: LevelType, index: IndexType, x: f64) -> f64
{
    0.0_f64.max(1.0 - f64::abs((1u64 << level) as f64 * x - index as f64))
}

impl Basis for LinearBasis
{
    #[inline]
    fn eval(&self, level: LevelType, index: IndexType, x: f64) -> f64 {
        if level == 0
        {
            0.0
        }
        else
        {
            hat(level, index, x)
        }
    }

    #[inline]
    fn integral(&self, level: LevelType, _index: IndexType) -> f64 {
        if level == 0
        {
            0.0
        }
        else
        {
            1.0 / (1u64 << level) as f64
        }
    }
}

///
/// Hat functions plus the two half hats `1 - x` and `x` on level zero.
///
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearBoundaryBasis;

impl Basis for LinearBoundaryBasis
{
    #[inline]
    fn eval(&self, level: LevelType, index: IndexType, x: f64) -> f64 {
        if level == 0
        {
            if index == 0
            {
                1.0 - x
            }
            else
            {
                x
            }
        }
        else
        {
            hat(level, index, x)
        }
    }

    #[inline]
    fn integral(&self, level: LevelType, _index: IndexType) -> f64 {
        if level == 0
        {
            0.5
        }
        else
        {
            1.0 / (1u64 << level) as f64
        }
    }
}

#[test]
fn test_linear_basis()
{
    assert_eq!(LinearBasis.eval(1, 1, 0.5), 1.0);
    assert_eq!(LinearBasis.eval(2, 1, 0.125), 0.5);
    assert_eq!(LinearBasis.eval(2, 1, 0.6), 0.0);
    assert_eq!(LinearBasis.eval(0, 0, 0.1), 0.0);
    assert_eq!(LinearBoundaryBasis.eval(0, 0, 0.25), 0.75);
    assert_eq!(LinearBoundaryBasis.eval(0, 1, 0.25), 0.25);
    assert_eq!(LinearBoundaryBasis.integral(0, 1), 0.5);
    assert_eq!(LinearBasis.integral(3, 5), 0.125);
}
