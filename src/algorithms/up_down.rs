//!
//! Mass matrix of the piecewise linear basis, applied with the unidirectional
//! principle: one `up` (contributions of finer points to coarser ones) and one
//! `down` (contributions of coarser points and the diagonal) sweep per
//! dimension.
//!
use crate::algorithms::sweep::{Sweep, SweepFunction};
use crate::errors::SGError;
use crate::iterators::grid_iterator::{GridIterator, GridIteratorT};
use crate::storage::GridStorage;

///
/// `up` part of the 1D mass matrix. Results only collect contributions from
/// hierarchical descendants.
///
pub struct PhiPhiUpLinear;

impl PhiPhiUpLinear
{
    ///
    /// Returns the contributions of the subtree rooted at the current point to
    /// the left and right end of its support.
    ///
    fn recurse(source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize, q: f64) -> (f64, f64)
    {
        let Some(seq) = iterator.seq() else
        {
            return (0.0, 0.0);
        };
        let (level, _) = iterator.get(dim);
        let (mut fl, mut fml, mut fmr, mut fr) = (0.0, 0.0, 0.0, 0.0);
        if !iterator.hint()
        {
            iterator.left_child(dim);
            (fl, fml) = Self::recurse(source, result, iterator, dim, q);
            iterator.step_right(dim);
            (fmr, fr) = Self::recurse(source, result, iterator, dim, q);
            iterator.up(dim);
        }
        let fm = fml + fmr;
        result[seq] = fm;
        let tmp = 0.5 * fm + q * source[seq] / (1u64 << (level + 1)) as f64;
        (fl + tmp, fr + tmp)
    }
}

impl SweepFunction for PhiPhiUpLinear
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize)
    {
        let q = iterator.storage().bounding_box().width(dim);
        Self::recurse(source, result, iterator, dim, q);
    }
}

pub struct PhiPhiUpLinearBoundary;

impl SweepFunction for PhiPhiUpLinearBoundary
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize)
    {
        let q = iterator.storage().bounding_box().width(dim);
        let seq_left = iterator.seq();
        iterator.reset_to_right_level_zero(dim);
        let seq_right = iterator.seq();
        let (mut fl, mut fr) = (0.0, 0.0);
        if iterator.reset_to_level_one(dim)
        {
            (fl, fr) = PhiPhiUpLinear::recurse(source, result, iterator, dim, q);
        }
        if let Some(seq) = seq_left
        {
            result[seq] = fl;
        }
        if let Some(seq) = seq_right
        {
            result[seq] = fr;
        }
        iterator.reset_to_left_level_zero(dim);
    }
}

///
/// `down` part of the 1D mass matrix: the diagonal plus contributions from
/// hierarchical ancestors, passed down as the values at the support ends.
///
pub struct PhiPhiDownLinear;

impl PhiPhiDownLinear
{
    fn recurse(source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize, q: f64, fl: f64, fr: f64)
    {
        let Some(seq) = iterator.seq() else
        {
            return;
        };
        let (level, _) = iterator.get(dim);
        let h = 1.0 / (1u64 << level) as f64;
        let alpha = source[seq];
        result[seq] = q * (0.5 * h * (fl + fr) + 2.0 / 3.0 * h * alpha);
        if !iterator.hint()
        {
            let fm = 0.5 * (fl + fr) + alpha;
            iterator.left_child(dim);
            Self::recurse(source, result, iterator, dim, q, fl, fm);
            iterator.step_right(dim);
            Self::recurse(source, result, iterator, dim, q, fm, fr);
            iterator.up(dim);
        }
    }
}

impl SweepFunction for PhiPhiDownLinear
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize)
    {
        let q = iterator.storage().bounding_box().width(dim);
        Self::recurse(source, result, iterator, dim, q, 0.0, 0.0);
    }
}

pub struct PhiPhiDownLinearBoundary;

impl SweepFunction for PhiPhiDownLinearBoundary
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize)
    {
        let q = iterator.storage().bounding_box().width(dim);
        let seq_left = iterator.seq();
        iterator.reset_to_right_level_zero(dim);
        let seq_right = iterator.seq();
        let fl = seq_left.map_or(0.0, |seq| source[seq]);
        let fr = seq_right.map_or(0.0, |seq| source[seq]);
        if let Some(seq) = seq_left
        {
            result[seq] = q * (fl / 3.0 + fr / 6.0);
        }
        if let Some(seq) = seq_right
        {
            result[seq] = q * (fr / 3.0 + fl / 6.0);
        }
        if iterator.reset_to_level_one(dim)
        {
            PhiPhiDownLinear::recurse(source, result, iterator, dim, q, fl, fr);
        }
        iterator.reset_to_left_level_zero(dim);
    }
}

///
/// Applies the L2 mass matrix `M_ij = (phi_i, phi_j)` of the linear (boundary)
/// basis over the storage's algorithmic dimensions.
///
pub struct OperationLTwoDotProductLinear<'a>
{
    storage: &'a GridStorage,
}

impl<'a> OperationLTwoDotProductLinear<'a>
{
    pub fn new(storage: &'a GridStorage) -> Self
    {
        Self { storage }
    }

    pub fn mult(&self, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
    {
        for len in [alpha.len(), result.len()]
        {
            if len != self.storage.len()
            {
                return Err(SGError::CoefficientLengthMismatch { expected: self.storage.len(), actual: len });
            }
        }
        let dims = self.storage.algorithmic_dimensions();
        if dims.is_empty()
        {
            result.copy_from_slice(alpha);
            return Ok(());
        }
        result.fill(0.0);
        self.updown(alpha, result, dims, dims.len() - 1)
    }

    fn updown(&self, alpha: &[f64], result: &mut [f64], dims: &[usize], k: usize) -> Result<(), SGError>
    {
        let dim = dims[k];
        let n = alpha.len();
        if k > 0
        {
            let mut temp = vec![0.0; n];
            self.up(alpha, &mut temp, dim)?;
            let mut result_temp = vec![0.0; n];
            self.updown(&temp, &mut result_temp, dims, k - 1)?;

            let mut temp = vec![0.0; n];
            self.updown(alpha, &mut temp, dims, k - 1)?;
            self.down(&temp, result, dim)?;
            result.iter_mut().zip(result_temp).for_each(|(r, t)| *r += t);
        }
        else
        {
            self.up(alpha, result, dim)?;
            let mut temp = vec![0.0; n];
            self.down(alpha, &mut temp, dim)?;
            result.iter_mut().zip(temp).for_each(|(r, t)| *r += t);
        }
        Ok(())
    }

    fn up(&self, alpha: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>
    {
        result.fill(0.0);
        if self.storage.has_boundary()
        {
            Sweep::new(PhiPhiUpLinearBoundary, self.storage).sweep_1d_boundary(alpha, result, dim)
        }
        else
        {
            Sweep::new(PhiPhiUpLinear, self.storage).sweep_1d(alpha, result, dim)
        }
    }

    fn down(&self, alpha: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>
    {
        result.fill(0.0);
        if self.storage.has_boundary()
        {
            Sweep::new(PhiPhiDownLinearBoundary, self.storage).sweep_1d_boundary(alpha, result, dim)
        }
        else
        {
            Sweep::new(PhiPhiDownLinear, self.storage).sweep_1d(alpha, result, dim)
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::basis::{Basis, LinearBasis, LinearBoundaryBasis};
    use crate::generators;
    use crate::storage::bounding_box::BoundingBox;

    ///
    /// Composite Simpson rule on a mesh fine enough to be exact for products of
    /// hats of the levels used below.
    ///
    fn phi_phi<B: Basis>(basis: &B, storage: &GridStorage, i: usize, j: usize) -> f64
    {
        let n = 64;
        let mut product = 1.0;
        for d in 0..storage.dim()
        {
            let (li, ii) = (storage.level(i, d), storage.index(i, d));
            let (lj, ij) = (storage.level(j, d), storage.index(j, d));
            let h = 1.0 / n as f64;
            let mut sum = 0.0;
            for k in 0..n
            {
                let a = k as f64 * h;
                let g = |x: f64| basis.eval(li, ii, x) * basis.eval(lj, ij, x);
                sum += h / 6.0 * (g(a) + 4.0 * g(a + 0.5 * h) + g(a + h));
            }
            product *= sum * storage.bounding_box().width(d);
        }
        product
    }

    fn check_against_quadrature<B: Basis>(storage: &GridStorage, basis: &B)
    {
        let alpha: Vec<f64> = (0..storage.len()).map(|i| ((i * 7 % 11) as f64) / 11.0 - 0.3).collect();
        let mut result = vec![0.0; storage.len()];
        OperationLTwoDotProductLinear::new(storage).mult(&alpha, &mut result).unwrap();
        for i in 0..storage.len()
        {
            let expected: f64 = (0..storage.len()).map(|j| phi_phi(basis, storage, i, j) * alpha[j]).sum();
            assert!((result[i] - expected).abs() < 1e-12, "row {i}: {} != {expected}", result[i]);
        }
    }

    #[test]
    fn test_mass_matrix_1d()
    {
        let mut storage = GridStorage::new(1);
        generators::full(&mut storage, 4).unwrap();
        check_against_quadrature(&storage, &LinearBasis);
    }

    #[test]
    fn test_mass_matrix_3d()
    {
        let mut storage = GridStorage::with_bounding_box(BoundingBox::new(&[0.0, -1.0, 0.0], &[1.0, 1.0, 0.5]));
        generators::regular(&mut storage, &[3, 3, 3]).unwrap();
        check_against_quadrature(&storage, &LinearBasis);
    }

    #[test]
    fn test_mass_matrix_boundary()
    {
        let mut storage = GridStorage::new(2);
        generators::regular_with_boundaries(&mut storage, &[3, 3], 1).unwrap();
        check_against_quadrature(&storage, &LinearBoundaryBasis);
    }

    #[test]
    fn test_mass_matrix_algorithmic_dimensions()
    {
        // with only dimension 0 active, the operator is the 1D mass matrix
        // applied along dimension 0 and the identity along dimension 1
        let mut storage = GridStorage::new(2);
        generators::full(&mut storage, 2).unwrap();
        storage.set_algorithmic_dimensions(vec![0]).unwrap();
        let alpha = vec![1.0; storage.len()];
        let mut result = vec![0.0; storage.len()];
        OperationLTwoDotProductLinear::new(&storage).mult(&alpha, &mut result).unwrap();
        let mut line = GridStorage::new(1);
        generators::full(&mut line, 2).unwrap();
        let mut expected = vec![0.0; line.len()];
        OperationLTwoDotProductLinear::new(&line).mult(&[1.0; 3], &mut expected).unwrap();
        for (point, seq) in storage.iter()
        {
            let p = crate::storage::GridPoint::new(&point.level()[..1], &point.index()[..1]);
            let k = line.find(&p).unwrap();
            assert!((result[seq] - expected[k]).abs() < 1e-14);
        }
    }
}
