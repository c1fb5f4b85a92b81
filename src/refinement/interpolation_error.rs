use crate::algorithms::basis_evaluation::{sum_stretched, sum_unit};
use crate::algorithms::refinement::RefinementFunctor;
use crate::basis::Basis;
use crate::storage::GridStorage;

pub type TargetFunction = dyn Fn(&[f64]) -> f64 + Send + Sync;

///
/// Scores a point with the largest interpolation error at the children it is
/// missing, i.e. at the points a refinement would insert.
///
pub struct InterpolationErrorRefinement<'a, B: Basis>
{
    pub basis: B,
    pub function: &'a TargetFunction,
    pub refinements_num: usize,
    pub threshold: f64,
}

impl<'a, B: Basis> InterpolationErrorRefinement<'a, B>
{
    pub fn new(basis: B, function: &'a TargetFunction, refinements_num: usize, threshold: f64) -> Self
    {
        Self { basis, function, refinements_num, threshold }
    }
}

impl<B: Basis> RefinementFunctor for InterpolationErrorRefinement<'_, B>
{
    ///
    /// `alpha` must hold one coefficient per stored point, which
    /// [`crate::algorithms::refinement::HashRefinement::refine`] checks before scoring.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` does not match the storage.
    ///
    fn score(&self, storage: &GridStorage, seq: usize, alpha: &[f64]) -> f64
    {
        assert_eq!(alpha.len(), storage.len(), "one coefficient per grid point expected");
        let point = storage.point(seq);
        let mut max_error = 0.0_f64;
        for d in 0..storage.dim()
        {
            for child in point.left_child(d).into_iter().chain(point.right_child(d))
            {
                if storage.contains(&child)
                {
                    continue;
                }
                let (x, interpolant) = match storage.stretching()
                {
                    Some(stretching) =>
                    {
                        let x: Vec<f64> = (0..storage.dim()).map(|k| stretching.coordinate(child.level[k], child.index[k], k)).collect();
                        let interpolant = sum_stretched(storage, alpha, stretching, &x);
                        (x, interpolant)
                    },
                    None =>
                    {
                        let unit = child.unit_coordinate();
                        let interpolant = sum_unit(storage, alpha, &self.basis, &unit);
                        (storage.bounding_box().to_real_coordinate(&unit), interpolant)
                    }
                };
                max_error = max_error.max(((self.function)(&x) - interpolant).abs());
            }
        }
        max_error
    }

    fn refinements_num(&self) -> usize
    {
        self.refinements_num
    }

    fn threshold(&self) -> f64
    {
        self.threshold
    }
}
