use crate::algorithms::coarsening::CoarseningFunctor;
use crate::algorithms::refinement::RefinementFunctor;
use crate::storage::GridStorage;

///
/// Refines the points with the largest absolute surplus.
///
#[derive(Debug, Clone, Copy)]
pub struct SurplusRefinementFunctor
{
    pub refinements_num: usize,
    pub threshold: f64,
}

impl SurplusRefinementFunctor
{
    pub fn new(refinements_num: usize, threshold: f64) -> Self
    {
        Self { refinements_num, threshold }
    }
}

impl RefinementFunctor for SurplusRefinementFunctor
{
    fn score(&self, _storage: &GridStorage, seq: usize, alpha: &[f64]) -> f64
    {
        alpha[seq].abs()
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

///
/// Weighs the surplus with the support volume `2^-|l|_1` of the basis function.
///
#[derive(Debug, Clone, Copy)]
pub struct SurplusVolumeRefinementFunctor
{
    pub refinements_num: usize,
    pub threshold: f64,
}

impl SurplusVolumeRefinementFunctor
{
    pub fn new(refinements_num: usize, threshold: f64) -> Self
    {
        Self { refinements_num, threshold }
    }
}

impl RefinementFunctor for SurplusVolumeRefinementFunctor
{
    fn score(&self, storage: &GridStorage, seq: usize, alpha: &[f64]) -> f64
    {
        let level_sum = storage.point_ref(seq).level_sum();
        alpha[seq].abs() * 0.5_f64.powi(level_sum as i32)
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

///
/// Removes the leaves with the smallest absolute surplus.
///
#[derive(Debug, Clone, Copy)]
pub struct SurplusCoarseningFunctor
{
    pub removements_num: usize,
    pub threshold: f64,
}

impl SurplusCoarseningFunctor
{
    pub fn new(removements_num: usize, threshold: f64) -> Self
    {
        Self { removements_num, threshold }
    }
}

impl CoarseningFunctor for SurplusCoarseningFunctor
{
    fn score(&self, _storage: &GridStorage, seq: usize, alpha: &[f64]) -> f64
    {
        alpha[seq].abs()
    }

    fn removements_num(&self) -> usize
    {
        self.removements_num
    }

    fn threshold(&self) -> f64
    {
        self.threshold
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::storage::GridPoint;

    #[test]
    fn test_surplus_scores()
    {
        let mut storage = GridStorage::new(2);
        storage.insert(GridPoint::new(&[1, 1], &[1, 1])).unwrap();
        storage.insert(GridPoint::new(&[2, 1], &[3, 1])).unwrap();
        let alpha = [-2.0, 4.0];
        assert_eq!(SurplusRefinementFunctor::new(1, 0.0).score(&storage, 0, &alpha), 2.0);
        assert_eq!(SurplusVolumeRefinementFunctor::new(1, 0.0).score(&storage, 0, &alpha), 0.5);
        assert_eq!(SurplusVolumeRefinementFunctor::new(1, 0.0).score(&storage, 1, &alpha), 0.5);
        let coarsening = SurplusCoarseningFunctor::new(3, 0.1);
        assert_eq!(coarsening.score(&storage, 1, &alpha), 4.0);
        assert_eq!(coarsening.removements_num(), 3);
        assert_eq!(coarsening.start(), f64::MAX);
    }
}
