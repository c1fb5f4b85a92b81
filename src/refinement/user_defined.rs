use crate::algorithms::refinement::RefinementFunctor;
use crate::storage::GridStorage;

///
/// A function that decides how refinement is performed.
///
/// # Arguments
/// - physical coordinates of the grid point.
/// - surplus coefficient of the grid point.
///
pub type UserRefinementFunction = dyn Fn(&[f64], f64) -> f64 + Send + Sync;

pub struct UserDefinedRefinement<'a>
{
    pub fun_eval: &'a UserRefinementFunction,
    pub refinements_num: usize,
    pub threshold: f64,
}

impl RefinementFunctor for UserDefinedRefinement<'_>
{
    fn score(&self, storage: &GridStorage, seq: usize, alpha: &[f64]) -> f64
    {
        (self.fun_eval)(&storage.coordinate(seq), alpha[seq])
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

#[test]
fn test_user_defined_refinement()
{
    use crate::algorithms::refinement::{HashRefinement, RefinementOptions};
    use crate::generators;
    use crate::storage::GridPoint;

    let mut storage = GridStorage::new(1);
    generators::regular(&mut storage, &[2]).unwrap();
    let mut alpha = vec![0.0; storage.len()];
    // refine towards the right end of the domain
    let fun = |x: &[f64], _alpha: f64| x[0];
    let functor = UserDefinedRefinement { fun_eval: &fun, refinements_num: 1, threshold: 0.0 };
    HashRefinement.refine(&mut storage, &mut alpha, &functor, &RefinementOptions::default()).unwrap();
    assert!(storage.contains(&GridPoint::new(&[3], &[7])));
    assert!(!storage.contains(&GridPoint::new(&[3], &[1])));
}
