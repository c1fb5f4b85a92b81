use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, trace};

use crate::errors::SGError;
use crate::storage::{GridPoint, GridStorage, LevelType, MAX_LEVEL};

///
/// Bounds applied while refining. Dimensions of a point that already reached
/// their limit are skipped silently.
///
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementOptions
{
    /// Deepest level created in any dimension.
    pub max_level: Option<LevelType>,
    /// Deepest level created per dimension.
    pub level_limits: Option<Vec<LevelType>>,
}

impl RefinementOptions
{
    pub fn with_max_level(max_level: LevelType) -> Self
    {
        Self { max_level: Some(max_level), ..Default::default() }
    }

    fn limits(&self, num_inputs: usize) -> Result<Vec<LevelType>, SGError>
    {
        let global = self.max_level.unwrap_or(MAX_LEVEL).min(MAX_LEVEL);
        match &self.level_limits
        {
            Some(limits) if limits.len() != num_inputs => Err(SGError::DimensionMismatch { expected: num_inputs, actual: limits.len() }),
            Some(limits) => Ok(limits.iter().map(|&l| l.min(global)).collect()),
            None => Ok(vec![global; num_inputs]),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RefinementResult
{
    /// Sequence numbers of the refined points, highest score first.
    pub refined: Vec<usize>,
    /// Number of inserted points; they occupy the last sequence numbers.
    pub inserted: usize,
}

///
/// Scores grid points for refinement. Points with larger scores are refined first.
///
pub trait RefinementFunctor : Sync
{
    fn score(&self, storage: &GridStorage, seq: usize, alpha: &[f64]) -> f64;

    ///
    /// Maximum number of points refined per call.
    ///
    fn refinements_num(&self) -> usize;

    ///
    /// Points need a score of at least this value.
    ///
    fn threshold(&self) -> f64;

    ///
    /// Points need a score strictly above this value.
    ///
    fn start(&self) -> f64
    {
        0.0
    }
}

///
/// Children of `point` in direction `dim`: (1, 1) for level zero, the
/// two points of the next level otherwise.
///
fn children(point: &GridPoint, dim: usize) -> impl Iterator<Item = GridPoint>
{
    point.left_child(dim).into_iter().chain(point.right_child(dim))
}

fn is_refinable(storage: &GridStorage, point: &GridPoint, limits: &[LevelType]) -> bool
{
    (0..storage.dim()).any(|d| point.level[d] < limits[d] && children(point, d).any(|c| !storage.contains(&c)))
}

#[derive(Default, Debug, Clone, Copy)]
pub struct HashRefinement;

impl HashRefinement
{
    ///
    /// Refines the best scoring points and zero-extends `alpha` to the new size.
    ///
    pub fn refine(&self, storage: &mut GridStorage, alpha: &mut Vec<f64>, functor: &dyn RefinementFunctor, options: &RefinementOptions) -> Result<RefinementResult, SGError>
    {
        if storage.is_empty()
        {
            return Err(SGError::EmptyStorage);
        }
        if alpha.len() != storage.len()
        {
            return Err(SGError::CoefficientLengthMismatch { expected: storage.len(), actual: alpha.len() });
        }
        let limits = options.limits(storage.dim())?;
        let _span = info_span!("refine", points = storage.len()).entered();

        let candidates = self.collect(storage, &limits);
        let selected = {
            let _span = info_span!("select", candidates = candidates.len()).entered();
            let scored: Vec<(usize, f64)> = {
                let storage = &*storage;
                let alpha = alpha.as_slice();
                candidates.par_iter().map(|&seq| (seq, functor.score(storage, seq, alpha).abs())).collect()
            };
            Self::select(scored, functor)
        };

        let original_len = storage.len();
        {
            let _span = info_span!("apply", selected = selected.len()).entered();
            for &seq in &selected
            {
                self.refine_gridpoint(storage, seq, &limits)?;
            }
        }
        alpha.resize(storage.len(), 0.0);
        let inserted = storage.len() - original_len;
        debug!(candidates = candidates.len(), refined = selected.len(), inserted, "refinement finished");
        Ok(RefinementResult { refined: selected, inserted })
    }

    ///
    /// Returns the number of grid points that can be refined.
    ///
    pub fn number_of_refinable_points(&self, storage: &GridStorage, options: &RefinementOptions) -> Result<usize, SGError>
    {
        let limits = options.limits(storage.dim())?;
        Ok(self.collect(storage, &limits).len())
    }

    ///
    /// Refines the point `seq` along `dim` only, inserting missing children and
    /// their ancestors.
    ///
    pub fn refine_1d(&self, storage: &mut GridStorage, seq: usize, dim: usize) -> Result<(), SGError>
    {
        if !storage.is_valid_sequence_number(seq)
        {
            return Err(SGError::InvalidSequenceNumber(seq));
        }
        if dim >= storage.dim()
        {
            return Err(SGError::InvalidArgument(format!("dimension {dim} is out of range")));
        }
        let point = storage.point(seq);
        for child in children(&point, dim)
        {
            if !storage.contains(&child)
            {
                self.create_point(storage, child)?;
            }
        }
        Ok(())
    }

    fn collect(&self, storage: &GridStorage, limits: &[LevelType]) -> Vec<usize>
    {
        let _span = info_span!("collect").entered();
        storage.iter()
            .filter(|(point, _)| is_refinable(storage, &GridPoint::from(*point), limits))
            .map(|(_, seq)| seq)
            .collect()
    }

    ///
    /// Keeps points above `start()` and at or above `threshold()`, best first,
    /// ties broken by sequence number, at most `refinements_num()` of them.
    ///
    fn select(mut scored: Vec<(usize, f64)>, functor: &dyn RefinementFunctor) -> Vec<usize>
    {
        let (start, threshold) = (functor.start(), functor.threshold());
        scored.retain(|&(_, s)| s > start && s >= threshold);
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(functor.refinements_num());
        scored.into_iter().map(|(seq, _)| seq).collect()
    }

    fn refine_gridpoint(&self, storage: &mut GridStorage, seq: usize, limits: &[LevelType]) -> Result<(), SGError>
    {
        let point = storage.point(seq);
        for dim in 0..storage.dim()
        {
            if point.level[dim] >= limits[dim]
            {
                continue; // skip this dimension, it is too deep
            }
            for child in children(&point, dim)
            {
                if !storage.contains(&child)
                {
                    trace!(%child, "inserting child");
                    self.create_point(storage, child)?;
                }
            }
        }
        Ok(())
    }

    ///
    /// Inserts `point` after all of its missing ancestors. On grids with
    /// boundaries level zero points are created in left/right pairs.
    ///
    fn create_point(&self, storage: &mut GridStorage, point: GridPoint) -> Result<(), SGError>
    {
        let parents: Vec<GridPoint> = if storage.has_boundary()
        {
            storage.parents(&point)
        }
        else
        {
            (0..storage.dim()).filter_map(|d| point.parent(d)).collect()
        };
        for parent in parents
        {
            if !storage.contains(&parent)
            {
                self.create_point(storage, parent)?;
            }
        }
        if storage.contains(&point)
        {
            return Ok(());
        }
        storage.insert(point.clone())?;
        if storage.has_boundary()
        {
            for d in 0..storage.dim()
            {
                let (level, index) = point.get(d);
                if level == 0
                {
                    let mut sibling = point.clone();
                    sibling.set(d, 0, 1 - index);
                    if !storage.contains(&sibling)
                    {
                        self.create_point(storage, sibling)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::generators;

    struct AlwaysRefine(usize);

    impl RefinementFunctor for AlwaysRefine
    {
        fn score(&self, _storage: &GridStorage, _seq: usize, alpha: &[f64]) -> f64
        {
            1.0 + alpha.len() as f64
        }
        fn refinements_num(&self) -> usize
        {
            self.0
        }
        fn threshold(&self) -> f64
        {
            0.0
        }
    }

    struct ByAlpha(usize, f64);

    impl RefinementFunctor for ByAlpha
    {
        fn score(&self, _storage: &GridStorage, seq: usize, alpha: &[f64]) -> f64
        {
            alpha[seq]
        }
        fn refinements_num(&self) -> usize
        {
            self.0
        }
        fn threshold(&self) -> f64
        {
            self.1
        }
    }

    #[test]
    fn test_single_point_refinement()
    {
        let mut storage = GridStorage::new(1);
        storage.insert(GridPoint::new(&[1], &[1])).unwrap();
        let mut alpha = vec![1.0];
        let result = HashRefinement.refine(&mut storage, &mut alpha, &AlwaysRefine(1), &RefinementOptions::default()).unwrap();
        assert_eq!(result, RefinementResult { refined: vec![0], inserted: 2 });
        assert_eq!(storage.len(), 3);
        assert_eq!(alpha, vec![1.0, 0.0, 0.0]);
        assert!(storage.contains(&GridPoint::new(&[2], &[1])));
        assert!(storage.contains(&GridPoint::new(&[2], &[3])));
        assert!(!storage.is_leaf(0));
    }

    #[test]
    fn test_selection_order_and_threshold()
    {
        let mut storage = GridStorage::new(1);
        generators::full(&mut storage, 2).unwrap();
        // (1,1), (2,1), (2,3)
        let mut alpha = vec![5.0, -0.5, 0.7];
        let functor = ByAlpha(1, 0.1);
        let result = HashRefinement.refine(&mut storage, &mut alpha, &functor, &RefinementOptions::default()).unwrap();
        assert_eq!(result.refined, vec![2]);
        assert!(storage.contains(&GridPoint::new(&[3], &[5])));
        assert!(!storage.contains(&GridPoint::new(&[3], &[1])));

        // ties resolve by sequence number
        let mut alpha = vec![0.0, 1.0, 0.0, 1.0, 0.0];
        let result = HashRefinement.refine(&mut storage, &mut alpha, &functor, &RefinementOptions::default()).unwrap();
        assert_eq!(result.refined, vec![1]);

        // nothing passes the threshold
        let before = storage.len();
        let mut alpha = vec![0.01; storage.len()];
        let result = HashRefinement.refine(&mut storage, &mut alpha, &functor, &RefinementOptions::default()).unwrap();
        assert!(result.refined.is_empty());
        assert_eq!(storage.len(), before);
    }

    #[test]
    fn test_ancestors_are_created()
    {
        // refining (2,1)x(1,1) in dimension 1 needs (1,1)x(2,1) as a parent of (2,1)x(2,1)
        let mut storage = GridStorage::new(2);
        storage.insert(GridPoint::new(&[1, 1], &[1, 1])).unwrap();
        storage.insert(GridPoint::new(&[2, 1], &[1, 1])).unwrap();
        HashRefinement.refine_1d(&mut storage, 1, 1).unwrap();
        for p in [GridPoint::new(&[2, 2], &[1, 1]), GridPoint::new(&[2, 2], &[1, 3]), GridPoint::new(&[1, 2], &[1, 1]), GridPoint::new(&[1, 2], &[1, 3])]
        {
            assert!(storage.contains(&p), "{p} missing");
        }
        assert_eq!(storage.len(), 6);
    }

    #[test]
    fn test_boundary_refinement_keeps_pairs()
    {
        let mut storage = GridStorage::new(2);
        generators::regular_with_boundaries(&mut storage, &[1, 1], 1).unwrap();
        let mut alpha = vec![0.0; storage.len()];
        let seq = storage.find(&GridPoint::new(&[0, 1], &[0, 1])).unwrap();
        alpha[seq] = 1.0;
        HashRefinement.refine(&mut storage, &mut alpha, &ByAlpha(1, 0.5), &RefinementOptions::default()).unwrap();
        assert!(storage.contains(&GridPoint::new(&[0, 2], &[0, 1])));
        assert!(storage.contains(&GridPoint::new(&[0, 2], &[1, 1])));
        assert!(storage.contains(&GridPoint::new(&[0, 2], &[0, 3])));
        assert!(storage.contains(&GridPoint::new(&[0, 2], &[1, 3])));
        assert_eq!(storage.len(), 13);
        assert_eq!(alpha.len(), storage.len());
    }

    #[test]
    fn test_level_limits()
    {
        let mut storage = GridStorage::new(2);
        generators::full(&mut storage, 2).unwrap();
        let options = RefinementOptions { max_level: Some(3), level_limits: Some(vec![2, 3]) };
        let refinable = HashRefinement.number_of_refinable_points(&storage, &options).unwrap();
        // only points on level 2 in dimension 1 still miss children
        assert_eq!(refinable, 6);
        let mut alpha = vec![1.0; storage.len()];
        HashRefinement.refine(&mut storage, &mut alpha, &AlwaysRefine(100), &options).unwrap();
        assert!(storage.nodes().all(|p| p.level()[0] <= 2 && p.level()[1] <= 3));
        assert_eq!(HashRefinement.number_of_refinable_points(&storage, &options).unwrap(), 0);
        let bad = RefinementOptions { max_level: None, level_limits: Some(vec![1]) };
        assert!(HashRefinement.number_of_refinable_points(&storage, &bad).is_err());
    }

    #[test]
    fn test_refine_errors()
    {
        let mut storage = GridStorage::new(1);
        let mut alpha = vec![];
        assert!(matches!(HashRefinement.refine(&mut storage, &mut alpha, &AlwaysRefine(1), &RefinementOptions::default()), Err(SGError::EmptyStorage)));
        storage.insert(GridPoint::new(&[1], &[1])).unwrap();
        assert!(matches!(HashRefinement.refine(&mut storage, &mut alpha, &AlwaysRefine(1), &RefinementOptions::default()), Err(SGError::CoefficientLengthMismatch { expected: 1, actual: 0 })));
    }
}
