use std::collections::HashSet;

use sgadapt::algorithms::coarsening::{CoarseningOptions, HashCoarsening};
use sgadapt::algorithms::hierarchisation::{HierarchisationOperation, LinearBoundaryHierarchisationOperation, LinearHierarchisationOperation};
use sgadapt::algorithms::refinement::{HashRefinement, RefinementOptions};
use sgadapt::generators;
use sgadapt::refinement::{SurplusCoarseningFunctor, SurplusRefinementFunctor, SurplusVolumeRefinementFunctor};
use sgadapt::storage::{GridPoint, GridStorage};

fn peak(x: &[f64]) -> f64
{
    (-30.0 * x.iter().map(|xi| (xi - 0.35) * (xi - 0.35)).sum::<f64>()).exp()
}

fn assert_complete(storage: &GridStorage)
{
    for (point, _) in storage.iter()
    {
        let point: GridPoint = point.into();
        for d in 0..storage.dim()
        {
            if let Some(parent) = point.parent(d)
            {
                assert!(storage.contains(&parent), "parent {parent} of {point} missing");
            }
        }
        if storage.has_boundary()
        {
            for parent in storage.parents(&point)
            {
                assert!(storage.contains(&parent), "parent {parent} of {point} missing");
            }
        }
    }
}

fn surpluses(storage: &GridStorage) -> Vec<f64>
{
    let mut alpha: Vec<f64> = storage.points().map(|x| peak(&x)).collect();
    if storage.has_boundary()
    {
        LinearBoundaryHierarchisationOperation.hierarchize(&mut alpha, storage).unwrap();
    }
    else
    {
        LinearHierarchisationOperation.hierarchize(&mut alpha, storage).unwrap();
    }
    alpha
}

///
/// Children of the refined points plus everything their insertion may pull in:
/// missing ancestors and, on boundary grids, the level zero partners.
///
fn refinement_closure(storage: &GridStorage, before: &[GridPoint], refined: &[usize]) -> HashSet<GridPoint>
{
    let mut pending: Vec<GridPoint> = Vec::new();
    for &seq in refined
    {
        let point = &before[seq];
        let children: Vec<GridPoint> = (0..storage.dim())
            .flat_map(|d| point.left_child(d).into_iter().chain(point.right_child(d)))
            .collect();
        assert!(children.len() <= 2 * storage.dim());
        pending.extend(children);
    }
    let mut closure = HashSet::new();
    while let Some(point) = pending.pop()
    {
        if !closure.insert(point.clone())
        {
            continue;
        }
        pending.extend(storage.parents(&point));
        for d in 0..storage.dim()
        {
            let (level, index) = point.get(d);
            if level == 0
            {
                let mut sibling = point.clone();
                sibling.set(d, 0, 1 - index);
                pending.push(sibling);
            }
        }
    }
    closure
}

#[test]
fn refinement_keeps_existing_points_and_completeness()
{
    for has_boundary in [false, true]
    {
        let mut storage = GridStorage::new(2);
        if has_boundary
        {
            generators::regular_with_boundaries(&mut storage, &[2, 2], 1).unwrap();
        }
        else
        {
            generators::regular(&mut storage, &[2, 2]).unwrap();
        }
        for _ in 0..6
        {
            let before: Vec<GridPoint> = (0..storage.len()).map(|seq| storage.point(seq)).collect();
            let mut alpha = surpluses(&storage);
            let result = HashRefinement.refine(&mut storage, &mut alpha, &SurplusRefinementFunctor::new(3, 1e-6), &RefinementOptions::default()).unwrap();
            assert_eq!(alpha.len(), storage.len());
            assert_eq!(storage.len(), before.len() + result.inserted);
            assert!(result.refined.len() <= 3);
            for (seq, point) in before.iter().enumerate()
            {
                assert_eq!(storage.find(point), Some(seq));
            }
            let allowed = refinement_closure(&storage, &before, &result.refined);
            for seq in before.len()..storage.len()
            {
                assert!(allowed.contains(&storage.point(seq)), "unexpected point {}", storage.point(seq));
            }
            assert_complete(&storage);
        }
    }
}

#[test]
fn coarsening_removes_only_leaves()
{
    let mut storage = GridStorage::new(3);
    generators::regular(&mut storage, &[4, 4, 4]).unwrap();
    let mut alpha = surpluses(&storage);
    let before: Vec<GridPoint> = (0..storage.len()).map(|seq| storage.point(seq)).collect();
    let leaves: Vec<bool> = (0..storage.len()).map(|seq| storage.is_leaf(seq)).collect();
    let removable = HashCoarsening.number_of_removable_points(&storage, &CoarseningOptions::default());
    let result = HashCoarsening.coarsen(&mut storage, &mut alpha, &SurplusCoarseningFunctor::new(usize::MAX, 1e-3), &CoarseningOptions::default()).unwrap();
    assert!(result.removed > 0);
    assert!(result.removed <= removable);
    assert_eq!(storage.len(), before.len() - result.removed);
    assert_eq!(alpha.len(), storage.len());
    assert_eq!(result.remaining.len(), storage.len());
    for (new_seq, &old_seq) in result.remaining.iter().enumerate()
    {
        assert_eq!(storage.point(new_seq), before[old_seq]);
    }
    for (old_seq, point) in before.iter().enumerate()
    {
        if !storage.contains(point)
        {
            assert!(leaves[old_seq], "{point} was not a leaf");
        }
    }
    assert_complete(&storage);

    // the surpluses of the survivors are still the surpluses of the smaller grid
    let expected = surpluses(&storage);
    for (a, b) in alpha.iter().zip(&expected)
    {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn refine_then_coarsen_round()
{
    let mut storage = GridStorage::new(2);
    generators::regular(&mut storage, &[3, 3]).unwrap();
    let mut alpha = surpluses(&storage);
    let functor = SurplusVolumeRefinementFunctor::new(5, 0.0);
    let options = RefinementOptions::with_max_level(7);
    for _ in 0..4
    {
        HashRefinement.refine(&mut storage, &mut alpha, &functor, &options).unwrap();
        alpha = surpluses(&storage);
    }
    let refined_len = storage.len();
    assert!(storage.max_level() <= 7);
    let result = HashCoarsening.coarsen(&mut storage, &mut alpha, &SurplusCoarseningFunctor::new(4, 1.0), &CoarseningOptions::default()).unwrap();
    assert_eq!(result.removed, 4);
    assert_eq!(storage.len(), refined_len - 4);
    assert_complete(&storage);
}

#[test]
fn full_grid_round_trip()
{
    let mut storage = GridStorage::new(2);
    generators::full(&mut storage, 2).unwrap();
    assert_eq!(storage.len(), 9);
    let values: Vec<f64> = storage.points().map(|x| x[0] * x[0] + 3.0 * x[1] - x[0] * x[1]).collect();
    let mut alpha = values.clone();
    LinearHierarchisationOperation.hierarchize(&mut alpha, &storage).unwrap();
    LinearHierarchisationOperation.dehierarchize(&mut alpha, &storage).unwrap();
    for (a, v) in alpha.iter().zip(&values)
    {
        assert!((a - v).abs() < 1e-12);
    }
}

#[test]
fn single_point_refinement()
{
    let mut storage = GridStorage::new(1);
    storage.insert(GridPoint::new(&[1], &[1])).unwrap();
    let mut alpha = vec![1.0];
    HashRefinement.refine(&mut storage, &mut alpha, &SurplusRefinementFunctor::new(1, 0.0), &RefinementOptions::default()).unwrap();
    assert_eq!(storage.len(), 3);
    assert_eq!(storage.point(1), GridPoint::new(&[2], &[1]));
    assert_eq!(storage.point(2), GridPoint::new(&[2], &[3]));
    assert!(!storage.is_leaf(0));
    assert!(storage.is_leaf(1) && storage.is_leaf(2));
}
