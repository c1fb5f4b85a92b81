use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::errors::SGError;
use crate::iterators::grid_iterator::{GridIterator, GridIteratorT};
use crate::storage::{GridPoint, GridStorage};

///
/// One-dimensional operator run along a single pole. On entry the iterator
/// points to the pole's level one point (non-boundary sweeps) or to its left
/// level zero point (boundary sweeps); either may be absent from the storage.
/// Implementations must leave the iterator on the pole they were given.
///
pub trait SweepFunction
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dim: usize);
}

///
/// Runs a [`SweepFunction`] once on every pole of a dimension.
///
pub struct Sweep<'a, F: SweepFunction>
{
    functor: F,
    storage: &'a GridStorage,
}

impl<'a, F: SweepFunction> Sweep<'a, F>
{
    pub fn new(functor: F, storage: &'a GridStorage) -> Self
    {
        Self { functor, storage }
    }

    pub fn functor(&self) -> &F
    {
        &self.functor
    }

    pub fn functor_mut(&mut self) -> &mut F
    {
        &mut self.functor
    }

    ///
    /// Sweeps dimension `dim`, entering every pole at level one. Entries of
    /// `result` belonging to level zero points in `dim` are left untouched.
    ///
    /// # Panics
    /// If the storage is not hierarchically complete in `dim`.
    ///
    pub fn sweep_1d(&mut self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>
    {
        self.check(source, result, dim)?;
        self.for_each_pole(dim, |functor, iterator, has_hierarchy|
        {
            iterator.reset_to_level_one(dim);
            if has_hierarchy
            {
                iterator.expect_seq();
            }
            functor.execute(source, result, iterator, dim);
        });
        Ok(())
    }

    ///
    /// Sweeps dimension `dim`, entering every pole at its left level zero point.
    /// Absent level zero points are allowed, an absent level one root is not.
    ///
    pub fn sweep_1d_boundary(&mut self, source: &[f64], result: &mut [f64], dim: usize) -> Result<(), SGError>
    {
        self.check(source, result, dim)?;
        self.for_each_pole(dim, |functor, iterator, has_hierarchy|
        {
            if has_hierarchy
            {
                iterator.reset_to_level_one(dim);
                iterator.expect_seq();
            }
            iterator.reset_to_left_level_zero(dim);
            functor.execute(source, result, iterator, dim);
        });
        Ok(())
    }

    pub fn sweep_1d_in_place(&mut self, values: &mut [f64], dim: usize) -> Result<(), SGError>
    {
        let source = values.to_vec();
        self.sweep_1d(&source, values, dim)
    }

    pub fn sweep_1d_boundary_in_place(&mut self, values: &mut [f64], dim: usize) -> Result<(), SGError>
    {
        let source = values.to_vec();
        self.sweep_1d_boundary(&source, values, dim)
    }

    fn check(&self, source: &[f64], result: &[f64], dim: usize) -> Result<(), SGError>
    {
        if dim >= self.storage.dim()
        {
            return Err(SGError::InvalidArgument(format!("sweep dimension {dim} is out of range for a {}-dimensional grid", self.storage.dim())));
        }
        for len in [source.len(), result.len()]
        {
            if len != self.storage.len()
            {
                return Err(SGError::CoefficientLengthMismatch { expected: self.storage.len(), actual: len });
            }
        }
        Ok(())
    }

    ///
    /// Visits each pole of `dim` once, in order of first appearance in the
    /// storage. A pole is identified by the point with `dim` reset to (0, 0);
    /// `operation` is told whether the pole holds any point above level zero.
    ///
    /// # Panics
    /// If a stored point of level >= 2 in `dim` misses its parent in `dim`.
    ///
    fn for_each_pole<Op: FnMut(&mut F, &mut GridIterator<'a>, bool)>(&mut self, dim: usize, mut operation: Op)
    {
        let storage = self.storage;
        let mut poles: IndexMap<GridPoint, bool, FxBuildHasher> = IndexMap::default();
        for point in storage.nodes()
        {
            let mut pole: GridPoint = point.into();
            if let Some(parent) = pole.parent(dim)
            {
                if !storage.contains(&parent)
                {
                    panic!("grid point {parent} is not part of the storage");
                }
            }
            let has_hierarchy = pole.get(dim).0 > 0;
            pole.set(dim, 0, 0);
            *poles.entry(pole).or_insert(false) |= has_hierarchy;
        }
        let mut iterator = GridIterator::new(storage);
        for (pole, has_hierarchy) in poles
        {
            iterator.set_point(pole);
            operation(&mut self.functor, &mut iterator, has_hierarchy);
        }
    }
}
