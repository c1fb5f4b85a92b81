use crate::algorithms::sweep::{Sweep, SweepFunction};
use crate::errors::SGError;
use crate::iterators::grid_iterator::{GridIterator, GridIteratorT};
use crate::storage::GridStorage;

pub trait HierarchisationOperation
{
    ///
    /// Turns nodal values into hierarchical surpluses, in place.
    ///
    fn hierarchize(&self, node_values: &mut [f64], storage: &GridStorage) -> Result<(), SGError>;
    ///
    /// Turns hierarchical surpluses back into nodal values, in place.
    ///
    fn dehierarchize(&self, alpha: &mut [f64], storage: &GridStorage) -> Result<(), SGError>;
}

pub struct LinearHierarchisation;

impl LinearHierarchisation
{
    fn recurse(source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dimension: usize, left_value: f64, right_value: f64)
    {
        if let Some(seq) = iterator.seq()
        {
            let mid_value = source[seq];
            if !iterator.hint()
            {
                iterator.left_child(dimension);
                if iterator.seq().is_some()
                {
                    Self::recurse(source, result, iterator, dimension, left_value, mid_value);
                }
                iterator.step_right(dimension);
                if iterator.seq().is_some()
                {
                    Self::recurse(source, result, iterator, dimension, mid_value, right_value);
                }
                iterator.up(dimension);
            }
            result[seq] = mid_value - 0.5 * (left_value + right_value);
        }
    }
}

impl SweepFunction for LinearHierarchisation
{
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dimension: usize)
    {
        Self::recurse(source, result, iterator, dimension, 0.0, 0.0);
    }
}

///
/// Reads the value of the current level zero point and copies it to the
/// result. Absent boundary points count as zero.
///
fn boundary_value(source: &[f64], result: &mut [f64], iterator: &GridIterator) -> f64
{
    match iterator.seq()
    {
        Some(seq) =>
        {
            result[seq] = source[seq];
            source[seq]
        },
        None => 0.0,
    }
}

pub struct LinearBoundaryHierarchisation;

impl SweepFunction for LinearBoundaryHierarchisation
{
    #[inline]
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dimension: usize)
    {
        // left boundary
        let left_boundary = boundary_value(source, result, iterator);
        iterator.reset_to_right_level_zero(dimension);
        let right_boundary = boundary_value(source, result, iterator);
        if iterator.reset_to_level_one(dimension)
        {
            LinearHierarchisation::recurse(source, result, iterator, dimension, left_boundary, right_boundary);
        }
        iterator.reset_to_left_level_zero(dimension);
    }
}

pub struct LinearDehierarchisation;

impl LinearDehierarchisation
{
    #[inline]
    fn recurse(source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dimension: usize, left_value: f64, right_value: f64)
    {
        if let Some(seq) = iterator.seq()
        {
            let mid_value = source[seq] + 0.5 * (left_value + right_value);
            result[seq] = mid_value;
            if !iterator.hint()
            {
                iterator.left_child(dimension);
                if iterator.seq().is_some()
                {
                    Self::recurse(source, result, iterator, dimension, left_value, mid_value);
                }
                iterator.step_right(dimension);
                if iterator.seq().is_some()
                {
                    Self::recurse(source, result, iterator, dimension, mid_value, right_value);
                }
                iterator.up(dimension);
            }
        }
    }
}

impl SweepFunction for LinearDehierarchisation
{
    #[inline]
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dimension: usize)
    {
        Self::recurse(source, result, iterator, dimension, 0.0, 0.0);
    }
}

pub struct LinearBoundaryDehierarchisation;

impl SweepFunction for LinearBoundaryDehierarchisation
{
    #[inline]
    fn execute(&mut self, source: &[f64], result: &mut [f64], iterator: &mut GridIterator, dimension: usize)
    {
        let left_boundary = boundary_value(source, result, iterator);
        iterator.reset_to_right_level_zero(dimension);
        let right_boundary = boundary_value(source, result, iterator);
        if iterator.reset_to_level_one(dimension)
        {
            LinearDehierarchisation::recurse(source, result, iterator, dimension, left_boundary, right_boundary);
        }
        iterator.reset_to_left_level_zero(dimension);
    }
}

#[derive(Clone, Copy, Default)]
pub struct LinearHierarchisationOperation;

impl HierarchisationOperation for LinearHierarchisationOperation
{
    #[inline]
    fn hierarchize(&self, node_values: &mut [f64], storage: &GridStorage) -> Result<(), SGError>
    {
        let mut sweep = Sweep::new(LinearHierarchisation, storage);
        for d in 0..storage.dim()
        {
            sweep.sweep_1d_in_place(node_values, d)?;
        }
        Ok(())
    }
    #[inline]
    fn dehierarchize(&self, alpha: &mut [f64], storage: &GridStorage) -> Result<(), SGError>
    {
        let mut sweep = Sweep::new(LinearDehierarchisation, storage);
        for d in 0..storage.dim()
        {
            sweep.sweep_1d_in_place(alpha, d)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Default)]
pub struct LinearBoundaryHierarchisationOperation;

impl HierarchisationOperation for LinearBoundaryHierarchisationOperation
{
    #[inline]
    fn hierarchize(&self, node_values: &mut [f64], storage: &GridStorage) -> Result<(), SGError>
    {
        let mut sweep = Sweep::new(LinearBoundaryHierarchisation, storage);
        for d in 0..storage.dim()
        {
            sweep.sweep_1d_boundary_in_place(node_values, d)?;
        }
        Ok(())
    }
    #[inline]
    fn dehierarchize(&self, alpha: &mut [f64], storage: &GridStorage) -> Result<(), SGError>
    {
        let mut sweep = Sweep::new(LinearBoundaryDehierarchisation, storage);
        for d in 0..storage.dim()
        {
            sweep.sweep_1d_boundary_in_place(alpha, d)?;
        }
        Ok(())
    }
}
