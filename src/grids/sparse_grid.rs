use std::io::{Read, Write};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithms::basis_evaluation::{evaluate, evaluate_stretched};
use crate::algorithms::coarsening::{CoarseningFunctor, CoarseningOptions, HashCoarsening};
use crate::algorithms::hierarchisation::{HierarchisationOperation, LinearBoundaryHierarchisationOperation, LinearHierarchisationOperation};
use crate::algorithms::refinement::{HashRefinement, RefinementFunctor, RefinementOptions};
use crate::algorithms::up_down::OperationLTwoDotProductLinear;
use crate::basis::{Basis, LinearBasis, LinearBoundaryBasis};
use crate::errors::SGError;
use crate::generators;
use crate::serialization::{deserialize, serialize, SerializationFormat};
use crate::storage::bounding_box::BoundingBox;
use crate::storage::{GridStorage, LevelType, PointIterator};

///
/// A piecewise linear sparse grid interpolant: the storage together with the
/// nodal values and the hierarchical surpluses, kept in sequence order.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SparseGrid
{
    storage: GridStorage,
    alpha: Vec<f64>,
    values: Vec<f64>,
}

impl SparseGrid
{
    /// Creates an empty grid on the unit cube.
    pub fn new(num_inputs: usize) -> Self
    {
        Self::from_storage(GridStorage::new(num_inputs))
    }

    pub fn with_bounding_box(bounding_box: BoundingBox) -> Self
    {
        Self::from_storage(GridStorage::with_bounding_box(bounding_box))
    }

    ///
    /// Wraps an existing storage. Values and surpluses start at zero.
    ///
    pub fn from_storage(storage: GridStorage) -> Self
    {
        let n = storage.len();
        Self { storage, alpha: vec![0.0; n], values: vec![0.0; n] }
    }

    pub fn storage(&self) -> &GridStorage
    {
        &self.storage
    }

    pub fn alpha(&self) -> &[f64]
    {
        &self.alpha
    }

    pub fn values(&self) -> &[f64]
    {
        &self.values
    }

    pub fn len(&self) -> usize
    {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.storage.is_empty()
    }

    pub fn dim(&self) -> usize
    {
        self.storage.dim()
    }

    pub fn has_boundary(&self) -> bool
    {
        self.storage.has_boundary()
    }

    pub fn bounding_box(&self) -> &BoundingBox
    {
        self.storage.bounding_box()
    }

    /// Physical coordinates of the grid points in sequence order.
    pub fn points(&self) -> PointIterator<'_>
    {
        self.storage.points()
    }

    fn resize(&mut self)
    {
        self.alpha.resize(self.len(), 0.0);
        self.values.resize(self.len(), 0.0);
    }

    /// Adds a regular sparse grid.
    pub fn sparse_grid(&mut self, levels: &[LevelType]) -> Result<(), SGError>
    {
        generators::regular(&mut self.storage, levels)?;
        self.resize();
        Ok(())
    }

    pub fn full_grid(&mut self, level: LevelType) -> Result<(), SGError>
    {
        generators::full(&mut self.storage, level)?;
        self.resize();
        Ok(())
    }

    /// Adds a regular sparse grid with boundaries, see [`generators::regular_with_boundaries`].
    pub fn sparse_grid_with_boundaries(&mut self, levels: &[LevelType], boundary_level: LevelType) -> Result<(), SGError>
    {
        generators::regular_with_boundaries(&mut self.storage, levels, boundary_level)?;
        self.resize();
        Ok(())
    }

    pub fn full_grid_with_boundaries(&mut self, level: LevelType) -> Result<(), SGError>
    {
        generators::full_with_boundaries(&mut self.storage, level)?;
        self.resize();
        Ok(())
    }

    fn hierarchisation(&self) -> &'static dyn HierarchisationOperation
    {
        if self.has_boundary()
        {
            &LinearBoundaryHierarchisationOperation
        }
        else
        {
            &LinearHierarchisationOperation
        }
    }

    fn basis(&self) -> &'static dyn Basis
    {
        if self.has_boundary()
        {
            &LinearBoundaryBasis
        }
        else
        {
            &LinearBasis
        }
    }

    /// Computes the surpluses from the nodal values.
    pub fn hierarchize(&mut self) -> Result<(), SGError>
    {
        self.alpha.clone_from(&self.values);
        self.hierarchisation().hierarchize(&mut self.alpha, &self.storage)
    }

    /// Recomputes the nodal values from the surpluses.
    pub fn dehierarchize(&mut self) -> Result<(), SGError>
    {
        self.values.clone_from(&self.alpha);
        self.hierarchisation().dehierarchize(&mut self.values, &self.storage)
    }

    ///
    /// Sets the nodal values and hierarchizes them.
    ///
    pub fn set_values(&mut self, values: Vec<f64>) -> Result<(), SGError>
    {
        if values.len() != self.len()
        {
            return Err(SGError::CoefficientLengthMismatch { expected: self.len(), actual: values.len() });
        }
        self.values = values;
        self.hierarchize()
    }

    ///
    /// Sets the surpluses directly and recomputes the nodal values.
    ///
    pub fn set_alpha(&mut self, alpha: Vec<f64>) -> Result<(), SGError>
    {
        if alpha.len() != self.len()
        {
            return Err(SGError::CoefficientLengthMismatch { expected: self.len(), actual: alpha.len() });
        }
        self.alpha = alpha;
        self.dehierarchize()
    }

    /// Evaluates `eval_fun` at every grid point and hierarchizes.
    pub fn update_values(&mut self, eval_fun: &mut dyn FnMut(&[f64]) -> f64) -> Result<(), SGError>
    {
        let values = self.points().map(|x| eval_fun(x.as_slice())).collect();
        self.set_values(values)
    }

    /// Same as [`update_values`](Self::update_values) but evaluates in parallel.
    pub fn update_values_parallel<EF: Fn(&[f64]) -> f64 + Send + Sync>(&mut self, eval_fun: &EF) -> Result<(), SGError>
    {
        let points: Vec<Vec<f64>> = self.points().collect();
        let values = points.par_iter().map(|x| eval_fun(x.as_slice())).collect();
        self.set_values(values)
    }

    ///
    /// Performs a single refinement step. Returns the physical coordinates of the
    /// inserted points, whose values must be supplied through
    /// [`update_refined_values`](Self::update_refined_values).
    ///
    pub fn refine_iteration(&mut self, functor: &dyn RefinementFunctor, options: &RefinementOptions) -> Result<Vec<Vec<f64>>, SGError>
    {
        let old_len = self.len();
        HashRefinement.refine(&mut self.storage, &mut self.alpha, functor, options)?;
        self.values.resize(self.len(), 0.0);
        Ok((old_len..self.len()).map(|seq| self.storage.coordinate(seq)).collect())
    }

    ///
    /// Sets the values of the points added by the last refinement step and
    /// hierarchizes.
    ///
    pub fn update_refined_values(&mut self, values: &[f64]) -> Result<(), SGError>
    {
        if values.len() > self.len()
        {
            return Err(SGError::CoefficientLengthMismatch { expected: self.len(), actual: values.len() });
        }
        let start = self.len() - values.len();
        self.values[start..].copy_from_slice(values);
        self.hierarchize()
    }

    ///
    /// Refines until no point is selected or `max_iterations` steps are done.
    /// New points are evaluated with `eval_fun`. Returns the number of inserted points.
    ///
    pub fn refine(&mut self, functor: &dyn RefinementFunctor, eval_fun: &mut dyn FnMut(&[f64]) -> f64, options: &RefinementOptions, max_iterations: usize) -> Result<usize, SGError>
    {
        let mut inserted = 0;
        for iteration in 0..max_iterations
        {
            let points = self.refine_iteration(functor, options)?;
            if points.is_empty()
            {
                debug!(iteration, "refinement converged");
                break;
            }
            let values: Vec<f64> = points.iter().map(|x| eval_fun(x.as_slice())).collect();
            self.update_refined_values(&values)?;
            inserted += points.len();
        }
        Ok(inserted)
    }

    ///
    /// Removes points selected by `functor`. Surpluses of the remaining points
    /// are unaffected. Returns the number of removed points.
    ///
    pub fn coarsen(&mut self, functor: &dyn CoarseningFunctor, options: &CoarseningOptions) -> Result<usize, SGError>
    {
        let result = HashCoarsening.coarsen(&mut self.storage, &mut self.alpha, functor, options)?;
        if result.removed > 0
        {
            self.values = result.remaining.iter().map(|&seq| self.values[seq]).collect();
        }
        Ok(result.removed)
    }

    ///
    /// Evaluates the interpolant at the physical coordinate `x`. Fails if `x`
    /// lies outside the bounding box.
    ///
    pub fn interpolate(&self, x: &[f64]) -> Result<f64, SGError>
    {
        if x.len() != self.dim()
        {
            return Err(SGError::DimensionMismatch { expected: self.dim(), actual: x.len() });
        }
        if !self.bounding_box().contains(x)
        {
            return Err(SGError::InvalidArgument(format!("{x:?} lies outside the grid domain")));
        }
        match self.storage.stretching()
        {
            Some(stretching) => evaluate_stretched(&self.storage, &self.alpha, stretching, x),
            None => evaluate(&self.storage, &self.alpha, self.basis(), x),
        }
    }

    pub fn interpolate_batch(&self, x: &[Vec<f64>]) -> Vec<Result<f64, SGError>>
    {
        x.par_iter().map(|x| self.interpolate(x)).collect()
    }

    ///
    /// Integral of the interpolant over the bounding box.
    ///
    pub fn integrate(&self) -> f64
    {
        let basis = self.basis();
        let sum: f64 = self.storage.iter()
            .map(|(point, seq)| self.alpha[seq] * point.level().iter().zip(point.index()).map(|(&l, &i)| basis.integral(l, i)).product::<f64>())
            .sum();
        sum * self.bounding_box().volume()
    }

    ///
    /// Applies the L2 mass matrix of the grid's basis functions to `alpha`.
    ///
    pub fn mass_matrix_mult(&self, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
    {
        OperationLTwoDotProductLinear::new(&self.storage).mult(alpha, result)
    }

    pub fn to_bytes(&self, format: SerializationFormat) -> Result<Vec<u8>, SGError>
    {
        serialize(self, format)
    }

    pub fn from_bytes(buffer: &[u8], format: SerializationFormat) -> Result<Self, SGError>
    {
        let grid: Self = deserialize(buffer, format)?;
        if grid.alpha.len() != grid.len() || grid.values.len() != grid.len()
        {
            return Err(SGError::DeserializationFailed);
        }
        Ok(grid)
    }

    ///
    /// Saves the grid, LZ4 compressed.
    ///
    pub fn save(&self, path: &str) -> Result<(), SGError>
    {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        file.write_all(&self.to_bytes(SerializationFormat::BincodeLz4)?)?;
        file.flush()?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, SGError>
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, SerializationFormat::BincodeLz4)
    }

    pub fn load(path: &str) -> Result<Self, SGError>
    {
        Self::read(std::io::BufReader::new(std::fs::File::open(path)?))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::refinement::{SurplusCoarseningFunctor, SurplusRefinementFunctor};

    fn parabola(x: &[f64]) -> f64
    {
        x.iter().map(|&xi| 4.0 * xi * (1.0 - xi)).product()
    }

    #[test]
    fn test_interpolate_and_integrate()
    {
        let mut grid = SparseGrid::new(2);
        grid.sparse_grid(&[5, 5]).unwrap();
        grid.update_values(&mut |x| parabola(x)).unwrap();
        for (x, &value) in grid.points().zip(grid.values())
        {
            assert!((grid.interpolate(&x).unwrap() - value).abs() < 1e-12);
        }
        assert!((grid.interpolate(&[0.3, 0.6]).unwrap() - parabola(&[0.3, 0.6])).abs() < 0.05);
        // exact integral is (2/3)^2
        assert!((grid.integrate() - 4.0 / 9.0).abs() < 0.02);
        assert!(grid.interpolate(&[1.5, 0.5]).is_err());
        assert!(grid.interpolate(&[0.5]).is_err());
    }

    #[test]
    fn test_boundary_grid_reproduces_bilinear()
    {
        let mut grid = SparseGrid::with_bounding_box(BoundingBox::new(&[-1.0, 0.0], &[1.0, 2.0]));
        grid.sparse_grid_with_boundaries(&[3, 3], 1).unwrap();
        let f = |x: &[f64]| 1.0 + 2.0 * x[0] + x[1] + 0.5 * x[0] * x[1];
        grid.update_values_parallel(&f).unwrap();
        for x in [[0.3, 1.7], [-0.9, 0.1], [1.0, 2.0]]
        {
            assert!((grid.interpolate(&x).unwrap() - f(x.as_slice())).abs() < 1e-12);
        }
        // integral of f over [-1,1]x[0,2] is 8
        assert!((grid.integrate() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_dehierarchize_restores_values()
    {
        let mut grid = SparseGrid::new(3);
        grid.sparse_grid(&[3, 3, 3]).unwrap();
        grid.update_values(&mut |x| parabola(x) + x[0]).unwrap();
        let values = grid.values().to_vec();
        let alpha = grid.alpha().to_vec();
        grid.set_alpha(alpha).unwrap();
        for (a, b) in grid.values().iter().zip(&values)
        {
            assert!((a - b).abs() < 1e-12);
        }
        assert!(grid.set_values(vec![0.0; 2]).is_err());
    }

    #[test]
    fn test_refine_and_coarsen_keep_vectors_aligned()
    {
        let mut grid = SparseGrid::new(1);
        grid.sparse_grid(&[2]).unwrap();
        let f = |x: &[f64]| (-50.0 * (x[0] - 0.3).powi(2)).exp();
        grid.update_values(&mut |x| f(x)).unwrap();
        let functor = SurplusRefinementFunctor::new(2, 1e-3);
        let inserted = grid.refine(&functor, &mut |x| f(x), &RefinementOptions::with_max_level(8), 5).unwrap();
        assert!(inserted > 0);
        assert_eq!(grid.alpha().len(), grid.len());
        assert_eq!(grid.values().len(), grid.len());
        for (x, &value) in grid.points().zip(grid.values())
        {
            assert!((value - f(x.as_slice())).abs() < 1e-14);
            assert!((grid.interpolate(&x).unwrap() - value).abs() < 1e-12);
        }

        let removed = grid.coarsen(&SurplusCoarseningFunctor::new(100, 1e-2), &CoarseningOptions::default()).unwrap();
        assert_eq!(grid.alpha().len(), grid.len());
        assert_eq!(grid.values().len(), grid.len());
        if removed > 0
        {
            for (x, &value) in grid.points().zip(grid.values())
            {
                assert!((value - f(x.as_slice())).abs() < 1e-14);
                assert!((grid.interpolate(&x).unwrap() - value).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_save_and_load()
    {
        let mut grid = SparseGrid::new(2);
        grid.sparse_grid(&[3, 3]).unwrap();
        grid.update_values(&mut |x| parabola(x)).unwrap();
        let path = std::env::temp_dir().join("sparse_grid_save_and_load.bin");
        let path = path.to_str().unwrap();
        grid.save(path).unwrap();
        let loaded = SparseGrid::load(path).unwrap();
        std::fs::remove_file(path).unwrap();
        assert_eq!(loaded.alpha(), grid.alpha());
        assert_eq!(loaded.values(), grid.values());
        assert_eq!(loaded.storage().find(&crate::storage::GridPoint::new(&[2, 1], &[3, 1])), grid.storage().find(&crate::storage::GridPoint::new(&[2, 1], &[3, 1])));

        let bytes = grid.to_bytes(SerializationFormat::Bincode).unwrap();
        let restored = SparseGrid::from_bytes(&bytes, SerializationFormat::Bincode).unwrap();
        assert_eq!(restored.len(), 17);
        assert!(SparseGrid::from_bytes(&bytes[..bytes.len() / 2], SerializationFormat::Bincode).is_err());
    }
}
